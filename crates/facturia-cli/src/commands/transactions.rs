//! Transaction command implementations

use anyhow::{Context, Result};
use chrono::NaiveDate;
use facturia_core::{Database, Direction, PipelineConfig, TransactionEdit, TransactionFilter};

use super::{format_amount, truncate};

fn parse_direction(s: &str) -> Result<Direction> {
    s.parse::<Direction>().map_err(anyhow::Error::msg)
}

pub fn cmd_transactions_list(
    db: &Database,
    review: bool,
    direction: Option<&str>,
    category: Option<&str>,
    limit: i64,
) -> Result<()> {
    let direction = direction.map(parse_direction).transpose()?;
    let filter = TransactionFilter::new()
        .direction(direction)
        .category(category)
        .needs_review(review.then_some(true))
        .limit(Some(limit));
    let transactions = db.list_transactions(&filter)?;

    if transactions.is_empty() {
        if review {
            println!("No transactions waiting for review.");
        } else {
            println!("No transactions found. Import some with:");
            println!("  facturia import --file extracto.csv");
        }
        return Ok(());
    }

    let total = db.count_transactions(&filter)?;

    println!();
    if review {
        println!("⚠️  Transactions to review ({} total)", total);
    } else {
        println!("📝 Transactions ({} total)", total);
    }
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in transactions {
        let record = &tx.record;
        let label = record
            .counterparty
            .as_deref()
            .or(record.description.as_deref())
            .unwrap_or("-");
        println!(
            "   [{}] {} │ {:>14} │ {:<22} │ {}",
            tx.id,
            record.occurred_at,
            format_amount(record.signed_amount()),
            record.category,
            truncate(label, 30)
        );
        if review {
            if let Some(ref reason) = record.review_reason {
                println!("        ↳ {}", reason);
            }
        }
    }

    if review {
        println!();
        println!("   Use 'facturia transactions edit <id> --category <name>' to correct one.");
    }

    Ok(())
}

/// Build an edit from command-line flags
pub fn parse_edit(
    category: Option<String>,
    amount: Option<f64>,
    direction: Option<&str>,
    date: Option<&str>,
    description: Option<String>,
    counterparty: Option<String>,
    review_reason: Option<String>,
) -> Result<TransactionEdit> {
    let occurred_at = date
        .map(|d| {
            NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", d))
        })
        .transpose()?;

    Ok(TransactionEdit {
        direction: direction.map(parse_direction).transpose()?,
        category,
        amount,
        occurred_at,
        counterparty,
        description,
        receipt_number: None,
        review_reason,
    })
}

pub fn cmd_transactions_edit(
    db: &Database,
    config: &PipelineConfig,
    id: i64,
    edit: &TransactionEdit,
) -> Result<()> {
    if edit.is_empty() {
        println!("Nothing to change. Pass at least one of --category, --amount, --direction, --date, --description, --counterparty.");
        return Ok(());
    }

    let tx = db
        .edit_transaction(id, edit, &config.vocabulary)
        .with_context(|| format!("Failed to edit transaction {}", id))?;

    println!(
        "✅ Updated [{}] {} │ {} │ {}",
        tx.id,
        tx.record.occurred_at,
        format_amount(tx.record.signed_amount()),
        tx.record.category
    );
    if tx.record.needs_review {
        println!("   ⚠️  Still flagged for review");
    }
    Ok(())
}

pub fn cmd_transactions_delete(db: &Database, id: i64) -> Result<()> {
    if db.delete_transaction(id)? {
        println!("🗑️  Deleted transaction {}", id);
        Ok(())
    } else {
        anyhow::bail!("Transaction {} not found", id)
    }
}

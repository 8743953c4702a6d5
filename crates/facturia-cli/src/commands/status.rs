//! Status-related command implementations (stats, categories, status)

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use facturia_core::db::DB_KEY_ENV;
use facturia_core::{
    BackendClient, ClassificationBackend, Database, Direction, PipelineConfig, TransactionFilter,
};

use super::{format_amount, open_db};

fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

pub fn cmd_stats(db: &Database, from: Option<&str>, to: Option<&str>, json: bool) -> Result<()> {
    let from = from.map(parse_day).transpose()?;
    let to = to.map(parse_day).transpose()?;
    let range = match (from, to) {
        (None, None) => None,
        (from, to) => Some((
            from.unwrap_or(NaiveDate::MIN),
            to.unwrap_or(NaiveDate::MAX),
        )),
    };

    let summary = db.summary(&TransactionFilter::new().date_range(range))?;

    if json {
        let out =
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary to JSON")?;
        println!("{}", out);
        return Ok(());
    }

    println!();
    println!("💰 Ledger Summary");
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   Income:   {:>16}  ({} transactions)",
        format_amount(summary.total_income),
        summary.income_count
    );
    println!(
        "   Expenses: {:>16}  ({} transactions)",
        format_amount(-summary.total_expense),
        summary.expense_count
    );
    println!("   Balance:  {:>16}", format_amount(summary.balance));

    if summary.needs_review_count > 0 {
        println!();
        println!(
            "   ⚠️  {} transactions need review (facturia transactions list --review)",
            summary.needs_review_count
        );
    }

    if !summary.by_category.is_empty() {
        println!();
        println!("   By category:");
        for entry in &summary.by_category {
            let signed = match entry.direction {
                Direction::Income => entry.total,
                Direction::Expense => -entry.total,
            };
            println!(
                "   {:<24} {:>16}  ({})",
                entry.category,
                format_amount(signed),
                entry.count
            );
        }
    }

    println!();
    Ok(())
}

pub fn cmd_categories(config: &PipelineConfig) -> Result<()> {
    println!();
    println!("🏷️  Categories ({})", config.source);
    for direction in Direction::all() {
        println!();
        println!("   {}:", direction);
        let catch_all = config.vocabulary.catch_all(*direction);
        for term in config.vocabulary.terms(*direction) {
            if term == catch_all {
                println!("     • {} (catch-all)", term);
            } else {
                println!("     • {}", term);
            }
        }
    }
    println!();
    Ok(())
}

pub async fn cmd_status(db_path: &Path, no_encrypt: bool, config_path: Option<&Path>) -> Result<()> {
    println!();
    println!("📊 FacturIA Status");
    println!("   ─────────────────────────────────────────────────────────────");

    println!("   Database: {}", db_path.display());
    if db_path.exists() {
        if let Ok(metadata) = std::fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    let has_key = std::env::var(DB_KEY_ENV).is_ok();
    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else if has_key {
        println!("   🔒 Encryption: ENABLED ({}=***)", DB_KEY_ENV);
    } else {
        println!("   ❌ Encryption: REQUIRED but {} not set", DB_KEY_ENV);
    }

    if db_path.exists() {
        match open_db(db_path, no_encrypt) {
            Ok(db) => {
                let all = TransactionFilter::new();
                let review = TransactionFilter::new().needs_review(Some(true));
                println!();
                println!("   Transactions: {}", db.count_transactions(&all)?);
                println!("   Needing review: {}", db.count_transactions(&review)?);
                println!("   Files processed: {}", db.count_processed_files()?);
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
                if !no_encrypt && !has_key {
                    println!("      Set {} or use --no-encrypt", DB_KEY_ENV);
                } else if has_key {
                    println!("      (Check if {} is correct)", DB_KEY_ENV);
                }
            }
        }
    }

    println!();
    let config = match PipelineConfig::load(config_path) {
        Ok(config) => {
            println!("   Config: {}", config.source);
            println!(
                "   Vocabulary: {} income / {} expense categories",
                config.vocabulary.terms(Direction::Income).len(),
                config.vocabulary.terms(Direction::Expense).len()
            );
            config
        }
        Err(e) => {
            println!("   ❌ Config error: {}", e);
            println!();
            return Ok(());
        }
    };

    println!();
    match BackendClient::from_env(config.backend.timeout) {
        Some(backend) => {
            let healthy = backend.health_check().await;
            let icon = if healthy { "✅" } else { "❌" };
            println!(
                "   {} Backend: {} ({} @ {})",
                icon,
                backend.name(),
                backend.model(),
                backend.host()
            );
            println!(
                "   Retry: {} attempts, breaker opens after {} failures for {}s",
                config.retry.max_attempts,
                config.breaker.failure_threshold,
                config.breaker.cooldown.as_secs()
            );
        }
        None => {
            println!("   ❌ Backend: not configured");
            println!("      Set GEMINI_API_KEY, or AI_BACKEND=ollama with OLLAMA_HOST");
        }
    }

    println!();
    Ok(())
}

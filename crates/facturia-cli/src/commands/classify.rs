//! Document classification commands (classify, pending)

use std::path::Path;

use anyhow::{Context, Result};
use facturia_core::{Attachment, ClassificationBackend, DocumentOutcome, Pipeline};

use super::format_amount;

pub async fn cmd_classify<B: ClassificationBackend>(
    pipeline: &Pipeline<B>,
    file: &Path,
    sender: Option<String>,
    subject: Option<String>,
    text_file: Option<&Path>,
) -> Result<()> {
    let mut attachment = Attachment::from_path(file)
        .with_context(|| format!("Failed to read {}", file.display()))?
        .with_email(sender, subject);
    if let Some(path) = text_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        attachment.extracted_text = Some(text);
    }

    println!("🤖 Classifying {}...", attachment.file_name);

    match pipeline.process_document(&attachment).await? {
        DocumentOutcome::Stored(id) => {
            let tx = pipeline
                .database()
                .get_transaction(id)?
                .context("Stored transaction not found")?;
            let record = &tx.record;
            println!(
                "✅ [{}] {} │ {} │ {} │ {}",
                id,
                record.occurred_at,
                format_amount(record.signed_amount()),
                record.category,
                record.counterparty.as_deref().unwrap_or("-")
            );
            if let Some(ref reason) = record.review_reason {
                println!("   ⚠️  Needs review: {}", reason);
            }
        }
        DocumentOutcome::Duplicate => {
            println!("   ⏭️  Already processed (same content), skipping");
        }
        DocumentOutcome::Unavailable => {
            println!("   ⏸️  Backend unavailable; the document will be retried on the next pass");
        }
        DocumentOutcome::Rejected(rejection) => {
            println!("   ❌ Rejected: {}", rejection);
            println!("      The document stays pending and will be sent again on the next pass");
        }
    }

    Ok(())
}

pub async fn cmd_pending<B: ClassificationBackend>(pipeline: &Pipeline<B>, dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }

    println!("📂 Processing attachments in {}...", dir.display());
    let summary = pipeline.process_pending_dir(dir).await?;

    println!();
    println!("✅ Processed {} files", summary.files);
    println!("   Transactions stored: {}", summary.stored_transactions);
    println!("   Duplicates skipped:  {}", summary.duplicates);
    println!("   Rejected:            {}", summary.rejected);
    println!("   Unsupported:         {}", summary.unsupported);
    if summary.unavailable > 0 {
        println!(
            "   ⏸️  Left for next pass: {} (backend unavailable)",
            summary.unavailable
        );
    }
    if summary.failed > 0 {
        println!("   ❌ Failed:            {}", summary.failed);
    }

    Ok(())
}

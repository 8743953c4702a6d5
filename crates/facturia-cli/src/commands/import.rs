//! Tabular import command

use std::path::Path;

use anyhow::{Context, Result};
use facturia_core::{Attachment, AttachmentKind, Database, PipelineConfig, TabularImporter, TabularOutcome};

pub fn cmd_import(db: &Database, config: &PipelineConfig, file: &Path) -> Result<()> {
    let attachment = Attachment::from_path(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    if attachment.kind() != Some(AttachmentKind::Tabular) {
        anyhow::bail!(
            "{} is not a tabular file (expected .csv, .tsv or .txt)",
            file.display()
        );
    }

    println!("📥 Importing {}...", attachment.file_name);

    let importer = TabularImporter::new(config, db.clone())?;
    match importer.process(&attachment)? {
        TabularOutcome::Duplicate => {
            println!("   ⏭️  Already imported (same content), skipping");
        }
        TabularOutcome::Empty { skipped } => {
            println!("   ⚠️  No rows with a usable amount ({} skipped)", skipped);
        }
        TabularOutcome::Stored {
            ids,
            stats,
            skipped,
        } => {
            println!("✅ Imported {} transactions", ids.len());
            println!("   Categorized by keyword: {}", stats.by_keyword);
            println!("   Category from file:     {}", stats.existing);
            println!("   Uncategorized:          {}", stats.fallback);
            if skipped > 0 {
                println!("   Skipped rows:           {}", skipped);
            }
        }
    }

    Ok(())
}

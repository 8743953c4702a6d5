//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (open_db, load_config, build_pipeline) and init
//! - `import` - Tabular import
//! - `classify` - Document classification and the pending-directory pass
//! - `status` - Stats, categories and status
//! - `transactions` - Transaction commands (list, edit, delete)

pub mod classify;
pub mod core;
pub mod import;
pub mod status;
pub mod transactions;

// Re-export command functions for main.rs
pub use classify::*;
pub use core::*;
pub use import::*;
pub use status::*;
pub use transactions::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Colored, signed amount for terminal output
pub fn format_amount(signed: f64) -> String {
    if signed < 0.0 {
        format!("\x1b[31m-${:.2}\x1b[0m", signed.abs()) // Red for expenses
    } else {
        format!("\x1b[32m+${:.2}\x1b[0m", signed) // Green for income
    }
}

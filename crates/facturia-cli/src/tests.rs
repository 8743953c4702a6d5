//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use chrono::NaiveDate;
use facturia_core::{
    Database, Direction, MockBackend, Pipeline, PipelineConfig, PromptLibrary, Source,
    TransactionFilter, TransactionRecord,
};

use crate::commands::{self, format_amount, truncate};

fn setup_test_db() -> Database {
    Database::in_memory().unwrap()
}

fn config() -> PipelineConfig {
    PipelineConfig::embedded().unwrap()
}

/// Insert a tabular transaction, returning its id
fn create_test_transaction(db: &Database, direction: Direction, category: &str, amount: f64) -> i64 {
    let record = TransactionRecord {
        direction,
        category: category.to_string(),
        amount,
        occurred_at: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        counterparty: Some("Coto".into()),
        description: Some("Compra semanal".into()),
        receipt_number: None,
        source: Source::Tabular,
        source_file: Some("extracto.csv".into()),
        ai_processed: false,
        confidence: None,
        needs_review: false,
        review_reason: None,
        manually_edited: false,
    };
    db.insert_transaction(&record).unwrap()
}

fn test_pipeline(backend: MockBackend) -> Pipeline<MockBackend> {
    Pipeline::new(&config(), backend, setup_test_db())
        .unwrap()
        .with_prompts(PromptLibrary::embedded_only())
}

// ========== Formatting Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("exactly ten", 11), "exactly ten");
    assert_eq!(truncate("a longer description", 10), "a longe...");
    // Multi-byte characters are counted, not bytes
    assert_eq!(truncate("Acreditación de haberes", 12), "Acreditac...");
}

#[test]
fn test_format_amount() {
    assert!(format_amount(-25.5).contains("-$25.50"));
    assert!(format_amount(1000.0).contains("+$1000.00"));
    assert!(format_amount(0.0).contains("+$0.00"));
}

// ========== Transactions Command Tests ==========

#[test]
fn test_cmd_transactions_list_empty() {
    let db = setup_test_db();
    assert!(commands::cmd_transactions_list(&db, false, None, None, 20).is_ok());
    assert!(commands::cmd_transactions_list(&db, true, None, None, 20).is_ok());
}

#[test]
fn test_cmd_transactions_list_with_filters() {
    let db = setup_test_db();
    create_test_transaction(&db, Direction::Expense, "supermercado", 2500.0);
    create_test_transaction(&db, Direction::Income, "sueldo", 900000.0);

    assert!(commands::cmd_transactions_list(&db, false, None, None, 20).is_ok());
    assert!(commands::cmd_transactions_list(&db, false, Some("egreso"), None, 20).is_ok());
    assert!(
        commands::cmd_transactions_list(&db, false, None, Some("Supermercado"), 1).is_ok()
    );
}

#[test]
fn test_cmd_transactions_list_invalid_direction() {
    let db = setup_test_db();
    let result = commands::cmd_transactions_list(&db, false, Some("sideways"), None, 20);
    assert!(result.is_err());
}

#[test]
fn test_parse_edit() {
    let edit = commands::parse_edit(
        Some("salud".into()),
        Some(120.0),
        Some("egreso"),
        Some("2024-03-20"),
        None,
        None,
        None,
    )
    .unwrap();
    assert_eq!(edit.category.as_deref(), Some("salud"));
    assert_eq!(edit.direction, Some(Direction::Expense));
    assert_eq!(edit.occurred_at, NaiveDate::from_ymd_opt(2024, 3, 20));
    assert!(!edit.is_empty());

    let empty = commands::parse_edit(None, None, None, None, None, None, None).unwrap();
    assert!(empty.is_empty());
}

#[test]
fn test_parse_edit_rejects_bad_input() {
    let bad_date = commands::parse_edit(None, None, None, Some("20/03/2024"), None, None, None);
    assert!(bad_date.is_err());

    let bad_direction = commands::parse_edit(None, None, Some("both"), None, None, None, None);
    assert!(bad_direction.is_err());
}

#[test]
fn test_cmd_transactions_edit() {
    let db = setup_test_db();
    let config = config();
    let id = create_test_transaction(&db, Direction::Expense, "supermercado", 2500.0);

    let edit = commands::parse_edit(
        Some("salud".into()),
        Some(3100.0),
        None,
        None,
        None,
        None,
        None,
    )
    .unwrap();
    commands::cmd_transactions_edit(&db, &config, id, &edit).unwrap();

    let tx = db.get_transaction(id).unwrap().unwrap();
    assert_eq!(tx.record.category, "salud");
    assert_eq!(tx.record.amount, 3100.0);
    assert!(tx.record.manually_edited);
}

#[test]
fn test_cmd_transactions_edit_empty_is_noop() {
    let db = setup_test_db();
    let id = create_test_transaction(&db, Direction::Expense, "supermercado", 2500.0);

    let edit = commands::parse_edit(None, None, None, None, None, None, None).unwrap();
    commands::cmd_transactions_edit(&db, &config(), id, &edit).unwrap();

    let tx = db.get_transaction(id).unwrap().unwrap();
    assert!(!tx.record.manually_edited);
}

#[test]
fn test_cmd_transactions_edit_rejects_foreign_category() {
    let db = setup_test_db();
    let id = create_test_transaction(&db, Direction::Expense, "supermercado", 2500.0);

    // "sueldo" is an income category
    let edit = commands::parse_edit(Some("sueldo".into()), None, None, None, None, None, None)
        .unwrap();
    assert!(commands::cmd_transactions_edit(&db, &config(), id, &edit).is_err());

    let missing = commands::parse_edit(Some("salud".into()), None, None, None, None, None, None)
        .unwrap();
    assert!(commands::cmd_transactions_edit(&db, &config(), 9999, &missing).is_err());
}

#[test]
fn test_cmd_transactions_delete() {
    let db = setup_test_db();
    let id = create_test_transaction(&db, Direction::Expense, "supermercado", 2500.0);

    assert!(commands::cmd_transactions_delete(&db, id).is_ok());
    assert!(db.get_transaction(id).unwrap().is_none());

    // Second delete fails
    assert!(commands::cmd_transactions_delete(&db, id).is_err());
}

// ========== Stats / Categories Tests ==========

#[test]
fn test_cmd_stats() {
    let db = setup_test_db();
    create_test_transaction(&db, Direction::Expense, "supermercado", 2500.0);
    create_test_transaction(&db, Direction::Income, "sueldo", 900000.0);

    assert!(commands::cmd_stats(&db, None, None, false).is_ok());
    assert!(commands::cmd_stats(&db, Some("2024-03-01"), Some("2024-03-31"), false).is_ok());
    assert!(commands::cmd_stats(&db, Some("2024-03-01"), None, true).is_ok());
}

#[test]
fn test_cmd_stats_invalid_date() {
    let db = setup_test_db();
    assert!(commands::cmd_stats(&db, Some("marzo"), None, false).is_err());
}

#[test]
fn test_cmd_categories() {
    assert!(commands::cmd_categories(&config()).is_ok());
}

// ========== Import Tests ==========

#[test]
fn test_cmd_import_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("extracto.csv");
    std::fs::write(
        &path,
        "Fecha;Descripción;Monto\n\
         02/04/2024;Pago mensual Netflix;-4.500,00\n\
         05/04/2024;Acreditación de haberes;1.250.000,00\n",
    )
    .unwrap();

    let db = setup_test_db();
    let config = config();
    commands::cmd_import(&db, &config, &path).unwrap();
    assert_eq!(db.count_transactions(&TransactionFilter::new()).unwrap(), 2);

    // Same content again is skipped
    commands::cmd_import(&db, &config, &path).unwrap();
    assert_eq!(db.count_transactions(&TransactionFilter::new()).unwrap(), 2);
}

#[test]
fn test_cmd_import_rejects_documents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("factura.pdf");
    std::fs::write(&path, b"%PDF-1.4").unwrap();

    let db = setup_test_db();
    assert!(commands::cmd_import(&db, &config(), &path).is_err());
}

#[test]
fn test_cmd_import_missing_file() {
    let db = setup_test_db();
    let path = std::path::Path::new("/nonexistent/extracto.csv");
    assert!(commands::cmd_import(&db, &config(), path).is_err());
}

// ========== Classify / Pending Tests ==========

#[tokio::test]
async fn test_cmd_classify_stores_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ticket.pdf");
    std::fs::write(&path, b"%PDF-1.4 ticket").unwrap();
    let text_path = dir.path().join("ticket.txt");
    std::fs::write(&text_path, "Coto - Total $1.000").unwrap();

    let pipeline = test_pipeline(MockBackend::new());
    commands::cmd_classify(
        &pipeline,
        &path,
        Some("tickets@coto.com.ar".into()),
        None,
        Some(&text_path),
    )
    .await
    .unwrap();

    let all = pipeline
        .database()
        .list_transactions(&TransactionFilter::new())
        .unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].record.category, "supermercado");
    assert!(all[0].record.ai_processed);

    // Classifying the same file again does not add a row
    commands::cmd_classify(&pipeline, &path, None, None, None)
        .await
        .unwrap();
    assert_eq!(
        pipeline
            .database()
            .count_transactions(&TransactionFilter::new())
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_cmd_classify_rejected_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ilegible.jpg");
    std::fs::write(&path, b"not really a jpeg").unwrap();

    let pipeline = test_pipeline(MockBackend::always("no puedo leer este documento"));
    commands::cmd_classify(&pipeline, &path, None, None, None)
        .await
        .unwrap();
    assert_eq!(
        pipeline
            .database()
            .count_transactions(&TransactionFilter::new())
            .unwrap(),
        0
    );
    // Still pending for the next pass
    assert_eq!(pipeline.database().count_processed_files().unwrap(), 0);
}

#[tokio::test]
async fn test_cmd_pending() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("factura.pdf"), b"%PDF-1.4 factura").unwrap();
    std::fs::write(
        dir.path().join("extracto.csv"),
        "Fecha,Descripcion,Monto\n2024-04-02,Compra Carrefour,-2500.00\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("notas.docx"), b"PK").unwrap();

    let pipeline = test_pipeline(MockBackend::new());
    commands::cmd_pending(&pipeline, dir.path()).await.unwrap();
    assert_eq!(
        pipeline
            .database()
            .count_transactions(&TransactionFilter::new())
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn test_cmd_pending_requires_directory() {
    let pipeline = test_pipeline(MockBackend::new());
    let result =
        commands::cmd_pending(&pipeline, std::path::Path::new("/nonexistent/inbox")).await;
    assert!(result.is_err());
}

// ========== Database Open Tests ==========

#[test]
fn test_open_db_unencrypted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("facturia.db");

    commands::cmd_init(&path, true).unwrap();
    assert!(path.exists());

    let db = commands::open_db(&path, true).unwrap();
    assert_eq!(db.count_transactions(&TransactionFilter::new()).unwrap(), 0);
}

//! Copy-activity simulation with caller-chosen table pairs.
//!
//! Unlike full pipelines, copy activities name their own source and sink,
//! so transforms come from the registry rather than the catalogue.

use serde_json::json;

use crate::helpers::fixtures::{row, test_config};

use tsunagi_harness::E2eConnection;
use tsunagi_harness::asserts::*;
use tsunagi_mock_services::InMemoryBackend;

#[tokio::test]
async fn test_copy_activity_is_a_passthrough_by_default() {
    // 1. Stage a source and sink pair outside the built-in catalogue
    let backend = InMemoryBackend::new();
    {
        let mut db = backend.database();
        db.create_table("raw_orders", &["order_id", "total"]);
        db.insert_data(
            "raw_orders",
            &[
                row(&[("order_id", json!(1)), ("total", json!(120))]),
                row(&[("order_id", json!(2)), ("total", json!(70))]),
            ],
        )
        .unwrap();
        db.create_table("orders_copy", &["order_id", "total"]);
    }
    let connection = E2eConnection::with_backend(test_config(), backend.clone())
        .await
        .unwrap();

    // 2. Rows land in the sink unchanged
    let record = connection
        .execute_copy_activity_simulation("order_sync", "copy_orders", "raw_orders", "orders_copy")
        .await;
    assert_execution_succeeded(&record);
    assert_eq!(record.rows_processed, 2);

    let rows = backend.database().select_data("orders_copy", None, None);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("total"), Some(&json!(120)));
}

#[tokio::test]
async fn test_copy_activity_applies_registered_transform() {
    // 1. Stage tables and register a custom transform for the pair
    let backend = InMemoryBackend::new();
    {
        let mut db = backend.database();
        db.create_table("raw_orders", &["order_id", "total"]);
        db.insert_data(
            "raw_orders",
            &[row(&[("order_id", json!(1)), ("total", json!(120))])],
        )
        .unwrap();
        db.create_table("orders_flagged", &["order_id", "total", "reviewed"]);
    }
    let mut connection = E2eConnection::with_backend(test_config(), backend.clone())
        .await
        .unwrap();
    connection
        .transforms_mut()
        .register("raw_orders", "orders_flagged", |rows| {
            rows.iter()
                .map(|r| {
                    let mut out = r.clone();
                    out.insert("reviewed".to_owned(), json!(false));
                    out
                })
                .collect()
        });

    // 2. The transform shapes the sink rows
    let record = connection
        .execute_copy_activity_simulation("order_sync", "flag_orders", "raw_orders", "orders_flagged")
        .await;
    assert_execution_succeeded(&record);

    let rows = backend.database().select_data("orders_flagged", None, None);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("reviewed"), Some(&json!(false)));
}

#[tokio::test]
async fn test_copy_activity_replaces_stale_sink_rows() {
    // 1. Stage a sink that still holds rows from an earlier run
    let backend = InMemoryBackend::new();
    {
        let mut db = backend.database();
        db.create_table("raw_orders", &["order_id"]);
        db.insert_data("raw_orders", &[row(&[("order_id", json!(10))])])
            .unwrap();
        db.create_table("orders_copy", &["order_id"]);
        db.insert_data(
            "orders_copy",
            &[
                row(&[("order_id", json!(98))]),
                row(&[("order_id", json!(99))]),
            ],
        )
        .unwrap();
    }
    let connection = E2eConnection::with_backend(test_config(), backend.clone())
        .await
        .unwrap();

    // 2. The sink is cleared before the copy, so stale rows are gone
    let record = connection
        .execute_copy_activity_simulation("order_sync", "copy_orders", "raw_orders", "orders_copy")
        .await;
    assert_execution_succeeded(&record);
    assert_row_count(&backend, "orders_copy", 1).await;

    let rows = backend.database().select_data("orders_copy", None, None);
    assert_eq!(rows[0].get("order_id"), Some(&json!(10)));
}

#[tokio::test]
async fn test_copy_activity_missing_source_fails() {
    // 1. Connect with an empty store
    let connection = E2eConnection::with_backend(test_config(), InMemoryBackend::new())
        .await
        .unwrap();

    // 2. The record names the pipeline and activity that failed
    let record = connection
        .execute_copy_activity_simulation("order_sync", "copy_orders", "ghost", "orders_copy")
        .await;
    assert_execution_failed(&record);
    let message = record.error_message.unwrap();
    assert!(message.contains("order_sync/copy_orders"), "{message}");
    assert!(message.contains("does not exist"), "{message}");
}

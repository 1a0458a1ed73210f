//! File staging through the mocks a connection owns.
//!
//! Scenarios here move fixture files through blob storage and the SFTP
//! drop zone before any pipeline runs, the same way a real ingestion
//! lands data. Each connection owns its own mock trio, so nothing leaks
//! between tests.

use serde_json::json;

use crate::helpers::fixtures::{row, test_config};

use tsunagi_harness::E2eConnection;
use tsunagi_harness::asserts::*;
use tsunagi_mock_services::{InMemoryBackend, QueryAction, TransferAction};

#[tokio::test]
async fn test_connection_owns_an_empty_mock_trio() {
    // 1. A fresh connection has staged nothing yet
    let connection = E2eConnection::with_backend(test_config(), InMemoryBackend::new())
        .await
        .unwrap();
    assert!(connection.blob().list_containers().is_empty());
    assert_eq!(connection.sftp().get_transfer_count(None), 0);
    assert!(connection.database().table_names().is_empty());

    // 2. The built-in transform catalogue is already registered
    assert!(connection.transforms().contains("client_dm", "client_dm_bx"));
    assert!(!connection.transforms().contains("raw_orders", "orders_copy"));
}

#[tokio::test]
async fn test_landing_file_moves_from_blob_to_sftp_drop() {
    // 1. Land a fixture file in blob storage
    let mut connection = E2eConnection::with_backend(test_config(), InMemoryBackend::new())
        .await
        .unwrap();
    connection.blob_mut().create_container("landing", None);
    connection
        .blob_mut()
        .upload_file("landing", "incoming/customers.csv", "1,aoi\n2,ren", None)
        .unwrap();
    assert_eq!(
        connection.blob().list_files("landing", Some("incoming/")),
        vec!["incoming/customers.csv".to_owned()]
    );

    // 2. Relay it to the SFTP drop zone
    let content = connection
        .blob()
        .download_file("landing", "incoming/customers.csv")
        .unwrap();
    connection
        .sftp_mut()
        .upload("/tmp/customers.csv", "/drop/incoming/customers.csv", content, None);

    // 3. The drop zone sees the file, its directories, and one upload log
    assert!(connection.sftp().file_exists("/drop/incoming/customers.csv"));
    assert!(connection.sftp().directory_exists("/drop/incoming"));
    assert_eq!(
        connection
            .sftp()
            .get_transfer_count(Some(TransferAction::Upload)),
        1
    );
    let staged = connection
        .sftp_mut()
        .download("/drop/incoming/customers.csv", "/tmp/check.csv")
        .unwrap();
    assert_eq!(&staged[..], b"1,aoi\n2,ren");
}

#[tokio::test]
async fn test_staged_file_feeds_a_pipeline_run() {
    // 1. Stage the landing file and the pipeline tables
    let backend = InMemoryBackend::new();
    {
        let mut db = backend.database();
        db.create_table("client_dm", &["client_id", "name"]);
        db.create_table("client_dm_bx", &["client_id", "name", "dm_channel"]);
    }
    let mut connection = E2eConnection::with_backend(test_config(), backend.clone())
        .await
        .unwrap();
    connection.blob_mut().create_container("landing", None);
    connection
        .blob_mut()
        .upload_file("landing", "incoming/client_dm.csv", "1,aoi\n2,ren", None)
        .unwrap();

    // 2. Parse the staged file into source rows
    let content = connection
        .blob()
        .download_file("landing", "incoming/client_dm.csv")
        .unwrap();
    let text = String::from_utf8(content.to_vec()).unwrap();
    let rows: Vec<_> = text
        .lines()
        .filter_map(|line| {
            let (id, name) = line.split_once(',')?;
            Some(row(&[
                ("client_id", json!(id.parse::<i64>().ok()?)),
                ("name", json!(name)),
            ]))
        })
        .collect();
    assert_eq!(rows.len(), 2);
    backend.database().insert_data("client_dm", &rows).unwrap();

    // 3. Record the ingestion in the connection's own ledger
    connection
        .database_mut()
        .insert_data(
            "files_ingested",
            &[row(&[
                ("path", json!("incoming/client_dm.csv")),
                ("rows", json!(2)),
            ])],
        )
        .unwrap();

    // 4. The pipeline consumes the staged rows
    let record = connection
        .execute_pipeline_simulation("client_dm_to_bx", json!({}))
        .await;
    assert_execution_succeeded(&record);
    assert_eq!(record.rows_processed, 2);
    assert_row_count(&backend, "client_dm_bx", 2).await;

    // 5. The ledger kept its own table and query log
    assert_eq!(connection.database().row_count("files_ingested"), Some(1));
    assert_eq!(
        connection.database().query_count(Some(QueryAction::Insert)),
        1
    );
}

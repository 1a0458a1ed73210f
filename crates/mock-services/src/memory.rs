//! インメモリ SQL バックエンド -- [`MockDatabase`] の trait アダプタ
//!
//! [`InMemoryBackend`] は [`SqlBackend`] trait を PostgreSQL なしで
//! 満たします。ハーネスの制御フロー (フォールバック、監査記録、検証) を
//! 外部サービスなしでテストするための実装です。
//!
//! # 実データベースとの対応
//! [`MockDatabase`] の自動テーブル生成はここでは適用しません。
//! 欠損テーブルへの参照・変更は PostgreSQL と同様にエラーになります。
//! テーブルの事前作成は [`InMemoryBackend::database`] ハンドル経由で行います。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tsunagi_core::backend::SqlBackend;
use tsunagi_core::error::ConnectionError;
use tsunagi_core::types::{compare_values, Row};

use crate::database::MockDatabase;

/// [`MockDatabase`] を [`SqlBackend`] に適合させるアダプタ
///
/// `Clone` はストアを共有します。テスト側はクローンを通じて
/// バックエンドの中身を準備・検査できます。
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    inner: Arc<Mutex<MockDatabase>>,
}

fn missing_relation(table: &str) -> ConnectionError {
    ConnectionError::Query {
        reason: format!("relation \"{table}\" does not exist"),
    }
}

impl InMemoryBackend {
    /// 空のバックエンドを作ります。
    pub fn new() -> Self {
        Self::default()
    }

    /// 準備済みの [`MockDatabase`] を包んで作ります。
    pub fn with_database(database: MockDatabase) -> Self {
        Self {
            inner: Arc::new(Mutex::new(database)),
        }
    }

    /// 内部ストアをロックして返します。テストの準備・検査用です。
    ///
    /// ガードを保持したまま await しないでください。
    pub fn database(&self) -> MutexGuard<'_, MockDatabase> {
        // パニックしたテストの毒は無視して続行する
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SqlBackend for InMemoryBackend {
    async fn probe(&self) -> Result<(), ConnectionError> {
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool, ConnectionError> {
        Ok(self.database().table_exists(table))
    }

    async fn fetch_rows(&self, table: &str) -> Result<Vec<Row>, ConnectionError> {
        let mut db = self.database();
        if !db.table_exists(table) {
            return Err(missing_relation(table));
        }
        Ok(db.select_data(table, None, None))
    }

    async fn count_rows(&self, table: &str) -> Result<u64, ConnectionError> {
        let db = self.database();
        db.row_count(table)
            .map(|n| n as u64)
            .ok_or_else(|| missing_relation(table))
    }

    async fn sample_rows(&self, table: &str, limit: u32) -> Result<Vec<Row>, ConnectionError> {
        let mut db = self.database();
        if !db.table_exists(table) {
            return Err(missing_relation(table));
        }
        let first_column = db
            .table_columns(table)
            .and_then(|columns| columns.first().cloned());
        let mut rows = db.select_data(table, None, None);
        // ORDER BY 1 相当: 先頭列の値で整列
        if let Some(column) = first_column {
            rows.sort_by(|a, b| {
                let left = a.get(&column).unwrap_or(&Value::Null);
                let right = b.get(&column).unwrap_or(&Value::Null);
                compare_values(left, right)
            });
        }
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn clear_table(&self, table: &str) -> Result<(), ConnectionError> {
        let mut db = self.database();
        if !db.table_exists(table) {
            return Err(missing_relation(table));
        }
        db.delete_data(table, None)
            .map_err(|e| ConnectionError::Query {
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn insert_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> Result<u64, ConnectionError> {
        let mut db = self.database();
        if !db.table_exists(table) {
            return Err(missing_relation(table));
        }
        // INSERT の列指定と同じく、列リストに沿って行を射影する
        let projected: Vec<Row> = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|column| {
                        (
                            column.clone(),
                            row.get(column).cloned().unwrap_or(Value::Null),
                        )
                    })
                    .collect()
            })
            .collect();
        let inserted = db
            .insert_data(table, &projected)
            .map_err(|e| ConnectionError::Query {
                reason: e.to_string(),
            })?;
        Ok(inserted as u64)
    }

    async fn execute(&self, sql: &str) -> Result<u64, ConnectionError> {
        self.database().execute_query(sql);
        Ok(0)
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>, ConnectionError> {
        Ok(self.database().execute_query(sql))
    }
}

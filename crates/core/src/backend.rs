//! SQL バックエンド抽象 -- 検証用データストアの差し替え口
//!
//! [`SqlBackend`] trait は外部 SQL ストアへの操作を抽象化します。
//! 本番ハーネスは PostgreSQL 実装を使い、テストではインメモリ実装を
//! 差し込むことで、DB なしで接続フローを検証できます。
//!
//! # 構成
//!
//! ```text
//! ┌───────────────┐
//! │ E2eConnection │
//! └───────┬───────┘
//!         │
//!         ▼
//!   ┌────────────┐
//!   │ SqlBackend │ (trait)
//!   └────────────┘
//!      │       │
//!      ▼       ▼
//!  ┌──────┐ ┌────────┐
//!  │ Pg   │ │InMemory│
//!  └──┬───┘ └────────┘
//!     │
//!     ▼
//!  PostgreSQL
//! ```

use std::future::Future;

use crate::error::ConnectionError;
use crate::types::Row;

/// SQL ストア操作を抽象化する trait
///
/// すべてのメソッドは `Send` な Future を返し、async コンテキスト間で
/// 安全に共有できます。実装は `&self` で動作し、内部状態の共有は
/// 実装側の責務です (プール、`Arc<Mutex<..>>` など)。
///
/// # エラー
///
/// 接続不能やクエリ失敗は [`ConnectionError`] として返します。
/// 存在しないテーブルの扱い (空結果かエラーか) は各メソッドの
/// ドキュメントに従います。
pub trait SqlBackend: Send + Sync + 'static {
    /// 到達性を 1 回だけ確認します (`SELECT 1` 相当)。
    ///
    /// リトライは呼び出し側の責務です。
    fn probe(&self) -> impl Future<Output = Result<(), ConnectionError>> + Send;

    /// テーブルの存在をカタログ照会で確認します。
    fn table_exists(&self, table: &str)
    -> impl Future<Output = Result<bool, ConnectionError>> + Send;

    /// テーブルの全行を取得します。
    ///
    /// 存在しないテーブルはエラーになります。
    fn fetch_rows(&self, table: &str)
    -> impl Future<Output = Result<Vec<Row>, ConnectionError>> + Send;

    /// テーブルの行数を返します。
    fn count_rows(&self, table: &str) -> impl Future<Output = Result<u64, ConnectionError>> + Send;

    /// テーブルから最大 `limit` 行を取得します。
    fn sample_rows(
        &self,
        table: &str,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Row>, ConnectionError>> + Send;

    /// テーブルの全行を削除します。テーブル自体は残ります。
    fn clear_table(&self, table: &str) -> impl Future<Output = Result<(), ConnectionError>> + Send;

    /// 行を一括挿入し、挿入行数を返します。
    ///
    /// `columns` が挿入時の列順を決めます。行に存在しない列は NULL 扱いです。
    fn insert_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> impl Future<Output = Result<u64, ConnectionError>> + Send;

    /// 任意の SQL 文を実行し、影響行数を返します (DDL / INSERT / UPDATE)。
    fn execute(&self, sql: &str) -> impl Future<Output = Result<u64, ConnectionError>> + Send;

    /// 任意の SELECT 文を実行し、結果行を返します。
    fn query(&self, sql: &str) -> impl Future<Output = Result<Vec<Row>, ConnectionError>> + Send;
}

/// テスト用の何もしないバックエンド
///
/// trait 署名が plain `async fn` で実装可能なことを保証します。
#[cfg(test)]
#[derive(Default)]
struct NullBackend;

#[cfg(test)]
impl SqlBackend for NullBackend {
    async fn probe(&self) -> Result<(), ConnectionError> {
        Ok(())
    }

    async fn table_exists(&self, _table: &str) -> Result<bool, ConnectionError> {
        Ok(false)
    }

    async fn fetch_rows(&self, table: &str) -> Result<Vec<Row>, ConnectionError> {
        Err(ConnectionError::Query {
            reason: format!("no such table: {table}"),
        })
    }

    async fn count_rows(&self, _table: &str) -> Result<u64, ConnectionError> {
        Ok(0)
    }

    async fn sample_rows(&self, _table: &str, _limit: u32) -> Result<Vec<Row>, ConnectionError> {
        Ok(Vec::new())
    }

    async fn clear_table(&self, _table: &str) -> Result<(), ConnectionError> {
        Ok(())
    }

    async fn insert_rows(
        &self,
        _table: &str,
        _columns: &[String],
        rows: &[Row],
    ) -> Result<u64, ConnectionError> {
        Ok(rows.len() as u64)
    }

    async fn execute(&self, _sql: &str) -> Result<u64, ConnectionError> {
        Ok(0)
    }

    async fn query(&self, _sql: &str) -> Result<Vec<Row>, ConnectionError> {
        Ok(Vec::new())
    }
}

//! データベースモック -- 自動テーブル生成とクエリログを持つテーブルストア
//!
//! [`MockDatabase`] はリレーショナルストアのインメモリ代替です。
//! パイプライン検証で「テーブルがまだ無い」状態を扱いやすくするため、
//! 参照系と挿入系は欠損テーブルを自動生成します。
//!
//! # 自動生成の規則
//! - select 系: 既定スキーマ `{id, name, value}` の空テーブルを生成
//! - insert 系: 先頭行のキー (ソート順) から列を推定して生成
//! - update / delete: 自動生成しない。欠損テーブルはエラー
//!
//! # クエリログ
//! 全操作が 1 件ずつ追記されます。raw SQL 系は先頭 100 文字まで
//! クエリ文字列を保持します。

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use tsunagi_core::error::DatabaseError;
use tsunagi_core::types::Row;

use crate::store::{self, TableData};

/// クエリログに保持する SQL の最大文字数
const QUERY_LOG_SQL_MAX: usize = 100;

/// クエリログの操作種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryAction {
    /// 行挿入
    Insert,
    /// フィルタ付き参照
    Select,
    /// 行更新
    Update,
    /// 行削除
    Delete,
    /// 任意 SQL 実行スタブ
    Execute,
    /// テーブル指定付き raw SQL 参照スタブ
    SelectSql,
}

impl fmt::Display for QueryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Insert => "INSERT",
            Self::Select => "SELECT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Execute => "EXECUTE",
            Self::SelectSql => "SELECT_SQL",
        };
        write!(f, "{s}")
    }
}

/// クエリログの 1 エントリ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryLogEntry {
    /// 操作種別
    pub action: QueryAction,
    /// 対象テーブル (raw SQL 実行スタブでは無し)
    pub table: Option<String>,
    /// 操作が返した・変更した行数
    pub records: usize,
    /// 記録時刻
    pub timestamp: DateTime<Utc>,
    /// raw SQL (先頭 100 文字、raw SQL 系のみ)
    pub query: Option<String>,
}

/// レコード参照のクエリ指定
#[derive(Debug, Clone)]
pub enum RecordQuery {
    /// 全行
    All,
    /// 等値条件の AND
    Filter(Row),
    /// raw SQL (スタブ経路)
    RawSql(String),
}

/// データベースのインメモリモック
#[derive(Debug, Clone, Default)]
pub struct MockDatabase {
    /// テーブル名 → 実体
    tables: BTreeMap<String, TableData>,
    /// 追記専用のクエリログ
    query_log: Vec<QueryLogEntry>,
}

fn truncate_query(sql: &str) -> String {
    sql.chars().take(QUERY_LOG_SQL_MAX).collect()
}

impl MockDatabase {
    /// 空のデータベースを作ります。
    pub fn new() -> Self {
        Self::default()
    }

    /// テーブルを (再) 定義します。既存の行は破棄されます。
    pub fn create_table(&mut self, table: &str, columns: &[&str]) {
        debug!(table, columns = columns.len(), "table created");
        self.tables.insert(
            table.to_owned(),
            TableData::new(columns.iter().map(|c| (*c).to_owned()).collect()),
        );
    }

    /// 行を挿入し、追加した行数を返します。
    ///
    /// 欠損テーブルは先頭行のキーから列を推定して自動生成します。
    ///
    /// # Errors
    ///
    /// テーブルが無くかつ `rows` が空で列を推定できない場合
    /// [`DatabaseError::SchemaUnknown`] を返します。
    pub fn insert_data(&mut self, table: &str, rows: &[Row]) -> Result<usize, DatabaseError> {
        if !self.tables.contains_key(table) {
            let Some(first) = rows.first() else {
                return Err(DatabaseError::SchemaUnknown {
                    table: table.to_owned(),
                });
            };
            self.tables
                .insert(table.to_owned(), TableData::new(store::infer_columns(first)));
            debug!(table, "table auto-created from inserted row");
        }
        if let Some(data) = self.tables.get_mut(table) {
            data.rows.extend(rows.iter().cloned());
        }
        self.log(QueryAction::Insert, Some(table), rows.len(), None);
        Ok(rows.len())
    }

    /// [`insert_data`](Self::insert_data) の別名です。
    pub fn insert_records(&mut self, table: &str, rows: &[Row]) -> Result<usize, DatabaseError> {
        self.insert_data(table, rows)
    }

    /// 行を参照します。失敗しません。
    ///
    /// 欠損テーブルは既定スキーマで自動生成され、空結果になります。
    /// フィルタは等値条件の AND、`limit` はフィルタ後の先頭 N 行です。
    /// ログの `records` は返却行数です。
    pub fn select_data(
        &mut self,
        table: &str,
        where_clause: Option<&Row>,
        limit: Option<usize>,
    ) -> Vec<Row> {
        let data = self.table_or_default(table);
        let result = store::filter_rows(&data.rows, where_clause, limit);
        self.log(QueryAction::Select, Some(table), result.len(), None);
        result
    }

    /// 条件に一致する行へ `set_values` をマージし、更新行数を返します。
    ///
    /// # Errors
    ///
    /// テーブルが無い場合 [`DatabaseError::TableNotFound`] を返します
    /// (select / insert と異なり自動生成しません)。
    pub fn update_data(
        &mut self,
        table: &str,
        set_values: &Row,
        where_clause: &Row,
    ) -> Result<usize, DatabaseError> {
        let data = self
            .tables
            .get_mut(table)
            .ok_or_else(|| DatabaseError::TableNotFound {
                table: table.to_owned(),
            })?;

        let mut updated = 0;
        for row in data
            .rows
            .iter_mut()
            .filter(|row| store::row_matches(row, where_clause))
        {
            for (key, value) in set_values {
                row.insert(key.clone(), value.clone());
            }
            updated += 1;
        }
        self.log(QueryAction::Update, Some(table), updated, None);
        Ok(updated)
    }

    /// 条件に一致する行を削除し、削除行数を返します。
    ///
    /// `where_clause` を省略すると全行が対象です。
    ///
    /// # Errors
    ///
    /// テーブルが無い場合 [`DatabaseError::TableNotFound`] を返します。
    pub fn delete_data(
        &mut self,
        table: &str,
        where_clause: Option<&Row>,
    ) -> Result<usize, DatabaseError> {
        let data = self
            .tables
            .get_mut(table)
            .ok_or_else(|| DatabaseError::TableNotFound {
                table: table.to_owned(),
            })?;

        let before = data.rows.len();
        match where_clause {
            Some(filter) => data.rows.retain(|row| !store::row_matches(row, filter)),
            None => data.rows.clear(),
        }
        let removed = before - data.rows.len();
        self.log(QueryAction::Delete, Some(table), removed, None);
        Ok(removed)
    }

    /// 任意 SQL の実行スタブです。結果は常に空です。
    ///
    /// ログに EXECUTE エントリを残すことだけが役割です。
    pub fn execute_query(&mut self, sql: &str) -> Vec<Row> {
        self.log(QueryAction::Execute, None, 0, Some(truncate_query(sql)));
        Vec::new()
    }

    /// テーブル指定付き raw SQL 参照スタブです。結果は常に空です。
    ///
    /// 欠損テーブルは既定スキーマで自動生成されます。
    pub fn execute_sql_query(&mut self, table: &str, sql: &str) -> Vec<Row> {
        self.table_or_default(table);
        self.log(
            QueryAction::SelectSql,
            Some(table),
            0,
            Some(truncate_query(sql)),
        );
        Vec::new()
    }

    /// クエリ指定に応じて参照系へディスパッチします。失敗しません。
    pub fn query_records(&mut self, table: &str, query: &RecordQuery) -> Vec<Row> {
        match query {
            RecordQuery::All => self.select_data(table, None, None),
            RecordQuery::Filter(filter) => self.select_data(table, Some(filter), None),
            RecordQuery::RawSql(sql) => self.execute_sql_query(table, sql),
        }
    }

    /// クエリログの件数を返します。`action` を渡すと種別で絞り込みます。
    pub fn query_count(&self, action: Option<QueryAction>) -> usize {
        match action {
            Some(a) => self
                .query_log
                .iter()
                .filter(|entry| entry.action == a)
                .count(),
            None => self.query_log.len(),
        }
    }

    /// クエリログ全体を返します。
    pub fn query_history(&self) -> &[QueryLogEntry] {
        &self.query_log
    }

    // --- 検査用アクセサ ---

    /// テーブルの存在を確認します。自動生成は起こしません。
    pub fn table_exists(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// 存在するテーブル名を辞書順で返します。
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// テーブルの列定義を返します。
    pub fn table_columns(&self, table: &str) -> Option<Vec<String>> {
        self.tables.get(table).map(|data| data.columns.clone())
    }

    /// テーブルの行数を返します。
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.tables.get(table).map(TableData::len)
    }

    fn table_or_default(&mut self, table: &str) -> &TableData {
        self.tables.entry(table.to_owned()).or_insert_with(|| {
            debug!(table, "table auto-created with default columns");
            TableData::with_default_columns()
        })
    }

    fn log(&mut self, action: QueryAction, table: Option<&str>, records: usize, query: Option<String>) {
        self.query_log.push(QueryLogEntry {
            action,
            table: table.map(ToOwned::to_owned),
            records,
            timestamp: Utc::now(),
            query,
        });
    }
}

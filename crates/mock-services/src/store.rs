//! テーブルストア基礎 -- 列定義・行フィルタの共通部品
//!
//! [`MockDatabase`](crate::database::MockDatabase) と
//! [`InMemoryBackend`](crate::memory::InMemoryBackend) が共有する
//! テーブル表現とフィルタ述語を定義します。

use tsunagi_core::types::Row;

/// select が未作成テーブルを自動生成するときの既定スキーマ
pub const DEFAULT_TABLE_COLUMNS: [&str; 3] = ["id", "name", "value"];

/// テーブルの実体
///
/// 列名リストと挿入順を保持する行シーケンスを持ちます。
/// 一度確定した列リストは、異なるキーを持つ行を挿入しても変化しません。
#[derive(Debug, Clone, Default)]
pub struct TableData {
    /// 列名 (確定順)
    pub columns: Vec<String>,
    /// 行 (挿入順)
    pub rows: Vec<Row>,
}

impl TableData {
    /// 指定した列定義で空テーブルを作ります。
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// 既定スキーマ `{id, name, value}` の空テーブルを作ります。
    pub fn with_default_columns() -> Self {
        Self::new(DEFAULT_TABLE_COLUMNS.iter().map(|c| (*c).to_owned()).collect())
    }

    /// 行数を返します。
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 行が無いか確認します。
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// 行の列名を推定します。
///
/// `Row` は `BTreeMap` のため、キーは常にソート順で得られます。
pub fn infer_columns(row: &Row) -> Vec<String> {
    row.keys().cloned().collect()
}

/// 行がフィルタに一致するか判定します。
///
/// フィルタは等値条件の AND です。行に存在しない列を参照する条件は
/// 不一致として扱います。空フィルタは全行に一致します。
pub fn row_matches(row: &Row, filter: &Row) -> bool {
    filter.iter().all(|(key, expected)| row.get(key) == Some(expected))
}

/// フィルタと上限を適用した行のコピーを返します。挿入順は保持されます。
pub fn filter_rows(rows: &[Row], filter: Option<&Row>, limit: Option<usize>) -> Vec<Row> {
    let iter = rows
        .iter()
        .filter(|row| filter.is_none_or(|f| row_matches(row, f)))
        .cloned();
    match limit {
        Some(n) => iter.take(n).collect(),
        None => iter.collect(),
    }
}

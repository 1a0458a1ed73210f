//! ドメイン型 -- ハーネス全体で共有する共通型
//!
//! モック層と接続ハーネスが交換するデータ構造を定義します。
//! 行データは `serde_json::Value` をセル値とする順序付きマップで表現します。

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// テーブル行 -- カラム名からセル値へのマップ
///
/// `BTreeMap` によりキー順が決定的になり、スキーマ推論とアサーションが
/// 再現可能になります。
pub type Row = BTreeMap<String, Value>;

/// JSON オブジェクトを [`Row`] に変換します。
///
/// オブジェクト以外 (配列、文字列など) は `None` を返します。
pub fn row_from_json(value: Value) -> Option<Row> {
    match value {
        Value::Object(map) => Some(map.into_iter().collect()),
        _ => None,
    }
}

/// [`Row`] を JSON オブジェクトに変換します。
pub fn row_to_json(row: &Row) -> Value {
    Value::Object(row.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

/// セル値の全順序比較
///
/// 型ランク (null < bool < number < string < array < object) を先に比較し、
/// 同型同士は値で比較します。先頭カラムによる行サンプルの整列に使います。
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ if rank(a) != rank(b) => rank(a).cmp(&rank(b)),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// パイプライン実行ステータス
///
/// 監査テーブルとシミュレータ応答では `SUCCESS` / `FAILED` / `TIMEOUT` の
/// 大文字表記を使います。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// 正常終了
    #[default]
    Success,
    /// 異常終了 (エラーメッセージ付き)
    Failed,
    /// タイムアウト
    Timeout,
}

impl ExecutionStatus {
    /// 文字列からステータスをパースします。
    ///
    /// 大文字小文字を区別しません。
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "success" | "succeeded" => Some(Self::Success),
            "failed" | "failure" | "error" => Some(Self::Failed),
            "timeout" | "timedout" | "timed_out" => Some(Self::Timeout),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Failed => write!(f, "FAILED"),
            Self::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

/// パイプライン実行レコード
///
/// リモート実行・ローカルフォールバックのどちらの経路でも、
/// 1 回の実行につき必ず 1 件生成されます。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// 実行 ID (UUID v4)
    pub execution_id: String,
    /// 実行ステータス
    pub status: ExecutionStatus,
    /// 実行開始時刻
    pub start_time: DateTime<Utc>,
    /// 実行終了時刻
    pub end_time: DateTime<Utc>,
    /// 処理行数 (コピー系はコピー行数)
    #[serde(alias = "rows_copied")]
    pub rows_processed: u64,
    /// エラーメッセージ (FAILED / TIMEOUT 時のみ)
    pub error_message: Option<String>,
}

impl ExecutionRecord {
    /// 新しい実行 ID を生成します。
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// 正常終了レコードを生成します。
    pub fn success(
        execution_id: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        rows_processed: u64,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            status: ExecutionStatus::Success,
            start_time,
            end_time,
            rows_processed,
            error_message: None,
        }
    }

    /// 異常終了レコードを生成します。
    pub fn failed(
        execution_id: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            status: ExecutionStatus::Failed,
            start_time,
            end_time,
            rows_processed: 0,
            error_message: Some(error_message.into()),
        }
    }
}

impl fmt::Display for ExecutionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] rows={}",
            self.execution_id, self.status, self.rows_processed,
        )?;
        if let Some(msg) = &self.error_message {
            write!(f, " error={}", msg)?;
        }
        Ok(())
    }
}

/// データ整合性レポート
///
/// ソース・ターゲット両テーブルの行数と先頭カラム順の上位サンプルを
/// 保持します。判定はレポートを受け取ったテスト側が行います。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// ソーステーブル名
    pub source_table: String,
    /// ターゲットテーブル名
    pub target_table: String,
    /// ソース行数
    pub source_count: u64,
    /// ターゲット行数
    pub target_count: u64,
    /// 行数一致フラグ
    pub counts_match: bool,
    /// ソース側サンプル (先頭カラム順、最大 5 行)
    pub source_sample: Vec<Row>,
    /// ターゲット側サンプル (先頭カラム順、最大 5 行)
    pub target_sample: Vec<Row>,
}

impl fmt::Display for IntegrityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} rows) -> {} ({} rows) match={}",
            self.source_table,
            self.source_count,
            self.target_table,
            self.target_count,
            self.counts_match,
        )
    }
}

#![doc = include_str!("../README.md")]

pub mod backend;
pub mod config;
pub mod error;
pub mod types;

// --- 主要型 re-export ---
// 各モジュールの中核型をクレートルートから直接使えるようにします。

// エラー
pub use error::{ConfigError, ConnectionError, DatabaseError, StorageError, TsunagiError};

// 設定
pub use config::TsunagiConfig;

// バックエンド trait
pub use backend::SqlBackend;

// ドメイン型
pub use types::{ExecutionRecord, ExecutionStatus, IntegrityReport, Row};

#![doc = include_str!("../README.md")]

pub mod blob;
pub mod database;
pub mod memory;
pub mod sftp;
pub mod store;

// --- 主要型 re-export ---

// Blob ストレージ
pub use blob::{BlobMetadata, ContainerMetadata, Metadata, MockBlobStorage};

// SFTP サーバ
pub use sftp::{MockSftpServer, SftpFileMetadata, TransferAction, TransferRecord};

// データベース
pub use database::{MockDatabase, QueryAction, QueryLogEntry, RecordQuery};

// バックエンドアダプタ
pub use memory::InMemoryBackend;

// テーブル基礎
pub use store::{DEFAULT_TABLE_COLUMNS, TableData};

//! エラー型 -- ドメイン別エラー定義

/// tsunagi 最上位エラー型
#[derive(Debug, thiserror::Error)]
pub enum TsunagiError {
    /// 設定関連エラー
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// モックストレージ (Blob / SFTP) エラー
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// モックデータベースエラー
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// 接続ハーネスエラー
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// I/O エラー
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 設定関連エラー
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 設定ファイルが見つからない
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 設定のパース失敗
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 不正な設定値
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// モックストレージ (Blob / SFTP) エラー
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// コンテナ未作成
    #[error("container not found: {container}")]
    ContainerNotFound { container: String },

    /// Blob が存在しない
    #[error("blob not found: {container}/{path}")]
    BlobNotFound { container: String, path: String },

    /// リモートファイルが存在しない
    #[error("remote file not found: {path}")]
    RemoteFileNotFound { path: String },
}

/// モックデータベースエラー
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// テーブルが存在しない (update / delete の非対称エラー)
    #[error("table not found: {table}")]
    TableNotFound { table: String },

    /// スキーマ推論不能 (テーブル未作成かつ挿入行が空)
    #[error("table '{table}' does not exist and no data to infer schema")]
    SchemaUnknown { table: String },
}

/// 接続ハーネスエラー
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// 必須依存サービスへの起動プローブ失敗
    #[error("startup probe failed for {service} after {attempts} attempts: {reason}")]
    StartupFailed {
        service: String,
        attempts: u32,
        reason: String,
    },

    /// SQL クエリ失敗
    #[error("sql query failed: {reason}")]
    Query { reason: String },

    /// シミュレータへのリクエスト失敗
    #[error("simulator request failed: {reason}")]
    Simulator { reason: String },
}

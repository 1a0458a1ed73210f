//! SFTP サーバモック -- 転送ログ付きインメモリファイルストア
//!
//! [`MockSftpServer`] はリモート SFTP サーバのインメモリ代替です。
//! 実ファイルシステムには触れず、`local_path` は転送元のラベルとして
//! 記録されるだけです。
//!
//! # ディレクトリ
//! アップロード時にリモートパスの祖先プレフィックスを暗黙に作成します。
//! 親が無いことによるエラーはありません。
//!
//! # 転送ログ
//! upload / download / delete の成功ごとに追記され、剪定されません。

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use tsunagi_core::error::StorageError;

use crate::blob::Metadata;

/// 転送ログの操作種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferAction {
    /// アップロード
    Upload,
    /// ダウンロード
    Download,
    /// 削除
    Delete,
}

impl fmt::Display for TransferAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Upload => "upload",
            Self::Download => "download",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

/// 転送ログの 1 エントリ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    /// 操作種別
    pub action: TransferAction,
    /// ローカル側パス (ラベル)
    pub local_path: String,
    /// リモート側パス
    pub remote_path: String,
    /// 対象バイト数
    pub size: u64,
    /// 記録時刻
    pub timestamp: DateTime<Utc>,
    /// 成否
    pub success: bool,
}

/// リモートファイルのメタ情報
#[derive(Debug, Clone)]
pub struct SftpFileMetadata {
    /// バイト数
    pub size: u64,
    /// 最終アップロード時刻
    pub uploaded_at: DateTime<Utc>,
    /// 転送元のローカルパス
    pub local_path: String,
    /// メタデータ
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
struct StoredFile {
    content: Bytes,
    uploaded_at: DateTime<Utc>,
    local_path: String,
    metadata: Metadata,
}

/// SFTP サーバのインメモリモック
#[derive(Debug, Clone, Default)]
pub struct MockSftpServer {
    /// リモートパス → ファイル
    files: BTreeMap<String, StoredFile>,
    /// 暗黙作成されたディレクトリプレフィックス
    directories: BTreeSet<String>,
    /// 追記専用の転送ログ
    transfer_log: Vec<TransferRecord>,
}

impl MockSftpServer {
    /// 空のサーバを作ります。
    pub fn new() -> Self {
        Self::default()
    }

    /// ファイルをアップロードします。常に成功します。
    ///
    /// リモートパスの祖先ディレクトリを暗黙に作成し、同一パスは
    /// 上書きします。成功ログを 1 件追記します。
    pub fn upload(
        &mut self,
        local_path: &str,
        remote_path: &str,
        content: impl Into<Bytes>,
        metadata: Option<Metadata>,
    ) {
        let content = content.into();
        let size = content.len() as u64;
        self.record_ancestor_dirs(remote_path);
        debug!(local_path, remote_path, size, "sftp upload");
        self.files.insert(
            remote_path.to_owned(),
            StoredFile {
                content,
                uploaded_at: Utc::now(),
                local_path: local_path.to_owned(),
                metadata: metadata.unwrap_or_default(),
            },
        );
        self.log_transfer(TransferAction::Upload, local_path, remote_path, size);
    }

    /// ファイルをダウンロードします。
    ///
    /// 成功時のみログを追記します。
    ///
    /// # Errors
    ///
    /// 該当パスが無い場合 [`StorageError::RemoteFileNotFound`] を返します。
    pub fn download(&mut self, remote_path: &str, local_path: &str) -> Result<Bytes, StorageError> {
        let (content, size) = {
            let file = self.files.get(remote_path).ok_or_else(|| {
                StorageError::RemoteFileNotFound {
                    path: remote_path.to_owned(),
                }
            })?;
            (file.content.clone(), file.content.len() as u64)
        };
        debug!(remote_path, local_path, size, "sftp download");
        self.log_transfer(TransferAction::Download, local_path, remote_path, size);
        Ok(content)
    }

    /// ファイルの存在を確認します。
    pub fn file_exists(&self, remote_path: &str) -> bool {
        self.files.contains_key(remote_path)
    }

    /// ファイルを削除します。削除が起きた場合のみログを追記し `true` を返します。
    pub fn delete_file(&mut self, remote_path: &str) -> bool {
        match self.files.remove(remote_path) {
            Some(file) => {
                debug!(remote_path, "sftp delete");
                self.log_transfer(
                    TransferAction::Delete,
                    &file.local_path,
                    remote_path,
                    file.content.len() as u64,
                );
                true
            }
            None => false,
        }
    }

    /// ディレクトリ直下および配下のファイルパスを辞書順で返します。
    ///
    /// ディレクトリ自身と同名のパスは含めません (厳密にプレフィックス配下のみ)。
    pub fn list_files(&self, directory: &str) -> Vec<String> {
        let prefix = format!("{}/", directory.trim_end_matches('/'));
        self.files
            .keys()
            .filter(|path| path.starts_with(&prefix))
            .cloned()
            .collect()
    }

    /// ディレクトリの存在を確認します。
    ///
    /// アップロードで暗黙作成された祖先プレフィックスのみが対象です。
    pub fn directory_exists(&self, directory: &str) -> bool {
        self.directories.contains(directory.trim_end_matches('/'))
    }

    /// リモートファイルのメタ情報を返します。
    pub fn file_metadata(&self, remote_path: &str) -> Option<SftpFileMetadata> {
        self.files.get(remote_path).map(|file| SftpFileMetadata {
            size: file.content.len() as u64,
            uploaded_at: file.uploaded_at,
            local_path: file.local_path.clone(),
            metadata: file.metadata.clone(),
        })
    }

    /// 転送ログの件数を返します。`action` を渡すと種別で絞り込みます。
    pub fn get_transfer_count(&self, action: Option<TransferAction>) -> usize {
        match action {
            Some(a) => self
                .transfer_log
                .iter()
                .filter(|entry| entry.action == a)
                .count(),
            None => self.transfer_log.len(),
        }
    }

    /// 転送ログ全体を返します。
    pub fn get_transfer_history(&self) -> &[TransferRecord] {
        &self.transfer_log
    }

    /// リモートパスの祖先プレフィックスをディレクトリとして記録します。
    fn record_ancestor_dirs(&mut self, remote_path: &str) {
        let mut search_from = 0;
        while let Some(pos) = remote_path[search_from..].find('/') {
            let abs = search_from + pos;
            if abs > 0 {
                self.directories.insert(remote_path[..abs].to_owned());
            }
            search_from = abs + 1;
        }
    }

    fn log_transfer(&mut self, action: TransferAction, local_path: &str, remote_path: &str, size: u64) {
        self.transfer_log.push(TransferRecord {
            action,
            local_path: local_path.to_owned(),
            remote_path: remote_path.to_owned(),
            size,
            timestamp: Utc::now(),
            success: true,
        });
    }
}

//! Blob ストレージモック -- コンテナ + パスで鍵付けするバイト列ストア
//!
//! [`MockBlobStorage`] はクラウド Blob ストレージのインメモリ代替です。
//! コンテナは明示的に作成し、Blob は `コンテナ/パス` で一意に特定します。
//!
//! # 上書きポリシー
//! 同一パスへの再アップロードは無条件で上書きします (last-write-wins)。
//! バージョニングはありません。

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;
use tsunagi_core::error::StorageError;

/// Blob / コンテナに付与する文字列メタデータ
pub type Metadata = BTreeMap<String, String>;

/// コンテナのメタ情報
#[derive(Debug, Clone)]
pub struct ContainerMetadata {
    /// 初回作成時刻 (再作成でも維持)
    pub created_at: DateTime<Utc>,
    /// メタデータ (再作成で置換)
    pub metadata: Metadata,
}

/// Blob のメタ情報
#[derive(Debug, Clone)]
pub struct BlobMetadata {
    /// コンテンツのバイト数
    pub size: u64,
    /// 最終アップロード時刻
    pub uploaded_at: DateTime<Utc>,
    /// メタデータ
    pub metadata: Metadata,
}

/// 保存済み Blob の実体
#[derive(Debug, Clone)]
struct StoredBlob {
    content: Bytes,
    uploaded_at: DateTime<Utc>,
    metadata: Metadata,
}

/// Blob ストレージのインメモリモック
///
/// セッション中にコンテナが削除されることはありません。
#[derive(Debug, Clone, Default)]
pub struct MockBlobStorage {
    /// コンテナ名 → メタ情報
    containers: BTreeMap<String, ContainerMetadata>,
    /// `コンテナ/パス` → Blob
    blobs: BTreeMap<String, StoredBlob>,
}

fn blob_key(container: &str, path: &str) -> String {
    format!("{container}/{path}")
}

impl MockBlobStorage {
    /// 空のストレージを作ります。
    pub fn new() -> Self {
        Self::default()
    }

    /// コンテナを作成します。常に成功します。
    ///
    /// 既存コンテナに対してはメタデータのみ置き換え、作成時刻と
    /// 格納済み Blob は維持します。
    pub fn create_container(&mut self, container: &str, metadata: Option<Metadata>) {
        let metadata = metadata.unwrap_or_default();
        match self.containers.get_mut(container) {
            Some(entry) => {
                entry.metadata = metadata;
                debug!(container, "container re-created, metadata replaced");
            }
            None => {
                self.containers.insert(
                    container.to_owned(),
                    ContainerMetadata {
                        created_at: Utc::now(),
                        metadata,
                    },
                );
                debug!(container, "container created");
            }
        }
    }

    /// Blob をアップロードします。
    ///
    /// # Errors
    ///
    /// コンテナが未作成の場合 [`StorageError::ContainerNotFound`] を返します。
    pub fn upload_file(
        &mut self,
        container: &str,
        path: &str,
        content: impl Into<Bytes>,
        metadata: Option<Metadata>,
    ) -> Result<(), StorageError> {
        if !self.containers.contains_key(container) {
            return Err(StorageError::ContainerNotFound {
                container: container.to_owned(),
            });
        }
        let content = content.into();
        debug!(container, path, size = content.len(), "blob uploaded");
        self.blobs.insert(
            blob_key(container, path),
            StoredBlob {
                content,
                uploaded_at: Utc::now(),
                metadata: metadata.unwrap_or_default(),
            },
        );
        Ok(())
    }

    /// Blob の内容を取得します。
    ///
    /// # Errors
    ///
    /// 該当キーが無い場合 [`StorageError::BlobNotFound`] を返します。
    pub fn download_file(&self, container: &str, path: &str) -> Result<Bytes, StorageError> {
        self.blobs
            .get(&blob_key(container, path))
            .map(|blob| blob.content.clone())
            .ok_or_else(|| StorageError::BlobNotFound {
                container: container.to_owned(),
                path: path.to_owned(),
            })
    }

    /// Blob の存在を確認します。
    pub fn file_exists(&self, container: &str, path: &str) -> bool {
        self.blobs.contains_key(&blob_key(container, path))
    }

    /// Blob を削除します。冪等で、削除が起きた場合のみ `true` を返します。
    pub fn delete_file(&mut self, container: &str, path: &str) -> bool {
        let removed = self.blobs.remove(&blob_key(container, path)).is_some();
        if removed {
            debug!(container, path, "blob deleted");
        }
        removed
    }

    /// Blob のメタ情報を取得します。
    ///
    /// # Errors
    ///
    /// 該当キーが無い場合 [`StorageError::BlobNotFound`] を返します。
    pub fn get_file_metadata(
        &self,
        container: &str,
        path: &str,
    ) -> Result<BlobMetadata, StorageError> {
        self.blobs
            .get(&blob_key(container, path))
            .map(|blob| BlobMetadata {
                size: blob.content.len() as u64,
                uploaded_at: blob.uploaded_at,
                metadata: blob.metadata.clone(),
            })
            .ok_or_else(|| StorageError::BlobNotFound {
                container: container.to_owned(),
                path: path.to_owned(),
            })
    }

    /// コンテナ配下の Blob パスを辞書順で列挙します。
    ///
    /// `prefix` を渡すとパスの前方一致で絞り込みます。
    /// 未知のコンテナは空リストになります (エラーにしません)。
    pub fn list_files(&self, container: &str, prefix: Option<&str>) -> Vec<String> {
        let container_prefix = format!("{container}/");
        self.blobs
            .keys()
            .filter_map(|key| key.strip_prefix(&container_prefix))
            .filter(|path| prefix.is_none_or(|p| path.starts_with(p)))
            .map(ToOwned::to_owned)
            .collect()
    }

    /// コンテナの存在を確認します。
    pub fn container_exists(&self, container: &str) -> bool {
        self.containers.contains_key(container)
    }

    /// 作成済みコンテナ名を辞書順で返します。
    pub fn list_containers(&self) -> Vec<String> {
        self.containers.keys().cloned().collect()
    }

    /// コンテナのメタ情報を返します。
    pub fn container_metadata(&self, container: &str) -> Option<ContainerMetadata> {
        self.containers.get(container).cloned()
    }
}

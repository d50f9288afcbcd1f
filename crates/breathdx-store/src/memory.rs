//! 内存文档存储
//!
//! 与 REST 存储语义一致的进程内实现：删除文档不会删除其子集合。
//! 记录每次操作，便于离线演示与测试中检查写入行为。

use async_trait::async_trait;
use breathdx_core::{Document, Fields};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use crate::paths::document_id;
use crate::store::DocumentStore;

/// 存储操作记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOperation {
    Get(String),
    List(String),
    Write(String),
    Delete(String),
}

/// 内存文档存储
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<BTreeMap<String, Fields>>,
    journal: RwLock<Vec<StoreOperation>>,
    fail_writes: AtomicBool,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接放入文档，不记录操作（模拟已有数据或设备写入）
    pub async fn seed(&self, path: &str, fields: Fields) {
        self.documents.write().await.insert(path.to_string(), fields);
    }

    /// 读取文档当前内容，不记录操作
    pub async fn snapshot(&self, path: &str) -> Option<Fields> {
        self.documents.read().await.get(path).cloned()
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.documents.read().await.contains_key(path)
    }

    pub async fn journal(&self) -> Vec<StoreOperation> {
        self.journal.read().await.clone()
    }

    /// 所有写入过的路径
    pub async fn written_paths(&self) -> Vec<String> {
        self.journal
            .read()
            .await
            .iter()
            .filter_map(|op| match op {
                StoreOperation::Write(path) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn clear_journal(&self) {
        self.journal.write().await.clear();
    }

    /// 让后续写入全部失败
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    async fn record(&self, operation: StoreOperation) {
        debug!("In-memory store operation: {:?}", operation);
        self.journal.write().await.push(operation);
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_document(&self, path: &str) -> Option<Document> {
        self.record(StoreOperation::Get(path.to_string())).await;
        self.documents
            .read()
            .await
            .get(path)
            .map(|fields| Document::new(document_id(path), fields.clone()))
    }

    async fn list_collection(&self, path: &str) -> Vec<Document> {
        self.record(StoreOperation::List(path.to_string())).await;
        let prefix = format!("{}/", path);
        self.documents
            .read()
            .await
            .iter()
            .filter_map(|(key, fields)| {
                let id = key.strip_prefix(&prefix)?;
                (!id.contains('/')).then(|| Document::new(id, fields.clone()))
            })
            .collect()
    }

    async fn create_or_replace(&self, path: &str, fields: &Fields) -> bool {
        self.record(StoreOperation::Write(path.to_string())).await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return false;
        }
        self.documents
            .write()
            .await
            .insert(path.to_string(), fields.clone());
        true
    }

    async fn delete(&self, path: &str) -> bool {
        self.record(StoreOperation::Delete(path.to_string())).await;
        self.documents.write().await.remove(path);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use breathdx_core::Value;

    #[tokio::test]
    async fn test_list_returns_direct_children_only() {
        let store = InMemoryDocumentStore::new();
        store.seed("patients/P-1", Fields::new()).await;
        store.seed("patients/P-2", Fields::new()).await;
        store.seed("patients/P-1/sessions/sessionID_001", Fields::new()).await;

        let ids: Vec<String> = store
            .list_collection("patients")
            .await
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["P-1", "P-2"]);
    }

    #[tokio::test]
    async fn test_delete_keeps_subcollections() {
        let store = InMemoryDocumentStore::new();
        store.seed("patients/P-1/sessions/s1", Fields::new()).await;
        store.seed("patients/P-1/sessions/s1/subsessions/sub1", Fields::new()).await;

        assert!(store.delete("patients/P-1/sessions/s1").await);
        assert!(!store.contains("patients/P-1/sessions/s1").await);
        assert!(store.contains("patients/P-1/sessions/s1/subsessions/sub1").await);
    }

    #[tokio::test]
    async fn test_failed_writes_are_journaled() {
        let store = InMemoryDocumentStore::new();
        let mut fields = Fields::new();
        fields.insert("n".into(), Value::Integer(1));

        store.set_fail_writes(true);
        assert!(!store.create_or_replace("a/b", &fields).await);
        assert!(!store.contains("a/b").await);
        assert_eq!(store.written_paths().await, vec!["a/b".to_string()]);

        store.set_fail_writes(false);
        assert!(store.merge_update("a/b", &fields).await);
        assert_eq!(store.get_document("a/b").await.unwrap().fields, fields);
    }
}

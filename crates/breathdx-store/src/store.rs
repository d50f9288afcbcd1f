//! 文档存储接口

use async_trait::async_trait;
use breathdx_core::{Document, Fields};

/// 按路径寻址的文档存储
///
/// 所有调用都折叠为成功/失败：读取失败与"不存在"无法区分，写入失败只得到 `false`，
/// 不重试、不回退。
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 存储名称，用于日志
    fn name(&self) -> &str;

    /// 读取单个文档，任何非成功响应都返回 None
    async fn get_document(&self, path: &str) -> Option<Document>;

    /// 列举集合下的全部直接文档，失败时返回空列表
    async fn list_collection(&self, path: &str) -> Vec<Document>;

    /// 整体替换 `path` 处的文档
    async fn create_or_replace(&self, path: &str, fields: &Fields) -> bool;

    /// 与替换使用相同的传输（没有字段掩码），需要局部更新的调用方必须先读取再合并
    async fn merge_update(&self, path: &str, fields: &Fields) -> bool {
        self.create_or_replace(path, fields).await
    }

    /// 删除文档；子集合不受影响
    async fn delete(&self, path: &str) -> bool;
}

//! REST 文档存储
//!
//! 通过 HTTP 访问远端文档数据库。每个请求都附带静态凭据查询参数 `key`，
//! 没有逐请求的认证协商、重试或限流。

use async_trait::async_trait;
use breathdx_core::{Document, Fields};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde_json::Value as Json;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::store::DocumentStore;
use crate::wire::{decode_document, decode_list_page, encode_document_body};

/// REST 存储连接配置
#[derive(Debug, Clone)]
pub struct RestStoreConfig {
    pub base_url: String,
    pub project_id: String,
    pub database: String,
    /// 静态凭据，为空时不附加
    pub api_key: String,
    pub request_timeout: Duration,
    /// 列举集合时每页文档数
    pub page_size: u32,
}

impl Default for RestStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "https://firestore.googleapis.com/v1".to_string(),
            project_id: "breathdx-system".to_string(),
            database: "(default)".to_string(),
            api_key: String::new(),
            request_timeout: Duration::from_secs(30),
            page_size: 300,
        }
    }
}

/// 基于 reqwest 的文档存储
pub struct RestDocumentStore {
    name: String,
    config: RestStoreConfig,
    client: reqwest::Client,
}

impl RestDocumentStore {
    pub fn new(config: RestStoreConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        info!(
            "Document store client ready for project {} at {}",
            config.project_id, config.base_url
        );

        Ok(Self {
            name: format!("rest:{}", config.project_id),
            config,
            client,
        })
    }

    /// 文档根地址
    pub fn documents_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents",
            self.config.base_url.trim_end_matches('/'),
            self.config.project_id,
            self.config.database
        )
    }

    /// 文档地址，每个路径段单独百分号编码
    fn document_url(&self, path: &str) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.documents_url())
            .map_err(|e| StoreError::Encode(format!("无效的存储地址 {}: {}", self.config.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Encode(format!("存储地址不能附加路径: {}", self.config.base_url)))?
            .pop_if_empty()
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    /// 附加静态凭据
    fn with_credential(&self, request: RequestBuilder) -> RequestBuilder {
        if self.config.api_key.is_empty() {
            request
        } else {
            request.query(&[("key", self.config.api_key.as_str())])
        }
    }

    fn check_status(response: Response, path: &str) -> Result<Response, StoreError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(StoreError::Status {
                status: response.status().as_u16(),
                path: path.to_string(),
            })
        }
    }

    /// 读取文档，区分不存在 (`Ok(None)`) 与失败
    pub async fn fetch_document(&self, path: &str) -> Result<Option<Document>, StoreError> {
        debug!("GET document {}", path);

        let response = self
            .with_credential(self.client.get(self.document_url(path)?))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = Self::check_status(response, path)?;
        let body: Json = response.json().await?;
        Ok(Some(decode_document(&body)?))
    }

    /// 列举集合，跟随分页令牌直到取完
    pub async fn fetch_collection(&self, path: &str) -> Result<Vec<Document>, StoreError> {
        debug!("LIST collection {}", path);

        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .with_credential(self.client.get(self.document_url(path)?))
                .query(&[("pageSize", self.config.page_size)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = Self::check_status(request.send().await?, path)?;
            let body: Json = response.json().await?;
            let (page, next_page_token) = decode_list_page(&body)?;
            documents.extend(page);

            match next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(documents)
    }

    /// 整体写入文档（PATCH，无字段掩码）
    pub async fn write_document(&self, path: &str, fields: &Fields) -> Result<(), StoreError> {
        debug!("PATCH document {} ({} fields)", path, fields.len());

        let body = encode_document_body(fields)?;
        let response = self
            .with_credential(self.client.patch(self.document_url(path)?))
            .json(&body)
            .send()
            .await?;

        Self::check_status(response, path)?;
        Ok(())
    }

    pub async fn remove_document(&self, path: &str) -> Result<(), StoreError> {
        debug!("DELETE document {}", path);

        let response = self
            .with_credential(self.client.delete(self.document_url(path)?))
            .send()
            .await?;

        Self::check_status(response, path)?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for RestDocumentStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_document(&self, path: &str) -> Option<Document> {
        match self.fetch_document(path).await {
            Ok(document) => document,
            Err(e) => {
                warn!("Failed to read document {}: {}", path, e);
                None
            }
        }
    }

    async fn list_collection(&self, path: &str) -> Vec<Document> {
        match self.fetch_collection(path).await {
            Ok(documents) => documents,
            Err(e) => {
                warn!("Failed to list collection {}: {}", path, e);
                Vec::new()
            }
        }
    }

    async fn create_or_replace(&self, path: &str, fields: &Fields) -> bool {
        match self.write_document(path, fields).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to write document {}: {}", path, e);
                false
            }
        }
    }

    async fn delete(&self, path: &str) -> bool {
        match self.remove_document(path).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to delete document {}: {}", path, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Query, State},
        http::{Method, StatusCode as HttpStatus, Uri},
        response::{IntoResponse, Response as AxumResponse},
        Json as AxumJson, Router,
    };
    use breathdx_core::Value;
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    const API_KEY: &str = "test-key";
    const DOCUMENTS_ROOT: &str = "projects/test/databases/(default)/documents";

    /// 进程内的类型化字段文档服务
    #[derive(Clone, Default)]
    struct FakeDocumentService {
        documents: Arc<RwLock<BTreeMap<String, Json>>>,
    }

    fn wire_document(path: &str, fields: &Json) -> Json {
        json!({ "name": format!("{}/{}", DOCUMENTS_ROOT, path), "fields": fields })
    }

    async fn handle(
        State(service): State<FakeDocumentService>,
        method: Method,
        uri: Uri,
        Query(params): Query<HashMap<String, String>>,
        body: String,
    ) -> AxumResponse {
        if params.get("key").map(String::as_str) != Some(API_KEY) {
            return HttpStatus::FORBIDDEN.into_response();
        }

        let Some((_, path)) = uri.path().split_once("/documents/") else {
            return HttpStatus::BAD_REQUEST.into_response();
        };
        let path = path.to_string();
        let is_collection = path.split('/').count() % 2 == 1;

        match method {
            Method::GET if is_collection => {
                let documents = service.documents.read().await;
                let prefix = format!("{}/", path);
                let children: Vec<Json> = documents
                    .iter()
                    .filter(|(key, _)| {
                        key.strip_prefix(&prefix).is_some_and(|rest| !rest.contains('/'))
                    })
                    .map(|(key, fields)| wire_document(key, fields))
                    .collect();

                let page_size: usize = params
                    .get("pageSize")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(usize::MAX);
                let offset: usize = params
                    .get("pageToken")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);

                let page: Vec<Json> = children.iter().skip(offset).take(page_size).cloned().collect();
                let mut body = json!({});
                if !page.is_empty() {
                    body["documents"] = Json::Array(page);
                }
                if offset + page_size < children.len() {
                    body["nextPageToken"] = Json::from((offset + page_size).to_string());
                }
                AxumJson(body).into_response()
            }
            Method::GET => match service.documents.read().await.get(&path) {
                Some(fields) => AxumJson(wire_document(&path, fields)).into_response(),
                None => HttpStatus::NOT_FOUND.into_response(),
            },
            Method::PATCH => {
                let Ok(request) = serde_json::from_str::<Json>(&body) else {
                    return HttpStatus::BAD_REQUEST.into_response();
                };
                let fields = request.get("fields").cloned().unwrap_or_else(|| json!({}));
                service.documents.write().await.insert(path.clone(), fields.clone());
                AxumJson(wire_document(&path, &fields)).into_response()
            }
            Method::DELETE => {
                service.documents.write().await.remove(&path);
                AxumJson(json!({})).into_response()
            }
            _ => HttpStatus::METHOD_NOT_ALLOWED.into_response(),
        }
    }

    async fn start_service() -> (FakeDocumentService, String) {
        let service = FakeDocumentService::default();
        let app = Router::new().fallback(handle).with_state(service.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (service, format!("http://{}/v1", addr))
    }

    fn store_for(base_url: String, api_key: &str, page_size: u32) -> RestDocumentStore {
        RestDocumentStore::new(RestStoreConfig {
            base_url,
            project_id: "test".to_string(),
            api_key: api_key.to_string(),
            page_size,
            ..RestStoreConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_write_then_read_document() {
        let (service, base_url) = start_service().await;
        let store = store_for(base_url, API_KEY, 300);

        let mut basic_info = Fields::new();
        basic_info.insert("name".into(), Value::from("A"));
        basic_info.insert("age".into(), Value::Integer(30));
        let mut fields = Fields::new();
        fields.insert("basic_info".into(), Value::Map(basic_info));

        assert!(store.create_or_replace("patients/P-1", &fields).await);
        assert!(service.documents.read().await.contains_key("patients/P-1"));

        let document = store.get_document("patients/P-1").await.unwrap();
        assert_eq!(document.id, "P-1");
        assert_eq!(document.fields, fields);
    }

    #[tokio::test]
    async fn test_missing_document_and_failure_both_collapse_to_none() {
        let (_service, base_url) = start_service().await;

        let store = store_for(base_url.clone(), API_KEY, 300);
        assert!(store.get_document("patients/P-404").await.is_none());
        assert!(matches!(store.fetch_document("patients/P-404").await, Ok(None)));

        let unauthorized = store_for(base_url, "wrong-key", 300);
        assert!(unauthorized.get_document("patients/P-404").await.is_none());
        assert!(matches!(
            unauthorized.fetch_document("patients/P-404").await,
            Err(StoreError::Status { status: 403, .. })
        ));
        assert!(unauthorized.list_collection("patients").await.is_empty());
        assert!(!unauthorized.create_or_replace("patients/P-1", &Fields::new()).await);
    }

    #[tokio::test]
    async fn test_list_follows_page_tokens() {
        let (_service, base_url) = start_service().await;
        let store = store_for(base_url, API_KEY, 2);

        for n in 1..=5 {
            let mut fields = Fields::new();
            fields.insert("n".into(), Value::Integer(n));
            assert!(store.create_or_replace(&format!("patients/P-{}", n), &fields).await);
        }
        // 子集合中的文档不属于直接子文档
        assert!(store
            .create_or_replace("patients/P-1/sessions/sessionID_001", &Fields::new())
            .await);

        let documents = store.list_collection("patients").await;
        let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["P-1", "P-2", "P-3", "P-4", "P-5"]);
    }

    #[tokio::test]
    async fn test_delete_document() {
        let (service, base_url) = start_service().await;
        let store = store_for(base_url, API_KEY, 300);

        assert!(store.create_or_replace("active_monitoring/current", &Fields::new()).await);
        assert!(store.delete("active_monitoring/current").await);
        assert!(service.documents.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_document_url_encodes_each_segment() {
        let store = store_for("http://localhost:8080/v1/".to_string(), API_KEY, 300);

        let url = store.document_url("patients/P-1?x#y/sessions/a b").unwrap();
        assert_eq!(
            url.path(),
            "/v1/projects/test/databases/(default)/documents/patients/P-1%3Fx%23y/sessions/a%20b"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[tokio::test]
    async fn test_reserved_characters_stay_inside_document_id() {
        let (service, base_url) = start_service().await;
        let store = store_for(base_url, API_KEY, 300);

        let mut fields = Fields::new();
        fields.insert("n".into(), Value::Integer(1));
        assert!(store.create_or_replace("patients/P-1?x", &fields).await);

        // 凭据参数没有被 id 中的 `?` 截断，文档落在编码后的 id 下
        let documents = service.documents.read().await;
        assert_eq!(documents.keys().collect::<Vec<_>>(), vec!["patients/P-1%3Fx"]);
        drop(documents);

        assert!(store.get_document("patients/P-1").await.is_none());
        assert_eq!(store.get_document("patients/P-1?x").await.unwrap().fields, fields);
    }

    #[tokio::test]
    async fn test_unreachable_store_collapses_failures() {
        let store = store_for("http://127.0.0.1:9/v1".to_string(), API_KEY, 300);
        assert!(store.get_document("patients/P-1").await.is_none());
        assert!(store.list_collection("patients").await.is_empty());
        assert!(!store.delete("patients/P-1").await);
    }
}

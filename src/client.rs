//! Remote space platform boundary
//!
//! [`SpaceApi`] is the trait the mirroring core consumes: node lookup,
//! child listing, document metadata, block listing, media download, and
//! space listing. [`HttpSpaceApi`] implements it over the platform's REST
//! surface (JSON envelope `{code, msg, data}` with a tenant token).
//!
//! Failure classification happens here, and only here, from structured
//! signals: HTTP status codes and envelope error codes. No error-message
//! string matching.

use crate::config::{Config, Credentials};
use crate::error::{Error, Result};
use crate::types::{
    Block, DocumentId, DocumentMeta, MediaDownload, Node, NodeToken, ObjectType, Page, Space,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::Mutex;

/// Envelope error code the platform uses for request-quota rejections
const CODE_RATE_LIMITED: i64 = 99991400;

/// Remote operations the mirroring core depends on
///
/// Everything here is a single remote call: pagination is driven by
/// [`fetch_all`](crate::pager::fetch_all) and retries by
/// [`run_with_backoff`](crate::retry::run_with_backoff) at the call sites.
#[async_trait]
pub trait SpaceApi: Send + Sync {
    /// Look up a single node by token (entry-point resolution)
    async fn get_node(&self, token: &NodeToken) -> Result<Node>;

    /// List one page of a node's children
    async fn list_children(
        &self,
        parent: &NodeToken,
        cursor: Option<String>,
    ) -> Result<Page<Node>>;

    /// Fetch document metadata (title, revision)
    async fn get_document(&self, id: &DocumentId) -> Result<DocumentMeta>;

    /// List one page of a document's content blocks
    async fn list_blocks(&self, id: &DocumentId, cursor: Option<String>) -> Result<Page<Block>>;

    /// Download the media object behind a token
    async fn download_media(&self, token: &str) -> Result<MediaDownload>;

    /// List one page of the spaces the credentials can access
    async fn list_spaces(&self, cursor: Option<String>) -> Result<Page<Space>>;

    /// Look up one space by id (used to title bulk exports)
    async fn get_space(&self, space_id: &str) -> Result<Space>;
}

/// Response envelope every platform endpoint wraps its payload in
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    tenant_access_token: String,
}

#[derive(Debug, Deserialize)]
struct ListData<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

impl<T> ListData<T> {
    fn into_page(self) -> Page<T> {
        Page {
            items: self.items,
            next_cursor: if self.has_more { self.next_cursor } else { None },
        }
    }
}

#[derive(Debug, Deserialize)]
struct NodeData {
    node_token: String,
    obj_token: String,
    obj_type: String,
    title: String,
    #[serde(default)]
    space_id: String,
}

impl From<NodeData> for Node {
    fn from(data: NodeData) -> Self {
        Node {
            node_token: NodeToken::from(data.node_token),
            object_token: data.obj_token,
            object_type: ObjectType::from_remote(&data.obj_type),
            title: data.title,
            space_id: data.space_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DocumentData {
    document_id: String,
    #[serde(default)]
    revision_id: i64,
    title: String,
}

/// HTTP implementation of [`SpaceApi`] over the platform REST API
///
/// Holds a cached tenant access token fetched lazily on first use. Each
/// mirror instance owns its own client, so concurrent traversals with
/// different credentials never share session state.
pub struct HttpSpaceApi {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    token: Mutex<Option<String>>,
}

impl HttpSpaceApi {
    /// Build a client from the mirror configuration
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_base_url(
            config.base_url.clone(),
            config.credentials.clone(),
            config.request_timeout,
        )
    }

    /// Build a client against an explicit base URL
    pub fn with_base_url(
        base_url: String,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            token: Mutex::new(None),
        })
    }

    /// Exchange app credentials for a tenant access token, caching it
    ///
    /// The platform token outlives any single traversal; expiry handling is
    /// out of scope for this boundary (a 401 surfaces as a fatal
    /// `PermissionDenied` and operators re-run with a fresh client).
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let url = format!("{}/auth/token", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "app_id": self.credentials.app_id,
                "app_secret": self.credentials.app_secret,
            }))
            .send()
            .await?;
        let response = check_http_status(response)?;
        let envelope: Envelope<TokenData> = response.json().await?;
        let data = unwrap_envelope(envelope).map_err(|e| match e {
            Error::Remote { code, message } => Error::Auth(format!("code {code}: {message}")),
            other => other,
        })?;

        tracing::debug!("obtained tenant access token");
        *cached = Some(data.tenant_access_token.clone());
        Ok(data.tenant_access_token)
    }

    /// GET an enveloped JSON payload from a platform endpoint
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .query(query)
            .send()
            .await?;
        let response = check_http_status(response)?;
        let envelope: Envelope<T> = response.json().await?;
        unwrap_envelope(envelope)
    }
}

/// Map HTTP status codes onto the error taxonomy
fn check_http_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    match status.as_u16() {
        200..=299 => Ok(response),
        429 => {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(Error::RateLimited { retry_after })
        }
        404 => Err(Error::NotFound(response.url().path().to_string())),
        401 | 403 => Err(Error::PermissionDenied(response.url().path().to_string())),
        s if status.is_server_error() => Err(Error::Upstream { status: s }),
        _ => Err(Error::Remote {
            code: i64::from(status.as_u16()),
            message: format!("unexpected HTTP status {status}"),
        }),
    }
}

/// Map envelope codes onto the error taxonomy and unwrap the payload
fn unwrap_envelope<T>(envelope: Envelope<T>) -> Result<T> {
    match envelope.code {
        0 => envelope.data.ok_or(Error::Remote {
            code: 0,
            message: "response envelope has no data field".to_string(),
        }),
        CODE_RATE_LIMITED => Err(Error::RateLimited { retry_after: None }),
        code => Err(Error::Remote {
            code,
            message: envelope.msg,
        }),
    }
}

/// Pull a filename out of a `Content-Disposition` header value
fn filename_from_disposition(value: &str) -> Option<String> {
    let marker = "filename=";
    let idx = value.find(marker)?;
    let raw = value[idx + marker.len()..].trim();
    let raw = raw.split(';').next()?.trim();
    let name = raw.trim_matches('"');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[async_trait]
impl SpaceApi for HttpSpaceApi {
    async fn get_node(&self, token: &NodeToken) -> Result<Node> {
        let data: NodeData = self
            .get_json(&format!("/nodes/{}", token.as_str()), &[])
            .await?;
        Ok(data.into())
    }

    async fn list_children(
        &self,
        parent: &NodeToken,
        cursor: Option<String>,
    ) -> Result<Page<Node>> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(c) = cursor.as_deref() {
            query.push(("cursor", c));
        }
        let data: ListData<NodeData> = self
            .get_json(&format!("/nodes/{}/children", parent.as_str()), &query)
            .await?;
        let page = data.into_page();
        Ok(Page {
            items: page.items.into_iter().map(Node::from).collect(),
            next_cursor: page.next_cursor,
        })
    }

    async fn get_document(&self, id: &DocumentId) -> Result<DocumentMeta> {
        let data: DocumentData = self
            .get_json(&format!("/documents/{}", id.as_str()), &[])
            .await?;
        Ok(DocumentMeta {
            document_id: DocumentId::from(data.document_id),
            revision_id: data.revision_id,
            title: data.title,
        })
    }

    async fn list_blocks(&self, id: &DocumentId, cursor: Option<String>) -> Result<Page<Block>> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(c) = cursor.as_deref() {
            query.push(("cursor", c));
        }
        let data: ListData<Block> = self
            .get_json(&format!("/documents/{}/blocks", id.as_str()), &query)
            .await?;
        Ok(data.into_page())
    }

    async fn download_media(&self, token: &str) -> Result<MediaDownload> {
        let auth = self.access_token().await?;
        let url = format!("{}/media/{}", self.base_url, token);
        let response = self.http.get(&url).bearer_auth(&auth).send().await?;
        let response = check_http_status(response)?;

        let filename_hint = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_default();
        let bytes = response.bytes().await?.to_vec();

        Ok(MediaDownload {
            filename_hint,
            bytes,
        })
    }

    async fn list_spaces(&self, cursor: Option<String>) -> Result<Page<Space>> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(c) = cursor.as_deref() {
            query.push(("cursor", c));
        }
        let data: ListData<Space> = self.get_json("/spaces", &query).await?;
        Ok(data.into_page())
    }

    async fn get_space(&self, space_id: &str) -> Result<Space> {
        self.get_json(&format!("/spaces/{space_id}"), &[]).await
    }
}

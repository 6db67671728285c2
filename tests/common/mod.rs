//! Shared test fixtures: a scripted in-memory document space
//!
//! `ScriptedSpace` implements the remote API against in-memory data with
//! per-entity failure injection and a call log, so integration tests can
//! assert call ordering, pagination behavior, and failure containment
//! without a network.

#![allow(dead_code)]

use async_trait::async_trait;
use space_mirror::{
    Block, Config, Credentials, DocumentId, DocumentMeta, Error, MediaDownload, Node, NodeToken,
    ObjectType, Page, Result, RetryPolicy, Space, SpaceApi,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// In-memory document space with scripted contents and failure injection
#[derive(Default)]
pub struct ScriptedSpace {
    nodes: HashMap<String, Node>,
    /// node token -> pages of children
    children: HashMap<String, Vec<Vec<Node>>>,
    documents: HashMap<String, DocumentMeta>,
    /// document id -> pages of blocks
    blocks: HashMap<String, Vec<Vec<Block>>>,
    media: HashMap<String, MediaDownload>,
    spaces: Vec<Space>,
    failing_listings: HashSet<String>,
    failing_documents: HashSet<String>,
    failing_media: HashSet<String>,
    /// call log: one entry per remote call, in order
    pub calls: Mutex<Vec<String>>,
    call_count: AtomicU32,
    /// cancel this token once the Nth call completes
    cancel_after: Mutex<Option<(u32, CancellationToken)>>,
}

impl ScriptedSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.insert(node.node_token.as_str().to_string(), node);
        self
    }

    pub fn with_children(mut self, parent: &str, pages: Vec<Vec<Node>>) -> Self {
        for page in &pages {
            for child in page {
                self.nodes
                    .insert(child.node_token.as_str().to_string(), child.clone());
            }
        }
        self.children.insert(parent.to_string(), pages);
        self
    }

    pub fn with_document(mut self, meta: DocumentMeta, pages: Vec<Vec<Block>>) -> Self {
        let id = meta.document_id.as_str().to_string();
        self.documents.insert(id.clone(), meta);
        self.blocks.insert(id, pages);
        self
    }

    pub fn with_media(mut self, token: &str, filename_hint: &str, bytes: &[u8]) -> Self {
        self.media.insert(
            token.to_string(),
            MediaDownload {
                filename_hint: filename_hint.to_string(),
                bytes: bytes.to_vec(),
            },
        );
        self
    }

    pub fn with_space(mut self, space_id: &str, name: &str) -> Self {
        self.spaces.push(Space {
            space_id: space_id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn fail_listing(mut self, node_token: &str) -> Self {
        self.failing_listings.insert(node_token.to_string());
        self
    }

    pub fn fail_document(mut self, document_id: &str) -> Self {
        self.failing_documents.insert(document_id.to_string());
        self
    }

    pub fn fail_media(mut self, token: &str) -> Self {
        self.failing_media.insert(token.to_string());
        self
    }

    /// Cancel `token` once the Nth remote call (1-based) has completed
    pub fn set_cancel_after(&self, calls: u32, token: CancellationToken) {
        *self.cancel_after.lock().unwrap() = Some((calls, token));
    }

    pub fn logged_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
        let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((threshold, token)) = self.cancel_after.lock().unwrap().as_ref() {
            if count == *threshold {
                token.cancel();
            }
        }
    }

    fn page_of<T: Clone>(pages: &[Vec<T>], cursor: Option<String>) -> Page<T> {
        let index: usize = cursor.as_deref().and_then(|c| c.parse().ok()).unwrap_or(0);
        let items = pages.get(index).cloned().unwrap_or_default();
        if index + 1 < pages.len() {
            Page::next(items, (index + 1).to_string())
        } else {
            Page::last(items)
        }
    }
}

#[async_trait]
impl SpaceApi for ScriptedSpace {
    async fn get_node(&self, token: &NodeToken) -> Result<Node> {
        self.record(format!("get_node:{token}"));
        self.nodes
            .get(token.as_str())
            .cloned()
            .ok_or_else(|| Error::NotFound(token.to_string()))
    }

    async fn list_children(
        &self,
        parent: &NodeToken,
        cursor: Option<String>,
    ) -> Result<Page<Node>> {
        self.record(format!("list_children:{parent}:{cursor:?}"));
        if self.failing_listings.contains(parent.as_str()) {
            return Err(Error::PermissionDenied(parent.to_string()));
        }
        let pages = self
            .children
            .get(parent.as_str())
            .cloned()
            .unwrap_or_default();
        Ok(Self::page_of(&pages, cursor))
    }

    async fn get_document(&self, id: &DocumentId) -> Result<DocumentMeta> {
        self.record(format!("get_document:{id}"));
        if self.failing_documents.contains(id.as_str()) {
            return Err(Error::NotFound(id.to_string()));
        }
        self.documents
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn list_blocks(&self, id: &DocumentId, cursor: Option<String>) -> Result<Page<Block>> {
        self.record(format!("list_blocks:{id}:{cursor:?}"));
        let pages = self.blocks.get(id.as_str()).cloned().unwrap_or_default();
        Ok(Self::page_of(&pages, cursor))
    }

    async fn download_media(&self, token: &str) -> Result<MediaDownload> {
        self.record(format!("download_media:{token}"));
        if self.failing_media.contains(token) {
            return Err(Error::NotFound(token.to_string()));
        }
        self.media
            .get(token)
            .cloned()
            .ok_or_else(|| Error::NotFound(token.to_string()))
    }

    async fn list_spaces(&self, cursor: Option<String>) -> Result<Page<Space>> {
        self.record(format!("list_spaces:{cursor:?}"));
        Ok(Page::last(self.spaces.clone()))
    }

    async fn get_space(&self, space_id: &str) -> Result<Space> {
        self.record(format!("get_space:{space_id}"));
        self.spaces
            .iter()
            .find(|s| s.space_id == space_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(space_id.to_string()))
    }
}

/// Node constructor shorthand
pub fn node(token: &str, object_type: ObjectType, title: &str) -> Node {
    Node {
        node_token: NodeToken::from(token),
        object_token: format!("obj-{token}"),
        object_type,
        title: title.to_string(),
        space_id: "sp1".to_string(),
    }
}

/// Document metadata for the object token `node` produces
pub fn doc_meta(node_token: &str, title: &str) -> DocumentMeta {
    DocumentMeta {
        document_id: DocumentId::from(format!("obj-{node_token}")),
        revision_id: 1,
        title: title.to_string(),
    }
}

pub fn text_block(id: &str, text: &str) -> Block {
    Block {
        block_id: id.to_string(),
        media_token: None,
        payload: serde_json::json!({ "text": text }),
    }
}

pub fn media_block(id: &str, token: &str) -> Block {
    Block {
        block_id: id.to_string(),
        media_token: Some(token.to_string()),
        payload: serde_json::Value::Null,
    }
}

/// Config pointed at a temp directory, with fast retries and no pacing
pub fn test_config(output_dir: &std::path::Path) -> Config {
    let mut config = Config {
        credentials: Credentials {
            app_id: "cli_test".into(),
            app_secret: "secret".into(),
        },
        ..Config::default()
    };
    config.output.output_dir = output_dir.to_path_buf();
    config.pacing_delay = Duration::ZERO;
    config.retry = RetryPolicy {
        max_attempts: 2,
        rate_limit_base: Duration::from_millis(1),
        transient_base: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        jitter: false,
    };
    config
}

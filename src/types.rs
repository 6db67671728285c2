//! Core types for space-mirror

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque token identifying a node in the remote tree
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeToken(pub String);

impl NodeToken {
    /// Create a new NodeToken
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the inner token string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl From<String> for NodeToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl std::fmt::Display for NodeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of a document object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    /// Create a new DocumentId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner id string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a tree node points at
///
/// The type is a branching signal, not a lifecycle gate: every node is listed
/// for children regardless of type, but only `Document` nodes are fed to the
/// content assembler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    /// A document with renderable block content
    Document,
    /// A folder/container node
    Folder,
    /// Any other object kind (sheets, bases, ...): listed but not assembled
    Other,
}

impl ObjectType {
    /// Map a remote object-type string onto the branching signal
    pub fn from_remote(kind: &str) -> Self {
        match kind {
            "docx" | "doc" | "document" => ObjectType::Document,
            "folder" | "wiki" => ObjectType::Folder,
            _ => ObjectType::Other,
        }
    }
}

/// One entry in the remote hierarchical document tree
///
/// A snapshot of remote state at listing time; immutable once built into a
/// tree mirror.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Token addressing this node in the tree
    pub node_token: NodeToken,
    /// Token of the underlying object (document id for document nodes)
    pub object_token: String,
    /// Branching signal
    pub object_type: ObjectType,
    /// Node title as listed remotely
    pub title: String,
    /// Space this node belongs to
    pub space_id: String,
}

/// One batch of a paginated listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page<T> {
    /// Items in remote listing order
    pub items: Vec<T>,
    /// Opaque token for the next batch; `None` or empty means no more pages
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// A page with more batches to follow
    pub fn next(items: Vec<T>, cursor: impl Into<String>) -> Self {
        Self {
            items,
            next_cursor: Some(cursor.into()),
        }
    }

    /// The final page of a listing
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}

/// Remote content unit of a document
///
/// Opaque to the mirroring core beyond its position in the sequence (which
/// defines reading order) and an optionally embedded media token. Rendering
/// is delegated to a [`BlockRenderer`](crate::render::BlockRenderer).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Remote block identifier
    pub block_id: String,
    /// Media token embedded in this block, if any
    #[serde(default)]
    pub media_token: Option<String>,
    /// Platform-specific block payload, passed through to the renderer
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Document metadata fetched ahead of block listing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Document identifier
    pub document_id: DocumentId,
    /// Remote revision at fetch time
    pub revision_id: i64,
    /// Document title
    pub title: String,
}

/// A remote space (top-level document collection)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    /// Space identifier
    pub space_id: String,
    /// Space display name
    pub name: String,
}

/// Raw media download from the remote platform
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaDownload {
    /// Remote filename, used only for its extension
    pub filename_hint: String,
    /// Raw file bytes
    pub bytes: Vec<u8>,
}

/// A media reference resolved into a locally stored asset
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Asset {
    /// The media token this asset resolves
    pub token: String,
    /// Deterministic local filename (token + reported extension)
    pub local_name: String,
    /// Raw file bytes
    pub bytes: Vec<u8>,
}

/// One occurrence class of a media token in rendered text
///
/// `occurrence` is the exact matched text recorded at the token's first
/// sighting (for the default pattern, `media://<token>`). Substitution is
/// driven by re-matching the scan pattern, so every occurrence of the
/// token is replaced exactly once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaRef {
    /// The opaque media token (capture group of the scan pattern)
    pub token: String,
    /// The full matched text as first seen in the rendered output
    pub occurrence: String,
}

/// Outcome of one document within a tree export
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// All blocks and assets were retrieved
    Complete,
    /// Exported, but some blocks or assets are missing
    Partial,
    /// No document could be produced
    Failed,
}

/// Per-document record in a [`MirrorReport`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Node the document hangs off
    pub node_token: NodeToken,
    /// Document title (or node title when metadata never arrived)
    pub title: String,
    /// Relative path of the written markdown file, when one was produced
    pub file: Option<String>,
    /// Outcome for this document
    pub status: DocumentStatus,
    /// Error detail for partial/failed documents
    pub error: Option<String>,
}

/// A node whose child listing could not be completed
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeFailure {
    /// The failed node
    pub node_token: NodeToken,
    /// Its title, for operator-facing reports
    pub title: String,
    /// Rendered terminal error
    pub error: String,
}

/// A media token whose download failed
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetFailure {
    /// The unresolved media token
    pub token: String,
    /// Rendered terminal error
    pub error: String,
}

/// Full accounting of a tree export
///
/// Every node and every asset shows up here as succeeded, partial, or
/// failed; nothing is dropped silently.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MirrorReport {
    /// The space that was exported, when it could be resolved
    pub space: Option<Space>,
    /// When the export started
    pub started_at: DateTime<Utc>,
    /// When the export finished (or was cancelled)
    pub finished_at: DateTime<Utc>,
    /// Per-document outcomes, in traversal order
    pub documents: Vec<DocumentRecord>,
    /// Nodes whose child listing failed terminally
    pub node_failures: Vec<NodeFailure>,
    /// Media tokens that could not be resolved
    pub asset_failures: Vec<AssetFailure>,
    /// True when the export was cut short by the cancellation signal
    pub cancelled: bool,
}

//! High-level export facade
//!
//! [`SpaceMirror`] owns the API handle, renderer, scan pattern, and
//! cancellation token, and exposes the export operations: a single document
//! to memory or disk, or a whole tree to a directory or zip archive.
//!
//! Tree exports are sequential by design. Pagination cursors and the
//! pacing throttle are inherently serial, so the traversal and the
//! document loop run one call at a time, and every remote call checks the
//! cancellation token first.

use crate::assemble::{Assembly, ContentAssembler};
use crate::assets::{AssetResolver, Resolution};
use crate::bundle::{
    substitute_tokens, write_archive_file, write_assets, write_document, BundleEntry,
};
use crate::client::{HttpSpaceApi, SpaceApi};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::pager::fetch_all;
use crate::render::{BlockRenderer, TextRenderer};
use crate::retry::run_with_backoff;
use crate::tree::{TreeMirror, TreeTraverser};
use crate::types::{
    Asset, AssetFailure, DocumentId, DocumentMeta, DocumentRecord, DocumentStatus, MirrorReport,
    Node, NodeFailure, NodeToken, ObjectType, Space,
};
use crate::utils::{parse_document_link, sanitize_filename, LinkKind};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Filename of the outline written alongside tree exports
const OUTLINE_FILENAME: &str = "tree.md";

/// One fully exported document, in memory
#[derive(Clone, Debug)]
pub struct DocumentExport {
    /// Document metadata as fetched
    pub meta: DocumentMeta,
    /// Markdown filename derived from the title
    pub filename: String,
    /// Final text, media references substituted
    pub text: String,
    /// Assets referenced by this document that resolved
    pub assets: Vec<Asset>,
    /// Media tokens that failed to resolve
    pub asset_failures: Vec<AssetFailure>,
    /// True when blocks or assets are missing
    pub partial: bool,
}

/// Engine for mirroring a remote document space to local Markdown
pub struct SpaceMirror {
    config: Config,
    api: Arc<dyn SpaceApi>,
    renderer: Box<dyn BlockRenderer>,
    pattern: Regex,
    cancel: CancellationToken,
}

impl SpaceMirror {
    /// Create a mirror talking to the platform over HTTP
    pub fn new(config: Config) -> Result<Self> {
        let api = Arc::new(HttpSpaceApi::new(&config)?);
        Self::with_api(config, api)
    }

    /// Create a mirror over an explicit API handle
    pub fn with_api(config: Config, api: Arc<dyn SpaceApi>) -> Result<Self> {
        let pattern = Regex::new(&config.media_token_pattern)?;
        Ok(Self {
            config,
            api,
            renderer: Box::new(TextRenderer),
            pattern,
            cancel: CancellationToken::new(),
        })
    }

    /// Replace the built-in renderer with a platform-specific one
    pub fn with_renderer(mut self, renderer: Box<dyn BlockRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Handle for cancelling exports in flight
    ///
    /// Cancellation is cooperative: in-flight calls finish, no new remote
    /// call starts, and partially exported state stays on disk.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// List the spaces visible to the configured credentials
    pub async fn list_spaces(&self) -> Result<Vec<Space>> {
        fetch_all(|cursor| {
            let cursor_outer = cursor;
            async move {
                run_with_backoff(&self.config.retry, &self.cancel, || {
                    let cursor = cursor_outer.clone();
                    async move { self.api.list_spaces(cursor).await }
                })
                .await
            }
        })
        .await
        .into_result()
    }

    /// Resolve a shared link into the node it points at
    ///
    /// Wiki links resolve through the node endpoint; direct document links
    /// synthesize a document-typed node from the document's metadata.
    pub async fn entry_node(&self, link: &str) -> Result<Node> {
        let (kind, token) = parse_document_link(link)?;
        match kind {
            LinkKind::Wiki => {
                let node_token = NodeToken::from(token);
                run_with_backoff(&self.config.retry, &self.cancel, || async {
                    self.api.get_node(&node_token).await
                })
                .await
            }
            LinkKind::Document => {
                let id = DocumentId::from(token.clone());
                let meta = run_with_backoff(&self.config.retry, &self.cancel, || async {
                    self.api.get_document(&id).await
                })
                .await?;
                Ok(Node {
                    node_token: NodeToken::from(token.clone()),
                    object_token: token,
                    object_type: ObjectType::Document,
                    title: meta.title,
                    space_id: String::new(),
                })
            }
        }
    }

    /// Build the tree mirror under `entry` without exporting any content
    ///
    /// Returns the mirror together with the nodes whose child listing
    /// failed; a single node's failure never fails the call.
    pub async fn build_tree(&self, entry: &NodeToken) -> Result<(TreeMirror, Vec<NodeFailure>)> {
        let root = run_with_backoff(&self.config.retry, &self.cancel, || async {
            self.api.get_node(entry).await
        })
        .await?;
        let traverser = TreeTraverser::new(
            self.api.as_ref(),
            &self.config.retry,
            self.config.pacing_delay,
            self.cancel.clone(),
        );
        Ok(traverser.build(root).await)
    }

    /// Export one document to memory
    pub async fn export_document(&self, id: &DocumentId) -> Result<DocumentExport> {
        let assembler = ContentAssembler::new(
            self.api.as_ref(),
            &self.config.retry,
            self.renderer.as_ref(),
            &self.pattern,
            self.cancel.clone(),
        );
        let assembly = assembler.assemble(id).await?;

        let mut resolver =
            AssetResolver::new(self.api.as_ref(), &self.config.retry, self.cancel.clone());
        let (text, missing) = self
            .resolve_and_substitute(&assembly, &mut resolver)
            .await?;

        let filename = format!("{}.md", sanitize_filename(&assembly.meta.title));
        Ok(DocumentExport {
            partial: assembly.partial || missing,
            meta: assembly.meta,
            filename,
            text,
            assets: resolver.assets().cloned().collect(),
            asset_failures: resolver.failures().to_vec(),
        })
    }

    /// Export one document and its assets under the configured output
    /// directory, returning the markdown file's path
    pub async fn export_document_file(&self, id: &DocumentId) -> Result<PathBuf> {
        let export = self.export_document(id).await?;
        let dir = self.config.output.output_dir.clone();
        let path = write_document(&dir, &export.filename, &export.text)?;
        write_assets(&dir, &self.config.output.assets_dir, export.assets.iter())?;
        Ok(path)
    }

    /// Export the whole tree under `entry` as files in the configured
    /// output directory
    ///
    /// Individual node or document failures never abort the export; they
    /// are accounted for in the returned report.
    pub async fn export_tree(&self, entry: &NodeToken) -> Result<MirrorReport> {
        let run = self.run_tree(entry).await?;
        let dir = self.config.output.output_dir.clone();

        for entry in &run.entries {
            write_document(&dir, &entry.filename, &entry.text)?;
        }
        write_document(&dir, OUTLINE_FILENAME, &run.outline)?;
        write_assets(&dir, &self.config.output.assets_dir, run.assets.iter())?;

        tracing::info!(
            dir = %dir.display(),
            documents = run.documents.len(),
            assets = run.assets.len(),
            cancelled = run.cancelled,
            "tree export finished"
        );
        Ok(run.into_report())
    }

    /// Export the whole tree under `entry` as one zip archive at `path`
    pub async fn export_tree_archive(
        &self,
        entry: &NodeToken,
        path: &Path,
    ) -> Result<MirrorReport> {
        let run = self.run_tree(entry).await?;

        let mut entries = run.entries.clone();
        entries.push(BundleEntry {
            filename: OUTLINE_FILENAME.to_string(),
            text: run.outline.clone(),
        });
        write_archive_file(
            path,
            &entries,
            &self.config.output.assets_dir,
            run.assets.iter(),
        )?;

        tracing::info!(
            path = %path.display(),
            documents = run.documents.len(),
            assets = run.assets.len(),
            cancelled = run.cancelled,
            "archive export finished"
        );
        Ok(run.into_report())
    }

    /// Walk the tree and assemble every document node
    async fn run_tree(&self, entry: &NodeToken) -> Result<TreeRun> {
        let started_at = Utc::now();
        let (mirror, node_failures) = self.build_tree(entry).await?;
        let space_id = mirror.node(mirror.root()).node.space_id.clone();
        let space = self.lookup_space(&space_id).await;
        let mut cancelled = mirror.cancelled();

        let assembler = ContentAssembler::new(
            self.api.as_ref(),
            &self.config.retry,
            self.renderer.as_ref(),
            &self.pattern,
            self.cancel.clone(),
        );
        let mut resolver =
            AssetResolver::new(self.api.as_ref(), &self.config.retry, self.cancel.clone());

        let mut used_names: HashSet<String> = HashSet::new();
        used_names.insert(OUTLINE_FILENAME.to_string());
        let mut entries = Vec::new();
        let mut documents = Vec::new();

        for index in mirror.document_nodes() {
            if cancelled || self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let node = mirror.node(index).node.clone();
            let id = DocumentId::from(node.object_token.clone());

            let assembly = match assembler.assemble(&id).await {
                Ok(assembly) => assembly,
                Err(Error::Cancelled) => {
                    cancelled = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!(node = %node.node_token, title = %node.title, error = %e, "document failed");
                    documents.push(DocumentRecord {
                        node_token: node.node_token,
                        title: node.title,
                        file: None,
                        status: DocumentStatus::Failed,
                        error: Some(e.to_string()),
                    });
                    continue;
                }
            };

            let (text, missing) = match self.resolve_and_substitute(&assembly, &mut resolver).await
            {
                Ok(resolved) => resolved,
                Err(Error::Cancelled) => {
                    cancelled = true;
                    break;
                }
                Err(e) => return Err(e),
            };

            let filename = unique_filename(&assembly.meta.title, &mut used_names);
            let status = if assembly.partial || missing {
                DocumentStatus::Partial
            } else {
                DocumentStatus::Complete
            };
            documents.push(DocumentRecord {
                node_token: node.node_token,
                title: assembly.meta.title.clone(),
                file: Some(filename.clone()),
                status,
                error: assembly.error.clone(),
            });
            entries.push(BundleEntry { filename, text });
        }

        Ok(TreeRun {
            outline: mirror.outline(),
            entries,
            documents,
            assets: resolver.assets().cloned().collect(),
            asset_failures: resolver.failures().to_vec(),
            node_failures,
            cancelled,
            space,
            started_at,
        })
    }

    /// Resolve every media reference of one assembly and substitute them
    ///
    /// Returns the final text and whether any reference stayed unresolved.
    async fn resolve_and_substitute(
        &self,
        assembly: &Assembly,
        resolver: &mut AssetResolver<'_>,
    ) -> Result<(String, bool)> {
        let mut resolved: HashMap<String, Option<String>> = HashMap::new();
        for media_ref in &assembly.media_refs {
            let local = match resolver.resolve(&media_ref.token).await? {
                Resolution::Resolved(asset) => Some(asset.local_name.clone()),
                Resolution::Failed(_) => None,
            };
            resolved.insert(media_ref.token.clone(), local);
        }

        let missing = resolved.values().any(|v| v.is_none());
        let text = substitute_tokens(
            &assembly.text,
            &self.pattern,
            &assembly.media_refs,
            &self.config.output.assets_dir,
            |token| resolved.get(token).cloned().flatten(),
        );
        Ok((text, missing))
    }

    /// Best-effort space lookup for the report header
    async fn lookup_space(&self, space_id: &str) -> Option<Space> {
        if space_id.is_empty() {
            return None;
        }
        match run_with_backoff(&self.config.retry, &self.cancel, || async {
            self.api.get_space(space_id).await
        })
        .await
        {
            Ok(space) => Some(space),
            Err(e) => {
                tracing::debug!(space_id, error = %e, "space lookup failed, report will omit it");
                None
            }
        }
    }
}

/// Intermediate result of a tree walk, before packaging
struct TreeRun {
    outline: String,
    entries: Vec<BundleEntry>,
    documents: Vec<DocumentRecord>,
    assets: Vec<Asset>,
    asset_failures: Vec<AssetFailure>,
    node_failures: Vec<NodeFailure>,
    cancelled: bool,
    space: Option<Space>,
    started_at: DateTime<Utc>,
}

impl TreeRun {
    fn into_report(self) -> MirrorReport {
        MirrorReport {
            space: self.space,
            started_at: self.started_at,
            finished_at: Utc::now(),
            documents: self.documents,
            node_failures: self.node_failures,
            asset_failures: self.asset_failures,
            cancelled: self.cancelled,
        }
    }
}

/// Derive a collision-free markdown filename from a title
fn unique_filename(title: &str, used: &mut HashSet<String>) -> String {
    let stem = sanitize_filename(title);
    let mut candidate = format!("{stem}.md");
    let mut counter = 2;
    while used.contains(&candidate) {
        candidate = format!("{stem}-{counter}.md");
        counter += 1;
    }
    used.insert(candidate.clone());
    candidate
}

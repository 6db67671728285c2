//! Document content assembly
//!
//! Turns one document id into rendered text plus the list of media
//! references found in it. Metadata comes first (its failure is the
//! document's failure), then the block sequence through the paged fetcher,
//! then rendering through the configured [`BlockRenderer`].
//!
//! A partially drained block listing still produces a document: the text is
//! rendered from what arrived and the assembly is flagged as partial so the
//! caller can report it. Zero retrievable blocks is a failure, not an empty
//! document.

use crate::client::SpaceApi;
use crate::config::RetryPolicy;
use crate::error::Result;
use crate::pager::fetch_all;
use crate::render::BlockRenderer;
use crate::retry::run_with_backoff;
use crate::types::{DocumentId, DocumentMeta, MediaRef};
use regex::Regex;
use tokio_util::sync::CancellationToken;

/// One assembled document, before asset resolution
#[derive(Clone, Debug)]
pub struct Assembly {
    /// Document metadata as fetched
    pub meta: DocumentMeta,
    /// Rendered text with media tokens still unsubstituted
    pub text: String,
    /// Distinct media references in first-occurrence order
    pub media_refs: Vec<MediaRef>,
    /// True when the block listing could not be drained completely
    pub partial: bool,
    /// Rendered error detail when `partial`
    pub error: Option<String>,
}

/// Assembles documents from metadata, blocks, and a renderer
pub struct ContentAssembler<'a> {
    api: &'a dyn SpaceApi,
    policy: &'a RetryPolicy,
    renderer: &'a dyn BlockRenderer,
    pattern: &'a Regex,
    cancel: CancellationToken,
}

impl<'a> ContentAssembler<'a> {
    /// Create an assembler over an API handle and renderer
    pub fn new(
        api: &'a dyn SpaceApi,
        policy: &'a RetryPolicy,
        renderer: &'a dyn BlockRenderer,
        pattern: &'a Regex,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            policy,
            renderer,
            pattern,
            cancel,
        }
    }

    /// Fetch and render one document
    ///
    /// Fails when metadata cannot be fetched or when not a single block was
    /// retrievable; otherwise returns an [`Assembly`], flagged partial if
    /// the block listing was cut short.
    pub async fn assemble(&self, id: &DocumentId) -> Result<Assembly> {
        let meta = run_with_backoff(self.policy, &self.cancel, || async {
            self.api.get_document(id).await
        })
        .await?;
        tracing::debug!(document = %id, revision = meta.revision_id, title = %meta.title, "assembling document");

        let fetched = fetch_all(|cursor| {
            let cursor_outer = cursor;
            async move {
                run_with_backoff(self.policy, &self.cancel, || {
                    let cursor = cursor_outer.clone();
                    async move { self.api.list_blocks(id, cursor).await }
                })
                .await
            }
        })
        .await;

        let partial = fetched.is_partial();
        let error = fetched.error.as_ref().map(|e| e.to_string());
        if fetched.items.is_empty() {
            if let Some(e) = fetched.error {
                return Err(e);
            }
        }
        if let Some(detail) = &error {
            tracing::warn!(
                document = %id,
                blocks = fetched.items.len(),
                error = %detail,
                "block listing incomplete, rendering what arrived"
            );
        }

        let text = self.renderer.render(&meta, &fetched.items);
        let media_refs = scan_media_refs(self.pattern, &text);

        Ok(Assembly {
            meta,
            text,
            media_refs,
            partial,
            error,
        })
    }
}

/// Find distinct media references in rendered text
///
/// Scans left to right; each distinct token appears once, in
/// first-occurrence order. If the pattern has a capture group, group 1 is
/// the token; otherwise the whole match is. The whole match is recorded as
/// the occurrence to substitute.
pub fn scan_media_refs(pattern: &Regex, text: &str) -> Vec<MediaRef> {
    let mut refs: Vec<MediaRef> = Vec::new();
    for captures in pattern.captures_iter(text) {
        let whole = match captures.get(0) {
            Some(m) => m,
            None => continue,
        };
        let token = captures
            .get(1)
            .map_or(whole.as_str(), |g| g.as_str())
            .to_string();
        if refs.iter().any(|r| r.token == token) {
            continue;
        }
        refs.push(MediaRef {
            token,
            occurrence: whole.as_str().to_string(),
        });
    }
    refs
}

//! Media asset resolution
//!
//! Each distinct media token is downloaded at most once per run, however
//! many documents reference it. Outcomes are memoized, success and failure
//! alike, so a token that failed once is not re-attempted within the same
//! run. Local filenames are deterministic: the token itself plus the
//! extension reported by the remote filename hint.

use crate::client::SpaceApi;
use crate::config::RetryPolicy;
use crate::error::{Error, Result};
use crate::retry::run_with_backoff;
use crate::types::{Asset, AssetFailure};
use std::collections::HashMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Memoized outcome of one token's download
#[derive(Clone, Debug)]
enum Cached {
    Resolved(Asset),
    Failed(String),
}

/// Outcome of resolving one media token
#[derive(Clone, Copy, Debug)]
pub enum Resolution<'r> {
    /// The token resolved to a locally stored asset
    Resolved(&'r Asset),
    /// The download failed terminally earlier in this run
    Failed(&'r str),
}

/// Downloads media tokens, once each per run
pub struct AssetResolver<'a> {
    api: &'a dyn SpaceApi,
    policy: &'a RetryPolicy,
    cancel: CancellationToken,
    cache: HashMap<String, Cached>,
    failures: Vec<AssetFailure>,
}

impl<'a> AssetResolver<'a> {
    /// Create a resolver over an API handle
    pub fn new(api: &'a dyn SpaceApi, policy: &'a RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            api,
            policy,
            cancel,
            cache: HashMap::new(),
            failures: Vec::new(),
        }
    }

    /// Resolve one media token, downloading it on first sight
    ///
    /// Subsequent calls for the same token return the memoized outcome
    /// without touching the network. The only hard error is cancellation,
    /// which is not memoized so a later run can retry the token.
    pub async fn resolve(&mut self, token: &str) -> Result<Resolution<'_>> {
        if !self.cache.contains_key(token) {
            let api = self.api;
            let policy = self.policy;
            let cancel = self.cancel.clone();
            let outcome = run_with_backoff(policy, &cancel, || {
                let token = token.to_string();
                async move { api.download_media(&token).await }
            })
            .await;

            match outcome {
                Ok(download) => {
                    let local_name = local_asset_name(token, &download.filename_hint);
                    tracing::debug!(token, local_name, size = download.bytes.len(), "media resolved");
                    self.cache.insert(
                        token.to_string(),
                        Cached::Resolved(Asset {
                            token: token.to_string(),
                            local_name,
                            bytes: download.bytes,
                        }),
                    );
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    tracing::warn!(token, error = %e, "media download failed");
                    let detail = e.to_string();
                    self.failures.push(AssetFailure {
                        token: token.to_string(),
                        error: detail.clone(),
                    });
                    self.cache.insert(token.to_string(), Cached::Failed(detail));
                }
            }
        }

        match &self.cache[token] {
            Cached::Resolved(asset) => Ok(Resolution::Resolved(asset)),
            Cached::Failed(detail) => Ok(Resolution::Failed(detail)),
        }
    }

    /// All assets resolved so far, in no particular order
    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.cache.values().filter_map(|c| match c {
            Cached::Resolved(asset) => Some(asset),
            Cached::Failed(_) => None,
        })
    }

    /// Tokens that failed terminally, one record each
    pub fn failures(&self) -> &[AssetFailure] {
        &self.failures
    }
}

/// Deterministic local filename for a media token
fn local_asset_name(token: &str, filename_hint: &str) -> String {
    match Path::new(filename_hint)
        .extension()
        .and_then(|e| e.to_str())
    {
        Some(ext) if !ext.is_empty() => format!("{token}.{ext}"),
        _ => token.to_string(),
    }
}

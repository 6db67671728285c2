//! # space-mirror
//!
//! A resilient mirroring engine for hierarchical document spaces: it walks
//! a remote node tree, assembles each document's block content into
//! Markdown, resolves embedded media into local assets, and packages the
//! result as plain files or a single zip archive.
//!
//! The engine is built for unreliable remotes. Every listing is cursor
//! paginated, every remote call runs under one documented backoff policy
//! (exponential for rate limits, linear for transient network failures,
//! fail-fast for everything else), and failures are contained: a node or
//! document that cannot be fetched is recorded in the final report while
//! its siblings export normally.
//!
//! ## Quick start
//!
//! ```no_run
//! use space_mirror::{Config, Credentials, NodeToken, SpaceMirror};
//!
//! # async fn run() -> space_mirror::Result<()> {
//! let config = Config {
//!     credentials: Credentials {
//!         app_id: "cli_abc".into(),
//!         app_secret: "s3cret".into(),
//!     },
//!     ..Config::default()
//! };
//!
//! let mirror = SpaceMirror::new(config)?;
//! let report = mirror.export_tree(&NodeToken::from("wikcnROOT")).await?;
//! for doc in &report.documents {
//!     println!("{}: {:?}", doc.title, doc.status);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Exports can be cancelled cooperatively through
//! [`SpaceMirror::cancellation_token`]; a cancelled export keeps what it
//! already wrote and flags the report as incomplete.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod assemble;
pub mod assets;
pub mod bundle;
pub mod client;
pub mod config;
pub mod error;
pub mod mirror;
pub mod pager;
pub mod render;
pub mod retry;
pub mod tree;
pub mod types;
pub mod utils;

pub use assemble::{Assembly, ContentAssembler};
pub use assets::{AssetResolver, Resolution};
pub use client::{HttpSpaceApi, SpaceApi};
pub use config::{Config, Credentials, OutputConfig, RetryPolicy};
pub use error::{Classification, Error, Result};
pub use mirror::{DocumentExport, SpaceMirror};
pub use pager::Fetched;
pub use render::{BlockRenderer, TextRenderer};
pub use tree::{MirrorNode, NodeState, TreeMirror, TreeTraverser};
pub use types::{
    Asset, AssetFailure, Block, DocumentId, DocumentMeta, DocumentRecord, DocumentStatus,
    MediaDownload, MediaRef, MirrorReport, Node, NodeFailure, NodeToken, ObjectType, Page, Space,
};

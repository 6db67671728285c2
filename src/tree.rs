//! Tree traversal and the in-memory tree mirror
//!
//! The traverser walks a node hierarchy depth-first, listing each node's
//! children through the paged fetcher wrapped in the backoff executor.
//! Instead of language-level recursion it keeps an explicit worklist over an
//! arena of node records, which bounds stack depth on very deep trees and
//! gives every expansion step a uniform cancellation check.
//!
//! Per node the state machine is `Pending → Listing → {Expanded,
//! ListFailed}`. A node whose listing fails terminally keeps an empty child
//! list and records the error; its siblings and cousins are still
//! traversed. The resulting [`TreeMirror`] is an immutable snapshot of
//! remote state at traversal time.

use crate::client::SpaceApi;
use crate::config::RetryPolicy;
use crate::error::Error;
use crate::pager::fetch_all;
use crate::retry::run_with_backoff;
use crate::types::{Node, NodeFailure, ObjectType};
use crate::utils::sanitize_filename;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Arena index of a node within a [`TreeMirror`]
pub type NodeIndex = usize;

/// Listing state of one mirrored node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    /// Not yet listed (only seen in cancelled traversals)
    Pending,
    /// Listing in progress (transient; never observed in a finished mirror)
    Listing,
    /// Children retrieved, possibly partially (check `error`)
    Expanded,
    /// Child listing failed terminally; subtree unresolved
    ListFailed,
}

/// One node record in the mirror arena
#[derive(Clone, Debug)]
pub struct MirrorNode {
    /// Snapshot of the remote node
    pub node: Node,
    /// Arena index of the parent, `None` for the root
    pub parent: Option<NodeIndex>,
    /// Children in remote listing order (page N before page N+1)
    pub children: Vec<NodeIndex>,
    /// Listing state
    pub state: NodeState,
    /// Terminal or partial listing error, when there was one
    pub error: Option<String>,
}

/// In-memory mirror of a remote node hierarchy
///
/// Owned exclusively by the traversal that built it; immutable afterwards.
#[derive(Clone, Debug)]
pub struct TreeMirror {
    nodes: Vec<MirrorNode>,
    root: NodeIndex,
    cancelled: bool,
}

impl TreeMirror {
    /// Arena index of the root node
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// Borrow a node record by arena index
    pub fn node(&self, index: NodeIndex) -> &MirrorNode {
        &self.nodes[index]
    }

    /// Number of nodes in the mirror
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the mirror holds no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True when traversal was cut short by cancellation
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    /// Iterate over all node records in arena order
    pub fn iter(&self) -> impl Iterator<Item = &MirrorNode> {
        self.nodes.iter()
    }

    /// Indices of document-typed nodes, in depth-first reading order
    pub fn document_nodes(&self) -> Vec<NodeIndex> {
        let mut docs = Vec::new();
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            let record = &self.nodes[index];
            if record.node.object_type == ObjectType::Document {
                docs.push(index);
            }
            for &child in record.children.iter().rev() {
                stack.push(child);
            }
        }
        docs
    }

    /// Render the tree as a markdown outline
    ///
    /// Documents become links to their (sanitized) local filename; folders
    /// and other containers are bold list entries.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.outline_into(self.root, 0, &mut out);
        out
    }

    fn outline_into(&self, index: NodeIndex, level: usize, out: &mut String) {
        let record = &self.nodes[index];
        let indent = "  ".repeat(level);
        if record.node.object_type == ObjectType::Document {
            let file = format!("{}.md", sanitize_filename(&record.node.title));
            out.push_str(&format!("{indent}- [{}]({file})\n", record.node.title));
        } else {
            out.push_str(&format!("{indent}- **{}**\n", record.node.title));
        }
        for &child in &record.children {
            self.outline_into(child, level + 1, out);
        }
    }
}

/// Depth-first traverser building a [`TreeMirror`]
pub struct TreeTraverser<'a> {
    api: &'a dyn SpaceApi,
    policy: &'a RetryPolicy,
    pacing: Duration,
    cancel: CancellationToken,
}

impl<'a> TreeTraverser<'a> {
    /// Create a traverser over an API handle
    pub fn new(
        api: &'a dyn SpaceApi,
        policy: &'a RetryPolicy,
        pacing: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            policy,
            pacing,
            cancel,
        }
    }

    /// Walk the hierarchy under `root`, returning the mirror and the nodes
    /// whose listing failed
    ///
    /// A single node's failure never aborts the walk; cancellation leaves
    /// the partially-built mirror intact and flagged.
    pub async fn build(&self, root: Node) -> (TreeMirror, Vec<NodeFailure>) {
        let mut nodes = vec![MirrorNode {
            node: root,
            parent: None,
            children: Vec::new(),
            state: NodeState::Pending,
            error: None,
        }];
        let mut failures = Vec::new();
        let mut cancelled = false;
        // Worklist of arena indices still awaiting their child listing
        let mut worklist: Vec<NodeIndex> = vec![0];

        while let Some(index) = worklist.pop() {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            // Proactive throttle between a node's processing and its first
            // child-listing call
            if !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            nodes[index].state = NodeState::Listing;
            let parent_token = nodes[index].node.node_token.clone();
            tracing::debug!(node = %parent_token, title = %nodes[index].node.title, "listing children");

            let fetched = fetch_all(|cursor| {
                let token = parent_token.clone();
                async move {
                    run_with_backoff(self.policy, &self.cancel, || {
                        let token = token.clone();
                        let cursor = cursor.clone();
                        async move { self.api.list_children(&token, cursor).await }
                    })
                    .await
                }
            })
            .await;

            if matches!(fetched.error, Some(Error::Cancelled)) {
                nodes[index].state = NodeState::Pending;
                cancelled = true;
                break;
            }

            if let Some(error) = &fetched.error {
                tracing::warn!(
                    node = %parent_token,
                    title = %nodes[index].node.title,
                    error = %error,
                    partial_children = fetched.items.len(),
                    "child listing did not complete"
                );
                failures.push(NodeFailure {
                    node_token: parent_token.clone(),
                    title: nodes[index].node.title.clone(),
                    error: error.to_string(),
                });
                nodes[index].error = Some(error.to_string());
            }

            if fetched.items.is_empty() && fetched.error.is_some() {
                // Nothing retrieved at all: the subtree stays unresolved
                // while traversal continues with siblings
                nodes[index].state = NodeState::ListFailed;
                continue;
            }

            let mut child_indices = Vec::with_capacity(fetched.items.len());
            for child in fetched.items {
                let child_index = nodes.len();
                nodes.push(MirrorNode {
                    node: child,
                    parent: Some(index),
                    children: Vec::new(),
                    state: NodeState::Pending,
                    error: None,
                });
                child_indices.push(child_index);
            }
            // Reverse push so the first-listed child is expanded first
            for &child_index in child_indices.iter().rev() {
                worklist.push(child_index);
            }
            nodes[index].children = child_indices;
            nodes[index].state = NodeState::Expanded;
        }

        if cancelled {
            tracing::info!(
                expanded = nodes.iter().filter(|n| n.state == NodeState::Expanded).count(),
                total = nodes.len(),
                "traversal cancelled, returning partial mirror"
            );
        }

        (
            TreeMirror {
                nodes,
                root: 0,
                cancelled,
            },
            failures,
        )
    }
}

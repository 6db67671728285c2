//! Block rendering boundary
//!
//! The block-format-to-markdown grammar is an external collaborator: the
//! assembler hands a complete ordered block sequence to a
//! [`BlockRenderer`] and gets text back. [`TextRenderer`] is the built-in
//! minimal implementation for plain-text payloads; platform-specific
//! grammars implement the trait themselves.

use crate::types::{Block, DocumentMeta};

/// Pure rendering function over an ordered block sequence
///
/// Implementations must be pure with respect to the input: same blocks in,
/// same text out, no I/O. Media references must be emitted in a form the
/// configured `media_token_pattern` can find (the default is
/// `media://<token>`).
pub trait BlockRenderer: Send + Sync {
    /// Render the complete ordered block sequence of one document
    fn render(&self, meta: &DocumentMeta, blocks: &[Block]) -> String;
}

/// Minimal renderer for plain-text block payloads
///
/// Emits the document title as a heading, each block's `text` payload field
/// as a paragraph, and each embedded media token as a markdown image
/// reference (`![](media://<token>)`).
#[derive(Clone, Copy, Debug, Default)]
pub struct TextRenderer;

impl BlockRenderer for TextRenderer {
    fn render(&self, meta: &DocumentMeta, blocks: &[Block]) -> String {
        let mut out = String::new();
        out.push_str("# ");
        out.push_str(&meta.title);
        out.push('\n');

        for block in blocks {
            if let Some(text) = block.payload.get("text").and_then(|t| t.as_str()) {
                out.push('\n');
                out.push_str(text);
                out.push('\n');
            }
            if let Some(token) = &block.media_token {
                out.push('\n');
                out.push_str(&format!("![](media://{token})\n"));
            }
        }
        out
    }
}

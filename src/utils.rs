//! Small shared helpers

use crate::error::{Error, Result};
use url::Url;

/// Longest filename stem produced by [`sanitize_filename`], in characters
const MAX_FILENAME_CHARS: usize = 100;

/// What a shared document link points at
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkKind {
    /// A tree node link (`.../wiki/<node_token>`)
    Wiki,
    /// A direct document link (`.../docx/<document_id>`)
    Document,
}

/// Turn a document title into a safe filename stem
///
/// Replaces characters that are path separators or reserved on common
/// filesystems with `_` and clamps the result to [`MAX_FILENAME_CHARS`]
/// characters on a character boundary.
pub fn sanitize_filename(title: &str) -> String {
    let mut out: String = title
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect();
    if let Some((boundary, _)) = out.char_indices().nth(MAX_FILENAME_CHARS) {
        out.truncate(boundary);
    }
    out
}

/// Parse a shared platform link into its kind and opaque token
///
/// Accepts `https://<host>/wiki/<node_token>` and
/// `https://<host>/docx/<document_id>` (plus the older `docs`/`doc` path
/// forms). Query strings and fragments are ignored.
pub fn parse_document_link(link: &str) -> Result<(LinkKind, String)> {
    let url = Url::parse(link).map_err(|e| Error::InvalidLink(format!("{link}: {e}")))?;

    let mut segments = url
        .path_segments()
        .ok_or_else(|| Error::InvalidLink(format!("{link}: no path")))?
        .filter(|s| !s.is_empty());

    while let Some(segment) = segments.next() {
        let kind = match segment {
            "wiki" => LinkKind::Wiki,
            "docx" | "docs" | "doc" => LinkKind::Document,
            _ => continue,
        };
        let token = segments
            .next()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::InvalidLink(format!("{link}: missing token")))?;
        return Ok((kind, token.to_string()));
    }

    Err(Error::InvalidLink(format!(
        "{link}: not a wiki or document link"
    )))
}

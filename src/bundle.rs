//! Output packaging
//!
//! Final stage of an export: media tokens in rendered text are substituted
//! with relative asset paths (or a visible placeholder when the asset never
//! resolved), then documents and assets are written either as plain files
//! under a directory or as a single zip archive with the same layout.
//!
//! Substitution replaces every occurrence of a reference, not just the
//! first, so a document that embeds the same image twice links both
//! embeds locally.

use crate::error::Result;
use crate::types::{Asset, MediaRef};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::ZipWriter;

/// One document ready for packaging
#[derive(Clone, Debug)]
pub struct BundleEntry {
    /// Filename of the markdown file, extension included
    pub filename: String,
    /// Final text, media tokens already substituted
    pub text: String,
}

/// Substitute media references with their local asset paths
///
/// One left-to-right pass over `text` driven by the scan pattern, so each
/// occurrence is substituted exactly once and a token whose text is a
/// prefix of another token's never corrupts it. Every match whose token
/// appears in `refs` is replaced: with `<assets_dir>/<local_name>` when
/// `resolve` yields a name, otherwise with a visible placeholder naming
/// the unresolved token. Matches for tokens outside `refs` stay untouched.
pub fn substitute_tokens(
    text: &str,
    pattern: &Regex,
    refs: &[MediaRef],
    assets_dir: &str,
    resolve: impl Fn(&str) -> Option<String>,
) -> String {
    let known: HashSet<&str> = refs.iter().map(|r| r.token.as_str()).collect();
    pattern
        .replace_all(text, |captures: &regex::Captures<'_>| {
            let whole = captures.get(0).map_or("", |m| m.as_str());
            let token = captures.get(1).map_or(whole, |g| g.as_str());
            if !known.contains(token) {
                return whole.to_string();
            }
            match resolve(token) {
                Some(local_name) => format!("{assets_dir}/{local_name}"),
                None => format!("[missing media: {token}]"),
            }
        })
        .into_owned()
}

/// Write one markdown document under `dir`, creating the directory as needed
pub fn write_document(dir: &Path, filename: &str, text: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(filename);
    fs::write(&path, text)?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "document written");
    Ok(path)
}

/// Write resolved assets under `dir/<assets_dir>/`
pub fn write_assets<'a>(
    dir: &Path,
    assets_dir: &str,
    assets: impl Iterator<Item = &'a Asset>,
) -> Result<()> {
    let target = dir.join(assets_dir);
    fs::create_dir_all(&target)?;
    for asset in assets {
        fs::write(target.join(&asset.local_name), &asset.bytes)?;
    }
    Ok(())
}

/// Write documents and assets as one zip archive
///
/// Layout inside the archive mirrors the directory form: markdown files at
/// the root, assets under `<assets_dir>/`.
pub fn write_archive<'a, W>(
    writer: W,
    documents: &[BundleEntry],
    assets_dir: &str,
    assets: impl Iterator<Item = &'a Asset>,
) -> Result<()>
where
    W: Write + Seek,
{
    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::default();

    for entry in documents {
        zip.start_file(entry.filename.as_str(), options)?;
        zip.write_all(entry.text.as_bytes())?;
    }
    for asset in assets {
        zip.start_file(format!("{assets_dir}/{}", asset.local_name), options)?;
        zip.write_all(&asset.bytes)?;
    }
    zip.finish()?;
    Ok(())
}

/// Write documents and assets as a zip archive file at `path`
pub fn write_archive_file<'a>(
    path: &Path,
    documents: &[BundleEntry],
    assets_dir: &str,
    assets: impl Iterator<Item = &'a Asset>,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    write_archive(file, documents, assets_dir, assets)?;
    tracing::info!(path = %path.display(), "archive written");
    Ok(())
}

//! End-to-end export flows over a scripted in-memory space

mod common;

use common::{doc_meta, media_block, node, test_config, text_block, ScriptedSpace};
use space_mirror::{
    DocumentId, DocumentStatus, Error, NodeToken, ObjectType, SpaceMirror,
};
use std::fs;
use std::sync::Arc;

/// A small space: root folder holding one document (with an image embedded
/// twice) and one empty folder
fn small_space() -> ScriptedSpace {
    ScriptedSpace::new()
        .with_space("sp1", "Space One")
        .with_node(node("root", ObjectType::Folder, "Root"))
        .with_children(
            "root",
            vec![vec![
                node("a", ObjectType::Document, "Doc A"),
                node("b", ObjectType::Folder, "Folder B"),
            ]],
        )
        .with_document(
            doc_meta("a", "Doc A"),
            vec![vec![
                text_block("b1", "intro"),
                media_block("b2", "img1"),
                media_block("b3", "img1"),
            ]],
        )
        .with_media("img1", "original.png", b"pngbytes")
}

fn mirror_over(space: ScriptedSpace, dir: &std::path::Path) -> (Arc<ScriptedSpace>, SpaceMirror) {
    let space = Arc::new(space);
    let mirror = SpaceMirror::with_api(test_config(dir), space.clone())
        .expect("mirror construction should succeed");
    (space, mirror)
}

#[tokio::test]
async fn exports_documents_and_assets_to_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    let (_, mirror) = mirror_over(small_space(), dir.path());

    let report = mirror.export_tree(&NodeToken::from("root")).await.unwrap();

    assert!(!report.cancelled);
    assert_eq!(report.space.as_ref().unwrap().name, "Space One");
    assert!(report.node_failures.is_empty());
    assert!(report.asset_failures.is_empty());
    assert_eq!(report.documents.len(), 1);
    assert_eq!(report.documents[0].status, DocumentStatus::Complete);
    assert_eq!(report.documents[0].file.as_deref(), Some("Doc A.md"));

    let text = fs::read_to_string(dir.path().join("Doc A.md")).unwrap();
    assert!(text.contains("intro"));
    assert_eq!(
        text.matches("assets/img1.png").count(),
        2,
        "both embeds of the same image link locally"
    );
    assert!(!text.contains("media://"), "no unsubstituted tokens remain");

    assert_eq!(
        fs::read(dir.path().join("assets/img1.png")).unwrap(),
        b"pngbytes"
    );
    let outline = fs::read_to_string(dir.path().join("tree.md")).unwrap();
    assert!(outline.contains("[Doc A](Doc A.md)"));
    assert!(outline.contains("**Folder B**"));
}

#[tokio::test]
async fn paginated_listings_make_exactly_one_call_per_page() {
    let dir = tempfile::tempdir().unwrap();
    let space = ScriptedSpace::new()
        .with_space("sp1", "Space One")
        .with_node(node("root", ObjectType::Folder, "Root"))
        .with_children(
            "root",
            vec![
                vec![node("f1", ObjectType::Folder, "F1")],
                vec![node("f2", ObjectType::Folder, "F2")],
            ],
        );
    let (space, mirror) = mirror_over(space, dir.path());

    mirror.export_tree(&NodeToken::from("root")).await.unwrap();

    let root_listings: Vec<String> = space
        .logged_calls()
        .into_iter()
        .filter(|c| c.starts_with("list_children:root"))
        .collect();
    assert_eq!(
        root_listings,
        vec![
            "list_children:root:None".to_string(),
            "list_children:root:Some(\"1\")".to_string(),
        ]
    );
}

#[tokio::test]
async fn a_failing_node_listing_never_aborts_the_export() {
    let dir = tempfile::tempdir().unwrap();
    let space = small_space()
        .with_children(
            "root",
            vec![vec![
                node("bad", ObjectType::Folder, "Bad Folder"),
                node("a", ObjectType::Document, "Doc A"),
            ]],
        )
        .fail_listing("bad");
    let (_, mirror) = mirror_over(space, dir.path());

    let report = mirror.export_tree(&NodeToken::from("root")).await.unwrap();

    assert_eq!(report.node_failures.len(), 1);
    assert_eq!(report.node_failures[0].node_token.as_str(), "bad");
    assert_eq!(report.documents.len(), 1, "sibling document still exported");
    assert_eq!(report.documents[0].status, DocumentStatus::Complete);
    assert!(dir.path().join("Doc A.md").exists());
}

#[tokio::test]
async fn a_failing_document_is_recorded_while_siblings_export() {
    let dir = tempfile::tempdir().unwrap();
    let space = ScriptedSpace::new()
        .with_space("sp1", "Space One")
        .with_node(node("root", ObjectType::Folder, "Root"))
        .with_children(
            "root",
            vec![vec![
                node("gone", ObjectType::Document, "Gone"),
                node("ok", ObjectType::Document, "Ok Doc"),
            ]],
        )
        .with_document(doc_meta("ok", "Ok Doc"), vec![vec![text_block("b1", "hi")]])
        .fail_document("obj-gone");
    let (_, mirror) = mirror_over(space, dir.path());

    let report = mirror.export_tree(&NodeToken::from("root")).await.unwrap();

    assert_eq!(report.documents.len(), 2);
    let failed = report
        .documents
        .iter()
        .find(|d| d.title == "Gone")
        .unwrap();
    assert_eq!(failed.status, DocumentStatus::Failed);
    assert!(failed.file.is_none());
    assert!(failed.error.is_some());

    let ok = report
        .documents
        .iter()
        .find(|d| d.title == "Ok Doc")
        .unwrap();
    assert_eq!(ok.status, DocumentStatus::Complete);
    assert!(dir.path().join("Ok Doc.md").exists());
}

#[tokio::test]
async fn unresolvable_media_leaves_a_visible_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let space = small_space().fail_media("img1");
    let (_, mirror) = mirror_over(space, dir.path());

    let report = mirror.export_tree(&NodeToken::from("root")).await.unwrap();

    assert_eq!(report.asset_failures.len(), 1);
    assert_eq!(report.asset_failures[0].token, "img1");
    assert_eq!(report.documents[0].status, DocumentStatus::Partial);

    let text = fs::read_to_string(dir.path().join("Doc A.md")).unwrap();
    assert!(text.contains("[missing media: img1]"));
    assert!(!text.contains("media://img1"));
}

#[tokio::test]
async fn prefix_sharing_media_tokens_resolve_independently() {
    let dir = tempfile::tempdir().unwrap();
    let space = ScriptedSpace::new()
        .with_space("sp1", "Space One")
        .with_node(node("root", ObjectType::Folder, "Root"))
        .with_children("root", vec![vec![node("d", ObjectType::Document, "Doc")]])
        .with_document(
            doc_meta("d", "Doc"),
            vec![vec![media_block("b1", "a"), media_block("b2", "ab")]],
        )
        .with_media("a", "one.png", b"one")
        .with_media("ab", "two.png", b"two");
    let (_, mirror) = mirror_over(space, dir.path());

    let report = mirror.export_tree(&NodeToken::from("root")).await.unwrap();
    assert_eq!(report.documents[0].status, DocumentStatus::Complete);

    let text = fs::read_to_string(dir.path().join("Doc.md")).unwrap();
    assert!(text.contains("assets/a.png"));
    assert!(text.contains("assets/ab.png"));
    assert!(!text.contains("a.pngb"), "no corrupted neighbor substitution");
    assert!(!text.contains("media://"));
}

#[tokio::test]
async fn shared_media_is_downloaded_once_per_run() {
    let dir = tempfile::tempdir().unwrap();
    let space = ScriptedSpace::new()
        .with_space("sp1", "Space One")
        .with_node(node("root", ObjectType::Folder, "Root"))
        .with_children(
            "root",
            vec![vec![
                node("a", ObjectType::Document, "A"),
                node("b", ObjectType::Document, "B"),
            ]],
        )
        .with_document(doc_meta("a", "A"), vec![vec![media_block("b1", "shared")]])
        .with_document(doc_meta("b", "B"), vec![vec![media_block("b1", "shared")]])
        .with_media("shared", "pic.jpg", b"jpg");
    let (space, mirror) = mirror_over(space, dir.path());

    mirror.export_tree(&NodeToken::from("root")).await.unwrap();

    let downloads = space
        .logged_calls()
        .into_iter()
        .filter(|c| c.starts_with("download_media:"))
        .count();
    assert_eq!(downloads, 1, "two documents, one download");
}

#[tokio::test]
async fn rebuilding_an_unchanged_space_is_idempotent() {
    let first_dir = tempfile::tempdir().unwrap();
    let second_dir = tempfile::tempdir().unwrap();

    let (_, first) = mirror_over(small_space(), first_dir.path());
    let (_, second) = mirror_over(small_space(), second_dir.path());
    first.export_tree(&NodeToken::from("root")).await.unwrap();
    second.export_tree(&NodeToken::from("root")).await.unwrap();

    for file in ["Doc A.md", "tree.md"] {
        assert_eq!(
            fs::read_to_string(first_dir.path().join(file)).unwrap(),
            fs::read_to_string(second_dir.path().join(file)).unwrap(),
            "{file} differs between identical runs"
        );
    }
    assert_eq!(
        fs::read(first_dir.path().join("assets/img1.png")).unwrap(),
        fs::read(second_dir.path().join("assets/img1.png")).unwrap()
    );
}

#[tokio::test]
async fn cancellation_mid_export_returns_a_flagged_partial_report() {
    let dir = tempfile::tempdir().unwrap();
    let (space, mirror) = mirror_over(small_space(), dir.path());
    // get_node, the root listing, then the first child's listing; cancel
    // right after that third call so the second child stays pending
    space.set_cancel_after(3, mirror.cancellation_token());

    let report = mirror.export_tree(&NodeToken::from("root")).await.unwrap();

    assert!(report.cancelled);
    assert!(report.documents.is_empty(), "no document was assembled");
    assert!(report.node_failures.is_empty());
}

#[tokio::test]
async fn a_pre_cancelled_mirror_makes_no_remote_calls() {
    let dir = tempfile::tempdir().unwrap();
    let (space, mirror) = mirror_over(small_space(), dir.path());
    mirror.cancellation_token().cancel();

    let result = mirror.export_tree(&NodeToken::from("root")).await;

    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(space.logged_calls().is_empty());
}

#[tokio::test]
async fn archive_export_bundles_documents_assets_and_outline() {
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("export.zip");
    let (_, mirror) = mirror_over(small_space(), dir.path());

    let report = mirror
        .export_tree_archive(&NodeToken::from("root"), &archive_path)
        .await
        .unwrap();
    assert_eq!(report.documents.len(), 1);

    let file = fs::File::open(&archive_path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    assert!(names.contains(&"Doc A.md".to_string()));
    assert!(names.contains(&"tree.md".to_string()));
    assert!(names.contains(&"assets/img1.png".to_string()));
}

#[tokio::test]
async fn a_single_document_exports_to_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let (_, mirror) = mirror_over(small_space(), dir.path());

    let path = mirror
        .export_document_file(&DocumentId::from("obj-a"))
        .await
        .unwrap();

    assert_eq!(path, dir.path().join("Doc A.md"));
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("# Doc A"));
    assert!(dir.path().join("assets/img1.png").exists());
}

#[tokio::test]
async fn entry_node_resolves_wiki_links() {
    let dir = tempfile::tempdir().unwrap();
    let (_, mirror) = mirror_over(small_space(), dir.path());

    let entry = mirror
        .entry_node("https://example.space.com/wiki/root")
        .await
        .unwrap();
    assert_eq!(entry.title, "Root");

    let doc_entry = mirror
        .entry_node("https://example.space.com/docx/obj-a")
        .await
        .unwrap();
    assert_eq!(doc_entry.object_type, ObjectType::Document);
    assert_eq!(doc_entry.title, "Doc A");
}

#[tokio::test]
async fn spaces_are_listable() {
    let dir = tempfile::tempdir().unwrap();
    let (_, mirror) = mirror_over(small_space(), dir.path());

    let spaces = mirror.list_spaces().await.unwrap();
    assert_eq!(spaces.len(), 1);
    assert_eq!(spaces[0].name, "Space One");
}

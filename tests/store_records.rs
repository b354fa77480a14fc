use pdf_findings::{
    model::{PageMatch, PdfMetadata, Region, Stage},
    store::Store,
};
use std::path::Path;

fn matches(pages: &[u32]) -> Vec<PageMatch> {
    pages
        .iter()
        .map(|&page_number| PageMatch {
            page_number,
            section: Some(format!("Kapitel {page_number}")),
        })
        .collect()
}

#[test]
fn new_document_starts_uploaded() {
    let store = Store::in_memory().unwrap();
    let id = store
        .create_document("abc", Path::new("in.pdf"), "a@example.org")
        .unwrap();
    let doc = store.require_document(id).unwrap();
    assert_eq!(doc.stage, Stage::Uploaded);
    assert_eq!(doc.requester, "a@example.org");
    assert!(!doc.has_outline);
    assert!(doc.report_path.is_none());
    assert_eq!(store.document_by_hash("abc").unwrap().map(|d| d.id), Some(id));
    assert!(store.document(id + 1).unwrap().is_none());
}

#[test]
fn content_hash_is_unique() {
    let store = Store::in_memory().unwrap();
    store.create_document("abc", Path::new("a.pdf"), "x").unwrap();
    assert!(store.create_document("abc", Path::new("b.pdf"), "y").is_err());
}

#[test]
fn metadata_round_trips() {
    let store = Store::in_memory().unwrap();
    let id = store.create_document("h", Path::new("a.pdf"), "x").unwrap();
    let meta = PdfMetadata {
        title: Some("Titel".into()),
        creator: Some("Microsoft Word".into()),
        ..PdfMetadata::default()
    };
    store.set_metadata(id, &meta, true).unwrap();
    let doc = store.require_document(id).unwrap();
    assert_eq!(doc.metadata, meta);
    assert!(doc.has_outline);
}

#[test]
fn commit_matches_advances_stage_and_orders_pages() {
    let store = Store::in_memory().unwrap();
    let id = store.create_document("h", Path::new("a.pdf"), "x").unwrap();
    store.commit_matches(id, &matches(&[7, 2, 4]), Stage::Matched).unwrap();

    assert_eq!(store.require_document(id).unwrap().stage, Stage::Matched);
    let pages: Vec<u32> = store.pages(id).unwrap().iter().map(|p| p.page_number).collect();
    assert_eq!(pages, [2, 4, 7]);
    assert!(store.pages(id).unwrap().iter().all(|p| !p.has_region));
}

#[test]
fn matching_twice_is_refused_and_leaves_records_alone() {
    let store = Store::in_memory().unwrap();
    let id = store.create_document("h", Path::new("a.pdf"), "x").unwrap();
    store.commit_matches(id, &matches(&[1]), Stage::Matched).unwrap();
    store.set_stage(id, Stage::Normalized).unwrap();

    assert!(store.commit_matches(id, &matches(&[1, 2]), Stage::Matched).is_err());
    assert_eq!(store.pages(id).unwrap().len(), 1);
    assert_eq!(store.require_document(id).unwrap().stage, Stage::Normalized);
}

#[test]
fn region_can_be_set_and_cleared() {
    let store = Store::in_memory().unwrap();
    let id = store.create_document("h", Path::new("a.pdf"), "x").unwrap();
    store.commit_matches(id, &matches(&[0, 1]), Stage::Matched).unwrap();
    let pages = store.pages(id).unwrap();
    let region = Region {
        x: 10,
        y: 20,
        width: 300,
        height: 400,
    };

    store
        .set_region(pages[0].id, Some((&region, Path::new("img/1_0.png"))))
        .unwrap();
    store.set_region(pages[1].id, None).unwrap();
    store.set_text(pages[0].id, "hittad text").unwrap();

    let with_region = store.region_pages(id).unwrap();
    assert_eq!(with_region.len(), 1);
    assert_eq!(with_region[0].region, Some(region));
    assert_eq!(with_region[0].text.as_deref(), Some("hittad text"));
    assert_eq!(with_region[0].image_path.as_deref(), Some(Path::new("img/1_0.png")));

    // detection ran again and found nothing this time
    store.set_region(pages[0].id, None).unwrap();
    let first = &store.pages(id).unwrap()[0];
    assert!(!first.has_region);
    assert!(first.region.is_none());
    assert!(first.image_path.is_none());
}

#[test]
fn store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("nested").join("db.sqlite3");
    let id = {
        let store = Store::open(&db).unwrap();
        let id = store.create_document("h", Path::new("a.pdf"), "x").unwrap();
        store.set_stage(id, Stage::Reported).unwrap();
        store.set_report_path(id, Path::new("r.xlsx")).unwrap();
        id
    };
    let store = Store::open(&db).unwrap();
    let doc = store.require_document(id).unwrap();
    assert_eq!(doc.stage, Stage::Reported);
    assert_eq!(doc.report_path.as_deref(), Some(Path::new("r.xlsx")));
    assert_eq!(store.list_documents().unwrap().len(), 1);
}

#[test]
fn unknown_document_is_an_error() {
    let store = Store::in_memory().unwrap();
    assert!(store.require_document(42).is_err());
    assert!(store.set_stage(42, Stage::Matched).is_err());
}

#[test]
fn requests_are_tracked_per_requester() {
    let store = Store::in_memory().unwrap();
    let id = store.create_document("h", Path::new("a.pdf"), "first@example.org").unwrap();
    assert_eq!(store.pending_requesters(id).unwrap(), ["first@example.org"]);

    assert!(store.add_request(id, "second@example.org").unwrap());
    assert!(!store.add_request(id, "first@example.org").unwrap());
    assert_eq!(
        store.pending_requesters(id).unwrap(),
        ["first@example.org", "second@example.org"]
    );

    store.mark_notified(id, "first@example.org").unwrap();
    assert_eq!(store.pending_requesters(id).unwrap(), ["second@example.org"]);
}

#[test]
fn clearing_the_outline_flag() {
    let store = Store::in_memory().unwrap();
    let id = store.create_document("h", Path::new("a.pdf"), "x").unwrap();
    store.set_metadata(id, &PdfMetadata::default(), true).unwrap();
    store.clear_outline(id).unwrap();
    assert!(!store.require_document(id).unwrap().has_outline);
}

use editor_meta::{
    DocumentMetadata, LineId, LineMetadataStore, RevisionTracker, RopeBuffer, TextBuffer, lines,
};
use editor_meta_lang::LanguageConfig;
use pretty_assertions::assert_eq;

fn revisions(tracker: &RevisionTracker, store: &LineMetadataStore, ids: &[LineId]) -> Vec<i32> {
    ids.iter().map(|id| tracker.line_revision(store, *id)).collect()
}

#[test]
fn test_save_stamps_every_line() {
    let buffer = RopeBuffer::from_lines(&["a", "b", "c"]);
    let ids: Vec<LineId> = lines(&buffer).collect();
    let mut store = LineMetadataStore::new();
    let mut tracker = RevisionTracker::new();

    tracker.on_edit(&mut store, ids[0]);
    tracker.on_edit(&mut store, ids[2]);
    assert_eq!(tracker.on_save(&mut store), 1);
    assert_eq!(revisions(&tracker, &store, &ids), vec![1, 1, 1]);
    assert!(tracker.modified_lines(&store, &buffer).is_empty());
}

#[test]
fn test_editing_one_line_leaves_others_unchanged() {
    let buffer = RopeBuffer::from_lines(&["a", "b", "c"]);
    let ids: Vec<LineId> = lines(&buffer).collect();
    let mut store = LineMetadataStore::new();
    let mut tracker = RevisionTracker::new();
    tracker.on_save(&mut store);
    tracker.on_save(&mut store);

    let before = revisions(&tracker, &store, &ids);
    tracker.on_edit(&mut store, ids[1]);
    let after = revisions(&tracker, &store, &ids);

    assert_eq!(after[1], -3);
    assert!(tracker.is_modified(&store, ids[1]));
    assert_eq!(after[0], before[0]);
    assert_eq!(after[2], before[2]);
    assert_eq!(tracker.modified_lines(&store, &buffer), vec![ids[1]]);
}

#[test]
fn test_reload_drops_stale_records() {
    let mut buffer = RopeBuffer::from_lines(&["a", "b", "c"]);
    let ids: Vec<LineId> = lines(&buffer).collect();
    let mut store = LineMetadataStore::new();
    let mut tracker = RevisionTracker::new();
    tracker.on_edit(&mut store, ids[1]);
    tracker.on_edit(&mut store, ids[2]);

    buffer.remove_line(2);
    assert_eq!(tracker.on_reload(&mut store, &buffer), 1);
    assert!(store.get(ids[2]).is_none());
    assert!(!tracker.is_modified(&store, ids[1]));
}

#[test]
fn test_document_lifecycle_stamps_revisions() {
    let buffer = RopeBuffer::from_lines(&["a", "b"]);
    let mut doc = DocumentMetadata::new(buffer, LanguageConfig::default());
    doc.on_save();

    let first = doc.buffer().line_at(0).unwrap();
    doc.buffer_mut().set_line_text(first, "changed");
    doc.on_line_edited(first);
    let added = doc.buffer_mut().insert_line(2, "new").unwrap();
    doc.on_line_inserted(added);

    assert_eq!(doc.modified_lines(), vec![first, added]);
    assert_eq!(doc.revisions().line_revision(doc.store(), first), -2);

    assert_eq!(doc.on_save(), 2);
    assert!(doc.modified_lines().is_empty());
}

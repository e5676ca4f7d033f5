use std::cell::RefCell;
use std::rc::Rc;

use editor_meta::{
    DocumentMetadata, FoldEngine, LineId, LineMetadataStore, MetadataChange, RopeBuffer,
    TextBuffer, can_fold, lines, validate_all,
};
use editor_meta_lang::LanguageConfig;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn document(indents: &[u32]) -> (RopeBuffer, LineMetadataStore, Vec<LineId>) {
    let texts: Vec<String> = indents
        .iter()
        .map(|i| format!("{}x", "  ".repeat(*i as usize)))
        .collect();
    let buffer = RopeBuffer::from_lines(&texts);
    let mut store = LineMetadataStore::new();
    let ids: Vec<LineId> = lines(&buffer).collect();
    for (id, indent) in ids.iter().zip(indents) {
        store.set_folding_indent(*id, *indent);
    }
    (buffer, store, ids)
}

fn visibility(buffer: &RopeBuffer, ids: &[LineId]) -> Vec<bool> {
    ids.iter().map(|id| buffer.is_visible(*id)).collect()
}

#[test]
fn test_if_block_scenario() {
    let buffer = RopeBuffer::from_lines(&["  if (x) {", "    y();", "  }"]);
    let mut doc = DocumentMetadata::new(buffer, LanguageConfig::c_like("c"));
    let ids: Vec<LineId> = lines(doc.buffer()).collect();
    for (id, indent) in ids.iter().zip([0, 1, 0]) {
        doc.store_mut().set_folding_indent(*id, indent);
    }

    assert!(doc.can_fold(ids[0]));
    assert!(!doc.can_fold(ids[1]));
    assert_eq!(doc.toggle_fold(ids[0], false), 1);
    assert_eq!(visibility(doc.buffer(), &ids), vec![true, false, true]);
    assert!(doc.store().is_folded(ids[0]));
}

#[test]
fn test_fold_then_unfold_restores_visibility() {
    let (mut buffer, mut store, ids) = document(&[0, 1, 2, 2, 1, 0]);
    let before = visibility(&buffer, &ids);
    let mut engine = FoldEngine::new(&mut buffer, &mut store);
    engine.toggle_fold(ids[0], false);
    engine.toggle_fold(ids[0], true);
    assert!(!engine.is_folded(ids[0]));
    assert_eq!(visibility(&buffer, &ids), before);
}

#[test]
fn test_unfold_keeps_nested_fold_collapsed() {
    let (mut buffer, mut store, ids) = document(&[0, 1, 1, 2, 2, 1, 0]);
    let mut engine = FoldEngine::new(&mut buffer, &mut store);
    engine.toggle_fold(ids[2], false);
    engine.toggle_fold(ids[0], false);
    assert_eq!(
        visibility(&buffer, &ids),
        vec![true, false, false, false, false, false, true]
    );

    let mut engine = FoldEngine::new(&mut buffer, &mut store);
    engine.toggle_fold(ids[0], true);
    assert!(engine.is_folded(ids[2]));
    assert_eq!(
        visibility(&buffer, &ids),
        vec![true, true, true, false, false, true, true]
    );
}

#[test]
fn test_toggle_all_flips_overall_state() {
    let (mut buffer, mut store, ids) = document(&[0, 1, 0, 1, 2]);
    let mut engine = FoldEngine::new(&mut buffer, &mut store);
    assert_eq!(engine.toggle_all(), (true, 3));
    assert!(engine.is_folded(ids[0]));
    assert!(engine.is_folded(ids[2]));
    assert!(engine.is_folded(ids[3]));
    assert_eq!(
        visibility(&buffer, &ids),
        vec![true, false, true, false, false]
    );

    let mut engine = FoldEngine::new(&mut buffer, &mut store);
    assert_eq!(engine.toggle_all(), (false, 3));
    assert!(!engine.is_folded(ids[3]));
    assert_eq!(visibility(&buffer, &ids), vec![true; 5]);
}

#[test]
fn test_ensure_visible_unfolds_ancestors() {
    let (mut buffer, mut store, ids) = document(&[0, 1, 2, 1]);
    let mut engine = FoldEngine::new(&mut buffer, &mut store);
    engine.toggle_fold(ids[1], false);
    engine.toggle_fold(ids[0], false);

    assert_eq!(engine.ensure_visible(ids[2]), 3);
    assert!(!engine.is_folded(ids[0]));
    assert!(!engine.is_folded(ids[1]));
    assert_eq!(visibility(&buffer, &ids), vec![true; 4]);
}

#[test]
fn test_document_end_terminates_walk() {
    // A stale folded flag on the last line must not swallow anything while unfolding.
    let (mut buffer, mut store, ids) = document(&[0, 1, 1]);
    let mut engine = FoldEngine::new(&mut buffer, &mut store);
    engine.toggle_fold(ids[0], false);
    store.set_folded(ids[2], true);

    let mut engine = FoldEngine::new(&mut buffer, &mut store);
    assert!(!engine.can_fold(ids[2]));
    engine.toggle_fold(ids[0], true);
    assert_eq!(visibility(&buffer, &ids), vec![true; 3]);
}

#[test]
fn test_validator_refolds_header_with_hidden_body() {
    let (mut buffer, mut store, ids) = document(&[0, 1, 1, 0]);
    buffer.set_visible(ids[1], false);

    assert!(validate_all(&mut buffer, &mut store));
    assert!(store.is_folded(ids[0]));
    assert_eq!(visibility(&buffer, &ids), vec![true, false, false, true]);
    assert!(!validate_all(&mut buffer, &mut store));
}

#[test]
fn test_validator_shows_lines_that_left_the_region() {
    let (mut buffer, mut store, ids) = document(&[0, 1, 1, 1]);
    FoldEngine::new(&mut buffer, &mut store).toggle_fold(ids[0], false);
    // An edit dedents the last line out of the region.
    store.set_folding_indent(ids[3], 0);

    assert!(validate_all(&mut buffer, &mut store));
    assert_eq!(visibility(&buffer, &ids), vec![true, false, false, true]);
}

fn random_indents(rng: &mut StdRng, count: usize) -> Vec<u32> {
    let mut indents = vec![0u32];
    while indents.len() < count {
        let prev = *indents.last().unwrap_or(&0);
        let next = if rng.gen_bool(0.4) {
            prev + 1
        } else {
            rng.gen_range(0..=prev)
        };
        indents.push(next);
    }
    indents
}

/// Lines hidden by some folded header, computed from scratch.
fn expected_hidden(store: &LineMetadataStore, buffer: &RopeBuffer, ids: &[LineId]) -> Vec<bool> {
    let mut hidden = vec![false; ids.len()];
    for (i, header) in ids.iter().enumerate() {
        if !store.is_folded(*header) || !can_fold(buffer, store, *header) {
            continue;
        }
        let level = store.folding_indent(*header);
        for (j, line) in ids.iter().enumerate().skip(i + 1) {
            if store.folding_indent(*line) <= level {
                break;
            }
            hidden[j] = true;
        }
    }
    hidden
}

#[test]
fn test_random_toggles_keep_folds_well_formed() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..50 {
        let indents = random_indents(&mut rng, 40);
        let (mut buffer, mut store, ids) = document(&indents);

        for _ in 0..30 {
            let engine = FoldEngine::new(&mut buffer, &mut store);
            let headers: Vec<LineId> = ids
                .iter()
                .copied()
                .filter(|id| engine.can_fold(*id))
                .collect();
            if headers.is_empty() {
                break;
            }
            let header = headers[rng.gen_range(0..headers.len())];
            if !buffer.is_visible(header) {
                continue;
            }
            let mut engine = FoldEngine::new(&mut buffer, &mut store);
            let unfold = engine.is_folded(header);
            engine.toggle_fold(header, unfold);

            for id in &ids {
                if store.is_folded(*id) {
                    assert!(can_fold(&buffer, &store, *id));
                }
            }
            let hidden = expected_hidden(&store, &buffer, &ids);
            let actual: Vec<bool> = ids.iter().map(|id| !buffer.is_visible(*id)).collect();
            assert_eq!(actual, hidden);
        }
    }
}

fn indented_document(indents: &[u32]) -> (DocumentMetadata<RopeBuffer>, Vec<LineId>) {
    let (buffer, _, ids) = document(indents);
    let mut doc = DocumentMetadata::new(buffer, LanguageConfig::default());
    for (id, indent) in ids.iter().zip(indents) {
        doc.store_mut().set_folding_indent(*id, *indent);
    }
    (doc, ids)
}

#[test]
fn test_removing_folded_first_line_reveals_its_body() {
    let (mut doc, ids) = indented_document(&[0, 1, 0]);
    doc.toggle_fold(ids[0], false);
    assert!(!doc.buffer().is_visible(ids[1]));

    assert_eq!(doc.buffer_mut().remove_line(0), Some(ids[0]));
    doc.on_line_removed(ids[0], None);
    assert!(doc.buffer().is_visible(ids[1]));
    assert!(doc.buffer().is_visible(ids[2]));
    assert!(!doc.validate_folds());
}

#[test]
fn test_document_toggle_all_reports_changed_lines() {
    let (mut doc, ids) = indented_document(&[0, 1, 0, 1, 2]);
    let reported = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&reported);
    doc.subscribe(move |change| {
        if let MetadataChange::FoldsChanged { lines_changed, .. } = change {
            sink.borrow_mut().push(*lines_changed);
        }
    });

    assert_eq!(doc.toggle_all(), (true, 3));
    assert_eq!(visibility(doc.buffer(), &ids), vec![true, false, true, false, false]);
    assert_eq!(doc.toggle_all(), (false, 3));
    assert_eq!(reported.borrow().as_slice(), &[3, 3]);
}

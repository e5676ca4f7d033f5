use std::rc::Rc;

use editor_meta::{
    GutterUpdate, LineId, LineMetadataStore, Mark, MarkRegistry, MetaError, RopeBuffer,
    TextBuffer, lines,
};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn setup(count: usize) -> (RopeBuffer, LineMetadataStore, MarkRegistry, Vec<LineId>) {
    let texts: Vec<String> = (0..count).map(|i| format!("line {i}")).collect();
    let buffer = RopeBuffer::from_lines(&texts);
    let ids = lines(&buffer).collect();
    (buffer, LineMetadataStore::new(), MarkRegistry::new(), ids)
}

fn priorities(registry: &MarkRegistry, store: &LineMetadataStore, line: LineId) -> Vec<i32> {
    registry
        .marks_on(store, line)
        .iter()
        .map(|m| m.priority())
        .collect()
}

#[test]
fn test_gutter_decisions_on_add() {
    let (buffer, mut store, mut registry, ids) = setup(3);
    let a = Rc::new(Mark::new(0));
    let b = Rc::new(Mark::new(0));
    let wide = Rc::new(Mark::new(0).with_width_factor(2.0));

    assert_eq!(
        registry.add_mark(&mut store, &buffer, ids[0], &a),
        Ok(GutterUpdate::RecomputeWidth)
    );
    assert_eq!(
        registry.add_mark(&mut store, &buffer, ids[1], &b),
        Ok(GutterUpdate::RepaintLines(vec![ids[1]]))
    );
    assert_eq!(
        registry.add_mark(&mut store, &buffer, ids[2], &wide),
        Ok(GutterUpdate::RecomputeWidth)
    );
    assert_eq!(registry.max_width_factor(), 2.0);
}

#[test]
fn test_gutter_decisions_on_remove() {
    let (buffer, mut store, mut registry, ids) = setup(3);
    let narrow = Rc::new(Mark::new(0));
    let wide = Rc::new(Mark::new(0).with_width_factor(2.0));
    let also_wide = Rc::new(Mark::new(0).with_width_factor(2.0));
    registry.add_mark(&mut store, &buffer, ids[0], &narrow).unwrap();
    registry.add_mark(&mut store, &buffer, ids[1], &wide).unwrap();
    registry.add_mark(&mut store, &buffer, ids[2], &also_wide).unwrap();

    // Not the maximum: narrow repaint.
    assert_eq!(
        registry.remove_mark(&mut store, ids[0], &narrow),
        Ok(GutterUpdate::RepaintLines(vec![ids[0]]))
    );
    // The maximum, but another mark keeps it: narrow repaint.
    assert_eq!(
        registry.remove_mark(&mut store, ids[1], &wide),
        Ok(GutterUpdate::RepaintLines(vec![ids[1]]))
    );
    assert_eq!(registry.max_width_factor(), 2.0);
    // Last mark anywhere: full recompute and reset.
    assert_eq!(
        registry.remove_mark(&mut store, ids[2], &also_wide),
        Ok(GutterUpdate::RecomputeWidth)
    );
    assert_eq!(registry.max_width_factor(), 1.0);
    assert!(!registry.has_marks());
}

#[test]
fn test_removing_sole_widest_mark_shrinks_gutter() {
    let (buffer, mut store, mut registry, ids) = setup(2);
    let narrow = Rc::new(Mark::new(0).with_width_factor(1.5));
    let wide = Rc::new(Mark::new(0).with_width_factor(3.0));
    registry.add_mark(&mut store, &buffer, ids[0], &narrow).unwrap();
    registry.add_mark(&mut store, &buffer, ids[1], &wide).unwrap();

    assert_eq!(
        registry.remove_mark(&mut store, ids[1], &wide),
        Ok(GutterUpdate::RecomputeWidth)
    );
    assert_eq!(registry.max_width_factor(), 1.5);
}

#[test]
fn test_attachment_errors() {
    let (mut buffer, mut store, mut registry, ids) = setup(3);
    let mark = Rc::new(Mark::new(0));
    registry.add_mark(&mut store, &buffer, ids[0], &mark).unwrap();

    assert_eq!(
        registry.add_mark(&mut store, &buffer, ids[1], &mark),
        Err(MetaError::AlreadyAttached(mark.id()))
    );
    assert_eq!(
        registry.remove_mark(&mut store, ids[1], &mark),
        Err(MetaError::NotAttached {
            mark: mark.id(),
            line: ids[1]
        })
    );

    let removed = buffer.remove_line(2).unwrap();
    let other = Rc::new(Mark::new(0));
    assert_eq!(
        registry.add_mark(&mut store, &buffer, removed, &other),
        Err(MetaError::StaleLine(removed))
    );
    assert!(!registry.is_attached(&other));
}

#[test]
fn test_move_is_a_single_transition() {
    let (buffer, mut store, mut registry, ids) = setup(3);
    let low = Rc::new(Mark::new(1));
    let high = Rc::new(Mark::new(5));
    let moving = Rc::new(Mark::new(3));
    registry.add_mark(&mut store, &buffer, ids[2], &low).unwrap();
    registry.add_mark(&mut store, &buffer, ids[2], &high).unwrap();
    registry.add_mark(&mut store, &buffer, ids[0], &moving).unwrap();

    assert_eq!(
        registry.move_mark(&mut store, &buffer, &moving, ids[0], ids[2]),
        Ok(GutterUpdate::RepaintLines(vec![ids[0], ids[2]]))
    );
    assert_eq!(registry.line_of(&moving), Some(ids[2]));
    assert_eq!(moving.line_number(), Some(2));
    assert_eq!(priorities(&registry, &store, ids[2]), vec![1, 3, 5]);
    assert!(priorities(&registry, &store, ids[0]).is_empty());

    assert!(matches!(
        registry.move_mark(&mut store, &buffer, &moving, ids[0], ids[1]),
        Err(MetaError::NotAttached { .. })
    ));
}

#[test]
fn test_hiding_widest_mark_recomputes() {
    let (buffer, mut store, mut registry, ids) = setup(2);
    let plain = Rc::new(Mark::new(0));
    let wide = Rc::new(Mark::new(0).with_width_factor(2.5));
    registry.add_mark(&mut store, &buffer, ids[0], &plain).unwrap();
    registry.add_mark(&mut store, &buffer, ids[1], &wide).unwrap();

    assert_eq!(
        registry.set_visible(&wide, false),
        Some(GutterUpdate::RecomputeWidth)
    );
    assert_eq!(registry.max_width_factor(), 1.0);
    assert_eq!(registry.set_visible(&wide, false), None);
    assert_eq!(
        registry.set_visible(&wide, true),
        Some(GutterUpdate::RecomputeWidth)
    );
    assert_eq!(registry.max_width_factor(), 2.5);
}

#[test]
fn test_dropped_marks_are_purged() {
    let (buffer, mut store, mut registry, ids) = setup(2);
    let kept = Rc::new(Mark::new(0));
    let dropped = Rc::new(Mark::new(1).with_width_factor(4.0));
    registry.add_mark(&mut store, &buffer, ids[0], &kept).unwrap();
    registry.add_mark(&mut store, &buffer, ids[0], &dropped).unwrap();
    drop(dropped);

    assert_eq!(registry.marks_on(&store, ids[0]).len(), 1);
    assert_eq!(
        registry.purge_dropped(&mut store),
        Some(GutterUpdate::RecomputeWidth)
    );
    assert_eq!(registry.max_width_factor(), 1.0);
    assert_eq!(store.get(ids[0]).map(|m| m.mark_count()), Some(1));
    assert_eq!(registry.purge_dropped(&mut store), None);
}

#[test]
fn test_line_number_cache_follows_buffer() {
    let (mut buffer, mut store, mut registry, ids) = setup(3);
    let mark = Rc::new(Mark::new(0));
    registry.add_mark(&mut store, &buffer, ids[2], &mark).unwrap();
    assert_eq!(mark.line_number(), Some(2));

    buffer.insert_line(0, "new first line");
    registry.refresh_line_numbers(&buffer);
    assert_eq!(mark.line_number(), Some(3));

    let listed: Vec<i32> = registry.marks().iter().map(|m| m.priority()).collect();
    assert_eq!(listed, vec![0]);
}

#[test]
fn test_random_add_remove_keeps_priority_order() {
    let (buffer, mut store, mut registry, ids) = setup(4);
    let mut rng = StdRng::seed_from_u64(7);
    let mut attached: Vec<(LineId, Rc<Mark>)> = Vec::new();

    for _ in 0..500 {
        if attached.is_empty() || rng.gen_bool(0.6) {
            let line = ids[rng.gen_range(0..ids.len())];
            let mark = Rc::new(Mark::new(rng.gen_range(-5..5)));
            registry.add_mark(&mut store, &buffer, line, &mark).unwrap();
            attached.push((line, mark));
        } else {
            let (line, mark) = attached.swap_remove(rng.gen_range(0..attached.len()));
            registry.remove_mark(&mut store, line, &mark).unwrap();
        }

        for line in &ids {
            let p = priorities(&registry, &store, *line);
            assert!(p.windows(2).all(|w| w[0] <= w[1]), "unsorted: {p:?}");
        }
    }
    // Every attached mark appears on exactly one line.
    let total: usize = ids
        .iter()
        .map(|l| registry.marks_on(&store, *l).len())
        .sum();
    assert_eq!(total, attached.len());
}

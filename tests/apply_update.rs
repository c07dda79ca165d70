//! End-to-end update scenarios against a live module.
//!
//! These tests drive the full pipeline the way an embedder would: build a
//! baseline module, encode deltas with the writer, apply them, and observe
//! dispatch through `resolve`.

use dotpatch::prelude::*;

fn method_token(row: u32) -> Token {
    Token::from_parts(TableId::MethodDef, row)
}

fn calculator_module() -> Module {
    Module::builder()
        .name("Calculator.dll")
        .table_rows(
            TableId::MethodDef,
            vec![vec![0u8; 8], vec![1u8; 8], vec![2u8; 8]],
        )
        .table_rows(TableId::TypeDef, vec![vec![0u8; 6]])
        .heap(HeapId::Strings, b"\0Main\0Calculate\0Magic\0".to_vec())
        .method_body(method_token(1), b"bodyMain".to_vec())
        .method_body(method_token(2), b"bodyA".to_vec())
        .method_body(method_token(3), b"bodyMagic".to_vec())
        .build()
        .unwrap()
}

#[test]
fn successive_updates_replace_the_same_method() -> Result<()> {
    let module = calculator_module();
    let target = method_token(2);

    // A reference fetched before any update keeps its original content even
    // after later generations are published.
    let pre_update = module.resolve(target)?;
    assert_eq!(pre_update.il.as_ref(), b"bodyA");

    let (dmeta, dil) = DeltaWriter::new()
        .il_body(target, b"bodyB".to_vec())
        .finish();
    assert_eq!(module.apply_update(&dmeta, &dil)?, 1);
    assert_eq!(module.resolve(target)?.il.as_ref(), b"bodyB");

    let (dmeta, dil) = DeltaWriter::new()
        .il_body(target, b"bodyC".to_vec())
        .finish();
    assert_eq!(module.apply_update(&dmeta, &dil)?, 2);

    let body = module.resolve(target)?;
    assert_eq!(body.il.as_ref(), b"bodyC");
    assert_eq!(body.generation, 2);
    assert_eq!(module.generation(), 2);

    // The pre-update reference is unaffected.
    assert_eq!(pre_update.il.as_ref(), b"bodyA");
    Ok(())
}

#[test]
fn generations_increase_by_exactly_one() -> Result<()> {
    let module = calculator_module();

    for expected in 1..=5u32 {
        let (dmeta, dil) = DeltaWriter::new()
            .il_body(method_token(1), format!("gen{expected}").into_bytes())
            .finish();
        assert_eq!(module.apply_update(&dmeta, &dil)?, expected);
    }
    assert_eq!(module.generation(), 5);
    Ok(())
}

#[test]
fn tokens_stay_valid_across_updates() -> Result<()> {
    let module = calculator_module();
    let tokens = [method_token(1), method_token(2), method_token(3)];

    let (dmeta, dil) = DeltaWriter::new()
        .table_change(TableId::MethodDef, 2, vec![9u8; 8])
        .il_body(method_token(2), b"bodyB".to_vec())
        .finish();
    module.apply_update(&dmeta, &dil)?;

    for token in tokens {
        assert!(module.resolve(token).is_ok(), "{token} must stay valid");
    }

    // Table rows are also still addressable in the new generation.
    let generation = module.current_generation();
    assert_eq!(generation.tables.row_count(TableId::MethodDef), 3);
    assert_eq!(generation.tables.row_count(TableId::TypeDef), 1);
    Ok(())
}

#[test]
fn delta_can_introduce_a_new_method() -> Result<()> {
    let module = calculator_module();
    let new_token = method_token(4);

    // Before the update the token is invalid.
    assert!(module.resolve(new_token).is_err());

    let (dmeta, dil) = DeltaWriter::new()
        .table_change(TableId::MethodDef, 4, vec![4u8; 8])
        .heap_addition(HeapId::Strings, b"Replacer\0".to_vec())
        .il_body(new_token, b"bodyNew".to_vec())
        .finish();
    module.apply_update(&dmeta, &dil)?;

    let body = module.resolve(new_token)?;
    assert_eq!(body.il.as_ref(), b"bodyNew");
    assert_eq!(body.generation, 1);

    // Heap offsets handed out at load time still resolve, and the addition
    // is reachable at the old heap's end.
    let generation = module.current_generation();
    assert_eq!(generation.heaps.string_at(1), Some("Main"));
    assert_eq!(generation.heaps.string_at(22), Some("Replacer"));
    Ok(())
}

#[test]
fn resolve_is_idempotent_between_commits() -> Result<()> {
    let module = calculator_module();
    let target = method_token(3);

    let first = module.resolve(target)?;
    let second = module.resolve(target)?;
    assert_eq!(first.il.as_ref(), second.il.as_ref());
    assert_eq!(first.generation, second.generation);
    Ok(())
}

#[test]
fn truncated_dmeta_leaves_generation_unchanged() {
    let module = calculator_module();

    let (dmeta, dil) = DeltaWriter::new()
        .il_body(method_token(1), b"bodyB".to_vec())
        .finish();
    let err = module.apply_update(&dmeta[..8], &dil).unwrap_err();

    match err {
        Error::Parse(ParseError::Truncated { .. }) => {}
        other => panic!("expected truncation, got {other}"),
    }
    assert_eq!(err.stage(), Stage::Parse);
    assert_eq!(module.generation(), 0);
}

#[test]
fn empty_delta_is_rejected_without_consuming_a_generation() {
    let module = calculator_module();

    let (dmeta, dil) = DeltaWriter::new().finish();
    let err = module.apply_update(&dmeta, &dil).unwrap_err();
    assert!(matches!(err, Error::Merge(MergeError::EmptyDelta)));
    assert_eq!(module.generation(), 0);

    // The next real update still becomes generation 1.
    let (dmeta, dil) = DeltaWriter::new()
        .il_body(method_token(1), b"bodyB".to_vec())
        .finish();
    assert_eq!(module.apply_update(&dmeta, &dil).unwrap(), 1);
}

#[test]
fn merge_rejection_reports_the_stage() {
    let module = calculator_module();

    // IL body for a method row that does not exist.
    let (dmeta, dil) = DeltaWriter::new()
        .il_body(method_token(17), b"nope".to_vec())
        .finish();
    let err = module.apply_update(&dmeta, &dil).unwrap_err();

    assert_eq!(err.stage(), Stage::Merge);
    assert!(matches!(
        err,
        Error::Merge(MergeError::UnknownMethodToken(_))
    ));
    assert_eq!(module.generation(), 0);
}

#[test]
fn round_trip_preserves_the_change_set() {
    let (dmeta, dil) = DeltaWriter::new()
        .table_change(TableId::MethodDef, 2, vec![0xAB; 8])
        .table_change(TableId::Param, 1, vec![0x01, 0x02])
        .heap_addition(HeapId::Blob, vec![0x06, 0x08])
        .il_body(method_token(2), vec![0x17, 0x2A])
        .finish();

    let image = DeltaImage::parse(&dmeta, &dil).unwrap();

    assert_eq!(image.table_changes.len(), 2);
    assert_eq!(image.table_changes[0].table, TableId::MethodDef);
    assert_eq!(image.table_changes[0].row, 2);
    assert_eq!(image.table_changes[0].payload, vec![0xAB; 8]);
    assert_eq!(image.table_changes[1].table, TableId::Param);
    assert_eq!(image.heap_additions.len(), 1);
    assert_eq!(image.heap_additions[0].heap, HeapId::Blob);
    assert_eq!(image.il_bodies.len(), 1);
    assert_eq!(image.il_bodies[0].token, method_token(2));
    assert_eq!(image.il_bodies[0].il, vec![0x17, 0x2A]);
}

#[test]
fn older_generation_snapshots_stay_intact() -> Result<()> {
    let module = calculator_module();
    let gen0 = module.current_generation();

    let (dmeta, dil) = DeltaWriter::new()
        .table_change(TableId::MethodDef, 1, vec![7u8; 8])
        .il_body(method_token(1), b"bodyB".to_vec())
        .finish();
    module.apply_update(&dmeta, &dil)?;

    // The pinned generation 0 snapshot still shows the original row and an
    // empty patch table.
    assert_eq!(gen0.number, 0);
    assert_eq!(gen0.tables.row(TableId::MethodDef, 1).unwrap().as_ref(), &[0u8; 8]);
    assert!(gen0.patches.is_empty());

    let gen1 = module.current_generation();
    assert_eq!(gen1.tables.row(TableId::MethodDef, 1).unwrap().as_ref(), &[7u8; 8]);
    Ok(())
}

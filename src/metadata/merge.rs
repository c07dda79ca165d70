//! The metadata merge engine.
//!
//! [`merge`] applies one decoded [`DeltaImage`] on top of a generation's table
//! and heap state and produces the state of the next generation. It is purely
//! functional: the inputs are never mutated, and nothing the merge builds
//! becomes visible to other threads until the coordinator publishes it.
//!
//! Storage sharing keeps small deltas cheap. Tables the delta does not touch
//! are carried over as shared `Arc`s; touched tables are copied at row
//! granularity so unmodified rows stay shared; heaps only ever gain segments.
//!
//! Token stability is the invariant everything here defends: a token captured
//! by running code before the update must decode to a sane row after it.
//! Adds may only land at the next new row, modifies may not resize a row, and
//! heap bytes are append-only.

use std::sync::Arc;

use crate::{
    error::MergeError,
    metadata::{
        delta::DeltaImage,
        heaps::HeapSet,
        tables::{TableData, TableId, TableSet},
        token::Token,
    },
};

/// The product of a successful merge, ready to be wrapped into a generation.
#[derive(Debug)]
pub struct MergeOutput {
    /// Table state of the next generation.
    pub tables: TableSet,
    /// Heap state of the next generation.
    pub heaps: HeapSet,
    /// Method body overrides to lay over the previous patch table.
    pub body_overrides: Vec<(Token, Arc<[u8]>)>,
}

/// Apply `delta` to the state of one generation, producing the next.
///
/// # Errors
/// - [`MergeError::EmptyDelta`] if the delta carries no changes
/// - [`MergeError::RowOutOfRange`] for a row index that is neither an existing
///   row nor the next new row
/// - [`MergeError::TokenStability`] for a modify that would resize a row
/// - [`MergeError::RowWidth`] for an add that does not match the table's row
///   width
/// - [`MergeError::NotAMethodToken`] / [`MergeError::UnknownMethodToken`] for
///   IL bodies whose token does not land on a merged `MethodDef` row
pub fn merge(
    tables: &TableSet,
    heaps: &HeapSet,
    delta: &DeltaImage,
) -> Result<MergeOutput, MergeError> {
    if delta.is_empty() {
        return Err(MergeError::EmptyDelta);
    }

    let mut next_tables = tables.clone();

    for change in &delta.table_changes {
        let current = next_tables.table(change.table);
        let mut data = current.map_or_else(TableData::new, |t| t.as_ref().clone());
        let next_row = data.row_count() + 1;

        if change.row == 0 || change.row > next_row {
            return Err(MergeError::RowOutOfRange {
                table: change.table,
                row: change.row,
                next_row,
            });
        }

        let payload: Arc<[u8]> = Arc::from(change.payload.as_slice());
        if change.row == next_row {
            if let Some(width) = data.row_width() {
                if payload.len() != width {
                    return Err(MergeError::RowWidth {
                        table: change.table,
                        expected: width,
                        actual: payload.len(),
                    });
                }
            }
            let rid = data.push_row(payload);
            log::debug!(
                target: "dotpatch",
                "merge: add {:?} row {} ({} bytes)",
                change.table,
                rid,
                change.payload.len()
            );
        } else {
            let existing = data
                .row(change.row)
                .map(|row| row.len())
                .unwrap_or_default();
            if payload.len() != existing {
                return Err(MergeError::TokenStability {
                    token: Token::from_parts(change.table, change.row),
                    expected: existing,
                    actual: payload.len(),
                });
            }
            data.set_row(change.row, payload);
            log::debug!(
                target: "dotpatch",
                "merge: modify {:?} row {}",
                change.table,
                change.row
            );
        }

        next_tables.insert(change.table, Arc::new(data));
    }

    let mut next_heaps = heaps.clone();
    for addition in &delta.heap_additions {
        let offset = next_heaps.append(addition.heap, Arc::from(addition.bytes.as_slice()));
        log::debug!(
            target: "dotpatch",
            "merge: append {} bytes to {:?} at offset {}",
            addition.bytes.len(),
            addition.heap,
            offset
        );
    }

    let method_rows = next_tables.row_count(TableId::MethodDef);
    let mut body_overrides = Vec::with_capacity(delta.il_bodies.len());
    for body in &delta.il_bodies {
        if !body.token.is_method() {
            return Err(MergeError::NotAMethodToken(body.token));
        }
        if body.token.row() == 0 || body.token.row() > method_rows {
            return Err(MergeError::UnknownMethodToken(body.token));
        }
        body_overrides.push((body.token, Arc::from(body.il.as_slice())));
    }

    Ok(MergeOutput {
        tables: next_tables,
        heaps: next_heaps,
        body_overrides,
    })
}

//! Type-1 slowly-changing-dimension merge and surrogate key assignment.

use std::collections::{HashMap, HashSet};

use crate::types::Dimension;

/// Result of merging a source batch into a dimension table.
#[derive(Debug, Clone, PartialEq)]
pub struct Upserted<D> {
    pub rows: Vec<D>,
    pub updated: usize,
    pub inserted: usize,
    /// Existing rows dropped because an earlier row already held their key.
    pub collapsed: usize,
}

/// Keep only the last occurrence of each business key, in the order those
/// last occurrences appear.
pub fn dedup_keep_last<D: Dimension>(rows: Vec<D>) -> Vec<D> {
    let mut last: HashMap<String, usize> = HashMap::new();
    for (idx, row) in rows.iter().enumerate() {
        last.insert(row.business_key().to_string(), idx);
    }
    rows.into_iter()
        .enumerate()
        .filter(|(idx, row)| last.get(row.business_key()) == Some(idx))
        .map(|(_, row)| row)
        .collect()
}

/// Merge `incoming` into `existing` keyed by [`Dimension::business_key`].
///
/// Existing rows whose key reappears are replaced wholesale by the incoming
/// row, sentinel values included. Keys only present in `incoming` are appended
/// after all existing rows. Nothing is removed except later duplicates of a
/// key already held by an earlier existing row: those collapse into the first
/// position, which the incoming row (if any) then overwrites. Surrogate keys
/// on the result are stale until [`assign_keys`] runs.
pub fn upsert<D: Dimension>(existing: Vec<D>, incoming: Vec<D>) -> Upserted<D> {
    let deduped = dedup_keep_last(incoming);
    let mut by_key: HashMap<String, D> = deduped
        .iter()
        .map(|row| (row.business_key().to_string(), row.clone()))
        .collect();

    let mut updated = 0usize;
    let mut collapsed = 0usize;
    let mut seen: HashSet<String> = HashSet::with_capacity(existing.len());
    let mut rows: Vec<D> = Vec::with_capacity(existing.len() + deduped.len());

    for current in existing {
        let key = current.business_key().to_string();
        if seen.contains(&key) {
            collapsed += 1;
            continue;
        }
        match by_key.remove(&key) {
            Some(replacement) => {
                updated += 1;
                rows.push(replacement);
            }
            None => rows.push(current),
        }
        seen.insert(key);
    }

    let before = rows.len();
    rows.extend(
        deduped
            .into_iter()
            .filter(|row| !seen.contains(row.business_key())),
    );
    let inserted = rows.len() - before;

    Upserted {
        rows,
        updated,
        inserted,
        collapsed,
    }
}

/// Number rows `1..=N` in their current order.
///
/// Keys are positional: they only stay put across runs while the row order
/// does, and rows appended by a later merge always get fresh trailing keys.
pub fn assign_keys<D: Dimension>(mut rows: Vec<D>) -> Vec<D> {
    for (idx, row) in rows.iter_mut().enumerate() {
        row.set_surrogate_key(idx as u32 + 1);
    }
    rows
}

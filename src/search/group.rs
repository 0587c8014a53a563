//! Collapses records sharing a display name into one grouped result.

use crate::types::{GroupedResult, Occurrence, Record};
use ahash::{AHashMap, AHashSet};
use std::sync::Arc;

/// Group records by exact (case-sensitive) display name.
///
/// Groups come out in first-seen order. Occurrences of records that share a
/// display name are concatenated, exact duplicates (same url and qualified
/// name) are dropped, and the rest are ordered by qualified name so output is
/// stable regardless of generation order. Each group remembers the shortest
/// token that contributed to it.
pub fn group(records: &[Arc<Record>]) -> Vec<GroupedResult> {
    let mut positions: AHashMap<&str, usize> = AHashMap::with_capacity(records.len());
    let mut groups: Vec<GroupedResult> = Vec::with_capacity(records.len());

    for record in records {
        match positions.get(record.display_name()) {
            Some(&pos) => {
                let group = &mut groups[pos];
                if record.token().len() < group.token.len() {
                    group.token = Arc::clone(record.token_arc());
                }
                group.occurrences.extend_from_slice(record.occurrences());
            }
            None => {
                positions.insert(record.display_name(), groups.len());
                groups.push(GroupedResult {
                    token: Arc::clone(record.token_arc()),
                    display_name: Arc::clone(record.display_name_arc()),
                    occurrences: record.occurrences().to_vec(),
                });
            }
        }
    }

    for group in &mut groups {
        dedup_occurrences(&mut group.occurrences);
        group
            .occurrences
            .sort_by(|a, b| a.qualified_name.cmp(&b.qualified_name));
    }

    groups
}

fn dedup_occurrences(occurrences: &mut Vec<Occurrence>) {
    if occurrences.len() < 2 {
        return;
    }
    let mut seen: AHashSet<(Arc<str>, Arc<str>)> = AHashSet::with_capacity(occurrences.len());
    occurrences.retain(|o| seen.insert((Arc::clone(&o.url), Arc::clone(&o.qualified_name))));
}

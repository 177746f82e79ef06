//! Identifier resolution: declared id strings → canonical integer ids.
//!
//! A record that fails to parse, or repeats an already-seen id, is skipped
//! and excluded from every downstream structure. Resolution is a
//! deterministic, total pass over the record set.

use std::collections::HashSet;

use tracing::warn;

use quarry_core::problem::Problem;

/// The outcome of identifier resolution.
///
/// `positions[i]` is the index into the original record set of the record
/// whose canonical id is `ids[i]`; both are in encounter order and always
/// equal length, enforced by construction.
#[derive(Debug, Default)]
pub struct ResolvedIds {
    positions: Vec<usize>,
    ids: Vec<i64>,
}

impl ResolvedIds {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// Iterate (original position, canonical id) pairs in encounter order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, i64)> + '_ {
        self.positions.iter().copied().zip(self.ids.iter().copied())
    }
}

/// Resolve canonical ids for a record set.
pub fn resolve(problems: &[Problem]) -> ResolvedIds {
    let mut resolved = ResolvedIds::default();
    let mut seen: HashSet<i64> = HashSet::new();

    for (position, problem) in problems.iter().enumerate() {
        match problem.declared_id.trim().parse::<i64>() {
            Ok(id) => {
                if !seen.insert(id) {
                    warn!(
                        id,
                        title = %problem.title,
                        "duplicate canonical id, skipping record"
                    );
                    continue;
                }
                resolved.positions.push(position);
                resolved.ids.push(id);
            }
            Err(_) => {
                warn!(
                    declared_id = %problem.declared_id,
                    title = %problem.title,
                    "unparseable identifier, skipping record"
                );
            }
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_integer_ids() {
        let problems = vec![Problem::new("1", "a"), Problem::new(" 42 ", "b")];
        let resolved = resolve(&problems);
        assert_eq!(resolved.ids(), &[1, 42]);
        assert_eq!(resolved.positions(), &[0, 1]);
    }

    #[test]
    fn skips_unparseable_ids() {
        let problems = vec![
            Problem::new("abc", "bad"),
            Problem::new("2", "good"),
            Problem::new("", "empty"),
        ];
        let resolved = resolve(&problems);
        assert_eq!(resolved.ids(), &[2]);
        assert_eq!(resolved.positions(), &[1]);
    }

    #[test]
    fn first_duplicate_wins() {
        let problems = vec![
            Problem::new("7", "first"),
            Problem::new("7", "second"),
            Problem::new("8", "other"),
        ];
        let resolved = resolve(&problems);
        assert_eq!(resolved.ids(), &[7, 8]);
        assert_eq!(resolved.positions(), &[0, 2]);
    }

    #[test]
    fn empty_input_resolves_empty() {
        let resolved = resolve(&[]);
        assert!(resolved.is_empty());
    }
}

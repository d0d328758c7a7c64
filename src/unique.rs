//! Per-read tracking of values seen in unique-constrained columns.

use std::collections::HashMap;

/// Remembers, per column, the first row index that introduced each value.
///
/// One tracker belongs to exactly one read; it is never shared or persisted.
#[derive(Debug, Default)]
pub struct UniquenessTracker {
    seen: HashMap<String, HashMap<String, usize>>,
}

impl UniquenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` for `column` at `row`. Returns the row that first
    /// introduced the value when it has been seen before; the original index
    /// is never overwritten.
    pub fn check(&mut self, column: &str, value: &str, row: usize) -> Option<usize> {
        let values = self.seen.entry(column.to_string()).or_default();
        match values.get(value) {
            Some(first_row) => Some(*first_row),
            None => {
                values.insert(value.to_string(), row);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn first_sighting_is_recorded() {
        let mut tracker = UniquenessTracker::new();
        assert_eq!(tracker.check("email", "a@x.io", 2), None);
        assert_eq!(tracker.check("email", "b@x.io", 3), None);
        assert_eq!(tracker.check("email", "a@x.io", 4), Some(2));
    }

    #[test]
    fn columns_are_tracked_independently() {
        let mut tracker = UniquenessTracker::new();
        assert_eq!(tracker.check("email", "same", 2), None);
        assert_eq!(tracker.check("username", "same", 2), None);
        assert_eq!(tracker.check("email", "same", 3), Some(2));
        assert_eq!(tracker.check("username", "same", 4), Some(2));
    }

    proptest! {
        #[test]
        fn repeats_always_cite_the_first_row(repeats in 1usize..20, start in 2usize..100) {
            let mut tracker = UniquenessTracker::new();
            prop_assert_eq!(tracker.check("code", "X1", start), None);
            for offset in 1..=repeats {
                prop_assert_eq!(tracker.check("code", "X1", start + offset), Some(start));
            }
        }
    }
}

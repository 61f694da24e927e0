//! List delta planning
//!
//! Sub-resources that are attached to a parent (disks, network interfaces,
//! port-forward rules) are reconciled by comparing the persisted list with the
//! declared one and issuing detach calls for removed entries before attach
//! calls for added ones.

use std::fmt::Display;
use tracing::warn;

/// Outcome of comparing two lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDelta<T> {
    /// Present before, gone from the declaration
    pub detach: Vec<T>,
    /// Declared, not present before
    pub attach: Vec<T>,
    /// Present in both (old element)
    pub keep: Vec<T>,
}

impl<T: Clone> ListDelta<T> {
    /// Compare with a matching predicate `same(old, new)`. Each old element
    /// matches at most one new element; every list keeps input order.
    pub fn plan_by<F>(old: &[T], new: &[T], same: F) -> Self
    where
        F: Fn(&T, &T) -> bool,
    {
        let mut new_used = vec![false; new.len()];
        let mut detach = Vec::new();
        let mut keep = Vec::new();

        for o in old {
            let hit = new
                .iter()
                .enumerate()
                .position(|(i, n)| !new_used[i] && same(o, n));
            match hit {
                Some(i) => {
                    new_used[i] = true;
                    keep.push(o.clone());
                }
                None => detach.push(o.clone()),
            }
        }

        let attach = new
            .iter()
            .zip(new_used)
            .filter(|(_, used)| !used)
            .map(|(n, _)| n.clone())
            .collect();

        Self {
            detach,
            attach,
            keep,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.detach.is_empty() && self.attach.is_empty()
    }
}

impl<T: Clone + PartialEq> ListDelta<T> {
    pub fn plan(old: &[T], new: &[T]) -> Self {
        Self::plan_by(old, new, |a, b| a == b)
    }
}

/// Runs a sequence of independent steps, remembering the last failure
///
/// Each failure is logged and counted; execution carries on. [`finish`]
/// reports the last error if any step failed.
///
/// [`finish`]: BestEffort::finish
pub struct BestEffort<E> {
    label: &'static str,
    failures: usize,
    last: Option<E>,
}

impl<E: Display> BestEffort<E> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            failures: 0,
            last: None,
        }
    }

    /// Record the outcome of one step
    pub fn record<I: Display>(&mut self, item: I, result: std::result::Result<(), E>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(step = self.label, item = %item, error = %e, "Step failed, continuing");
                self.failures += 1;
                self.last = Some(e);
                false
            }
        }
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn is_clean(&self) -> bool {
        self.failures == 0
    }

    pub fn finish(self) -> std::result::Result<(), E> {
        match self.last {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_disk_ids() {
        let delta = ListDelta::plan(&[100, 101, 102], &[101, 103]);
        assert_eq!(delta.detach, vec![100, 102]);
        assert_eq!(delta.attach, vec![103]);
        assert_eq!(delta.keep, vec![101]);
    }

    #[test]
    fn test_plan_from_empty() {
        let delta = ListDelta::plan(&[], &[7, 8]);
        assert!(delta.detach.is_empty());
        assert_eq!(delta.attach, vec![7, 8]);
    }

    #[test]
    fn test_plan_identical_is_empty() {
        let delta = ListDelta::plan(&[1, 2], &[2, 1]);
        assert!(delta.is_empty());
        assert_eq!(delta.keep, vec![1, 2]);
    }

    #[test]
    fn test_plan_by_matches_each_element_once() {
        let old = vec![("VINS", 5), ("VINS", 5)];
        let new = vec![("VINS", 5)];
        let delta = ListDelta::plan_by(&old, &new, |a, b| a == b);
        assert_eq!(delta.keep.len(), 1);
        assert_eq!(delta.detach, vec![("VINS", 5)]);
        assert!(delta.attach.is_empty());
    }

    #[test]
    fn test_best_effort_keeps_last_error() {
        let mut run: BestEffort<String> = BestEffort::new("attach");
        assert!(!run.record(1, Err("first".to_string())));
        assert!(run.record(2, Ok(())));
        assert!(!run.record(3, Err("second".to_string())));
        assert_eq!(run.failures(), 2);
        assert_eq!(run.finish(), Err("second".to_string()));
    }

    #[test]
    fn test_best_effort_clean() {
        let mut run: BestEffort<String> = BestEffort::new("detach");
        run.record("x", Ok(()));
        assert!(run.is_clean());
        assert!(run.finish().is_ok());
    }
}

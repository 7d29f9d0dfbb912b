use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

static NEXT_TRIAL_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates the next process-wide trial id. Ids are never reused.
pub fn next_trial_id() -> u64 {
    NEXT_TRIAL_ID.fetch_add(1, Ordering::SeqCst)
}

/// Marks the ids handed out during one session.
#[derive(Debug)]
pub struct TrialIdScope {
    first: u64,
}

impl TrialIdScope {
    pub fn begin() -> Self {
        let first = NEXT_TRIAL_ID.load(Ordering::SeqCst);
        info!(first_trial_id = first, "trial id scope opened");
        Self { first }
    }

    pub fn first(&self) -> u64 {
        self.first
    }

    /// Ids allocated process-wide since the scope opened.
    pub fn allocated(&self) -> u64 {
        NEXT_TRIAL_ID.load(Ordering::SeqCst) - self.first
    }

    pub fn end(self) -> u64 {
        let allocated = self.allocated();
        info!(first_trial_id = self.first, allocated, "trial id scope closed");
        allocated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn ids_increase() {
        let a = next_trial_id();
        let b = next_trial_id();
        assert!(b > a);
    }

    #[test]
    fn concurrent_allocation_stays_unique() {
        let handles: Vec<_> = (0..4)
            .map(|_| thread::spawn(|| (0..250).map(|_| next_trial_id()).collect::<Vec<_>>()))
            .collect();
        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate trial id {id}");
            }
        }
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn scope_counts_its_allocations() {
        let scope = TrialIdScope::begin();
        let id = next_trial_id();
        assert!(id >= scope.first());
        assert!(scope.allocated() >= 1);
    }
}

//! The runtime tracker injected into an instrumented module (C7,
//! spec.md §4.7): one per module per instrumentation identifier,
//! accumulating hit counts in memory and persisting them to its hit
//! file on unload.
//!
//! spec.md §4.7 describes incrementing `t_thread_hits[k]`
//! non-atomically once a thread has its own counter array. Every
//! crate in this workspace forbids `unsafe_code`, so a genuinely
//! non-synchronized counter isn't available; `AtomicI32` with
//! `Ordering::Relaxed` is the closest safe equivalent — no ordering is
//! established between threads on the hot path, matching the spec's
//! stated rationale for avoiding synchronization there.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::{hitfile, mutex::HitFileLock};

thread_local! {
    static THREAD_HITS: RefCell<HashMap<usize, Arc<Vec<AtomicI32>>>> = RefCell::new(HashMap::new());
}

/// Accumulates hit counts for one instrumented module in memory and
/// flushes them to `hits_file_path` on `unload`.
pub struct Tracker {
    len: usize,
    hits_file_path: PathBuf,
    registry: Mutex<Vec<Arc<Vec<AtomicI32>>>>,
}

impl Tracker {
    /// `len` is the number of hit entries the module's tracker type
    /// was sized for (spec.md §4.4's static array length).
    pub fn new(len: usize, hits_file_path: impl Into<PathBuf>) -> Self {
        Self { len, hits_file_path: hits_file_path.into(), registry: Mutex::new(Vec::new()) }
    }

    fn key(&self) -> usize {
        self as *const Tracker as usize
    }

    fn thread_counters(&self) -> Arc<Vec<AtomicI32>> {
        THREAD_HITS.with(|cell| {
            let mut map = cell.borrow_mut();
            map.entry(self.key())
                .or_insert_with(|| {
                    let counters: Vec<AtomicI32> = (0..self.len).map(|_| AtomicI32::new(0)).collect();
                    let counters = Arc::new(counters);
                    self.registry.lock().unwrap().push(Arc::clone(&counters));
                    counters
                })
                .clone()
        })
    }

    /// Increments the counter for hit-map index `k` on this thread's
    /// own array, per spec.md §4.7. `k` is zero-based.
    pub fn record_hit(&self, k: usize) {
        let counters = self.thread_counters();
        counters[k].fetch_add(1, Ordering::Relaxed);
    }

    /// Sums every thread's counters, merges the total into the on-disk
    /// hit file under the named inter-process lock, and clears the
    /// registry so a subsequent unload starts from zero (spec.md §8
    /// scenario S4: repeated unloads of the same module accumulate on
    /// disk, not in memory).
    pub fn unload(&self) -> Result<()> {
        let mut totals = vec![0i32; self.len];
        let mut registry = self.registry.lock().unwrap();
        for counters in registry.iter() {
            for (total, counter) in totals.iter_mut().zip(counters.iter()) {
                *total = total.wrapping_add(counter.load(Ordering::Relaxed));
            }
        }
        registry.clear();
        drop(registry);

        let _lock = HitFileLock::acquire(&self.hits_file_path)?;
        hitfile::merge(&self.hits_file_path, &totals)
    }

    /// Name of the inter-process mutex guarding this tracker's hit
    /// file, per spec.md §6.
    pub fn named_mutex_name(&self) -> String {
        crate::mutex::lock_name(&self.hits_file_path)
    }

    /// Path of the hit file this tracker flushes to.
    pub fn hits_file_path(&self) -> &Path {
        &self.hits_file_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_hit_then_unload_writes_counts() {
        let dir = std::env::temp_dir().join(format!("cov-runtime-tracker-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let hits_path = dir.join("hits.bin");

        let tracker = Tracker::new(2, &hits_path);
        tracker.record_hit(0);
        tracker.record_hit(0);
        tracker.record_hit(1);
        tracker.unload().unwrap();

        assert_eq!(hitfile::read(&hits_path).unwrap(), Some(vec![2, 1]));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn two_sequential_unloads_accumulate_on_disk() {
        let dir = std::env::temp_dir().join(format!("cov-runtime-tracker-test-s4-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let hits_path = dir.join("hits.bin");

        let tracker = Tracker::new(2, &hits_path);
        tracker.record_hit(0);
        tracker.record_hit(0);
        tracker.record_hit(0);
        tracker.record_hit(1);
        tracker.record_hit(1);
        tracker.record_hit(1);
        tracker.record_hit(1);
        tracker.unload().unwrap();
        assert_eq!(hitfile::read(&hits_path).unwrap(), Some(vec![3, 4]));

        tracker.record_hit(0);
        tracker.record_hit(1);
        tracker.record_hit(1);
        tracker.unload().unwrap();
        assert_eq!(hitfile::read(&hits_path).unwrap(), Some(vec![4, 6]));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn merging_two_trackers_hit_files_sums_element_wise() {
        let dir = std::env::temp_dir().join(format!("cov-runtime-tracker-test-merge-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let hits_path = dir.join("hits.bin");

        let tracker_a = Tracker::new(2, &hits_path);
        tracker_a.record_hit(0);
        tracker_a.unload().unwrap();

        let tracker_b = Tracker::new(2, &hits_path);
        tracker_b.record_hit(0);
        tracker_b.record_hit(1);
        tracker_b.unload().unwrap();

        assert_eq!(hitfile::read(&hits_path).unwrap(), Some(vec![2, 1]));

        let _ = std::fs::remove_dir_all(&dir);
    }
}

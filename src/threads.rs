//! The spawn-loop primitive threaded plans are built on.

use std::fmt;

/// Runs `work(0)`, ..., `work(nblocks - 1)`, possibly concurrently, and returns once every block
/// has finished.
pub trait SpawnLoop: Send + Sync + fmt::Debug {
    fn spawn_loop(&self, nblocks: usize, work: &(dyn Fn(usize) + Sync));

    fn name(&self) -> &'static str;
}

/// Runs every block on the calling thread, in order.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialLoop;

impl SpawnLoop for SerialLoop {
    fn spawn_loop(&self, nblocks: usize, work: &(dyn Fn(usize) + Sync)) {
        for block in 0..nblocks {
            work(block);
        }
    }
    fn name(&self) -> &'static str {
        "serial"
    }
}

/// Runs block 0 on the calling thread and every other block on its own scoped thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScopedThreads;

impl SpawnLoop for ScopedThreads {
    fn spawn_loop(&self, nblocks: usize, work: &(dyn Fn(usize) + Sync)) {
        if nblocks <= 1 {
            return SerialLoop.spawn_loop(nblocks, work);
        }
        std::thread::scope(|scope| {
            for block in 1..nblocks {
                scope.spawn(move || work(block));
            }
            work(0);
        });
    }
    fn name(&self) -> &'static str {
        "scoped-threads"
    }
}

/// Hands blocks to the global rayon pool.
#[cfg(feature = "rayon")]
#[derive(Clone, Copy, Debug, Default)]
pub struct RayonLoop;

#[cfg(feature = "rayon")]
impl SpawnLoop for RayonLoop {
    fn spawn_loop(&self, nblocks: usize, work: &(dyn Fn(usize) + Sync)) {
        use rayon::prelude::*;
        (0..nblocks).into_par_iter().for_each(|block| work(block));
    }
    fn name(&self) -> &'static str {
        "rayon"
    }
}

/// A raw pointer that may cross into spawned blocks. Blocks only touch disjoint parts of the
/// buffer it points into.
#[derive(Debug)]
pub(crate) struct SendPtr<T>(*mut T);

impl<T> Clone for SendPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for SendPtr<T> {}

unsafe impl<T> Send for SendPtr<T> {}
unsafe impl<T> Sync for SendPtr<T> {}

impl<T> SendPtr<T> {
    pub(crate) fn new(ptr: *mut T) -> Self {
        Self(ptr)
    }
    #[inline(always)]
    pub(crate) fn get(self) -> *mut T {
        self.0
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn check_every_block_runs_once(spawn: &dyn SpawnLoop) {
        for nblocks in [0usize, 1, 2, 7] {
            let counters: Vec<AtomicUsize> = (0..nblocks).map(|_| AtomicUsize::new(0)).collect();
            spawn.spawn_loop(nblocks, &|block| {
                counters[block].fetch_add(1, Ordering::SeqCst);
            });
            assert!(
                counters.iter().all(|c| c.load(Ordering::SeqCst) == 1),
                "{} with {} blocks",
                spawn.name(),
                nblocks
            );
        }
    }

    #[test]
    fn test_spawn_loops() {
        check_every_block_runs_once(&SerialLoop);
        check_every_block_runs_once(&ScopedThreads);
        #[cfg(feature = "rayon")]
        check_every_block_runs_once(&RayonLoop);
    }
}

//! PoW generation (multi-threaded CPU).

use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;

use crate::validator::hash_with_nonce;
use crate::{CancelToken, WorkError, WorkSolution, MAX_DIFFICULTY};

/// Searches for block nonces on a dedicated rayon pool.
pub struct WorkGenerator {
    pool: rayon::ThreadPool,
}

/// Nonces tried per thread before checking cancellation and the best hit so far.
const BATCH_SIZE: u64 = 4096;

impl WorkGenerator {
    /// Build a generator with `threads` search threads (at least one).
    pub fn new(threads: usize) -> Result<Self, WorkError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("tally-pow-{i}"))
            .build()
            .map_err(|e| WorkError::ThreadPool(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Find the smallest nonce whose hash has `difficulty` leading zero hex digits.
    ///
    /// Thread `t` of `n` scans nonces `t, t+n, t+2n, ...` in order and stops at
    /// its first hit or once it has passed the best hit found by any thread, so
    /// the result is the global minimum regardless of the thread count.
    pub fn generate(
        &self,
        prefix: &[u8],
        difficulty: u32,
        cancel: &CancelToken,
    ) -> Result<WorkSolution, WorkError> {
        if difficulty > MAX_DIFFICULTY {
            return Err(WorkError::DifficultyOutOfRange {
                difficulty,
                max: MAX_DIFFICULTY,
            });
        }
        if cancel.is_cancelled() {
            return Err(WorkError::Cancelled);
        }
        if difficulty == 0 {
            return Ok(WorkSolution {
                nonce: 0,
                hash: hash_with_nonce(prefix, 0),
            });
        }

        let found = AtomicU64::new(u64::MAX);
        let stride = self.threads().max(1) as u64;

        self.pool.install(|| {
            (0..stride).into_par_iter().for_each(|thread_id| {
                let mut nonce = thread_id;
                loop {
                    if cancel.is_cancelled() || nonce >= found.load(Ordering::Acquire) {
                        return;
                    }
                    for _ in 0..BATCH_SIZE {
                        if hash_with_nonce(prefix, nonce).meets_difficulty(difficulty) {
                            found.fetch_min(nonce, Ordering::AcqRel);
                            return;
                        }
                        nonce = match nonce.checked_add(stride) {
                            Some(next) => next,
                            None => return,
                        };
                    }
                }
            });
        });

        if cancel.is_cancelled() {
            tracing::debug!(difficulty, "proof-of-work search cancelled");
            return Err(WorkError::Cancelled);
        }
        match found.load(Ordering::Acquire) {
            u64::MAX => Err(WorkError::Cancelled),
            nonce => Ok(WorkSolution {
                nonce,
                hash: hash_with_nonce(prefix, nonce),
            }),
        }
    }
}

//! Parallel-for over particle indices.
//!
//! Every hot loop of the solver is written once, as a per-index body that
//! writes only its own output slot, and run through [`for_each_mut`]. The
//! execution mode only decides whether the body runs on the calling thread or
//! on the rayon pool; the body itself is shared, so both modes produce
//! bit-identical results.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// How a parallel-for region is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Execution {
    /// Run on the calling thread, in index order.
    #[default]
    Sequential,
    /// Fan out over the global rayon thread pool and join before returning.
    Parallel,
}

impl Execution {
    /// `Parallel` if `multiprocessing` is set, otherwise `Sequential`.
    pub fn from_flag(multiprocessing: bool) -> Self {
        if multiprocessing {
            Execution::Parallel
        } else {
            Execution::Sequential
        }
    }

    /// True for [`Execution::Parallel`].
    pub fn is_parallel(self) -> bool {
        self == Execution::Parallel
    }
}

/// Run `body(i, &mut items[i])` for every index.
///
/// Returns only after every invocation has finished.
pub fn for_each_mut<T, F>(execution: Execution, items: &mut [T], body: F)
where
    T: Send,
    F: Fn(usize, &mut T) + Send + Sync,
{
    match execution {
        Execution::Sequential => {
            for (i, item) in items.iter_mut().enumerate() {
                body(i, item);
            }
        }
        Execution::Parallel => {
            items
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, item)| body(i, item));
        }
    }
}

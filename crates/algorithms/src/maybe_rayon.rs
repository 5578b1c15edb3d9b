/// Parallel/sequential execution switch.
///
/// With the `parallel` feature the per-cell kriging pass and the resampling
/// draws run on rayon's pool. Without it, `into_par_iter()` degrades to
/// `into_iter()` so the same iterator chains compile unchanged.
///
/// Both paths collect results in index order, which keeps downstream
/// reductions identical between the two builds.
#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

/// Number of worker threads the parallel passes will use.
#[cfg(feature = "parallel")]
pub fn worker_threads() -> usize {
    rayon::current_num_threads()
}

#[cfg(not(feature = "parallel"))]
mod sequential {
    /// Sequential stand-in for `rayon::prelude::IntoParallelIterator`.
    pub trait IntoParallelIterator {
        type Iter;
        type Item;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        type Item = I::Item;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }

    pub fn worker_threads() -> usize {
        1
    }
}

#[cfg(not(feature = "parallel"))]
pub use sequential::*;

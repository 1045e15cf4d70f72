use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::utils::timer::timed_scope_log;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ExecutionMode {
    #[default]
    Parallel,
    Sequential,
}

impl std::str::FromStr for ExecutionMode {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "parallel" => Ok(Self::Parallel),
            "sequential" => Ok(Self::Sequential),
            _ => Err("expected parallel or sequential"),
        }
    }
}

/// Runs `f` once per index in `0..count` and collects the results in index order.
///
/// In parallel mode the work is spread over the rayon thread pool, a panic in `f` is propagated to the caller.
pub fn dispatch<T, F>(count: u32, mode: ExecutionMode, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(u32) -> T + Sync + Send,
{
    timed_scope_log("dispatch", || match mode {
        ExecutionMode::Parallel => (0..count).into_par_iter().map(&f).collect(),
        ExecutionMode::Sequential => (0..count).map(&f).collect(),
    })
}

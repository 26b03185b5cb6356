#[cfg(feature = "rayon")]
use std::sync::Arc;

use super::{BuildError, Executor};
use crate::loom::{
    data::{Body, HostCtx, Index, LoopData},
    launch::LaunchError,
    segment::AnySegment,
    statement::Policy,
};

/// Runs policy trees on the calling thread; parallel policies use `rayon`.
#[derive(Debug, Default, Clone)]
pub struct Host {
    /// A dedicated pool for parallel policies. The global pool is used if absent.
    #[cfg(feature = "rayon")]
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl Executor for Host {
    type Context = HostCtx;

    fn execute<'a, S, const N: usize, const P: usize>(
        &self,
        statement: &S,
        segments: [AnySegment<'a>; N],
        params: [Index; P],
        bodies: &'a [Body<'a, N, P>],
    ) -> Result<(), LaunchError>
    where
        S: Policy<Self::Context, N, P>,
    {
        let mut data = LoopData::new(segments, params, bodies, HostCtx);

        #[cfg(feature = "rayon")]
        if let Some(pool) = &self.pool {
            pool.install(|| statement.exec(&mut data, true));
            return Ok(());
        }

        statement.exec(&mut data, true);
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct HostBuilder {
    /// Size of a dedicated thread pool.
    pub threads: Option<usize>,
}

impl HostBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn build(self) -> Result<Host, BuildError> {
        match self.threads {
            Some(0) => Err(BuildError::ZeroThreads),
            #[cfg(feature = "rayon")]
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|index| format!("strand-host-{index}"))
                    .build()?;
                let pool = Some(Arc::new(pool));
                Ok(Host { pool })
            }
            #[cfg(not(feature = "rayon"))]
            Some(threads) => {
                log::warn!("ignoring thread count {threads}: parallel policies run sequentially");
                Ok(Host {})
            }
            None => Ok(Host::default()),
        }
    }
}

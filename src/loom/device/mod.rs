use thiserror::Error;

use super::{
    data::{Body, Context, Index},
    launch::LaunchError,
    segment::AnySegment,
    statement::{For, Lambda, Policy},
};

pub use group::{Device, DeviceBuilder};
pub use host::{Host, HostBuilder};

pub mod group;
pub mod host;

#[derive(Debug, Error)]
pub enum BuildError {
    #[cfg(feature = "rayon")]
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("thread count must be positive")]
    ZeroThreads,
}

/// A backend that drives policy trees.
pub trait Executor: Sync {
    /// What every iteration context carries on this backend.
    type Context: Context;

    /// Runs `statement` over the nest described by `segments`.
    ///
    /// Returns once every body invocation has finished.
    fn execute<'a, S, const N: usize, const P: usize>(
        &self,
        statement: &S,
        segments: [AnySegment<'a>; N],
        params: [Index; P],
        bodies: &'a [Body<'a, N, P>],
    ) -> Result<(), LaunchError>
    where
        S: Policy<Self::Context, N, P>;

    /// Prepares a launch.
    ///
    /// Bodies are attached with [`Kernel::body`] in the order `Lambda` refers to them.
    #[inline]
    fn launch<'e, 's, S, const N: usize, const P: usize>(
        &'e self,
        statement: &'e S,
        segments: [AnySegment<'s>; N],
        params: [Index; P],
    ) -> Kernel<'e, 's, Self, S, N, P>
    where
        Self: Sized,
    {
        Kernel {
            executor: self,
            statement,
            segments,
            params,
            bodies: vec![],
        }
    }

    /// Runs `statement` with a single body and no parameters.
    #[inline]
    fn kernel<'s, S, F, const N: usize>(
        &self,
        statement: &S,
        segments: [AnySegment<'s>; N],
        body: F,
    ) -> Result<(), LaunchError>
    where
        Self: Sized,
        S: Policy<Self::Context, N, 0>,
        F: Fn(&[Index; N], &[Index; 0]) + Send + Sync + 's,
    {
        self.launch(statement, segments, []).body(body).run()
    }

    /// Runs `body` on every index of `segment` with traversal `E`.
    #[inline]
    fn forall<'s, E, F>(
        &self,
        segment: impl Into<AnySegment<'s>>,
        body: F,
    ) -> Result<(), LaunchError>
    where
        Self: Sized,
        For<0, E, Lambda<0>>: Policy<Self::Context, 1, 0>,
        F: Fn(Index) + Send + Sync + 's,
    {
        let statement = For::<0, E, Lambda<0>>::default();
        self.kernel(&statement, [segment.into()], move |&[i], _| body(i))
    }
}

/// A launch being assembled.
#[must_use]
pub struct Kernel<'e, 's, E, S, const N: usize, const P: usize> {
    executor: &'e E,
    statement: &'e S,
    segments: [AnySegment<'s>; N],
    params: [Index; P],
    bodies: Vec<Body<'s, N, P>>,
}

impl<'s, E, S, const N: usize, const P: usize> Kernel<'_, 's, E, S, N, P>
where
    E: Executor,
    S: Policy<E::Context, N, P>,
{
    /// Attaches the next body.
    #[inline]
    pub fn body<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Index; N], &[Index; P]) + Send + Sync + 's,
    {
        self.bodies.push(Box::new(f));
        self
    }

    pub fn run(self) -> Result<(), LaunchError> {
        let Self {
            executor,
            statement,
            segments,
            params,
            bodies,
        } = self;
        executor.execute(statement, segments, params, &bodies)
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, sync::Mutex};

    use itertools::Itertools;

    use super::{DeviceBuilder, Executor, Host, HostBuilder};
    use crate::loom::{
        data::Index,
        policy::{GroupDirect, LaneDirect, ParExec, SeqExec, SimdExec, X, Y},
        segment::{ListSegment, range},
        statement::{For, Lambda},
    };

    #[test]
    fn test_same_body_any_backend() -> Result<(), Box<dyn Error>> {
        let (rows, cols) = (5, 7);
        let expected = (0..rows)
            .cartesian_product(0..cols)
            .map(|(i, j)| (i, j, i * cols + j))
            .collect_vec();

        let seen = Mutex::new(vec![]);
        let body = |&[j, i]: &[Index; 2], _: &[Index; 0]| {
            seen.lock().unwrap().push((i, j, i * cols + j))
        };
        let check = || -> Vec<_> { seen.lock().unwrap().drain(..).sorted().collect() };
        let segments = || [range(0, cols), range(0, rows)];

        let host = Host::default();
        host.kernel(&For::<1, SeqExec, For<0, SimdExec, Lambda<0>>>::default(), segments(), body)?;
        assert_eq!(check(), expected);

        let pool = HostBuilder::new().threads(2).build()?;
        pool.kernel(&For::<1, ParExec, For<0, SeqExec, Lambda<0>>>::default(), segments(), body)?;
        assert_eq!(check(), expected);

        let device = DeviceBuilder::new().build();
        let tree = For::<1, GroupDirect<X>, For<0, LaneDirect<Y>, Lambda<0>>>::default();
        device.kernel(&tree, segments(), body)?;
        assert_eq!(check(), expected);
        Ok(())
    }

    #[test]
    fn test_forall_list() -> Result<(), Box<dyn Error>> {
        let seen = Mutex::new(vec![]);
        let indices = vec![4, 8, 15, 16, 23, 42];
        Host::default().forall::<SeqExec, _>(ListSegment::borrowed(&indices), |i| {
            seen.lock().unwrap().push(i)
        })?;
        assert_eq!(*seen.lock().unwrap(), indices);
        Ok(())
    }

    #[test]
    fn test_reversed_range_runs_nothing() -> Result<(), Box<dyn Error>> {
        let calls = Mutex::new(0);
        Host::default().forall::<SeqExec, _>(range(5, 3), |_| *calls.lock().unwrap() += 1)?;
        assert_eq!(*calls.lock().unwrap(), 0);
        Ok(())
    }

    #[test]
    fn test_params_reach_bodies() -> Result<(), Box<dyn Error>> {
        let seen = Mutex::new(vec![]);
        let tree = For::<0, SeqExec, (Lambda<1>, Lambda<0>)>::default();
        Host::default()
            .launch(&tree, [range(0, 2)], [7, 9])
            .body(|&[i], &[a, _]| seen.lock().unwrap().push(i * a))
            .body(|&[i], &[_, b]| seen.lock().unwrap().push(-i * b))
            .run()?;
        assert_eq!(*seen.lock().unwrap(), vec![0, 0, -9, 7]);
        Ok(())
    }
}

use std::sync::{Arc, Barrier};

use itertools::Itertools;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::Executor;
use crate::loom::{
    data::{Body, Index, LaneCtx, LaneInfo, LoopData},
    launch::{Dim3, LaunchDims, LaunchError, LaunchRequest, Limits},
    segment::AnySegment,
    statement::{Policy, Statement},
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaunchId;

/// Runs policy trees on groups of lanes.
///
/// Each group runs its lanes as scoped threads sharing one barrier, so that [`LaneSync`] behaves
/// like a hardware group barrier. Groups are independent and run concurrently with `rayon`.
///
/// [`LaneSync`]: crate::loom::sync::LaneSync
#[derive(Debug, Clone)]
pub struct Device {
    limits: Limits,
    parallel: bool,
}

impl Default for Device {
    fn default() -> Self {
        DeviceBuilder::new().build()
    }
}

impl Device {
    #[inline]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    fn run_group<'a, S, const N: usize, const P: usize>(
        statement: &S,
        proto: &LoopData<'a, LaneCtx, N, P>,
        dims: LaunchDims,
        group: Dim3,
    ) where
        S: Statement<LoopData<'a, LaneCtx, N, P>>,
    {
        let barrier = Arc::new(Barrier::new(dims.lanes.size()));
        let run_lane = |lane: Dim3| {
            let info = LaneInfo {
                group,
                groups: dims.groups,
                lane,
                lanes: dims.lanes,
            };
            let mut data = proto.with_ctx(LaneCtx::new(info, barrier.clone()));
            statement.exec(&mut data, true);
        };

        match dims.lanes.size() {
            1 => run_lane(Dim3::ZERO),
            _ => std::thread::scope(|scope| {
                let run_lane = &run_lane;
                for lane in dims.lanes.iter() {
                    scope.spawn(move || run_lane(lane));
                }
            }),
        }
    }
}

impl Executor for Device {
    type Context = LaneCtx;

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
        let proto = LoopData::new(
            segments,
            params,
            bodies,
            LaneCtx::detached(LaneInfo::default()),
        );

        let mut request = LaunchRequest::default();
        statement.request(&proto, &mut request);
        let dims = request
            .resolve(&self.limits)
            .inspect_err(|err| log::error!("{err}"))?;

        let id = uid::Id::<LaunchId>::new();
        log::debug!("launch {id:?}: {dims}");

        #[cfg(feature = "trace")]
        let _span = tracing::trace_span!("launch", ?id, %dims).entered();
        let start = instant::Instant::now();

        let groups = dims.groups.iter().collect_vec();
        let run_group = |group: Dim3| Self::run_group(statement, &proto, dims, group);

        #[cfg(feature = "rayon")]
        match self.parallel {
            true => groups.into_par_iter().for_each(run_group),
            false => groups.into_iter().for_each(run_group),
        }
        #[cfg(not(feature = "rayon"))]
        groups.into_iter().for_each(run_group);

        log::debug!("launch {id:?}: finished in {:?}", start.elapsed());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DeviceBuilder {
    pub limits: Limits,
    /// Run groups concurrently.
    pub parallel: bool,
}

impl Default for DeviceBuilder {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            parallel: true,
        }
    }
}

impl DeviceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn build(self) -> Device {
        let Self { limits, parallel } = self;
        Device { limits, parallel }
    }
}

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::{
    data::{Data, Index, LaneData},
    launch::LaunchRequest,
};

pub const X: usize = 0;
pub const Y: usize = 1;
pub const Z: usize = 2;

/// Maps the iterations `0..count` of one loop level onto execution resources.
///
/// `f` receives the context, the iteration number and whether the iteration has real work.
/// Inactive iterations are still visited when a mapping must keep lanes in lockstep.
pub trait Traversal<D: Data> {
    /// Records the resources this mapping needs for `count` iterations.
    #[inline]
    fn request(count: Index, request: &mut LaunchRequest) {
        let _ = (count, request);
    }

    fn traverse<F>(data: &mut D, count: Index, active: bool, f: F)
    where
        F: Fn(&mut D, Index, bool) + Send + Sync;
}

#[inline]
fn extent(count: Index) -> usize {
    count.max(0) as usize
}

/// Iterations run in increasing order on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeqExec;

/// Iterations run in increasing order on the calling thread, in a loop the compiler may vectorize.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimdExec;

/// Iterations are spread over host threads. Every branch owns a copy of the context.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParExec;

/// One iteration per group along axis `A`. Groups beyond the count do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct GroupDirect<const A: usize>;

/// Groups along axis `A` stride over the iterations.
#[derive(Debug, Default, Clone, Copy)]
pub struct GroupLoop<const A: usize>;

/// One iteration per lane along axis `A`. Lanes beyond the count are masked.
#[derive(Debug, Default, Clone, Copy)]
pub struct LaneDirect<const A: usize>;

/// Lanes along axis `A` stride over the iterations.
///
/// All lanes run the same number of strides, masked where they run past the count, so that a
/// barrier inside the loop is reached uniformly.
#[derive(Debug, Default, Clone, Copy)]
pub struct LaneLoop<const A: usize>;

impl<D: Data> Traversal<D> for SeqExec {
    #[inline]
    fn traverse<F>(data: &mut D, count: Index, active: bool, f: F)
    where
        F: Fn(&mut D, Index, bool) + Send + Sync,
    {
        for index in 0..count {
            f(data, index, active);
        }
    }
}

impl<D: Data> Traversal<D> for SimdExec {
    #[inline]
    fn traverse<F>(data: &mut D, count: Index, active: bool, f: F)
    where
        F: Fn(&mut D, Index, bool) + Send + Sync,
    {
        (0..count).for_each(|index| f(data, index, active));
    }
}

impl<D: Data> Traversal<D> for ParExec {
    #[cfg(feature = "rayon")]
    #[inline]
    fn traverse<F>(data: &mut D, count: Index, active: bool, f: F)
    where
        F: Fn(&mut D, Index, bool) + Send + Sync,
    {
        (0..count)
            .into_par_iter()
            .for_each_with(data.clone(), |data, index| f(data, index, active));
    }

    #[cfg(not(feature = "rayon"))]
    #[inline]
    fn traverse<F>(data: &mut D, count: Index, active: bool, f: F)
    where
        F: Fn(&mut D, Index, bool) + Send + Sync,
    {
        let mut data = data.clone();
        for index in 0..count {
            f(&mut data, index, active);
        }
    }
}

impl<D: LaneData, const A: usize> Traversal<D> for GroupDirect<A> {
    #[inline]
    fn request(count: Index, request: &mut LaunchRequest) {
        request.direct_groups(A, extent(count));
    }

    #[inline]
    fn traverse<F>(data: &mut D, count: Index, active: bool, f: F)
    where
        F: Fn(&mut D, Index, bool) + Send + Sync,
    {
        let group = data.lane().group.get(A) as Index;
        if group < count {
            f(data, group, active);
        }
    }
}

impl<D: LaneData, const A: usize> Traversal<D> for GroupLoop<A> {
    #[inline]
    fn request(count: Index, request: &mut LaunchRequest) {
        request.loop_groups(A, extent(count));
    }

    #[inline]
    fn traverse<F>(data: &mut D, count: Index, active: bool, f: F)
    where
        F: Fn(&mut D, Index, bool) + Send + Sync,
    {
        let info = data.lane();
        let stride = info.groups.get(A).max(1);
        for index in (info.group.get(A) as Index..count).step_by(stride) {
            f(data, index, active);
        }
    }
}

impl<D: LaneData, const A: usize> Traversal<D> for LaneDirect<A> {
    #[inline]
    fn request(count: Index, request: &mut LaunchRequest) {
        request.direct_lanes(A, extent(count));
    }

    #[inline]
    fn traverse<F>(data: &mut D, count: Index, active: bool, f: F)
    where
        F: Fn(&mut D, Index, bool) + Send + Sync,
    {
        let lane = data.lane().lane.get(A) as Index;
        f(data, lane, active && lane < count);
    }
}

impl<D: LaneData, const A: usize> Traversal<D> for LaneLoop<A> {
    #[inline]
    fn request(count: Index, request: &mut LaunchRequest) {
        request.loop_lanes(A, extent(count));
    }

    #[inline]
    fn traverse<F>(data: &mut D, count: Index, active: bool, f: F)
    where
        F: Fn(&mut D, Index, bool) + Send + Sync,
    {
        let info = data.lane();
        let (lane, stride) = (info.lane.get(A) as Index, info.lanes.get(A).max(1));
        for base in (0..count).step_by(stride) {
            let index = base + lane;
            f(data, index, active && index < count);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use itertools::Itertools;

    use super::{
        GroupDirect, GroupLoop, LaneDirect, LaneLoop, ParExec, SeqExec, SimdExec, Traversal,
    };
    use crate::loom::{
        data::{Body, HostCtx, Index, LaneCtx, LaneInfo, LoopData},
        launch::Dim3,
        segment::range,
    };

    fn visit<T, D>(data: &mut D, count: Index) -> Vec<(Index, bool)>
    where
        T: Traversal<D>,
        D: crate::loom::data::Data,
    {
        let visited = Mutex::new(vec![]);
        T::traverse(data, count, true, |_, index, active| {
            visited.lock().unwrap().push((index, active))
        });
        visited.into_inner().unwrap().into_iter().sorted().collect()
    }

    #[test]
    fn test_host_traversals() {
        let bodies: Vec<Body<1, 0>> = vec![];
        let mut data = LoopData::new([range(0, 5)], [], &bodies, HostCtx);
        let expected = (0..5).map(|index| (index, true)).collect_vec();

        assert_eq!(visit::<SeqExec, _>(&mut data, 5), expected);
        assert_eq!(visit::<SimdExec, _>(&mut data, 5), expected);
        assert_eq!(visit::<ParExec, _>(&mut data, 5), expected);
        assert!(visit::<SeqExec, _>(&mut data, 0).is_empty());
    }

    #[test]
    fn test_lane_traversals() {
        let bodies: Vec<Body<1, 0>> = vec![];
        let info = LaneInfo {
            group: Dim3::new(1, 0, 0),
            groups: Dim3::new(3, 1, 1),
            lane: Dim3::new(2, 0, 0),
            lanes: Dim3::new(4, 1, 1),
        };
        let mut data = LoopData::new([range(0, 8)], [], &bodies, LaneCtx::detached(info));

        assert_eq!(visit::<GroupDirect<0>, _>(&mut data, 8), vec![(1, true)]);
        assert!(visit::<GroupDirect<0>, _>(&mut data, 1).is_empty());
        assert_eq!(
            visit::<GroupLoop<0>, _>(&mut data, 8),
            vec![(1, true), (4, true), (7, true)]
        );

        assert_eq!(visit::<LaneDirect<0>, _>(&mut data, 8), vec![(2, true)]);
        assert_eq!(visit::<LaneDirect<0>, _>(&mut data, 2), vec![(2, false)]);

        // the last stride is masked but still visited
        assert_eq!(
            visit::<LaneLoop<0>, _>(&mut data, 6),
            vec![(2, true), (6, false)]
        );
    }
}

use std::sync::{Arc, Barrier};

use super::{
    launch::Dim3,
    segment::{AnySegment, Segment},
};

pub type Index = i64;

/// A kernel body: receives the current index of every dimension and the parameter slots.
pub type Body<'a, const N: usize, const P: usize> =
    Box<dyn Fn(&[Index; N], &[Index; P]) + Send + Sync + 'a>;

/// What an execution backend contributes to an iteration context.
pub trait Context: Clone + Send + Sync {
    /// Blocks until every lane of the current group reaches the same point.
    fn sync(&self);
}

/// Context of host traversals. There is no group to synchronize with.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostCtx;

impl Context for HostCtx {
    #[inline]
    fn sync(&self) {}
}

/// Coordinates of a lane within a device launch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaneInfo {
    pub group: Dim3,
    pub groups: Dim3,
    pub lane: Dim3,
    pub lanes: Dim3,
}

#[derive(Debug, Clone)]
pub struct LaneCtx {
    pub info: LaneInfo,
    barrier: Arc<Barrier>,
}

impl LaneCtx {
    #[inline]
    pub fn new(info: LaneInfo, barrier: Arc<Barrier>) -> Self {
        Self { info, barrier }
    }

    /// A lane that belongs to no group. Synchronization returns immediately.
    #[inline]
    pub fn detached(info: LaneInfo) -> Self {
        Self::new(info, Arc::new(Barrier::new(1)))
    }
}

impl Context for LaneCtx {
    #[inline]
    fn sync(&self) {
        self.barrier.wait();
    }
}

/// Everything a statement may read or write while traversing.
pub trait Data: Clone + Send + Sync {
    type Segment: Segment;

    fn segment(&self, arg: usize) -> &Self::Segment;

    /// Replaces the view of dimension `arg`, returning the previous one.
    fn set_segment(&mut self, arg: usize, segment: Self::Segment) -> Self::Segment;

    fn offset(&self, arg: usize) -> Index;

    fn set_offset(&mut self, arg: usize, offset: Index);

    fn param(&self, param: usize) -> Index;

    fn set_param(&mut self, param: usize, value: Index);

    /// Runs body number `body` at the current position.
    fn invoke(&self, body: usize);

    fn sync(&self);
}

/// Iteration context of lanes on a device, the only place group and lane mappings are valid.
pub trait LaneData: Data {
    fn lane(&self) -> LaneInfo;
}

/// The iteration context of an `N`-dimensional loop nest with `P` parameter slots.
///
/// Parallel branches receive their own clone; the bodies are shared.
#[derive(Clone)]
pub struct LoopData<'a, C, const N: usize, const P: usize> {
    segments: [AnySegment<'a>; N],
    offsets: [Index; N],
    params: [Index; P],
    bodies: &'a [Body<'a, N, P>],
    ctx: C,
}

impl<'a, C: Context, const N: usize, const P: usize> LoopData<'a, C, N, P> {
    #[inline]
    pub fn new(
        segments: [AnySegment<'a>; N],
        params: [Index; P],
        bodies: &'a [Body<'a, N, P>],
        ctx: C,
    ) -> Self {
        Self {
            segments,
            offsets: [0; N],
            params,
            bodies,
            ctx,
        }
    }

    #[inline]
    pub fn ctx(&self) -> &C {
        &self.ctx
    }

    #[inline]
    pub fn with_ctx<D: Context>(&self, ctx: D) -> LoopData<'a, D, N, P> {
        LoopData {
            segments: self.segments.clone(),
            offsets: self.offsets,
            params: self.params,
            bodies: self.bodies,
            ctx,
        }
    }

    /// Returns the index of every dimension at the current position.
    #[inline]
    pub fn indices(&self) -> [Index; N] {
        std::array::from_fn(|arg| self.segments[arg].value(self.offsets[arg]))
    }
}

impl<C, const N: usize, const P: usize> std::fmt::Debug for LoopData<'_, C, N, P>
where
    C: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopData")
            .field("segments", &self.segments)
            .field("offsets", &self.offsets)
            .field("params", &self.params)
            .field("bodies", &self.bodies.len())
            .field("ctx", &self.ctx)
            .finish()
    }
}

impl<'a, C: Context, const N: usize, const P: usize> Data for LoopData<'a, C, N, P> {
    type Segment = AnySegment<'a>;

    #[inline]
    fn segment(&self, arg: usize) -> &Self::Segment {
        &self.segments[arg]
    }

    #[inline]
    fn set_segment(&mut self, arg: usize, segment: Self::Segment) -> Self::Segment {
        std::mem::replace(&mut self.segments[arg], segment)
    }

    #[inline]
    fn offset(&self, arg: usize) -> Index {
        self.offsets[arg]
    }

    #[inline]
    fn set_offset(&mut self, arg: usize, offset: Index) {
        self.offsets[arg] = offset;
    }

    #[inline]
    fn param(&self, param: usize) -> Index {
        self.params[param]
    }

    #[inline]
    fn set_param(&mut self, param: usize, value: Index) {
        self.params[param] = value;
    }

    #[inline]
    fn invoke(&self, body: usize) {
        match self.bodies.get(body) {
            Some(f) => f(&self.indices(), &self.params),
            #[cfg(feature = "strict")]
            None => panic!("body {body} is not attached ({} available)", self.bodies.len()),
            #[cfg(not(feature = "strict"))]
            None => log::warn!("body {body} is not attached, skipping"),
        }
    }

    #[inline]
    fn sync(&self) {
        self.ctx.sync();
    }
}

impl<const N: usize, const P: usize> LaneData for LoopData<'_, LaneCtx, N, P> {
    #[inline]
    fn lane(&self) -> LaneInfo {
        self.ctx.info
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::{Body, Data, HostCtx, Index, LoopData};
    use crate::loom::segment::{ListSegment, Segment, range};

    #[test]
    fn test_invoke_reads_views() {
        let seen = Mutex::new(vec![]);
        let bodies: Vec<Body<2, 1>> = vec![Box::new(|&[i, j]: &[Index; 2], &[p]: &[Index; 1]| {
            seen.lock().unwrap().push((i, j, p));
        })];
        let segments = [range(10, 20), ListSegment::owned(&[7, 3, 5]).into()];
        let mut data = LoopData::new(segments, [0], &bodies, HostCtx);

        data.set_offset(0, 4);
        data.set_offset(1, 2);
        data.set_param(0, 9);
        data.invoke(0);

        let old = data.set_segment(0, data.segment(0).slice(5, 5));
        assert_eq!(old.len(), 10);
        data.invoke(0);

        assert_eq!(*seen.lock().unwrap(), vec![(14, 5, 9), (19, 5, 9)]);
    }

    #[test]
    fn test_clone_is_independent() {
        let bodies: Vec<Body<1, 1>> = vec![];
        let mut data = LoopData::new([range(0, 8)], [0], &bodies, HostCtx);
        let mut copy = data.clone();

        copy.set_segment(0, copy.segment(0).slice(2, 2));
        copy.set_param(0, 1);
        data.set_offset(0, 3);

        assert_eq!(data.segment(0).len(), 8);
        assert_eq!(data.param(0), 0);
        assert_eq!(copy.offset(0), 0);
        assert_eq!(copy.indices(), [2 as Index]);
    }
}

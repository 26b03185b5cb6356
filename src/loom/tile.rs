use std::marker::PhantomData;

use super::{
    data::{Data, Index},
    launch::LaunchRequest,
    policy::Traversal,
    segment::Segment,
    statement::{Statement, impl_loop_statement},
};

/// Partitions dimension `ARG` into chunks of `CHUNK` indices and runs `S` once per chunk.
///
/// While a chunk is processed the dimension's view is narrowed to it; the original view is restored
/// once every chunk has been traversed. Only the final chunk may be shorter than `CHUNK`.
pub struct Tile<const ARG: usize, const CHUNK: usize, E, S = ()> {
    pub inner: S,
    phantom: PhantomData<fn() -> E>,
}

/// Like [`Tile`], additionally storing the tile number in parameter `PARAM`.
pub struct TileTCount<const ARG: usize, const PARAM: usize, const CHUNK: usize, E, S = ()> {
    pub inner: S,
    phantom: PhantomData<fn() -> E>,
}

impl_loop_statement!(Tile<ARG, CHUNK>);
impl_loop_statement!(TileTCount<ARG, PARAM, CHUNK>);

#[inline]
fn tile_count(len: Index, chunk: Index) -> Index {
    match len > 0 {
        true => (len - 1) / chunk + 1,
        false => 0,
    }
}

/// Runs `f` once per tile of dimension `arg`, with the view narrowed to the tile.
///
/// Tiles past the last one (masked lanes of a direct or strided mapping) see an empty view, so that
/// they can still reach the barriers of the enclosed statements.
fn traverse_tiles<D, E, F>(data: &mut D, arg: usize, chunk: Index, active: bool, f: F)
where
    D: Data,
    E: Traversal<D>,
    F: Fn(&mut D, Index, bool) + Send + Sync,
{
    let origin = data.segment(arg).clone();
    let tiles = tile_count(origin.len(), chunk);
    E::traverse(data, tiles, active, |data, tile, active| {
        let count = if tile < tiles { chunk } else { 0 };
        data.set_segment(arg, origin.slice(tile * chunk, count));
        f(data, tile, active);
    });
    data.set_segment(arg, origin);
}

/// Records the needs of a tiled loop: the tiles themselves, then the subtree over one full tile.
fn request_tiles<D, E, S>(
    inner: &S,
    data: &D,
    arg: usize,
    chunk: Index,
    request: &mut LaunchRequest,
) where
    D: Data,
    E: Traversal<D>,
    S: Statement<D>,
{
    E::request(tile_count(data.segment(arg).len(), chunk), request);
    let mut data = data.clone();
    let tile = data.segment(arg).slice(0, chunk);
    data.set_segment(arg, tile);
    inner.request(&data, request);
}

impl<D, E, S, const ARG: usize, const CHUNK: usize> Statement<D> for Tile<ARG, CHUNK, E, S>
where
    D: Data,
    E: Traversal<D>,
    S: Statement<D>,
{
    #[inline]
    fn exec(&self, data: &mut D, active: bool) {
        const { assert!(CHUNK > 0, "tile chunk must be positive") };
        traverse_tiles::<D, E, _>(data, ARG, CHUNK as Index, active, |data, _, active| {
            self.inner.exec(data, active)
        });
    }

    fn request(&self, data: &D, request: &mut LaunchRequest) {
        request_tiles::<D, E, S>(&self.inner, data, ARG, CHUNK as Index, request);
    }
}

impl<D, E, S, const ARG: usize, const PARAM: usize, const CHUNK: usize> Statement<D>
    for TileTCount<ARG, PARAM, CHUNK, E, S>
where
    D: Data,
    E: Traversal<D>,
    S: Statement<D>,
{
    #[inline]
    fn exec(&self, data: &mut D, active: bool) {
        const { assert!(CHUNK > 0, "tile chunk must be positive") };
        traverse_tiles::<D, E, _>(data, ARG, CHUNK as Index, active, |data, tile, active| {
            data.set_param(PARAM, tile);
            self.inner.exec(data, active)
        });
    }

    fn request(&self, data: &D, request: &mut LaunchRequest) {
        request_tiles::<D, E, S>(&self.inner, data, ARG, CHUNK as Index, request);
    }
}

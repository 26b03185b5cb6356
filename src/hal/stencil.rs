use strand_derive::Statement;
use thiserror::Error;

use crate::loom::{
    atomic::SharedArray,
    data::Index,
    device::Executor,
    launch::LaunchError,
    num::Scalar,
    policy::{GroupDirect, GroupLoop, LaneDirect, ParExec, SeqExec, SimdExec, X, Y},
    segment::range,
    statement::{For, Lambda, Policy},
    sync::LaneSync,
    tile::{Tile, TileTCount},
};

#[derive(Debug, Error)]
pub enum StencilError {
    #[error("field and tile must be non-empty")]
    Empty,
    #[error("field size {n} is not a multiple of tile width {width}")]
    Uneven { n: usize, width: usize },
    #[error("tile width {width} cannot hold a halo band of radius {radius}")]
    NarrowTile { width: usize, radius: usize },
    #[error("halo tile width {halo} does not match policy tile width {policy}")]
    WidthMismatch { halo: usize, policy: usize },
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

/// A policy tree that stages tiles of a fixed width, with the tile counters in its parameters.
pub trait Staged {
    const WIDTH: usize;
}

/// Geometry of halo-padded tiles over a periodic `n × n` field.
///
/// Dimension 0 is `x`, dimension 1 is `y`; field cells are stored row-major (`y * n + x`).
/// Every tile owns a `(width + 2·radius)²` region of the scratch buffer, addressed by the tile
/// counters `[tx, ty]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Halo {
    n: usize,
    width: usize,
    radius: usize,
}

impl Halo {
    pub fn new(n: usize, width: usize, radius: usize) -> Result<Self, StencilError> {
        if n == 0 || width == 0 {
            return Err(StencilError::Empty);
        }
        if n % width != 0 {
            return Err(StencilError::Uneven { n, width });
        }
        if width < 2 * radius {
            return Err(StencilError::NarrowTile { width, radius });
        }
        Ok(Self { n, width, radius })
    }

    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Side of a padded tile.
    #[inline]
    pub fn padded(&self) -> usize {
        self.width + 2 * self.radius
    }

    #[inline]
    pub fn tiles_per_axis(&self) -> usize {
        self.n / self.width
    }

    #[inline]
    pub fn scratch_len(&self) -> usize {
        self.padded() * self.padded()
    }

    /// Allocates scratch for every tile of the field.
    pub fn scratch<T: Scalar>(&self) -> SharedArray<T> {
        let tiles = self.tiles_per_axis();
        SharedArray::zeros(tiles * tiles * self.scratch_len())
    }

    /// Periodic wrap of a coordinate into `0..n`.
    #[inline]
    pub fn wrap(&self, i: Index) -> usize {
        i.rem_euclid(self.n as Index) as usize
    }

    /// Position of global cell `[gx, gy]` inside tile `[tx, ty]`.
    #[inline]
    pub fn local(&self, [gx, gy]: [Index; 2], [tx, ty]: [Index; 2]) -> [usize; 2] {
        let width = self.width as Index;
        [(gx - tx * width) as usize, (gy - ty * width) as usize]
    }

    /// Scratch address of padded position `[px, py]` of tile `[tx, ty]`.
    #[inline]
    pub fn at(&self, [tx, ty]: [Index; 2], [px, py]: [usize; 2]) -> usize {
        let tile = ty as usize * self.tiles_per_axis() + tx as usize;
        tile * self.scratch_len() + py * self.padded() + px
    }

    /// Loads the cells lane `global` is responsible for into the scratch of `tile`.
    ///
    /// Every lane loads its primary cell shifted by the radius; lanes within `2·radius` of the low
    /// edge of an axis also load the cell one tile width further along that axis, and the corner
    /// when both apply. Together the lanes of a tile fill the whole padded region.
    pub fn load<T: Scalar>(
        &self,
        field: &SharedArray<T>,
        scratch: &SharedArray<T>,
        global: [Index; 2],
        tile: [Index; 2],
    ) {
        let [gx, gy] = global;
        let [lx, ly] = self.local(global, tile);
        let (w, s) = (self.width as Index, self.radius as Index);
        let band = 2 * self.radius;

        let read = |x: Index, y: Index| field.load(self.wrap(y) * self.n + self.wrap(x));
        let write = |px: usize, py: usize, value: T| scratch.store(self.at(tile, [px, py]), value);

        write(lx, ly, read(gx - s, gy - s));
        if lx < band {
            write(lx + self.width, ly, read(gx + w - s, gy - s));
            if ly < band {
                write(
                    lx + self.width,
                    ly + self.width,
                    read(gx + w - s, gy + w - s),
                );
            }
        }
        if ly < band {
            write(lx, ly + self.width, read(gx - s, gy + w - s));
        }
    }

    /// Fails unless tiles of `S` have the width of this halo.
    pub fn check<S: Staged>(&self) -> Result<(), StencilError> {
        match S::WIDTH == self.width {
            true => Ok(()),
            false => Err(StencilError::WidthMismatch {
                halo: self.width,
                policy: S::WIDTH,
            }),
        }
    }

    /// Runs only the load phase of a staged tree, filling `scratch` from `field`.
    pub fn stage<E, S, T>(
        &self,
        executor: &E,
        tree: &S,
        field: &SharedArray<T>,
        scratch: &SharedArray<T>,
    ) -> Result<(), StencilError>
    where
        E: Executor,
        S: Policy<E::Context, 2, 2> + Staged,
        T: Scalar,
    {
        self.check::<S>()?;
        let n = self.n as Index;
        executor
            .launch(tree, [range(0, n), range(0, n)], [0, 0])
            .body(|&global, &tile| self.load(field, scratch, global, tile))
            .body(|_, _| {})
            .run()?;
        Ok(())
    }
}

/// Load with body 0, barrier, then compute with body 1, over the cells of the current tile.
type Phases<Ey, Ex> = (
    For<1, Ey, For<0, Ex, Lambda<0>>>,
    LaneSync,
    For<1, Ey, For<0, Ex, Lambda<1>>>,
);

/// Staged traversal on the calling thread. Parameters hold the tile counters `[tx, ty]`.
#[derive(Debug, Default, Statement)]
#[statement(crate = "crate")]
pub struct StagedSeq<const W: usize>(
    TileTCount<1, 1, W, SeqExec, TileTCount<0, 0, W, SeqExec, Phases<SeqExec, SimdExec>>>,
);

/// Staged traversal with rows of tiles spread over host threads.
#[derive(Debug, Default, Statement)]
#[statement(crate = "crate")]
pub struct StagedPar<const W: usize>(
    TileTCount<1, 1, W, ParExec, TileTCount<0, 0, W, SeqExec, Phases<SeqExec, SimdExec>>>,
);

/// Staged traversal with one group per tile and one lane per cell.
#[derive(Debug, Default, Statement)]
#[statement(crate = "crate")]
pub struct StagedDevice<const W: usize>(
    TileTCount<
        1,
        1,
        W,
        GroupDirect<Y>,
        TileTCount<0, 0, W, GroupDirect<X>, Phases<LaneDirect<Y>, LaneDirect<X>>>,
    >,
);

/// Staged traversal with groups striding over tiles, for fields with more tiles than groups.
#[derive(Debug, Default, Statement)]
#[statement(crate = "crate")]
pub struct StagedDeviceLoop<const W: usize>(
    TileTCount<
        1,
        1,
        W,
        GroupLoop<Y>,
        TileTCount<0, 0, W, GroupLoop<X>, Phases<LaneDirect<Y>, LaneDirect<X>>>,
    >,
);

macro_rules! impl_staged {
    ($($name:ident),+) => {
        $(impl<const W: usize> Staged for $name<W> {
            const WIDTH: usize = W;
        })+
    };
}

impl_staged!(StagedSeq, StagedPar, StagedDevice, StagedDeviceLoop);

/// Direct-indexed traversal on the calling thread.
pub type DirectSeq = For<1, SeqExec, For<0, SimdExec, Lambda<0>>>;

/// Direct-indexed traversal with rows spread over host threads.
pub type DirectPar = For<1, ParExec, For<0, SimdExec, Lambda<0>>>;

/// Direct-indexed traversal with one group per `W × W` block.
pub type DirectDevice<const W: usize> = Tile<
    1,
    W,
    GroupDirect<Y>,
    Tile<0, W, GroupDirect<X>, For<1, LaneDirect<Y>, For<0, LaneDirect<X>, Lambda<0>>>>,
>;

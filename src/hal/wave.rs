use std::f64::consts::PI;

use super::stencil::{DirectSeq, Halo, Staged, StencilError};
use crate::loom::{
    atomic::SharedArray,
    data::Index,
    device::{Executor, Host},
    launch::LaunchError,
    reduce::{ReduceMax, SeqReduce},
    segment::{AnySegment, range},
    statement::Policy,
};

/// Radius of the finite-difference stencil.
pub const RADIUS: usize = 2;

/// Fourth-order central-difference weights of the second derivative.
pub const COEFFS: [f64; 2 * RADIUS + 1] =
    [-1.0 / 12.0, 4.0 / 3.0, -5.0 / 2.0, 4.0 / 3.0, -1.0 / 12.0];

/// A uniform discretization of `[ox, ox + nx·dx)`, shared by both axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub ox: f64,
    pub dx: f64,
    pub nx: usize,
}

impl Grid {
    /// The periodic square `[-1, 1)²` with `16·factor` cells per axis.
    pub fn new(factor: usize) -> Self {
        Self {
            ox: -1.0,
            dx: 0.125 / factor as f64,
            nx: 16 * factor,
        }
    }

    #[inline]
    pub fn coord(&self, i: Index) -> f64 {
        self.ox + i as f64 * self.dx
    }

    #[inline]
    pub fn cells(&self) -> usize {
        self.nx * self.nx
    }

    #[inline]
    pub fn segments(&self) -> [AnySegment<'static>; 2] {
        let nx = self.nx as Index;
        [range(0, nx), range(0, nx)]
    }
}

/// Analytic solution of `P_tt = c²(P_xx + P_yy)` with `c² = 1/2` on the periodic square.
#[inline]
pub fn solution(t: f64, x: f64, y: f64) -> f64 {
    (2.0 * PI * t).cos() * (2.0 * PI * x).sin() * (2.0 * PI * y).sin()
}

/// Time stepping of a solve up to `t_final`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schedule {
    pub dt: f64,
    pub steps: usize,
    /// `c²·dt²/dx²`, the weight of the Laplacian in one step.
    pub ct: f64,
}

impl Schedule {
    pub fn new(grid: &Grid, cc: f64, t_final: f64) -> Self {
        let dt = 0.01 * grid.dx / cc.sqrt();
        let steps = (t_final / dt).ceil() as usize;
        let dt = t_final / steps as f64;
        let ct = cc * dt * dt / (grid.dx * grid.dx);
        Self { dt, steps, ct }
    }
}

/// The two time levels of the field. `p2` is the current level; a step overwrites `p1` with the
/// next one, after which the levels are swapped.
#[derive(Debug)]
pub struct Fields {
    pub p1: SharedArray<f64>,
    pub p2: SharedArray<f64>,
}

impl Fields {
    pub fn new(grid: &Grid) -> Self {
        Self {
            p1: SharedArray::zeros(grid.cells()),
            p2: SharedArray::zeros(grid.cells()),
        }
    }

    /// Samples the analytic solution at `t0` into `p1` and at `t1` into `p2`.
    pub fn set_initial(
        &self,
        host: &Host,
        grid: &Grid,
        t0: f64,
        t1: f64,
    ) -> Result<(), LaunchError> {
        let Self { p1, p2 } = self;
        host.kernel(&DirectSeq::default(), grid.segments(), |&[tx, ty], _| {
            let id = ty as usize * grid.nx + tx as usize;
            let (x, y) = (grid.coord(tx), grid.coord(ty));
            p1.store(id, solution(t0, x, y));
            p2.store(id, solution(t1, x, y));
        })
    }

    #[inline]
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.p1, &mut self.p2);
    }
}

/// Maximum pointwise deviation of `field` from the analytic solution at time `t`.
pub fn max_error(
    host: &Host,
    grid: &Grid,
    field: &SharedArray<f64>,
    t: f64,
) -> Result<f64, LaunchError> {
    let error = ReduceMax::<SeqReduce, f64>::new(-1.0);
    host.kernel(&DirectSeq::default(), grid.segments(), |&[tx, ty], _| {
        let id = ty as usize * grid.nx + tx as usize;
        let exact = solution(t, grid.coord(tx), grid.coord(ty));
        error.max((field.load(id) - exact).abs());
    })?;
    Ok(error.into_inner())
}

/// Advances one time step reading the field directly with periodic wrap.
pub fn step_direct<E, S>(
    executor: &E,
    tree: &S,
    grid: &Grid,
    fields: &Fields,
    ct: f64,
) -> Result<(), LaunchError>
where
    E: Executor,
    S: Policy<E::Context, 2, 0>,
{
    let Fields { p1, p2 } = fields;
    let n = grid.nx as Index;
    let wrap = |i: Index| i.rem_euclid(n) as usize;
    let r = RADIUS as Index;

    executor.kernel(tree, grid.segments(), |&[tx, ty], _| {
        let id = ty as usize * grid.nx + tx as usize;
        let mut lap = 0.0;
        for (offset, c) in (-r..=r).zip(COEFFS) {
            lap += c * p2.load(ty as usize * grid.nx + wrap(tx + offset));
            lap += c * p2.load(wrap(ty + offset) * grid.nx + tx as usize);
        }
        p1.store(id, 2.0 * p2.load(id) - p1.load(id) + ct * lap);
    })
}

/// Advances one time step, staging each tile with its halo through `scratch` first.
///
/// Fails without touching the fields if the tiles of `tree` and `halo` differ in width.
pub fn step_staged<E, S>(
    executor: &E,
    tree: &S,
    halo: &Halo,
    scratch: &SharedArray<f64>,
    fields: &Fields,
    ct: f64,
) -> Result<(), StencilError>
where
    E: Executor,
    S: Policy<E::Context, 2, 2> + Staged,
{
    halo.check::<S>()?;
    let Fields { p1, p2 } = fields;
    let n = halo.n() as Index;
    let s = halo.radius();

    executor
        .launch(tree, [range(0, n), range(0, n)], [0, 0])
        .body(|&global, &tile| halo.load(p2, scratch, global, tile))
        .body(|&[tx, ty], &tile| {
            let [lx, ly] = halo.local([tx, ty], tile);
            let id = ty as usize * halo.n() + tx as usize;
            let mut lap = 0.0;
            for (i, c) in COEFFS.into_iter().enumerate() {
                lap += c * scratch.load(halo.at(tile, [lx + i, ly + s]));
                lap += c * scratch.load(halo.at(tile, [lx + s, ly + i]));
            }
            p1.store(id, 2.0 * p2.load(id) - p1.load(id) + ct * lap);
        })
        .run()?;
    Ok(())
}

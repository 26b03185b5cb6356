//! Hardware-mapped patterns built on [`loom`](crate::loom).
//!
//! [`stencil`] stages halo-padded tiles of a periodic field through per-tile scratch, and
//! [`wave`] drives a fourth-order acoustic wave step with it, next to a direct-indexed reference.

pub mod stencil;
pub mod wave;

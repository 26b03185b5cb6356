//! The `loom` module is the nested-loop execution engine.
//! A loop nest is described declaratively (one segment per dimension) and lowered onto hardware by
//! a policy tree, without touching the kernel bodies that run at its leaves.
//!
//! ## Key Components
//! 1. **Segments**:
//!    - Contiguous ranges and explicit index lists (`RangeSegment`, `ListSegment`).
//!    - Slicing narrows a view and never copies index storage.
//!
//! 2. **Iteration Context**:
//!    - `LoopData` carries the segment views, current offsets, parameter slots and bodies.
//!    - Parallel branches always receive their own copy.
//!
//! 3. **Policy Tree**:
//!    - Statements (`For`, `Tile`, `TileTCount`, `LaneSync`, `Lambda`) composed as types.
//!    - Traversal policies (`SeqExec`, `SimdExec`, `ParExec`, group and lane mappings).
//!
//! 4. **Backends**:
//!    - `Host` runs trees on the calling thread or a `rayon` pool.
//!    - `Device` runs trees on groups of barrier-synchronized lanes.
//!
//! 5. **Accumulation**:
//!    - Lock-free atomic slots and shared arrays.
//!    - Order-independent `Max`, `Min` and `Sum` reductions.

pub mod atomic;
pub mod data;
pub mod device;
pub mod launch;
pub mod num;
pub mod platform;
pub mod policy;
pub mod reduce;
pub mod segment;
pub mod statement;
pub mod sync;
pub mod tile;

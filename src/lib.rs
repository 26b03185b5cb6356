//! Portable nested-loop execution.
//!
//! A kernel body is written once and executed under interchangeable policy trees that map
//! each loop level onto sequential, vectorized, multi-threaded, or grouped-lane hardware.
//! See [`loom`] for the engine and [`hal`] for patterns built on top of it.

pub mod hal;
pub mod loom;

pub mod prelude {
    pub use crate::loom::{
        data::{Data, Index, LaneData, LoopData},
        device::{Device, DeviceBuilder, Executor, Host, HostBuilder, Kernel},
        launch::{Dim3, LaunchError, LaunchRequest, Limits},
        policy::{
            GroupDirect, GroupLoop, LaneDirect, LaneLoop, ParExec, SeqExec, SimdExec, X, Y, Z,
        },
        reduce::{ParReduce, ReduceMax, ReduceMin, ReduceSum, SeqReduce},
        segment::{AnySegment, ListSegment, RangeSegment, Segment, range},
        statement::{For, ForICount, Lambda, Policy, Statement},
        sync::LaneSync,
        tile::{Tile, TileTCount},
    };
}

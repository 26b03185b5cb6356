use super::{data::Data, statement::Statement};

/// A barrier across every lane of the current group.
///
/// Masked lanes synchronize too; a lane that skips a barrier its group reaches deadlocks the group.
/// On the host this is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct LaneSync;

impl<D: Data> Statement<D> for LaneSync {
    #[inline]
    fn exec(&self, data: &mut D, _active: bool) {
        data.sync();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        error::Error,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::LaneSync;
    use crate::loom::{
        atomic::SharedArray,
        device::{DeviceBuilder, Executor, Host},
        launch::{Dim3, Limits},
        policy::{GroupDirect, LaneDirect, LaneLoop, SeqExec, X},
        segment::range,
        statement::{For, Lambda},
        tile::Tile,
    };

    #[test]
    fn test_barrier_orders_phases() -> Result<(), Box<dyn Error>> {
        const W: usize = 8;
        let n = 30;
        let device = DeviceBuilder::new().build();

        // every lane writes its own slot, then reads its right neighbour's slot within the tile
        let scratch = SharedArray::<i64>::zeros(n);
        let output = SharedArray::<i64>::zeros(n);
        let tree = Tile::<
            0,
            W,
            GroupDirect<X>,
            (
                For<0, LaneDirect<X>, Lambda<0>>,
                LaneSync,
                For<0, LaneDirect<X>, Lambda<1>>,
            ),
        >::default();

        let neighbour = |i: usize| {
            let tile = i / W * W;
            tile + (i - tile + 1) % W.min(n - tile)
        };
        device
            .launch(&tree, [range(0, n as i64)], [])
            .body(|&[i], _| scratch.store(i as usize, i + 1))
            .body(|&[i], _| {
                let i = i as usize;
                output.store(i, scratch.load(neighbour(i)));
            })
            .run()?;

        for (i, value) in output.to_vec().into_iter().enumerate() {
            assert_eq!(value, neighbour(i) as i64 + 1, "cell {i}");
        }
        Ok(())
    }

    #[test]
    fn test_masked_lanes_reach_barrier() -> Result<(), Box<dyn Error>> {
        let device = DeviceBuilder::new().parallel(false).build();
        let calls = AtomicUsize::new(0);

        // 29 indices on 16-lane groups: three lanes of the last group carry no work
        let tree = Tile::<
            0,
            16,
            GroupDirect<X>,
            (For<0, LaneDirect<X>, Lambda<0>>, LaneSync, For<0, LaneDirect<X>, Lambda<0>>),
        >::default();
        device.kernel(&tree, [range(0, 29)], |_, _| {
            calls.fetch_add(1, Ordering::Relaxed);
        })?;
        assert_eq!(calls.load(Ordering::Relaxed), 58);
        Ok(())
    }

    #[test]
    fn test_barrier_inside_lane_loop() -> Result<(), Box<dyn Error>> {
        const LANES: usize = 4;
        let n = 10;
        let device = DeviceBuilder::new()
            .with_limits(Limits {
                max_lanes: Dim3::new(LANES, 1, 1),
                max_lanes_total: LANES,
                ..Default::default()
            })
            .build();

        // the last stride has two active lanes; the other two must still reach the barrier
        let scratch = SharedArray::<i64>::zeros(n);
        let output = SharedArray::<i64>::zeros(n);
        let tree = For::<0, LaneLoop<X>, (Lambda<0>, LaneSync, Lambda<1>)>::default();

        let neighbour = |i: usize| {
            let base = i / LANES * LANES;
            base + (i - base + 1) % LANES.min(n - base)
        };
        device
            .launch(&tree, [range(0, n as i64)], [])
            .body(|&[i], _| scratch.store(i as usize, i + 1))
            .body(|&[i], _| {
                let i = i as usize;
                output.store(i, scratch.load(neighbour(i)));
            })
            .run()?;

        for (i, value) in output.to_vec().into_iter().enumerate() {
            assert_eq!(value, neighbour(i) as i64 + 1, "cell {i}");
        }
        Ok(())
    }

    #[test]
    fn test_host_sync_is_noop() -> Result<(), Box<dyn Error>> {
        let calls = AtomicUsize::new(0);
        let tree = For::<0, SeqExec, (Lambda<0>, LaneSync)>::default();
        Host::default().kernel(&tree, [range(0, 5)], |_, _| {
            calls.fetch_add(1, Ordering::Relaxed);
        })?;
        assert_eq!(calls.load(Ordering::Relaxed), 5);
        Ok(())
    }
}

use std::marker::PhantomData;

use derive_more::Deref;

use super::{
    atomic::AtomicSlot,
    num::{Scalar, WrappingArith},
    platform,
};

/// Decides how many partial slots a reducer keeps.
pub trait ReducePolicy: Send + Sync {
    fn shards() -> usize;
}

/// A single partial slot. Suited to sequential traversals.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeqReduce;

/// One partial slot per group of threads, merged on finalization.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParReduce;

impl ReducePolicy for SeqReduce {
    #[inline]
    fn shards() -> usize {
        1
    }
}

impl ReducePolicy for ParReduce {
    #[inline]
    fn shards() -> usize {
        platform::shard_count()
    }
}

/// An associative and commutative operator.
pub trait ReduceOp<T: Scalar>: Send + Sync {
    fn identity() -> T;

    fn merge(x: T, y: T) -> T;

    /// Folds `value` into a partial slot.
    fn combine(slot: &AtomicSlot<T>, value: T);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Max;

#[derive(Debug, Default, Clone, Copy)]
pub struct Min;

#[derive(Debug, Default, Clone, Copy)]
pub struct Sum;

impl<T: Scalar> ReduceOp<T> for Max {
    #[inline]
    fn identity() -> T {
        T::lowest()
    }

    #[inline]
    fn merge(x: T, y: T) -> T {
        if y > x { y } else { x }
    }

    #[inline]
    fn combine(slot: &AtomicSlot<T>, value: T) {
        slot.fetch_max(value);
    }
}

impl<T: Scalar> ReduceOp<T> for Min {
    #[inline]
    fn identity() -> T {
        T::highest()
    }

    #[inline]
    fn merge(x: T, y: T) -> T {
        if y < x { y } else { x }
    }

    #[inline]
    fn combine(slot: &AtomicSlot<T>, value: T) {
        slot.fetch_min(value);
    }
}

impl<T: Scalar> ReduceOp<T> for Sum {
    #[inline]
    fn identity() -> T {
        T::zero()
    }

    #[inline]
    fn merge(x: T, y: T) -> T {
        x.wrapping_add(y)
    }

    #[inline]
    fn combine(slot: &AtomicSlot<T>, value: T) {
        slot.fetch_add(value);
    }
}

#[repr(align(64))]
#[derive(Debug, Default, Deref)]
struct Padded<T>(T);

/// A running reduction that kernel bodies update concurrently through a shared reference.
///
/// The result is read with [`Reducer::finalize`], which takes `&mut self`: once the borrow checker
/// grants it, every body holding the reducer has finished.
pub struct Reducer<R, O, T> {
    init: T,
    shards: Box<[Padded<AtomicSlot<T>>]>,
    phantom: PhantomData<fn() -> (R, O)>,
}

pub type ReduceMax<R, T> = Reducer<R, Max, T>;
pub type ReduceMin<R, T> = Reducer<R, Min, T>;
pub type ReduceSum<R, T> = Reducer<R, Sum, T>;

impl<R, O, T> std::fmt::Debug for Reducer<R, O, T>
where
    T: Scalar,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reducer")
            .field("op", &std::any::type_name::<O>())
            .field("init", &self.init)
            .field("shards", &self.shards.len())
            .finish()
    }
}

impl<R, O, T> Reducer<R, O, T>
where
    R: ReducePolicy,
    O: ReduceOp<T>,
    T: Scalar,
{
    /// Creates a reducer seeded with `init`.
    pub fn new(init: T) -> Self {
        let shards = (0..R::shards().max(1))
            .map(|_| Padded(AtomicSlot::new(O::identity())))
            .collect();
        Self {
            init,
            shards,
            phantom: PhantomData,
        }
    }

    #[inline]
    pub fn update(&self, value: T) {
        let shard = match self.shards.len() {
            1 => 0,
            count => platform::shard(count),
        };
        O::combine(&self.shards[shard], value);
    }

    /// Merges every partial into the seed.
    pub fn finalize(&mut self) -> T {
        self.shards
            .iter()
            .map(|slot| slot.load())
            .fold(self.init, O::merge)
    }

    /// Discards all updates and reseeds with `init`.
    pub fn reset(&mut self, init: T) {
        self.init = init;
        for slot in self.shards.iter() {
            slot.store(O::identity());
        }
    }

    #[inline]
    pub fn into_inner(mut self) -> T {
        self.finalize()
    }
}

impl<R: ReducePolicy, T: Scalar> Reducer<R, Max, T> {
    #[inline]
    pub fn max(&self, value: T) {
        self.update(value);
    }
}

impl<R: ReducePolicy, T: Scalar> Reducer<R, Min, T> {
    #[inline]
    pub fn min(&self, value: T) {
        self.update(value);
    }
}

impl<R: ReducePolicy, T: Scalar> Reducer<R, Sum, T> {
    #[inline]
    pub fn sum(&self, value: T) {
        self.update(value);
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use itertools::Itertools;

    use super::{ParReduce, ReduceMax, ReduceMin, ReduceSum, SeqReduce};
    use crate::loom::{
        data::Index,
        device::{DeviceBuilder, Executor, Host},
        launch::{Dim3, Limits},
        policy::{GroupLoop, LaneLoop, ParExec, SeqExec, X},
        segment::{ListSegment, range},
        statement::{For, Lambda, Policy},
        tile::Tile,
    };

    #[test]
    fn test_max_seeded() {
        fastrand::seed(42);
        let mut values = vec![0.2, 0.05, 0.31, 0.04];
        for _ in 0..8 {
            fastrand::shuffle(&mut values);

            let mut seq = ReduceMax::<SeqReduce, f64>::new(-1.0);
            values.iter().for_each(|&x| seq.max(x));
            assert_eq!(seq.finalize(), 0.31);

            let par = ReduceMax::<ParReduce, f64>::new(-1.0);
            std::thread::scope(|scope| {
                for &x in &values {
                    let par = &par;
                    scope.spawn(move || par.max(x));
                }
            });
            assert_eq!(par.into_inner(), 0.31);
        }

        let mut empty = ReduceMax::<ParReduce, f64>::new(-1.0);
        assert_eq!(empty.finalize(), -1.0);
    }

    fn reduce<E, S>(
        executor: &E,
        tree: &S,
        segment: ListSegment<'_>,
        values: &[i64],
    ) -> Result<(i64, i64, i64), Box<dyn Error>>
    where
        E: Executor,
        S: Policy<E::Context, 1, 0>,
    {
        let r_sum = ReduceSum::<ParReduce, i64>::new(0);
        let r_max = ReduceMax::<ParReduce, i64>::new(i64::MIN);
        let r_min = ReduceMin::<ParReduce, i64>::new(i64::MAX);
        executor.kernel(tree, [segment.into()], |&[i], _| {
            let x = values[i as usize];
            r_sum.sum(x);
            r_max.max(x);
            r_min.min(x);
        })?;
        Ok((r_sum.into_inner(), r_max.into_inner(), r_min.into_inner()))
    }

    #[test]
    fn test_reduce_any_order() -> Result<(), Box<dyn Error>> {
        fastrand::seed(42);
        let values = (0..500).map(|_| fastrand::i64(-1000..1000)).collect_vec();
        let expected = (
            values.iter().sum::<i64>(),
            values.iter().copied().max().unwrap_or_default(),
            values.iter().copied().min().unwrap_or_default(),
        );

        let host = Host::default();
        let device = DeviceBuilder::new()
            .with_limits(Limits {
                max_groups: Dim3::new(4, 1, 1),
                max_lanes: Dim3::new(8, 1, 1),
                max_lanes_total: 8,
            })
            .build();

        for _ in 0..4 {
            // visit the values in a shuffled order
            let mut order = (0..values.len() as Index).collect_vec();
            fastrand::shuffle(&mut order);
            let segment = ListSegment::from(order);

            let tree = For::<0, ParExec, Lambda<0>>::default();
            assert_eq!(reduce(&host, &tree, segment.clone(), &values)?, expected);

            let tree = Tile::<0, 16, GroupLoop<X>, For<0, LaneLoop<X>, Lambda<0>>>::default();
            assert_eq!(reduce(&device, &tree, segment, &values)?, expected);
        }
        Ok(())
    }

    #[test]
    fn test_reset() -> Result<(), Box<dyn Error>> {
        let mut sum = ReduceSum::<SeqReduce, i64>::new(5);
        sum.sum(3);
        assert_eq!(sum.finalize(), 8);

        sum.reset(100);
        Host::default().forall::<SeqExec, _>(range(0, 10), |i| sum.sum(i))?;
        assert_eq!(sum.finalize(), 145);
        Ok(())
    }

    #[test]
    fn test_sum_wraps() {
        let mut sum = ReduceSum::<SeqReduce, i64>::new(i64::MAX);
        sum.sum(1);
        assert_eq!(sum.finalize(), i64::MIN);

        let sum = ReduceSum::<ParReduce, i64>::new(1);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| sum.sum(i64::MAX));
            }
        });
        assert_eq!(sum.into_inner(), 1i64.wrapping_add(i64::MAX.wrapping_mul(4)));
    }
}

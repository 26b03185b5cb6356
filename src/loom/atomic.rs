use std::sync::atomic::{AtomicU64, Ordering};

use derive_more::Deref;

use super::num::{Scalar, WrappingArith};

#[inline]
fn encode<T: Scalar>(value: T) -> u64 {
    let mut bytes = [0u8; 8];
    bytes[..size_of::<T>()].copy_from_slice(bytemuck::bytes_of(&value));
    u64::from_ne_bytes(bytes)
}

#[inline]
fn decode<T: Scalar>(bits: u64) -> T {
    let bytes = bits.to_ne_bytes();
    bytemuck::pod_read_unaligned(&bytes[..size_of::<T>()])
}

/// A lock-free cell holding one scalar.
///
/// Comparisons in [`AtomicSlot::compare_exchange`] are bitwise.
#[repr(transparent)]
pub struct AtomicSlot<T> {
    bits: AtomicU64,
    phantom: std::marker::PhantomData<T>,
}

impl<T: Scalar> Default for AtomicSlot<T> {
    #[inline]
    fn default() -> Self {
        Self::new(T::zero())
    }
}

impl<T: Scalar> std::fmt::Debug for AtomicSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AtomicSlot").field(&self.load()).finish()
    }
}

impl<T: Scalar> AtomicSlot<T> {
    #[inline]
    pub fn new(value: T) -> Self {
        const { assert!(size_of::<T>() <= size_of::<u64>()) };
        Self {
            bits: AtomicU64::new(encode(value)),
            phantom: std::marker::PhantomData,
        }
    }

    #[inline]
    pub fn load(&self) -> T {
        decode(self.bits.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, value: T) {
        self.bits.store(encode(value), Ordering::Release);
    }

    #[inline]
    pub fn swap(&self, value: T) -> T {
        decode(self.bits.swap(encode(value), Ordering::AcqRel))
    }

    #[inline]
    pub fn compare_exchange(&self, current: T, new: T) -> Result<T, T> {
        self.bits
            .compare_exchange(
                encode(current),
                encode(new),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(decode)
            .map_err(decode)
    }

    /// Applies `f` until it succeeds or returns `None`. Returns the previous value.
    #[inline]
    pub fn fetch_update(&self, mut f: impl FnMut(T) -> Option<T>) -> Result<T, T> {
        self.bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                f(decode(bits)).map(encode)
            })
            .map(decode)
            .map_err(decode)
    }

    #[inline]
    fn update(&self, f: impl Fn(T) -> Option<T>) -> T {
        match self.fetch_update(f) {
            Ok(value) | Err(value) => value,
        }
    }

    /// Adds `value`; integers wrap around on overflow.
    #[inline]
    pub fn fetch_add(&self, value: T) -> T {
        self.update(|x| Some(x.wrapping_add(value)))
    }

    /// Subtracts `value`; integers wrap around on overflow.
    #[inline]
    pub fn fetch_sub(&self, value: T) -> T {
        self.update(|x| Some(x.wrapping_sub(value)))
    }

    #[inline]
    pub fn fetch_min(&self, value: T) -> T {
        self.update(|x| (value < x).then_some(value))
    }

    #[inline]
    pub fn fetch_max(&self, value: T) -> T {
        self.update(|x| (value > x).then_some(value))
    }

    #[inline]
    pub fn fetch_inc(&self) -> T {
        self.fetch_add(T::one())
    }

    #[inline]
    pub fn fetch_dec(&self) -> T {
        self.fetch_sub(T::one())
    }

    /// Increments, wrapping to zero once the value reaches `limit`.
    #[inline]
    pub fn fetch_inc_wrap(&self, limit: T) -> T {
        self.update(|x| match x >= limit {
            true => Some(T::zero()),
            false => Some(x + T::one()),
        })
    }

    /// Decrements, wrapping to `limit` at zero or when the value exceeds `limit`.
    #[inline]
    pub fn fetch_dec_wrap(&self, limit: T) -> T {
        self.update(|x| match x == T::zero() || x > limit {
            true => Some(limit),
            false => Some(x.wrapping_sub(T::one())),
        })
    }

    #[inline]
    pub fn into_inner(self) -> T {
        decode(self.bits.into_inner())
    }
}

/// A fixed array of atomic slots, writable from every lane.
#[derive(Deref)]
#[deref(forward)]
pub struct SharedArray<T>(Box<[AtomicSlot<T>]>);

impl<T: Scalar> std::fmt::Debug for SharedArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

impl<T: Scalar> SharedArray<T> {
    #[inline]
    pub fn filled(len: usize, value: T) -> Self {
        Self((0..len).map(|_| AtomicSlot::new(value)).collect())
    }

    #[inline]
    pub fn zeros(len: usize) -> Self {
        Self::filled(len, T::zero())
    }

    #[inline]
    pub fn from_slice(values: &[T]) -> Self {
        Self(values.iter().copied().map(AtomicSlot::new).collect())
    }

    #[inline]
    pub fn load(&self, index: usize) -> T {
        self.0[index].load()
    }

    #[inline]
    pub fn store(&self, index: usize, value: T) {
        self.0[index].store(value);
    }

    /// Copies the current contents out.
    pub fn to_vec(&self) -> Vec<T> {
        self.0.iter().map(AtomicSlot::load).collect()
    }

    /// Overwrites the contents with `values`.
    ///
    /// # Panics
    /// Panics if the lengths differ.
    pub fn copy_from_slice(&self, values: &[T]) {
        assert_eq!(self.0.len(), values.len(), "length mismatch");
        for (slot, &value) in self.0.iter().zip(values) {
            slot.store(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use half::f16;
    use rayon::prelude::*;

    use super::{AtomicSlot, SharedArray};

    #[test]
    fn test_concurrent_math() {
        let sum = AtomicSlot::<i64>::default();
        let max = AtomicSlot::new(f64::NEG_INFINITY);
        let min = AtomicSlot::new(u32::MAX);
        (0..1000i64).into_par_iter().for_each(|x| {
            sum.fetch_add(x);
            max.fetch_max(x as f64 * 0.5);
            min.fetch_min(1000 - x as u32);
        });
        assert_eq!(sum.load(), 499500);
        assert_eq!(max.load(), 499.5);
        assert_eq!(min.load(), 1);

        let counter = AtomicSlot::<u64>::default();
        (0..64).into_par_iter().for_each(|_| {
            counter.fetch_inc();
        });
        (0..16).into_par_iter().for_each(|_| {
            counter.fetch_dec();
        });
        assert_eq!(counter.into_inner(), 48);
    }

    #[test]
    fn test_wrapping_counters() {
        let slot = AtomicSlot::new(2u32);
        assert_eq!(slot.fetch_inc_wrap(3), 2);
        assert_eq!(slot.fetch_inc_wrap(3), 3);
        assert_eq!(slot.load(), 0);

        assert_eq!(slot.fetch_dec_wrap(3), 0);
        assert_eq!(slot.load(), 3);
        assert_eq!(slot.fetch_dec_wrap(3), 3);
        assert_eq!(slot.load(), 2);

        slot.store(9);
        slot.fetch_dec_wrap(3);
        assert_eq!(slot.load(), 3);
    }

    #[test]
    fn test_integer_math_wraps() {
        let slot = AtomicSlot::new(i64::MAX);
        assert_eq!(slot.fetch_add(1), i64::MAX);
        assert_eq!(slot.load(), i64::MIN);
        assert_eq!(slot.fetch_sub(1), i64::MIN);
        assert_eq!(slot.load(), i64::MAX);

        let slot = AtomicSlot::<u32>::default();
        assert_eq!(slot.fetch_dec(), 0);
        assert_eq!(slot.load(), u32::MAX);
    }

    #[test]
    fn test_exchange_and_half() {
        let slot = AtomicSlot::new(f16::from_f32(1.5));
        assert_eq!(slot.swap(f16::from_f32(-2.0)), f16::from_f32(1.5));
        assert_eq!(
            slot.compare_exchange(f16::from_f32(-2.0), f16::ONE),
            Ok(f16::from_f32(-2.0))
        );
        assert_eq!(slot.compare_exchange(f16::ZERO, f16::ONE), Err(f16::ONE));
        assert_eq!(slot.fetch_sub(f16::ONE), f16::ONE);
        assert_eq!(slot.load(), f16::ZERO);

        let array = SharedArray::from_slice(&[1.0f32, 2.0, 3.0]);
        array.store(1, -2.0);
        array[2].fetch_add(0.5);
        assert_eq!(array.len(), 3);
        assert_eq!(array.to_vec(), vec![1.0, -2.0, 3.5]);
    }
}

use bytemuck::Pod;
use derive_more::Display;
use half::f16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    F16,
    F32,
    F64,
    I32,
    I64,
    U32,
    U64,
}

impl DataType {
    /// Returns the size in bytes of one element.
    pub const fn size(self) -> usize {
        match self {
            DataType::F16 => 2,
            DataType::F32 | DataType::I32 | DataType::U32 => 4,
            DataType::F64 | DataType::I64 | DataType::U64 => 8,
        }
    }
}

pub trait Zero {
    fn zero() -> Self;
}

pub trait One {
    fn one() -> Self;
}

/// Smallest and largest values of a type, the identities of `max` and `min`.
pub trait Bounded {
    fn lowest() -> Self;
    fn highest() -> Self;
}

macro_rules! impl_num {
    ($ty:ty, $zero:expr, $one:expr, $lowest:expr, $highest:expr) => {
        impl Zero for $ty {
            #[inline]
            fn zero() -> Self {
                $zero
            }
        }

        impl One for $ty {
            #[inline]
            fn one() -> Self {
                $one
            }
        }

        impl Bounded for $ty {
            #[inline]
            fn lowest() -> Self {
                $lowest
            }

            #[inline]
            fn highest() -> Self {
                $highest
            }
        }
    };
}

impl_num!(f16, f16::ZERO, f16::ONE, f16::NEG_INFINITY, f16::INFINITY);
impl_num!(f32, 0.0, 1.0, f32::NEG_INFINITY, f32::INFINITY);
impl_num!(f64, 0.0, 1.0, f64::NEG_INFINITY, f64::INFINITY);
impl_num!(i32, 0, 1, i32::MIN, i32::MAX);
impl_num!(i64, 0, 1, i64::MIN, i64::MAX);
impl_num!(u32, 0, 1, u32::MIN, u32::MAX);
impl_num!(u64, 0, 1, u64::MIN, u64::MAX);

/// Addition and subtraction that wrap around on integer overflow. Floats add as usual.
pub trait WrappingArith {
    fn wrapping_add(self, rhs: Self) -> Self;
    fn wrapping_sub(self, rhs: Self) -> Self;
}

macro_rules! impl_wrapping {
    (int: $($ty:ty),+) => {
        $(impl WrappingArith for $ty {
            #[inline]
            fn wrapping_add(self, rhs: Self) -> Self {
                <$ty>::wrapping_add(self, rhs)
            }

            #[inline]
            fn wrapping_sub(self, rhs: Self) -> Self {
                <$ty>::wrapping_sub(self, rhs)
            }
        })+
    };
    (float: $($ty:ty),+) => {
        $(impl WrappingArith for $ty {
            #[inline]
            fn wrapping_add(self, rhs: Self) -> Self {
                self + rhs
            }

            #[inline]
            fn wrapping_sub(self, rhs: Self) -> Self {
                self - rhs
            }
        })+
    };
}

impl_wrapping!(int: i32, i64, u32, u64);
impl_wrapping!(float: f16, f32, f64);

/// A value that fits in one atomic word and supports the reduction operators.
pub trait Scalar:
    Sized
    + Pod
    + PartialOrd
    + Zero
    + One
    + Bounded
    + WrappingArith
    + std::ops::Add<Output = Self>
    + std::ops::Sub<Output = Self>
    + std::fmt::Debug
    + Send
    + Sync
    + sealed::Sealed
    + 'static
{
    const DATA_TYPE: DataType;
}

impl Scalar for f16 {
    const DATA_TYPE: DataType = DataType::F16;
}

impl Scalar for f32 {
    const DATA_TYPE: DataType = DataType::F32;
}

impl Scalar for f64 {
    const DATA_TYPE: DataType = DataType::F64;
}

impl Scalar for i32 {
    const DATA_TYPE: DataType = DataType::I32;
}

impl Scalar for i64 {
    const DATA_TYPE: DataType = DataType::I64;
}

impl Scalar for u32 {
    const DATA_TYPE: DataType = DataType::U32;
}

impl Scalar for u64 {
    const DATA_TYPE: DataType = DataType::U64;
}

mod sealed {
    use half::f16;

    pub trait Sealed {}

    impl Sealed for f16 {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
}

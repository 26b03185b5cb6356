use std::marker::PhantomData;

use casey::snake;

pub use super::{data::Data, launch::LaunchRequest};
use super::{
    data::{Context, LoopData},
    policy::Traversal,
    segment::Segment,
};

/// A node of a policy tree.
///
/// `exec` performs one level of iteration and recurses into the enclosed statements.
/// `active` is `false` on lanes that are masked; such lanes must still reach every barrier.
pub trait Statement<D: Data>: Send + Sync {
    fn exec(&self, data: &mut D, active: bool);

    /// Records the launch resources the subtree needs, given the views in `data`.
    #[inline]
    fn request(&self, data: &D, request: &mut LaunchRequest) {
        let _ = (data, request);
    }
}

/// A statement tree that can drive a whole `N`-dimensional nest with `P` parameter slots.
pub trait Policy<C: Context, const N: usize, const P: usize>:
    for<'a> Statement<LoopData<'a, C, N, P>>
{
}

impl<T, C, const N: usize, const P: usize> Policy<C, N, P> for T
where
    T: for<'a> Statement<LoopData<'a, C, N, P>>,
    C: Context,
{
}

/// Iterates dimension `ARG` with traversal `E`, running `S` at every position.
pub struct For<const ARG: usize, E, S = ()> {
    pub inner: S,
    phantom: PhantomData<fn() -> E>,
}

/// Like [`For`], additionally storing the loop-local iteration number in parameter `PARAM`.
pub struct ForICount<const ARG: usize, const PARAM: usize, E, S = ()> {
    pub inner: S,
    phantom: PhantomData<fn() -> E>,
}

/// Invokes body number `L` on active lanes.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lambda<const L: usize>;

macro_rules! impl_loop_statement {
    ($name:ident<$($c:ident),+>) => {
        impl<$(const $c: usize,)+ E, S: Default> Default for $name<$($c,)+ E, S> {
            #[inline]
            fn default() -> Self {
                Self::new(S::default())
            }
        }

        impl<$(const $c: usize,)+ E, S> $name<$($c,)+ E, S> {
            #[inline]
            pub fn new(inner: S) -> Self {
                Self {
                    inner,
                    phantom: std::marker::PhantomData,
                }
            }
        }

        impl<$(const $c: usize,)+ E, S: std::fmt::Debug> std::fmt::Debug for $name<$($c,)+ E, S> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("policy", &std::any::type_name::<E>())
                    .field("inner", &self.inner)
                    .finish()
            }
        }
    };
}

pub(crate) use impl_loop_statement;

impl_loop_statement!(For<ARG>);
impl_loop_statement!(ForICount<ARG, PARAM>);

impl<D, E, S, const ARG: usize> Statement<D> for For<ARG, E, S>
where
    D: Data,
    E: Traversal<D>,
    S: Statement<D>,
{
    #[inline]
    fn exec(&self, data: &mut D, active: bool) {
        let count = data.segment(ARG).len();
        E::traverse(data, count, active, |data, index, active| {
            data.set_offset(ARG, index);
            self.inner.exec(data, active);
        });
    }

    fn request(&self, data: &D, request: &mut LaunchRequest) {
        E::request(data.segment(ARG).len(), request);
        self.inner.request(data, request);
    }
}

impl<D, E, S, const ARG: usize, const PARAM: usize> Statement<D> for ForICount<ARG, PARAM, E, S>
where
    D: Data,
    E: Traversal<D>,
    S: Statement<D>,
{
    #[inline]
    fn exec(&self, data: &mut D, active: bool) {
        let count = data.segment(ARG).len();
        E::traverse(data, count, active, |data, index, active| {
            data.set_offset(ARG, index);
            data.set_param(PARAM, index);
            self.inner.exec(data, active);
        });
    }

    fn request(&self, data: &D, request: &mut LaunchRequest) {
        E::request(data.segment(ARG).len(), request);
        self.inner.request(data, request);
    }
}

impl<D: Data, const L: usize> Statement<D> for Lambda<L> {
    #[inline]
    fn exec(&self, data: &mut D, active: bool) {
        if active {
            data.invoke(L);
        }
    }
}

impl<D: Data> Statement<D> for () {
    #[inline]
    fn exec(&self, _data: &mut D, _active: bool) {}
}

macro_rules! impl_statement_list {
    ($($t:ident),+) => {
        impl<D: Data, $($t),+> Statement<D> for ($($t,)+)
        where
            $($t: Statement<D>),+
        {
            #[inline]
            fn exec(&self, data: &mut D, active: bool) {
                let ($(snake!($t),)+) = self;
                $(snake!($t).exec(data, active);)+
            }

            fn request(&self, data: &D, request: &mut LaunchRequest) {
                let ($(snake!($t),)+) = self;
                $(snake!($t).request(data, request);)+
            }
        }
    };
}

impl_statement_list!(S0);
impl_statement_list!(S0, S1);
impl_statement_list!(S0, S1, S2);
impl_statement_list!(S0, S1, S2, S3);
impl_statement_list!(S0, S1, S2, S3, S4);
impl_statement_list!(S0, S1, S2, S3, S4, S5);
impl_statement_list!(S0, S1, S2, S3, S4, S5, S6);
impl_statement_list!(S0, S1, S2, S3, S4, S5, S6, S7);

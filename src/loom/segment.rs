use std::sync::Arc;

use derive_more::{Display, From};
use itertools::Itertools;
use thiserror::Error;

use super::data::Index;

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("segment allocation error: unable to reserve {0} indices")]
    Alloc(usize),
}

/// An ordered sequence of integer indices.
///
/// `begin` and `end` delimit the positions of the current view, so that `len() == end() - begin()`
/// holds for every segment kind. [`Segment::value`] maps a position of the view to its index.
pub trait Segment: Clone + Send + Sync {
    fn begin(&self) -> Index;

    fn end(&self) -> Index;

    #[inline]
    fn len(&self) -> Index {
        self.end() - self.begin()
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() <= 0
    }

    /// Narrows the view to `count` positions starting at `offset`, clipped to the current extent.
    ///
    /// A zero `count` yields an empty view positioned at `offset`. This marks a lane without work
    /// and is not an error.
    fn slice(&self, offset: Index, count: Index) -> Self;

    /// Returns the index stored at `position` of the view.
    fn value(&self, position: Index) -> Index;
}

/// Clips a `(offset, count)` request against `[begin, end)`.
#[inline]
fn clip(begin: Index, end: Index, offset: Index, count: Index) -> (Index, Index) {
    #[cfg(feature = "strict")]
    assert!(
        offset >= 0 && count >= 0,
        "negative slice request: offset {offset}, count {count}"
    );
    let start = (begin + offset.max(0)).min(end);
    let stop = (start + count.max(0)).min(end);
    (start, stop)
}

/// A contiguous range of indices `[begin, end)`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("[{begin}, {end})")]
pub struct RangeSegment {
    begin: Index,
    end: Index,
}

impl RangeSegment {
    /// Creates a range. An `end` before `begin` denotes an empty range.
    #[inline]
    pub fn new(begin: Index, end: Index) -> Self {
        let end = end.max(begin);
        Self { begin, end }
    }
}

impl Segment for RangeSegment {
    #[inline]
    fn begin(&self) -> Index {
        self.begin
    }

    #[inline]
    fn end(&self) -> Index {
        self.end
    }

    #[inline]
    fn slice(&self, offset: Index, count: Index) -> Self {
        let (begin, end) = clip(self.begin, self.end, offset, count);
        Self { begin, end }
    }

    #[inline]
    fn value(&self, position: Index) -> Index {
        self.begin + position
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Ownership {
    #[display("owned")]
    Owned,
    #[display("borrowed")]
    Borrowed,
}

/// Storage of an explicit index list.
///
/// Owned storage is released when the last view is dropped; borrowed storage carries no release
/// obligation and is bound to the lender's lifetime.
#[derive(Debug, Clone)]
pub enum Indices<'a> {
    Owned(Arc<[Index]>),
    Borrowed(&'a [Index]),
}

impl std::ops::Deref for Indices<'_> {
    type Target = [Index];

    #[inline]
    fn deref(&self) -> &Self::Target {
        match self {
            Indices::Owned(indices) => indices,
            Indices::Borrowed(indices) => indices,
        }
    }
}

impl Indices<'_> {
    #[inline]
    pub fn ownership(&self) -> Ownership {
        match self {
            Indices::Owned(_) => Ownership::Owned,
            Indices::Borrowed(_) => Ownership::Borrowed,
        }
    }

    /// Copies `indices` into fresh owned storage.
    pub fn try_owned(indices: &[Index]) -> Result<Indices<'static>, SegmentError> {
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(indices.len())
            .map_err(|_| SegmentError::Alloc(indices.len()))?;
        buffer.extend_from_slice(indices);
        Ok(Indices::Owned(buffer.into()))
    }
}

/// A segment over an explicit list of indices.
#[derive(Debug, Clone)]
pub struct ListSegment<'a> {
    indices: Indices<'a>,
    begin: Index,
    end: Index,
}

impl<'a> ListSegment<'a> {
    #[inline]
    fn from_indices(indices: Indices<'a>) -> Self {
        let end = indices.len() as Index;
        Self {
            indices,
            begin: 0,
            end,
        }
    }

    /// Creates a view over indices owned by the caller. Nothing is copied.
    #[inline]
    pub fn borrowed(indices: &'a [Index]) -> Self {
        Self::from_indices(Indices::Borrowed(indices))
    }

    /// Creates a segment owning a copy of `indices`.
    ///
    /// Allocation failure is fatal: it is logged and the process aborts.
    pub fn owned(indices: &[Index]) -> ListSegment<'static> {
        match Indices::try_owned(indices) {
            Ok(indices) => ListSegment::from_indices(indices),
            Err(err) => {
                log::error!("{err}");
                std::process::abort()
            }
        }
    }

    #[inline]
    pub fn ownership(&self) -> Ownership {
        self.indices.ownership()
    }

    /// Returns the indices visible through the current view.
    #[inline]
    pub fn as_slice(&self) -> &[Index] {
        &self.indices[self.begin as usize..self.end as usize]
    }

    /// Returns `true` if the view holds exactly `other`.
    /// Empty operands never compare equal.
    pub fn indices_equal(&self, other: &[Index]) -> bool {
        let indices = self.as_slice();
        !indices.is_empty() && indices == other
    }
}

impl From<Vec<Index>> for ListSegment<'static> {
    #[inline]
    fn from(value: Vec<Index>) -> Self {
        Self::from_indices(Indices::Owned(value.into()))
    }
}

impl Segment for ListSegment<'_> {
    #[inline]
    fn begin(&self) -> Index {
        self.begin
    }

    #[inline]
    fn end(&self) -> Index {
        self.end
    }

    #[inline]
    fn slice(&self, offset: Index, count: Index) -> Self {
        let (begin, end) = clip(self.begin, self.end, offset, count);
        let indices = self.indices.clone();
        Self {
            indices,
            begin,
            end,
        }
    }

    #[inline]
    fn value(&self, position: Index) -> Index {
        self.indices[(self.begin + position) as usize]
    }
}

impl std::fmt::Display for ListSegment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ListSegment({}, {}): [{}]",
            self.len(),
            self.ownership(),
            self.as_slice().iter().format(", ")
        )
    }
}

/// Any segment kind; the per-dimension entry of an iteration context.
#[derive(Debug, Clone, From, Display)]
pub enum AnySegment<'a> {
    Range(RangeSegment),
    List(ListSegment<'a>),
}

/// Shorthand for a contiguous [`AnySegment`].
#[inline]
pub fn range(begin: Index, end: Index) -> AnySegment<'static> {
    AnySegment::Range(RangeSegment::new(begin, end))
}

impl Segment for AnySegment<'_> {
    #[inline]
    fn begin(&self) -> Index {
        match self {
            AnySegment::Range(segment) => segment.begin(),
            AnySegment::List(segment) => segment.begin(),
        }
    }

    #[inline]
    fn end(&self) -> Index {
        match self {
            AnySegment::Range(segment) => segment.end(),
            AnySegment::List(segment) => segment.end(),
        }
    }

    #[inline]
    fn slice(&self, offset: Index, count: Index) -> Self {
        match self {
            AnySegment::Range(segment) => AnySegment::Range(segment.slice(offset, count)),
            AnySegment::List(segment) => AnySegment::List(segment.slice(offset, count)),
        }
    }

    #[inline]
    fn value(&self, position: Index) -> Index {
        match self {
            AnySegment::Range(segment) => segment.value(position),
            AnySegment::List(segment) => segment.value(position),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use itertools::Itertools;

    use super::{AnySegment, Indices, ListSegment, Ownership, RangeSegment, Segment};

    #[test]
    fn test_range_slice_clips() {
        let range = RangeSegment::new(0, 100);
        let tile = range.slice(96, 16);
        assert_eq!((tile.begin(), tile.end(), tile.len()), (96, 100, 4));

        let tile = range.slice(16, 16);
        assert_eq!((tile.begin(), tile.end()), (16, 32));
        assert_eq!(tile.value(3), 19);

        // a zero-length request past the end is a masked lane, not an error
        let tile = range.slice(112, 0);
        assert!(tile.is_empty());
        assert_eq!(tile.begin(), 100);
    }

    #[test]
    fn test_reversed_range_is_empty() {
        let range = RangeSegment::new(5, 3);
        assert!(range.is_empty());
        assert_eq!((range.begin(), range.end(), range.len()), (5, 5, 0));
        assert_eq!(range.slice(0, 4).len(), 0);
    }

    #[test]
    fn test_range_offset_base() {
        let range = RangeSegment::new(-8, 8);
        let tile = range.slice(4, 4);
        assert_eq!((tile.begin(), tile.end()), (-4, 0));
        assert_eq!(tile.value(0), -4);
    }

    #[test]
    fn test_list_slice_shares_storage() {
        let list = ListSegment::from(vec![3, 1, 4, 1, 5, 9, 2, 6]);
        let view = list.slice(2, 3);
        assert_eq!(view.as_slice(), &[4, 1, 5]);
        assert_eq!(view.value(2), 5);
        assert_eq!(view.len(), 3);

        match (&list.indices, &view.indices) {
            (Indices::Owned(x), Indices::Owned(y)) => assert!(Arc::ptr_eq(x, y)),
            _ => panic!("views of owned storage must stay owned"),
        }

        let view = view.slice(1, 8);
        assert_eq!(view.as_slice(), &[1, 5]);
    }

    #[test]
    fn test_list_ownership() {
        let indices = vec![10, 20, 30];
        let borrowed = ListSegment::borrowed(&indices);
        assert_eq!(borrowed.ownership(), Ownership::Borrowed);
        assert_eq!(borrowed.as_slice().as_ptr(), indices.as_ptr());

        let owned = ListSegment::owned(&indices);
        assert_eq!(owned.ownership(), Ownership::Owned);
        assert_ne!(owned.as_slice().as_ptr(), indices.as_ptr());
        drop(indices);
        assert_eq!(owned.as_slice(), &[10, 20, 30]);
    }

    #[test]
    fn test_list_indices_equal() {
        let list = ListSegment::owned(&[1, 2, 3]);
        assert!(list.indices_equal(&[1, 2, 3]));
        assert!(!list.indices_equal(&[1, 2]));
        assert!(!list.indices_equal(&[1, 2, 4]));

        let empty = ListSegment::owned(&[]);
        assert!(!empty.indices_equal(&[]));
    }

    #[test]
    fn test_display() {
        let list = ListSegment::owned(&[7, 8]);
        assert_eq!(list.to_string(), "ListSegment(2, owned): [7, 8]");

        let segment = AnySegment::from(RangeSegment::new(2, 5));
        assert_eq!(segment.to_string(), "[2, 5)");
    }

    #[test]
    fn test_any_segment_values() {
        let segments: [AnySegment; 2] = [
            RangeSegment::new(5, 9).into(),
            ListSegment::owned(&[5, 6, 7, 8]).into(),
        ];
        for segment in &segments {
            let values = (0..segment.len()).map(|p| segment.value(p)).collect_vec();
            assert_eq!(values, vec![5, 6, 7, 8]);
        }
    }
}

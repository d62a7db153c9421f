/// simple trait to add a `.len()` equivalent to implementors
#[allow(clippy::len_without_is_empty)]
pub trait Len {
    /// get the length of the implementing object
    #[must_use]
    fn len(&self) -> usize;
}

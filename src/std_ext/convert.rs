/// The traits in this module provide a way to convert from one type to another type

/// return reference to inner type
pub trait AsInner {
    /// the inner type that should be exposed
    type Type;

    /// get a reference to the inner type, which is of type [`Self::Type`]
    fn inner(&self) -> &Self::Type;
}

/// simple trait to add a `.as_bytes()` equivalent to implementors
pub trait AsBytes {
    /// Returns a byte slice of the implementor's contents
    fn as_bytes(&self) -> &[u8];
}

//! Payload sources modeled around where the test cases come from, i.e. a wordlist file or stdin
mod utils;
mod wordlist;

// re-exports
pub use self::utils::{has_valid_extension, replace_extension, strip_comments};
pub use self::wordlist::Wordlist;

/// A positioned source of payloads bound to a single keyword
///
/// The cursor is a plain sequential iterator; callers that advance it from
/// more than one thread are responsible for serializing access.
///
/// Combining several providers (clusterbomb, pitchfork, etc...) is the
/// scheduler's job; `active`, `enable`, and `disable` exist so that it can
/// take individual providers in and out of rotation.
pub trait InputProvider {
    /// the keyword this provider's payloads replace
    #[must_use]
    fn keyword(&self) -> &str;

    /// whether the cursor points at a payload, i.e. `position < total`
    #[must_use]
    fn has_next(&self) -> bool;

    /// current cursor position
    #[must_use]
    fn position(&self) -> usize;

    /// move the cursor to `position`; no bounds checking is performed
    fn set_position(&mut self, position: usize);

    /// move the cursor back to the first payload
    fn reset_position(&mut self);

    /// advance the cursor by one
    fn increment_position(&mut self);

    /// payload at the current cursor position, `None` once the cursor
    /// has moved past the last payload
    #[must_use]
    fn value(&self) -> Option<&[u8]>;

    /// number of accepted payloads
    #[must_use]
    fn total(&self) -> usize;

    /// whether this provider participates in payload combination
    #[must_use]
    fn active(&self) -> bool;

    /// mark this provider as participating
    fn enable(&mut self);

    /// take this provider out of rotation
    fn disable(&mut self);
}

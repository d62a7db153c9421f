//! the value produced by a wordlist and bound to a keyword
use crate::AsBytes;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// one candidate value bound to the keyword it should replace
///
/// # Examples
///
/// ```
/// # use fuffa::input::Payload;
/// # use fuffa::AsBytes;
/// let payload = Payload::new("FUZZ", b"admin.php".to_vec());
///
/// assert_eq!(payload.keyword(), "FUZZ");
/// assert_eq!(payload.value(), b"admin.php");
/// assert_eq!(payload.as_bytes(), payload.value());
/// assert_eq!(payload.to_string(), "FUZZ=admin.php");
/// ```
#[derive(Clone, Default, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Payload {
    keyword: String,
    value: Vec<u8>,
}

impl Payload {
    /// bind `value` to `keyword`
    #[must_use]
    pub fn new(keyword: &str, value: Vec<u8>) -> Self {
        Self {
            keyword: keyword.to_string(),
            value,
        }
    }

    /// the keyword this payload replaces
    #[must_use]
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// the raw payload bytes
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// split the payload into a `(keyword, value)` pair, ready to be
    /// collected into an [`InputMap`]
    ///
    /// [`InputMap`]: crate::requests::InputMap
    #[must_use]
    pub fn into_entry(self) -> (String, Vec<u8>) {
        (self.keyword, self.value)
    }
}

impl AsBytes for Payload {
    fn as_bytes(&self) -> &[u8] {
        &self.value
    }
}

impl Display for Payload {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}",
            self.keyword,
            String::from_utf8_lossy(&self.value)
        )
    }
}

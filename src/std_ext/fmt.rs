use super::convert::AsInner;
use lazy_static::lazy_static;
use regex::Regex;
use std::any::type_name;

lazy_static! {
    /// translate fully qualified crate paths to just their names
    ///
    /// `fuffa::corpora::wordlist::Wordlist`
    ///
    /// becomes
    ///
    /// `Wordlist`
    static ref TYPENAME_REGEX: Regex = Regex::new(r"\w+::").unwrap();
}

/// Extend the [`Display`] trait to provide a uniform format for library types
///
/// [`Display`]: std::fmt::Display
pub trait DisplayExt {
    /// display the type, its length, and the first `n` elements in the collection
    fn display_top(&self, n: usize) -> String;
}

impl<T, I> DisplayExt for T
where
    T: AsInner<Type = Vec<I>>,
    I: AsRef<[u8]>,
{
    fn display_top(&self, n: usize) -> String {
        let name = TYPENAME_REGEX.replace_all(type_name::<T>(), "");

        let peek: Vec<_> = self
            .inner()
            .iter()
            .take(n)
            .map(|item| String::from_utf8_lossy(item.as_ref()))
            .collect();

        format!(
            "{}::{{len={}, top-{}={:?}}}",
            name,
            self.inner().len(),
            peek.len(),
            peek
        )
    }
}

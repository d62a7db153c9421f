//! keyword substitution across method, headers, url, and body
use super::{InputMap, Request};
use crate::std_ext::str::{canonical_header_key, replace_bytes};

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{instrument, trace};

lazy_static! {
    /// a run of slashes preceded by anything other than the scheme's colon
    static ref REPEATED_SLASHES: Regex = Regex::new(r"([^:])/+").unwrap();
}

/// build a concrete request by substituting every keyword in `input` into a copy of `base`
///
/// keywords are applied one at a time in lexicographic order. For each one:
///
/// 1. the method has every occurrence replaced
/// 2. header names and values have every occurrence replaced; names are then
///    re-canonicalized and the header map is rebuilt
/// 3. the url has every occurrence replaced, and runs of `/` are collapsed
///    (the `://` after the scheme is left alone)
/// 4. the body has every occurrence replaced, byte-for-byte
///
/// `input` is attached to the returned request. `base` is never modified.
///
/// # Examples
///
/// ```
/// # use fuffa::requests::{prepare, InputMap, Request};
/// let base = Request::new("GET", "https://x.org/FUZZ/y");
///
/// let mut input = InputMap::new();
/// input.insert(String::from("FUZZ"), b"a/b/".to_vec());
///
/// let request = prepare(&base, &input);
///
/// assert_eq!(request.url(), "https://x.org/a/b/y");
/// assert_eq!(request.input(), &input);
/// assert_eq!(base.url(), "https://x.org/FUZZ/y");
/// ```
#[must_use]
#[instrument(skip_all, level = "trace")]
pub fn prepare(base: &Request, input: &InputMap) -> Request {
    let mut request = base.clone();

    for (keyword, value) in input {
        if keyword.is_empty() {
            trace!("skipping empty keyword");
            continue;
        }

        let replacement = String::from_utf8_lossy(value);

        request.method = request.method.replace(keyword.as_str(), &replacement);

        request.headers = request
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    canonical_header_key(&name.replace(keyword.as_str(), &replacement)),
                    value.replace(keyword.as_str(), &replacement),
                )
            })
            .collect::<BTreeMap<_, _>>();

        request.url = replace_keyword_in_url(&request.url, keyword, &replacement);

        request.data = replace_bytes(&request.data, keyword.as_bytes(), value);
    }

    request.input = input.clone();

    request
}

/// replace `keyword` in `url` without introducing doubled slashes
fn replace_keyword_in_url(url: &str, keyword: &str, replacement: &str) -> String {
    let replaced = url.replace(keyword, replacement);

    REPEATED_SLASHES.replace_all(&replaced, "$1/").into_owned()
}

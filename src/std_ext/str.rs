//! byte and header-name helpers shared by templating and raw dumps

/// canonical form of a MIME header key: the first letter and any letter
/// following a hyphen are upper-cased, the rest are lower-cased
/// (`content-type` becomes `Content-Type`)
///
/// keys containing a space or any other byte that isn't valid in an http
/// token are returned unchanged
pub fn canonical_header_key(key: &str) -> String {
    if !key.bytes().all(is_token_byte) {
        return key.to_string();
    }

    let mut upper = true;

    key.chars()
        .map(|c| {
            let canonical = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            canonical
        })
        .collect()
}

/// valid characters in an http token, per RFC 7230
const fn is_token_byte(byte: u8) -> bool {
    matches!(
        byte,
        b'!' | b'#'
            | b'$'
            | b'%'
            | b'&'
            | b'\''
            | b'*'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~'
    ) || byte.is_ascii_alphanumeric()
}

/// replace every non-overlapping occurrence of `needle` in `haystack`
///
/// an empty `needle` leaves `haystack` untouched
pub fn replace_bytes(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return haystack.to_vec();
    }

    let mut replaced = Vec::with_capacity(haystack.len());
    let mut index = 0;

    while index < haystack.len() {
        if haystack[index..].starts_with(needle) {
            replaced.extend_from_slice(replacement);
            index += needle.len();
        } else {
            replaced.push(haystack[index]);
            index += 1;
        }
    }

    replaced
}

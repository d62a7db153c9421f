//! line-level helpers used while loading a wordlist
//!
//! everything here works on raw bytes; wordlist entries are not required to be utf-8

/// whitespace as understood when deciding whether a line is blank
const fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | b'\x0b' | b'\x0c')
}

/// strip comments and blank lines from a wordlist entry
///
/// - lines that are empty once trimmed are rejected
/// - lines whose first non-space character is `#` are rejected
/// - anything following a ` #` (space, then hash) is treated as a trailing comment
///
/// accepted lines are otherwise returned as-is; surrounding whitespace is kept
///
/// # Examples
///
/// ```
/// # use fuffa::corpora::strip_comments;
/// assert_eq!(strip_comments(b"  # comment"), None);
/// assert_eq!(strip_comments(b""), None);
/// assert_eq!(strip_comments(b"text #trailing"), Some(b"text".as_slice()));
/// assert_eq!(strip_comments(b"text#trailing"), Some(b"text#trailing".as_slice()));
/// ```
#[must_use]
pub fn strip_comments(line: &[u8]) -> Option<&[u8]> {
    if line.iter().copied().all(is_space) {
        return None;
    }

    let first_non_space = line.iter().position(|&byte| byte != b' ');

    if first_non_space.is_some_and(|index| line[index] == b'#') {
        return None;
    }

    match line.windows(2).position(|pair| pair == b" #") {
        Some(index) => Some(&line[..index]),
        None => Some(line),
    }
}

/// whether `text` ends in a file extension of 1-4 ascii alphanumeric characters
///
/// # Examples
///
/// ```
/// # use fuffa::corpora::has_valid_extension;
/// assert!(has_valid_extension(b"index.php"));
/// assert!(has_valid_extension(b"archive.tar.gz"));
/// assert!(!has_valid_extension(b"index."));
/// assert!(!has_valid_extension(b"index.phtml5"));
/// assert!(!has_valid_extension(b"v1.0/admin"));
/// assert!(!has_valid_extension(b"admin"));
/// ```
#[must_use]
pub fn has_valid_extension(text: &[u8]) -> bool {
    let Some(last_dot) = text.iter().rposition(|&byte| byte == b'.') else {
        return false;
    };

    let extension = &text[last_dot + 1..];

    (1..=4).contains(&extension.len()) && extension.iter().all(u8::is_ascii_alphanumeric)
}

/// strip a valid extension (see [`has_valid_extension`]) from `text`, if one is present
fn remove_extension(text: &[u8]) -> &[u8] {
    if !has_valid_extension(text) {
        return text;
    }

    text.iter()
        .rposition(|&byte| byte == b'.')
        .map_or(text, |last_dot| &text[..last_dot])
}

/// swap the extension of `text` for `extension`; if `text` has no
/// valid extension, `extension` is appended
///
/// `extension` is expected without its leading dot
///
/// # Examples
///
/// ```
/// # use fuffa::corpora::replace_extension;
/// assert_eq!(replace_extension(b"admin", b"php"), b"admin.php");
/// assert_eq!(replace_extension(b"admin.asp", b"php"), b"admin.php");
/// assert_eq!(replace_extension(b"admin.backup", b"php"), b"admin.backup.php");
/// ```
#[must_use]
pub fn replace_extension(text: &[u8], extension: &[u8]) -> Vec<u8> {
    let base = remove_extension(text);

    let mut replaced = Vec::with_capacity(base.len() + extension.len() + 1);
    replaced.extend_from_slice(base);
    replaced.push(b'.');
    replaced.extend_from_slice(extension);
    replaced
}

use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use lazy_static::lazy_static;
use regex::bytes::{NoExpand, Regex};
use tracing::{debug, error, instrument, trace};

use super::utils::{replace_extension, strip_comments};
use super::InputProvider;
use crate::config::Config;
use crate::error::FuffaError;
use crate::input::Payload;
use crate::std_ext::convert::AsInner;
use crate::std_ext::fmt::DisplayExt;
use crate::std_ext::ops::Len;

/// wordlist source that reads from standard input instead of a file
const STDIN_SOURCE: &str = "-";

/// only this keyword receives automatically derived extension variants
const EXTENSION_KEYWORD: &str = "FUZZ";

lazy_static! {
    /// dirsearch-style extension placeholder, matched case-insensitively
    static ref EXT_PLACEHOLDER: Regex = Regex::new("(?i)%ext%").unwrap();
}

/// ordered, deduplicated list of payloads loaded from a file or stdin and
/// bound to a single keyword
///
/// # Examples
///
/// ```
/// # use fuffa::config::Config;
/// # use fuffa::corpora::{InputProvider, Wordlist};
/// # use fuffa::error::FuffaError;
/// # fn main() -> Result<(), FuffaError> {
/// let config = Config {
///     extensions: vec![String::from("php"), String::from(".html")],
///     ..Config::default()
/// };
///
/// let words = "admin\n# comment\n\nadmin\n";
/// let mut wordlist = Wordlist::from_reader("FUZZ", words.as_bytes(), &config)?;
///
/// assert_eq!(wordlist.total(), 3);
///
/// let mut gathered = Vec::new();
///
/// while wordlist.has_next() {
///     gathered.extend(wordlist.value().map(<[u8]>::to_vec));
///     wordlist.increment_position();
/// }
///
/// assert_eq!(gathered, [b"admin".to_vec(), b"admin.php".to_vec(), b"admin.html".to_vec()]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Wordlist {
    items: Vec<Vec<u8>>,
    unique_items: HashSet<Vec<u8>>,
    position: usize,
    active: bool,
    keyword: String,
}

impl Wordlist {
    /// load the wordlist found at `source` and bind it to `keyword`
    ///
    /// a `source` of `-` reads from standard input
    ///
    /// # Errors
    ///
    /// If `source` can't be stat'ed or opened, a [`FuffaError::WordlistOpenError`]
    /// is returned. Any other I/O error encountered while reading is returned as
    /// [`FuffaError::IOError`].
    #[instrument(skip(config), level = "trace")]
    pub fn new(keyword: &str, source: &str, config: &Config) -> Result<Self, FuffaError> {
        if source == STDIN_SOURCE {
            return Self::from_reader(keyword, io::stdin().lock(), config);
        }

        let file = open_wordlist(source)?;

        Self::from_reader(keyword, BufReader::new(file), config)
    }

    /// load a wordlist from any buffered reader and bind it to `keyword`
    ///
    /// # Errors
    ///
    /// Returns [`FuffaError::IOError`] if reading from `reader` fails
    #[instrument(skip(reader, config), level = "trace")]
    pub fn from_reader<R>(keyword: &str, reader: R, config: &Config) -> Result<Self, FuffaError>
    where
        R: BufRead,
    {
        let mut wordlist = Self {
            items: Vec::new(),
            unique_items: HashSet::new(),
            position: 0,
            active: true,
            keyword: keyword.to_string(),
        };

        wordlist.load(reader, config)?;

        debug!(
            keyword,
            total = wordlist.items.len(),
            "loaded wordlist"
        );

        Ok(wordlist)
    }

    /// read `reader` line by line, applying comment stripping, deduplication, and
    /// extension expansion
    fn load<R>(&mut self, mut reader: R, config: &Config) -> Result<(), FuffaError>
    where
        R: BufRead,
    {
        let compat = config.dir_search_compat && !config.extensions.is_empty();
        let derive_extensions = !compat && self.keyword == EXTENSION_KEYWORD && !config.extensions.is_empty();

        let mut buffer = Vec::new();
        let mut lines_read = 0;

        loop {
            buffer.clear();

            if reader.read_until(b'\n', &mut buffer)? == 0 {
                break;
            }

            // placeholder expansions and derived extensions are not counted
            if config.wordlist_limit > 0 && lines_read >= config.wordlist_limit {
                trace!(limit = config.wordlist_limit, "wordlist limit reached");
                break;
            }

            let line = trim_line_ending(&buffer);

            if compat && EXT_PLACEHOLDER.is_match(line) {
                for extension in &config.extensions {
                    let expanded = EXT_PLACEHOLDER.replace_all(line, NoExpand(extension.as_bytes()));
                    self.items.push(expanded.into_owned());
                }
                continue;
            }

            let Some(word) = strip_comments(line) else {
                continue;
            };

            self.add_unique(word);
            lines_read += 1;

            if derive_extensions {
                for extension in &config.extensions {
                    let extension = extension.strip_prefix('.').unwrap_or(extension);
                    self.add_unique(&replace_extension(word, extension.as_bytes()));
                }
            }
        }

        Ok(())
    }

    /// push `word` unless an identical payload was already accepted
    fn add_unique(&mut self, word: &[u8]) {
        if self.unique_items.insert(word.to_vec()) {
            self.items.push(word.to_vec());
        }
    }

    /// the payload at the current position, bound to this wordlist's keyword
    #[must_use]
    pub fn payload(&self) -> Option<Payload> {
        self.value()
            .map(|value| Payload::new(&self.keyword, value.to_vec()))
    }

    /// Returns an iterator over all payloads, regardless of the current position
    pub fn iter(&self) -> std::slice::Iter<'_, Vec<u8>> {
        self.items.iter()
    }
}

/// stat and open a wordlist file, logging and wrapping any failure
fn open_wordlist(source: &str) -> Result<File, FuffaError> {
    let open_error = |source_error: io::Error| {
        error!(
            file = source,
            "could not open wordlist: {}", source_error
        );

        FuffaError::WordlistOpenError {
            source: source_error,
            path: source.to_string(),
        }
    };

    fs::metadata(Path::new(source)).map_err(open_error)?;

    File::open(source).map_err(open_error)
}

/// drop a trailing `\n` or `\r\n`
fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

impl InputProvider for Wordlist {
    fn keyword(&self) -> &str {
        &self.keyword
    }

    fn has_next(&self) -> bool {
        self.position < self.items.len()
    }

    fn position(&self) -> usize {
        self.position
    }

    fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    fn reset_position(&mut self) {
        self.position = 0;
    }

    fn increment_position(&mut self) {
        self.position += 1;
    }

    fn value(&self) -> Option<&[u8]> {
        self.items.get(self.position).map(Vec::as_slice)
    }

    fn total(&self) -> usize {
        self.items.len()
    }

    fn active(&self) -> bool {
        self.active
    }

    fn enable(&mut self) {
        self.active = true;
    }

    fn disable(&mut self) {
        self.active = false;
    }
}

impl<'i> IntoIterator for &'i Wordlist {
    /// the type of the elements being iterated over
    type Item = &'i Vec<u8>;

    /// the kind of iterator we're turning `Wordlist` into
    type IntoIter = std::slice::Iter<'i, Vec<u8>>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl AsInner for Wordlist {
    type Type = Vec<Vec<u8>>;

    fn inner(&self) -> &Self::Type {
        &self.items
    }
}

impl Len for Wordlist {
    #[inline]
    fn len(&self) -> usize {
        self.items.len()
    }
}

impl Display for Wordlist {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_top(3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load(keyword: &str, words: &str, config: &Config) -> Vec<String> {
        let wordlist = Wordlist::from_reader(keyword, words.as_bytes(), config).unwrap();

        wordlist
            .iter()
            .map(|item| String::from_utf8(item.clone()).unwrap())
            .collect()
    }

    fn with_extensions(extensions: &[&str]) -> Config {
        Config {
            extensions: extensions.iter().map(ToString::to_string).collect(),
            ..Config::default()
        }
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let words = load("FUZZ", "a\n#skip\n\nb\n", &Config::default());
        assert_eq!(words, ["a", "b"]);

        let words = load("FUZZ", "  # comment\n\nx\n", &Config::default());
        assert_eq!(words, ["x"]);
    }

    #[test]
    fn trailing_comments_are_stripped() {
        let words = load("FUZZ", "text #trailing\ntext#trailing\n", &Config::default());
        assert_eq!(words, ["text", "text#trailing"]);
    }

    #[test]
    fn duplicate_lines_are_dropped() {
        let words = load("FUZZ", "a\nb\na\nb #dup\n", &Config::default());
        assert_eq!(words, ["a", "b"]);
    }

    #[test]
    fn crlf_line_endings_are_trimmed() {
        let words = load("FUZZ", "one\r\ntwo\r\nthree", &Config::default());
        assert_eq!(words, ["one", "two", "three"]);
    }

    #[test]
    fn non_utf8_lines_are_kept_byte_for_byte() {
        let words: &[u8] = b"\xffadmin\xfe\n\xfeadmin\xff\n\xffadmin\xfe\n";
        let wordlist = Wordlist::from_reader("FUZZ", words, &Config::default()).unwrap();

        assert_eq!(
            wordlist.inner(),
            &[b"\xffadmin\xfe".to_vec(), b"\xfeadmin\xff".to_vec()]
        );
    }

    #[test]
    fn non_utf8_lines_keep_their_bytes_through_extension_derivation() {
        let config = with_extensions(&["php"]);
        let words: &[u8] = b"\xe9t\xe9.asp\n";
        let wordlist = Wordlist::from_reader("FUZZ", words, &config).unwrap();

        assert_eq!(
            wordlist.inner(),
            &[b"\xe9t\xe9.asp".to_vec(), b"\xe9t\xe9.php".to_vec()]
        );
    }

    #[test]
    fn compat_mode_placeholders_keep_surrounding_bytes() {
        let config = Config {
            dir_search_compat: true,
            extensions: vec![String::from("php")],
            ..Config::default()
        };
        let words: &[u8] = b"\xffindex.%ext%\n";
        let wordlist = Wordlist::from_reader("FUZZ", words, &config).unwrap();

        assert_eq!(wordlist.inner(), &[b"\xffindex.php".to_vec()]);
    }

    #[test]
    fn fuzz_keyword_derives_extension_variants() {
        let config = with_extensions(&["php", ".html"]);
        let words = load("FUZZ", "admin\n", &config);
        assert_eq!(words, ["admin", "admin.php", "admin.html"]);
    }

    #[test]
    fn derived_variants_replace_existing_extensions_and_are_deduplicated() {
        let config = with_extensions(&["php"]);
        let words = load("FUZZ", "index.asp\nindex\nindex.php\n", &config);
        assert_eq!(words, ["index.asp", "index.php", "index"]);
    }

    #[test]
    fn other_keywords_do_not_derive_extension_variants() {
        let config = with_extensions(&["php"]);
        let words = load("W1", "admin\n", &config);
        assert_eq!(words, ["admin"]);
    }

    #[test]
    fn limit_counts_accepted_lines_only() {
        let config = Config {
            wordlist_limit: 2,
            ..Config::default()
        };

        let words = load("FUZZ", "# comment\none\n\ntwo\nthree\nfour\nfive\n", &config);
        assert_eq!(words, ["one", "two"]);
    }

    #[test]
    fn limit_ignores_derived_variants() {
        let config = Config {
            wordlist_limit: 1,
            extensions: vec![String::from("php")],
            ..Config::default()
        };

        let words = load("FUZZ", "admin\nlogin\n", &config);
        assert_eq!(words, ["admin", "admin.php"]);
    }

    #[test]
    fn compat_mode_expands_placeholders_case_insensitively() {
        let config = Config {
            dir_search_compat: true,
            extensions: vec![String::from("php"), String::from("asp")],
            ..Config::default()
        };

        let words = load("FUZZ", "index.%EXT%\nadmin.%ext%\nlogin\n", &config);
        assert_eq!(
            words,
            ["index.php", "index.asp", "admin.php", "admin.asp", "login"]
        );
    }

    #[test]
    fn compat_mode_placeholders_skip_dedup_and_comments() {
        let config = Config {
            dir_search_compat: true,
            extensions: vec![String::from("php")],
            ..Config::default()
        };

        let words = load("FUZZ", "#%EXT%\n#%EXT%\nindex.php\n", &config);
        assert_eq!(words, ["#php", "#php", "index.php"]);
    }

    #[test]
    fn compat_mode_placeholders_do_not_count_toward_limit() {
        let config = Config {
            dir_search_compat: true,
            wordlist_limit: 1,
            extensions: vec![String::from("php")],
            ..Config::default()
        };

        let words = load("FUZZ", "a.%EXT%\nb.%EXT%\nplain\nother\n", &config);
        assert_eq!(words, ["a.php", "b.php", "plain"]);
    }

    #[test]
    fn compat_mode_without_extensions_falls_back_to_default_mode() {
        let config = Config {
            dir_search_compat: true,
            ..Config::default()
        };

        let words = load("FUZZ", "index.%EXT%\n", &config);
        assert_eq!(words, ["index.%EXT%"]);
    }

    #[test]
    fn cursor_walks_payloads_in_order() {
        let mut wordlist =
            Wordlist::from_reader("FUZZ", "one\ntwo\n".as_bytes(), &Config::default()).unwrap();

        assert_eq!(wordlist.keyword(), "FUZZ");
        assert_eq!(wordlist.total(), 2);
        assert_eq!(wordlist.len(), 2);
        assert_eq!(wordlist.position(), 0);
        assert!(wordlist.has_next());
        assert_eq!(wordlist.value(), Some(b"one".as_slice()));
        assert_eq!(wordlist.payload(), Some(Payload::new("FUZZ", b"one".to_vec())));

        wordlist.increment_position();
        assert_eq!(wordlist.value(), Some(b"two".as_slice()));

        wordlist.increment_position();
        assert!(!wordlist.has_next());
        assert_eq!(wordlist.value(), None);
        assert_eq!(wordlist.payload(), None);

        wordlist.set_position(1);
        assert_eq!(wordlist.value(), Some(b"two".as_slice()));

        wordlist.reset_position();
        assert_eq!(wordlist.position(), 0);
    }

    #[test]
    fn wordlist_can_be_toggled() {
        let mut wordlist =
            Wordlist::from_reader("FUZZ", "one\n".as_bytes(), &Config::default()).unwrap();

        assert!(wordlist.active());
        wordlist.disable();
        assert!(!wordlist.active());
        wordlist.enable();
        assert!(wordlist.active());
    }

    #[test]
    fn wordlist_display_shows_length_and_top_entries() {
        let wordlist =
            Wordlist::from_reader("FUZZ", "a\nb\nc\nd\n".as_bytes(), &Config::default()).unwrap();

        assert_eq!(
            wordlist.to_string(),
            r#"Wordlist::{len=4, top-3=["a", "b", "c"]}"#
        );
    }

    #[test]
    fn wordlist_is_loaded_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "one").unwrap();
        writeln!(file, "# two").unwrap();
        writeln!(file, "three").unwrap();

        let path = file.path().to_string_lossy().to_string();
        let wordlist = Wordlist::new("FUZZ", &path, &Config::default()).unwrap();

        assert_eq!(wordlist.inner(), &[b"one".to_vec(), b"three".to_vec()]);
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let result = Wordlist::new("FUZZ", "/this/wordlist/does/not/exist", &Config::default());

        assert!(matches!(
            result,
            Err(FuffaError::WordlistOpenError { ref path, .. }) if path == "/this/wordlist/does/not/exist"
        ));
    }
}

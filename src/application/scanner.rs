//! Locate outbound `href` attributes in a chunk of HTML.
//!
//! The scanner works on raw bytes and reports, for every absolute `http(s)` link,
//! the offset of the `href=` attribute (where annotations are inserted) and the
//! URL it points at. Each chunk is scanned on its own; a link split across two
//! chunks is not seen.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::bytes::Regex;
use thiserror::Error;
use tracing::debug;

/// Matches are stored in blocks of this size.
const MATCH_CHUNK_SIZE: usize = 5;

/// Caseless `href="http…"` or `href='http…'`. The URL may not contain markup
/// delimiters, brackets, braces, quotes or a vertical tab. Unicode mode is off
/// so any other byte, including bytes of a non-UTF-8 page, belongs to the URL.
const LINK_PATTERN_SOURCE: &str =
    r#"(?i-u)href=(?:"(http[^\x0B<>{}\[\]"']+)"|'(http[^\x0B<>{}\[\]"']+)')"#;

static LINK_PATTERN: LazyLock<Result<Regex, ScanError>> =
    LazyLock::new(|| compile_pattern(LINK_PATTERN_SOURCE));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("link pattern failed to compile: {0}")]
    Pattern(String),
}

/// One located link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMatch {
    /// Byte offset of the `href=` attribute in the scanned buffer.
    pub offset: usize,
    pub url: String,
}

/// Links found in one buffer, ordered by strictly increasing offset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSet {
    links: Vec<LinkMatch>,
}

impl MatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, link: LinkMatch) {
        if self.links.len() == self.links.capacity() {
            self.links.reserve(MATCH_CHUNK_SIZE);
        }
        self.links.push(link);
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LinkMatch> {
        self.links.iter()
    }
}

impl<'a> IntoIterator for &'a MatchSet {
    type Item = &'a LinkMatch;
    type IntoIter = std::slice::Iter<'a, LinkMatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.links.iter()
    }
}

fn compile_pattern(source: &str) -> Result<Regex, ScanError> {
    Regex::new(source).map_err(|err| ScanError::Pattern(err.to_string()))
}

/// Scan `buffer` with the built-in link pattern.
pub fn scan(buffer: &[u8]) -> Result<MatchSet, ScanError> {
    let pattern = LINK_PATTERN.as_ref().map_err(Clone::clone)?;
    Ok(scan_with(pattern, buffer))
}

/// Capture group 1 or 2 holds the URL; the whole match marks the insertion point.
/// URLs that are not valid UTF-8 are decoded lossily.
fn scan_with(pattern: &Regex, buffer: &[u8]) -> MatchSet {
    let mut matches = MatchSet::new();

    for captures in pattern.captures_iter(buffer) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let Some(url) = captures.get(1).or_else(|| captures.get(2)) else {
            continue;
        };

        let url = match String::from_utf8_lossy(url.as_bytes()) {
            Cow::Borrowed(url) => url.to_string(),
            Cow::Owned(url) => {
                debug!(offset = whole.start(), url = %url, "link url is not utf-8, decoded lossily");
                url
            }
        };

        debug!(offset = whole.start(), url = %url, "link matched");
        matches.push(LinkMatch {
            offset: whole.start(),
            url,
        });
    }

    matches
}

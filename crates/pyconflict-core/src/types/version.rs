//! PEP 440 version type.
//!
//! A [`Version`] is the normalized tuple
//! `(epoch, release, pre, post, dev, local)`. Parsing accepts every spelling
//! PEP 440 allows (`v1.0`, `1.0-alpha.1`, `1.0-1`, `1.0.POST2`, ...) and stores
//! the normalized form; ordering and equality are defined on that form, so
//! `1.0 == 1.0.0` and `1.0.dev1 < 1.0a1 < 1.0 < 1.0.post1`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::{PycError, PycResult};

/// Pre-release phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrereleaseKind {
    Alpha,
    Beta,
    Rc,
}

impl PrereleaseKind {
    /// Normalized spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            PrereleaseKind::Alpha => "a",
            PrereleaseKind::Beta => "b",
            PrereleaseKind::Rc => "rc",
        }
    }
}

/// Pre-release qualifier, e.g. `rc1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Prerelease {
    pub kind: PrereleaseKind,
    pub number: u64,
}

/// One dot-separated piece of a local version label.
///
/// Alphanumeric segments sort before numeric ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LocalSegment {
    String(String),
    Number(u64),
}

impl fmt::Display for LocalSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalSegment::String(s) => f.write_str(s),
            LocalSegment::Number(n) => write!(f, "{}", n),
        }
    }
}

/// A PEP 440 version
#[derive(Debug, Clone)]
pub struct Version {
    epoch: u64,
    release: Vec<u64>,
    pre: Option<Prerelease>,
    post: Option<u64>,
    dev: Option<u64>,
    local: Vec<LocalSegment>,
}

impl Version {
    /// Create a final release from its release segments
    pub fn new<I>(release: I) -> Self
    where
        I: IntoIterator<Item = u64>,
    {
        let mut release: Vec<u64> = release.into_iter().collect();
        if release.is_empty() {
            release.push(0);
        }
        Self {
            epoch: 0,
            release,
            pre: None,
            post: None,
            dev: None,
            local: Vec::new(),
        }
    }

    /// Parse a version string
    pub fn parse(input: &str) -> PycResult<Self> {
        VersionParser::new(input).parse()
    }

    pub fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn with_pre(mut self, pre: Option<Prerelease>) -> Self {
        self.pre = pre;
        self
    }

    pub fn with_post(mut self, post: Option<u64>) -> Self {
        self.post = post;
        self
    }

    pub fn with_dev(mut self, dev: Option<u64>) -> Self {
        self.dev = dev;
        self
    }

    pub fn with_local(mut self, local: Vec<LocalSegment>) -> Self {
        self.local = local;
        self
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn release(&self) -> &[u64] {
        &self.release
    }

    pub fn pre(&self) -> Option<Prerelease> {
        self.pre
    }

    pub fn post(&self) -> Option<u64> {
        self.post
    }

    pub fn dev(&self) -> Option<u64> {
        self.dev
    }

    pub fn local(&self) -> &[LocalSegment] {
        &self.local
    }

    /// First release segment
    pub fn major(&self) -> u64 {
        self.release.first().copied().unwrap_or(0)
    }

    /// Second release segment (0 when absent)
    pub fn minor(&self) -> u64 {
        self.release.get(1).copied().unwrap_or(0)
    }

    /// Third release segment (0 when absent)
    pub fn micro(&self) -> u64 {
        self.release.get(2).copied().unwrap_or(0)
    }

    /// True for pre-releases and development releases
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    pub fn is_postrelease(&self) -> bool {
        self.post.is_some()
    }

    pub fn is_local(&self) -> bool {
        !self.local.is_empty()
    }

    /// Epoch and release only (`1!2.0rc1.post3+abc` -> `1!2.0`)
    pub fn base_version(&self) -> Version {
        Version::new(self.release.iter().copied()).with_epoch(self.epoch)
    }

    /// The version without its local label
    pub fn public(&self) -> Version {
        Version {
            local: Vec::new(),
            ..self.clone()
        }
    }

    /// Release segments with trailing zeros removed
    fn trimmed_release(&self) -> &[u64] {
        let len = self
            .release
            .iter()
            .rposition(|segment| *segment != 0)
            .map_or(0, |idx| idx + 1);
        &self.release[..len]
    }

    /// Rank of the pre-release slot: dev-only releases sort first, final
    /// releases last.
    fn pre_key(&self) -> (u8, Option<Prerelease>) {
        match (self.pre, self.post, self.dev) {
            (None, None, Some(_)) => (0, None),
            (Some(pre), _, _) => (1, Some(pre)),
            (None, _, _) => (2, None),
        }
    }

    fn dev_key(&self) -> (u8, u64) {
        match self.dev {
            Some(dev) => (0, dev),
            None => (1, 0),
        }
    }
}

fn compare_release(left: &[u64], right: &[u64]) -> Ordering {
    let len = left.len().max(right.len());
    for idx in 0..len {
        let a = left.get(idx).copied().unwrap_or(0);
        let b = right.get(idx).copied().unwrap_or(0);
        match a.cmp(&b) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| compare_release(&self.release, &other.release))
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post.cmp(&other.post))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
            .then_with(|| self.local.cmp(&other.local))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.epoch.hash(state);
        self.trimmed_release().hash(state);
        self.pre.hash(state);
        self.post.hash(state);
        self.dev.hash(state);
        self.local.hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}!", self.epoch)?;
        }

        let release: Vec<String> = self.release.iter().map(u64::to_string).collect();
        f.write_str(&release.join("."))?;

        if let Some(pre) = self.pre {
            write!(f, "{}{}", pre.kind.as_str(), pre.number)?;
        }
        if let Some(post) = self.post {
            write!(f, ".post{}", post)?;
        }
        if let Some(dev) = self.dev {
            write!(f, ".dev{}", dev)?;
        }
        if !self.local.is_empty() {
            let local: Vec<String> = self.local.iter().map(ToString::to_string).collect();
            write!(f, "+{}", local.join("."))?;
        }

        Ok(())
    }
}

impl FromStr for Version {
    type Err = PycError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}

const PRE_LABELS: &[(&str, PrereleaseKind)] = &[
    ("preview", PrereleaseKind::Rc),
    ("alpha", PrereleaseKind::Alpha),
    ("beta", PrereleaseKind::Beta),
    ("pre", PrereleaseKind::Rc),
    ("rc", PrereleaseKind::Rc),
    ("a", PrereleaseKind::Alpha),
    ("b", PrereleaseKind::Beta),
    ("c", PrereleaseKind::Rc),
];

const POST_LABELS: &[&str] = &["post", "rev", "r"];

fn is_separator(byte: u8) -> bool {
    matches!(byte, b'-' | b'_' | b'.')
}

/// Cursor over the lowercased input
struct VersionParser<'a> {
    original: &'a str,
    input: Vec<u8>,
    pos: usize,
}

impl<'a> VersionParser<'a> {
    fn new(original: &'a str) -> Self {
        Self {
            original,
            input: original.trim().to_ascii_lowercase().into_bytes(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> PycError {
        PycError::invalid_version(self.original, reason)
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn starts_with(&self, label: &str) -> bool {
        self.input[self.pos..].starts_with(label.as_bytes())
    }

    fn number(&mut self) -> PycResult<Option<u64>> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        if start == self.pos {
            return Ok(None);
        }
        // digits are ASCII, so the slice is valid UTF-8
        let digits = String::from_utf8_lossy(&self.input[start..self.pos]);
        digits
            .parse::<u64>()
            .map(Some)
            .map_err(|_| self.error(format!("number '{}' is too large", digits)))
    }

    /// Optional number after a qualifier label, allowing one separator
    /// between label and number. Missing numbers are implicitly 0.
    fn implicit_number(&mut self) -> PycResult<u64> {
        if let Some(sep) = self.peek() {
            if is_separator(sep) && matches!(self.peek_at(1), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
        }
        Ok(self.number()?.unwrap_or(0))
    }

    /// Consume an optional separator followed by one of the labels. The
    /// cursor is left untouched when no label follows.
    fn label<T: Copy>(&mut self, labels: &[(&str, T)]) -> Option<T> {
        let checkpoint = self.pos;
        if let Some(sep) = self.peek() {
            if is_separator(sep) {
                self.pos += 1;
            }
        }
        for (label, value) in labels {
            if self.starts_with(label) {
                self.pos += label.len();
                return Some(*value);
            }
        }
        self.pos = checkpoint;
        None
    }

    fn parse(mut self) -> PycResult<Version> {
        if self.input.is_empty() {
            return Err(self.error("version string is empty"));
        }

        self.eat(b'v');

        let first = self
            .number()?
            .ok_or_else(|| self.error("expected a release number"))?;
        let (epoch, first) = if self.eat(b'!') {
            let release_start = self
                .number()?
                .ok_or_else(|| self.error("expected a release number after the epoch"))?;
            (first, release_start)
        } else {
            (0, first)
        };

        let mut release = vec![first];
        while self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b'0'..=b'9')) {
            self.pos += 1;
            if let Some(segment) = self.number()? {
                release.push(segment);
            }
        }

        let pre = match self.label(PRE_LABELS) {
            Some(kind) => Some(Prerelease {
                kind,
                number: self.implicit_number()?,
            }),
            None => None,
        };

        let post = if self.peek() == Some(b'-') && matches!(self.peek_at(1), Some(b'0'..=b'9')) {
            self.pos += 1;
            self.number()?
        } else {
            let post_labels: Vec<(&str, ())> = POST_LABELS.iter().map(|l| (*l, ())).collect();
            match self.label(&post_labels) {
                Some(()) => Some(self.implicit_number()?),
                None => None,
            }
        };

        let dev = match self.label(&[("dev", ())]) {
            Some(()) => Some(self.implicit_number()?),
            None => None,
        };

        let local = if self.eat(b'+') {
            self.local()?
        } else {
            Vec::new()
        };

        if let Some(byte) = self.peek() {
            return Err(self.error(format!(
                "unexpected character '{}' at position {}",
                byte as char, self.pos
            )));
        }

        Ok(Version {
            epoch,
            release,
            pre,
            post,
            dev,
            local,
        })
    }

    fn local(&mut self) -> PycResult<Vec<LocalSegment>> {
        let mut segments = Vec::new();
        loop {
            let start = self.pos;
            while matches!(self.peek(), Some(b'a'..=b'z' | b'0'..=b'9')) {
                self.pos += 1;
            }
            if start == self.pos {
                return Err(self.error("empty segment in local version label"));
            }
            let text = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
            let segment = if text.bytes().all(|b| b.is_ascii_digit()) {
                text.parse::<u64>()
                    .map(LocalSegment::Number)
                    .unwrap_or(LocalSegment::String(text))
            } else {
                LocalSegment::String(text)
            };
            segments.push(segment);

            match self.peek() {
                Some(sep) if is_separator(sep) => self.pos += 1,
                _ => return Ok(segments),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_version_parsing() {
        let version = v("1.2.3");
        assert_eq!(version.epoch(), 0);
        assert_eq!(version.release(), &[1, 2, 3]);
        assert_eq!(version.pre(), None);
        assert_eq!(version.post(), None);
        assert_eq!(version.dev(), None);
        assert!(!version.is_local());
    }

    #[test]
    fn test_version_with_all_qualifiers() {
        let version = v("2!1.0rc2.post3.dev4+ubuntu.1");
        assert_eq!(version.epoch(), 2);
        assert_eq!(version.release(), &[1, 0]);
        assert_eq!(
            version.pre(),
            Some(Prerelease {
                kind: PrereleaseKind::Rc,
                number: 2
            })
        );
        assert_eq!(version.post(), Some(3));
        assert_eq!(version.dev(), Some(4));
        assert_eq!(
            version.local(),
            &[
                LocalSegment::String("ubuntu".to_string()),
                LocalSegment::Number(1)
            ]
        );
        assert_eq!(version.to_string(), "2!1.0rc2.post3.dev4+ubuntu.1");
    }

    #[test]
    fn test_alternative_spellings_normalize() {
        assert_eq!(v("v1.0").to_string(), "1.0");
        assert_eq!(v("1.0-alpha.1").to_string(), "1.0a1");
        assert_eq!(v("1.0BETA2").to_string(), "1.0b2");
        assert_eq!(v("1.0c1").to_string(), "1.0rc1");
        assert_eq!(v("1.0-preview-3").to_string(), "1.0rc3");
        assert_eq!(v("1.0a").to_string(), "1.0a0");
        assert_eq!(v("1.0-1").to_string(), "1.0.post1");
        assert_eq!(v("1.0rev2").to_string(), "1.0.post2");
        assert_eq!(v("1.0.post").to_string(), "1.0.post0");
        assert_eq!(v("1.0-dev").to_string(), "1.0.dev0");
        assert_eq!(v("1.0+Local_Build-7").to_string(), "1.0+local.build.7");
        assert_eq!(v("  1.0  ").to_string(), "1.0");
    }

    #[test]
    fn test_invalid_versions() {
        for input in ["", "abc", "1.", "1..0", "1.0+", "1.0+a..b", "1.0-beta-x", "1!", "1.0 2"] {
            let err = Version::parse(input).unwrap_err();
            assert!(
                matches!(err, PycError::InvalidVersion { .. }),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_version_comparison() {
        assert!(v("1.0.0") < v("1.0.1"));
        assert!(v("1.0.1") < v("1.1.0"));
        assert!(v("1.1.0") < v("2.0.0"));
        assert!(v("1.0rc1") < v("1.0"));
        assert!(v("1.0") < v("1.0.post1"));
        assert!(v("1.0.dev1") < v("1.0"));
        assert!(v("1.0.dev1") < v("1.0a1"));
        assert!(v("1.0a1") < v("1.0a2.dev1"));
        assert!(v("1.0a2.dev1") < v("1.0a2"));
        assert!(v("1.0a2") < v("1.0b1"));
        assert!(v("1.0b1") < v("1.0rc1"));
        assert!(v("1.0.post1.dev1") < v("1.0.post1"));
        assert!(v("1.0") < v("1.0+local"));
        assert!(v("1.0+abc") < v("1.0+1"));
        assert!(v("1.0+1") < v("1.0+1.0"));
        assert!(v("2.0") < v("1!1.0"));
    }

    #[test]
    fn test_trailing_zero_equality() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("1"), v("1.0.0.0"));
        assert_ne!(v("1.0"), v("1.0.1"));

        use std::collections::HashSet;
        let set: HashSet<Version> = [v("1.0"), v("1.0.0"), v("1")].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_prerelease_detection() {
        assert!(v("1.0a1").is_prerelease());
        assert!(v("1.0.dev0").is_prerelease());
        assert!(v("1.0.post1.dev0").is_prerelease());
        assert!(!v("1.0.post1").is_prerelease());
        assert!(!v("1.0+local").is_prerelease());
    }

    #[test]
    fn test_base_and_public() {
        let version = v("1!2.3rc1.post2+abc");
        assert_eq!(version.base_version().to_string(), "1!2.3");
        assert_eq!(version.public().to_string(), "1!2.3rc1.post2");
    }

    #[test]
    fn test_major_minor_micro() {
        let version = v("3.11");
        assert_eq!(version.major(), 3);
        assert_eq!(version.minor(), 11);
        assert_eq!(version.micro(), 0);
    }

    #[test]
    fn test_serde_as_string() {
        let version = v("1.0-rc.1");
        let json = serde_json::to_string(&version).unwrap();
        assert_eq!(json, "\"1.0rc1\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, version);
        assert!(serde_json::from_str::<Version>("\"not-a-version\"").is_err());
    }
}

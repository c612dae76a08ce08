//! PEP 440 version specifiers.
//!
//! A [`SpecifierSet`] is a comma-separated conjunction of [`Specifier`]
//! clauses such as `>=3.3.2,<4`. Containment follows PEP 440, including the
//! exclusive-ordering rules for pre-, post- and local releases and the
//! default exclusion of pre-releases.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::Version;
use crate::error::{PycError, PycResult};

/// Specifier comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    /// `==1.0`
    Equal,
    /// `==1.0.*`
    EqualStar,
    /// `===foobar`
    ExactEqual,
    /// `!=1.0`
    NotEqual,
    /// `!=1.0.*`
    NotEqualStar,
    /// `~=1.4.2`
    TildeEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal | Operator::EqualStar => "==",
            Operator::ExactEqual => "===",
            Operator::NotEqual | Operator::NotEqualStar => "!=",
            Operator::TildeEqual => "~=",
            Operator::LessThan => "<",
            Operator::LessThanEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanEqual => ">=",
        }
    }

    /// Longest operator at the start of `input`
    fn parse_prefix(input: &str) -> Option<(Operator, usize)> {
        const OPERATORS: &[(&str, Operator)] = &[
            ("===", Operator::ExactEqual),
            ("==", Operator::Equal),
            ("!=", Operator::NotEqual),
            ("~=", Operator::TildeEqual),
            ("<=", Operator::LessThanEqual),
            (">=", Operator::GreaterThanEqual),
            ("<", Operator::LessThan),
            (">", Operator::GreaterThan),
        ];
        OPERATORS
            .iter()
            .find(|(token, _)| input.starts_with(token))
            .map(|(token, op)| (*op, token.len()))
    }

    /// Operators whose pre-release operand opts the whole set into
    /// pre-releases
    fn admits_prereleases(&self) -> bool {
        matches!(
            self,
            Operator::Equal
                | Operator::EqualStar
                | Operator::ExactEqual
                | Operator::LessThanEqual
                | Operator::GreaterThanEqual
                | Operator::TildeEqual
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `operator version` clause
#[derive(Debug, Clone)]
pub struct Specifier {
    operator: Operator,
    /// Operand as written, e.g. `1.0.*`
    text: String,
    /// Parsed operand. `None` only for `===` with a non-PEP 440 operand.
    version: Option<Version>,
}

impl Specifier {
    /// Parse one clause such as `>=1.0` or `!=2.1.*`
    pub fn parse(input: &str) -> PycResult<Self> {
        let trimmed = input.trim();
        let (operator, op_len) = Operator::parse_prefix(trimmed).ok_or_else(|| {
            PycError::invalid_specifier(input, "expected an operator such as >=, ==, ~= or <")
        })?;
        let text = trimmed[op_len..].trim();
        if text.is_empty() {
            return Err(PycError::invalid_specifier(input, "missing version"));
        }

        if operator == Operator::ExactEqual {
            if text.chars().any(char::is_whitespace) {
                return Err(PycError::invalid_specifier(
                    input,
                    "arbitrary equality operand cannot contain whitespace",
                ));
            }
            return Ok(Self {
                operator,
                text: text.to_string(),
                version: Version::parse(text).ok(),
            });
        }

        let invalid = |reason: String| PycError::invalid_specifier(input, reason);

        if let Some(prefix) = text.strip_suffix(".*") {
            let operator = match operator {
                Operator::Equal => Operator::EqualStar,
                Operator::NotEqual => Operator::NotEqualStar,
                other => {
                    return Err(invalid(format!(
                        "wildcards are not allowed with '{}'",
                        other
                    )))
                },
            };
            let version = Version::parse(prefix).map_err(|e| invalid(e.to_string()))?;
            if version.is_prerelease() || version.is_postrelease() || version.is_local() {
                return Err(invalid(
                    "wildcards may only follow release segments".to_string(),
                ));
            }
            return Ok(Self {
                operator,
                text: text.to_string(),
                version: Some(version),
            });
        }

        let version = Version::parse(text).map_err(|e| invalid(e.to_string()))?;
        match operator {
            Operator::Equal | Operator::NotEqual => {},
            Operator::TildeEqual if version.release().len() < 2 => {
                return Err(invalid(
                    "'~=' needs at least two release segments".to_string(),
                ));
            },
            _ if version.is_local() => {
                return Err(invalid(format!(
                    "local versions are not allowed with '{}'",
                    operator
                )));
            },
            _ => {},
        }

        Ok(Self {
            operator,
            text: text.to_string(),
            version: Some(version),
        })
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// The operand exactly as written
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// True when the operand itself is a pre-release and the operator can
    /// select it
    pub fn prereleases(&self) -> bool {
        self.operator.admits_prereleases()
            && self.version.as_ref().map_or(false, Version::is_prerelease)
    }

    /// Whether `candidate` satisfies this clause, ignoring the pre-release
    /// policy of the enclosing set
    pub fn contains(&self, candidate: &Version) -> bool {
        if self.operator == Operator::ExactEqual {
            return candidate.to_string().eq_ignore_ascii_case(&self.text);
        }

        let Some(spec) = self.version.as_ref() else {
            return false;
        };

        match self.operator {
            Operator::Equal => {
                if spec.is_local() {
                    candidate == spec
                } else {
                    candidate.public() == *spec
                }
            },
            Operator::NotEqual => {
                if spec.is_local() {
                    candidate != spec
                } else {
                    candidate.public() != *spec
                }
            },
            Operator::EqualStar => prefix_matches(candidate, spec.epoch(), spec.release()),
            Operator::NotEqualStar => !prefix_matches(candidate, spec.epoch(), spec.release()),
            Operator::TildeEqual => {
                let release = spec.release();
                candidate.public() >= *spec
                    && prefix_matches(candidate, spec.epoch(), &release[..release.len() - 1])
            },
            Operator::LessThanEqual => candidate.public() <= *spec,
            Operator::GreaterThanEqual => candidate.public() >= *spec,
            Operator::LessThan => {
                let candidate = candidate.public();
                if candidate >= *spec {
                    return false;
                }
                // <3.1 must not admit 3.1rc1
                !(!spec.is_prerelease()
                    && candidate.is_prerelease()
                    && candidate.base_version() == spec.base_version())
            },
            Operator::GreaterThan => {
                if candidate.public() <= *spec {
                    return false;
                }
                // >3.1 must not admit 3.1.post1 or 3.1+local
                if !spec.is_postrelease()
                    && candidate.is_postrelease()
                    && candidate.base_version() == spec.base_version()
                {
                    return false;
                }
                !(candidate.is_local() && candidate.base_version() == spec.base_version())
            },
            Operator::ExactEqual => false,
        }
    }
}

/// Epoch and zero-padded release prefix comparison used by `==V.*`
fn prefix_matches(candidate: &Version, epoch: u64, prefix: &[u64]) -> bool {
    candidate.epoch() == epoch
        && prefix
            .iter()
            .enumerate()
            .all(|(idx, segment)| candidate.release().get(idx).copied().unwrap_or(0) == *segment)
}

impl PartialEq for Specifier {
    fn eq(&self, other: &Self) -> bool {
        if self.operator != other.operator {
            return false;
        }
        match (&self.version, &other.version) {
            _ if self.operator == Operator::ExactEqual => {
                self.text.eq_ignore_ascii_case(&other.text)
            },
            (Some(a), Some(b)) => match self.operator {
                // ~=1.0 and ~=1.0.0 select different ranges
                Operator::TildeEqual | Operator::EqualStar | Operator::NotEqualStar => {
                    a == b && a.release().len() == b.release().len()
                },
                _ => a == b,
            },
            _ => false,
        }
    }
}

impl Eq for Specifier {}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator, self.text)
    }
}

impl FromStr for Specifier {
    type Err = PycError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Specifier::parse(s)
    }
}

/// Conjunction of specifier clauses. The empty set admits every version.
#[derive(Debug, Clone, Default)]
pub struct SpecifierSet {
    specifiers: Vec<Specifier>,
}

impl SpecifierSet {
    /// The unconstrained set
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a comma-separated specifier list. Blank input is the empty set,
    /// and blank clauses (`>=3.6, `) are skipped.
    pub fn parse(input: &str) -> PycResult<Self> {
        let mut specifiers = Vec::new();
        for clause in input.split(',').filter(|c| !c.trim().is_empty()) {
            let specifier = Specifier::parse(clause).map_err(|e| match e {
                PycError::InvalidSpecifier { reason, .. } => {
                    PycError::invalid_specifier(input, reason)
                },
                other => other,
            })?;
            specifiers.push(specifier);
        }
        Ok(Self::from_specifiers(specifiers))
    }

    /// Build a set, dropping duplicate clauses while keeping first-seen order
    pub fn from_specifiers<I>(specifiers: I) -> Self
    where
        I: IntoIterator<Item = Specifier>,
    {
        let mut unique: Vec<Specifier> = Vec::new();
        for specifier in specifiers {
            if !unique.contains(&specifier) {
                unique.push(specifier);
            }
        }
        Self { specifiers: unique }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Specifier> {
        self.specifiers.iter()
    }

    pub fn len(&self) -> usize {
        self.specifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specifiers.is_empty()
    }

    /// Whether any clause opts the set into pre-releases
    pub fn prereleases(&self) -> bool {
        self.specifiers.iter().any(Specifier::prereleases)
    }

    /// PEP 440 containment with the set's own pre-release policy
    pub fn contains(&self, version: &Version) -> bool {
        self.contains_with_prereleases(version, self.prereleases())
    }

    /// Containment with an explicit pre-release policy
    pub fn contains_with_prereleases(&self, version: &Version, prereleases: bool) -> bool {
        if self.specifiers.is_empty() {
            return true;
        }
        if version.is_prerelease() && !prereleases {
            return false;
        }
        self.specifiers.iter().all(|spec| spec.contains(version))
    }

    /// Keep the versions this set contains, preserving input order
    pub fn filter<'a, I>(&'a self, versions: I) -> impl Iterator<Item = &'a Version> + 'a
    where
        I: IntoIterator<Item = &'a Version>,
        I::IntoIter: 'a,
    {
        versions.into_iter().filter(move |v| self.contains(v))
    }

    /// Conjunction of both sets
    pub fn intersection(&self, other: &SpecifierSet) -> SpecifierSet {
        SpecifierSet::from_specifiers(
            self.specifiers
                .iter()
                .chain(other.specifiers.iter())
                .cloned(),
        )
    }

    /// True when the clauses provably admit no version at all.
    ///
    /// Only contradictions visible from the combined lower and upper bounds
    /// are detected (`>=2,<1`, `>1,<=1`, `==1.0,!=1.0`); anything else is
    /// reported as satisfiable.
    pub fn is_unsatisfiable(&self) -> bool {
        let mut lower: Option<Bound> = None;
        let mut upper: Option<Bound> = None;
        let mut excluded: Vec<&Version> = Vec::new();

        for spec in &self.specifiers {
            let Some(version) = spec.version.as_ref() else {
                continue;
            };
            match spec.operator {
                Operator::Equal => {
                    let public = version.public();
                    tighten_lower(&mut lower, Bound::inclusive(public.clone()));
                    tighten_upper(&mut upper, Bound::inclusive(public));
                },
                Operator::EqualStar => {
                    let (start, end) = prefix_range(version.epoch(), version.release());
                    tighten_lower(&mut lower, Bound::inclusive(start));
                    tighten_upper(&mut upper, Bound::exclusive(end));
                },
                Operator::TildeEqual => {
                    let release = version.release();
                    let (_, end) = prefix_range(version.epoch(), &release[..release.len() - 1]);
                    tighten_lower(&mut lower, Bound::inclusive(version.clone()));
                    tighten_upper(&mut upper, Bound::exclusive(end));
                },
                Operator::GreaterThanEqual => {
                    tighten_lower(&mut lower, Bound::inclusive(version.clone()))
                },
                Operator::GreaterThan => {
                    tighten_lower(&mut lower, Bound::exclusive(version.clone()))
                },
                Operator::LessThanEqual => {
                    tighten_upper(&mut upper, Bound::inclusive(version.clone()))
                },
                Operator::LessThan => tighten_upper(&mut upper, Bound::exclusive(version.clone())),
                Operator::NotEqual if !version.is_local() => excluded.push(version),
                _ => {},
            }
        }

        let (Some(lower), Some(upper)) = (lower, upper) else {
            return false;
        };
        match lower.version.cmp(&upper.version) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Equal => {
                !(lower.inclusive && upper.inclusive)
                    || excluded.iter().any(|v| **v == lower.version)
            },
            std::cmp::Ordering::Less => false,
        }
    }
}

/// One end of a version interval
#[derive(Debug, Clone)]
struct Bound {
    version: Version,
    inclusive: bool,
}

impl Bound {
    fn inclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: true,
        }
    }

    fn exclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: false,
        }
    }
}

fn tighten_lower(current: &mut Option<Bound>, candidate: Bound) {
    let replace = match current {
        None => true,
        Some(bound) => {
            candidate.version > bound.version
                || (candidate.version == bound.version && !candidate.inclusive)
        },
    };
    if replace {
        *current = Some(candidate);
    }
}

fn tighten_upper(current: &mut Option<Bound>, candidate: Bound) {
    let replace = match current {
        None => true,
        Some(bound) => {
            candidate.version < bound.version
                || (candidate.version == bound.version && !candidate.inclusive)
        },
    };
    if replace {
        *current = Some(candidate);
    }
}

/// `[P.dev0, bump(P).dev0)`, the interval covering every version whose
/// release starts with `prefix`
fn prefix_range(epoch: u64, prefix: &[u64]) -> (Version, Version) {
    let start = Version::new(prefix.iter().copied())
        .with_epoch(epoch)
        .with_dev(Some(0));
    let mut bumped = prefix.to_vec();
    if let Some(last) = bumped.last_mut() {
        *last = last.saturating_add(1);
    }
    let end = Version::new(bumped).with_epoch(epoch).with_dev(Some(0));
    (start, end)
}

impl PartialEq for SpecifierSet {
    fn eq(&self, other: &Self) -> bool {
        self.specifiers.len() == other.specifiers.len()
            && self.specifiers.iter().all(|s| other.specifiers.contains(s))
    }
}

impl Eq for SpecifierSet {}

impl fmt::Display for SpecifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut clauses: Vec<String> = self.specifiers.iter().map(ToString::to_string).collect();
        clauses.sort();
        f.write_str(&clauses.join(","))
    }
}

impl FromStr for SpecifierSet {
    type Err = PycError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SpecifierSet::parse(s)
    }
}

impl Serialize for SpecifierSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SpecifierSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SpecifierSet::parse(&s).map_err(serde::de::Error::custom)
    }
}

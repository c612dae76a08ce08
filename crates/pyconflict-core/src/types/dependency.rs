//! Dependency requirement types.
//!
//! A [`Dependency`] is one PEP 508 requirement line as published in a
//! package's `requires_dist` metadata:
//!
//! ```text
//! asgiref<4,>=3.3.2
//! requests[socks] (>=2.0) ; python_version >= "3.8"
//! pip @ https://example.com/pip.whl ; sys_platform == "linux"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::SpecifierSet;
use crate::error::{PycError, PycResult};
use crate::utils::{is_valid_name, normalize_name};

/// A requirement on another distribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub specifier: SpecifierSet,
    /// Environment marker, evaluated lazily
    pub marker: Option<String>,
    pub extras: BTreeSet<String>,
    /// Direct reference (`name @ url`)
    pub url: Option<String>,
}

impl Dependency {
    /// Create a new dependency with no marker or extras
    pub fn new(name: impl Into<String>, specifier: SpecifierSet) -> Self {
        Self {
            name: name.into(),
            specifier,
            marker: None,
            extras: BTreeSet::new(),
            url: None,
        }
    }

    /// Parse a PEP 508 requirement string
    pub fn parse(input: &str) -> PycResult<Self> {
        let invalid = |reason: &str| PycError::InvalidRequirement {
            requirement: input.to_string(),
            reason: reason.to_string(),
        };

        let line = input.trim();
        if line.is_empty() {
            return Err(invalid("requirement is empty"));
        }

        let name_end = line
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
            .unwrap_or(line.len());
        let name = &line[..name_end];
        if !is_valid_name(name) {
            return Err(invalid("expected a distribution name"));
        }

        let mut rest = line[name_end..].trim_start();
        let mut extras = BTreeSet::new();
        if let Some(after_bracket) = rest.strip_prefix('[') {
            let close = after_bracket
                .find(']')
                .ok_or_else(|| invalid("unterminated extras list"))?;
            for extra in after_bracket[..close].split(',') {
                let extra = extra.trim();
                if extra.is_empty() {
                    continue;
                }
                if !is_valid_name(extra) {
                    return Err(invalid("invalid extra name"));
                }
                extras.insert(normalize_name(extra));
            }
            rest = after_bracket[close + 1..].trim_start();
        }

        let (body, marker) = split_marker(rest);
        let marker = marker.map(str::trim).filter(|m| !m.is_empty());
        if rest.contains(';') && marker.is_none() {
            return Err(invalid("empty environment marker"));
        }

        let (specifier, url) = if let Some(reference) = body.strip_prefix('@') {
            let url = reference.trim();
            if url.is_empty() {
                return Err(invalid("missing URL after '@'"));
            }
            (SpecifierSet::empty(), Some(url.to_string()))
        } else {
            let mut spec = body.trim();
            if let Some(inner) = spec.strip_prefix('(') {
                spec = inner
                    .strip_suffix(')')
                    .ok_or_else(|| invalid("unbalanced parentheses around specifier"))?
                    .trim();
            }
            if !spec.is_empty() && spec.split(',').any(|clause| clause.trim().is_empty()) {
                return Err(invalid("empty specifier clause"));
            }
            let specifier = SpecifierSet::parse(spec).map_err(|e| PycError::InvalidRequirement {
                requirement: input.to_string(),
                reason: e.to_string(),
            })?;
            (specifier, None)
        };

        Ok(Self {
            name: name.to_string(),
            specifier,
            marker: marker.map(str::to_string),
            extras,
            url,
        })
    }

    /// Attach an environment marker
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }

    /// PEP 503 normalized name
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }
}

/// Split off the marker. A direct reference URL may itself contain `;`, so
/// for `@` requirements the marker must be introduced by whitespace.
fn split_marker(rest: &str) -> (&str, Option<&str>) {
    if rest.starts_with('@') {
        match rest.find(" ;").or_else(|| rest.find("\t;")) {
            Some(idx) => (&rest[..idx], Some(&rest[idx + 2..])),
            None => (rest, None),
        }
    } else {
        match rest.split_once(';') {
            Some((body, marker)) => (body, Some(marker)),
            None => (rest, None),
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.extras.is_empty() {
            let extras: Vec<&str> = self.extras.iter().map(String::as_str).collect();
            write!(f, "[{}]", extras.join(","))?;
        }
        match &self.url {
            Some(url) => write!(f, " @ {}", url)?,
            None => write!(f, "{}", self.specifier)?,
        }
        if let Some(marker) = &self.marker {
            if self.url.is_some() {
                f.write_str(" ")?;
            }
            write!(f, "; {}", marker)?;
        }
        Ok(())
    }
}

impl FromStr for Dependency {
    type Err = PycError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dependency::parse(s)
    }
}

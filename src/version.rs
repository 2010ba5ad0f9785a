//! Semantic versions and version constraint bounds
//!
//! Versions are comparable triples (`major.minor.patch`). Constraint bounds
//! carry optional minimum/maximum versions with inclusive/exclusive flags and
//! support intersection, which is how disjoint constraint sets are detected
//! before any ordering is attempted.

use std::fmt;
use std::str::FromStr;

use crate::error::{ModforgeError, Result};

/// A semantic version triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = ModforgeError;

    /// Parses `major[.minor[.patch]]`; omitted components default to zero
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ModforgeError::InvalidVersion {
            input: s.to_string(),
        };

        let mut parts = s.trim().split('.');
        let mut next_component = |required: bool| -> Result<u64> {
            match parts.next() {
                Some(p) => p.parse::<u64>().map_err(|_| invalid()),
                None if required => Err(invalid()),
                None => Ok(0),
            }
        };

        let major = next_component(true)?;
        let minor = next_component(false)?;
        let patch = next_component(false)?;

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Version::new(major, minor, patch))
    }
}

/// Acceptable version range for a dependency constraint
///
/// `min`/`max` of `None` mean unbounded on that side. An exact constraint is
/// represented as an inclusive min equal to an inclusive max.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionBounds {
    pub min: Option<Version>,
    pub min_inclusive: bool,
    pub max: Option<Version>,
    pub max_inclusive: bool,
}

impl Default for VersionBounds {
    fn default() -> Self {
        Self::any()
    }
}

impl VersionBounds {
    /// Accepts any version (`*`)
    pub const fn any() -> Self {
        Self {
            min: None,
            min_inclusive: true,
            max: None,
            max_inclusive: true,
        }
    }

    /// Accepts exactly one version
    pub const fn exact(version: Version) -> Self {
        Self {
            min: Some(version),
            min_inclusive: true,
            max: Some(version),
            max_inclusive: true,
        }
    }

    /// Accepts `version` and anything newer
    pub const fn at_least(version: Version) -> Self {
        Self {
            min: Some(version),
            min_inclusive: true,
            max: None,
            max_inclusive: true,
        }
    }

    /// Whether `version` falls within the bounds
    pub fn contains(&self, version: Version) -> bool {
        if let Some(min) = self.min {
            if version < min || (version == min && !self.min_inclusive) {
                return false;
            }
        }
        if let Some(max) = self.max {
            if version > max || (version == max && !self.max_inclusive) {
                return false;
            }
        }
        true
    }

    /// Intersection of two bounds; the result may be empty
    pub fn intersect(&self, other: &Self) -> Self {
        let (min, min_inclusive) = tighter_bound(
            (self.min, self.min_inclusive),
            (other.min, other.min_inclusive),
            BoundSide::Lower,
        );
        let (max, max_inclusive) = tighter_bound(
            (self.max, self.max_inclusive),
            (other.max, other.max_inclusive),
            BoundSide::Upper,
        );
        Self {
            min,
            min_inclusive,
            max,
            max_inclusive,
        }
    }

    /// Whether no version at all can satisfy the bounds
    pub fn is_empty(&self) -> bool {
        match (self.min, self.max) {
            (Some(min), Some(max)) => {
                min > max || (min == max && !(self.min_inclusive && self.max_inclusive))
            }
            _ => false,
        }
    }
}

enum BoundSide {
    Lower,
    Upper,
}

fn tighter_bound(
    a: (Option<Version>, bool),
    b: (Option<Version>, bool),
    side: BoundSide,
) -> (Option<Version>, bool) {
    match (a.0, b.0) {
        (None, None) => (None, true),
        (Some(_), None) => a,
        (None, Some(_)) => b,
        (Some(va), Some(vb)) => {
            if va == vb {
                // Exclusive wins: the intersection keeps the stricter flag
                (Some(va), a.1 && b.1)
            } else {
                let a_tighter = match side {
                    BoundSide::Lower => va > vb,
                    BoundSide::Upper => va < vb,
                };
                if a_tighter { a } else { b }
            }
        }
    }
}

impl fmt::Display for VersionBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (None, None) => write!(f, "*"),
            (Some(min), Some(max)) if min == max && self.min_inclusive && self.max_inclusive => {
                write!(f, "{min}")
            }
            _ => {
                let mut parts = Vec::new();
                if let Some(min) = self.min {
                    let op = if self.min_inclusive { ">=" } else { ">" };
                    parts.push(format!("{op}{min}"));
                }
                if let Some(max) = self.max {
                    let op = if self.max_inclusive { "<=" } else { "<" };
                    parts.push(format!("{op}{max}"));
                }
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

impl FromStr for VersionBounds {
    type Err = ModforgeError;

    /// Parses constraint expressions: `*`, an exact version, a single
    /// comparison (`>=1.2.0`, `>1.2`, `<=2`, `<3.0`) or a comma-joined
    /// range such as `>=2.0,<3.0`
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed == "*" || trimmed.is_empty() {
            return Ok(Self::any());
        }

        let mut bounds = Self::any();
        for term in trimmed.split(',') {
            let term = term.trim();
            let term_bounds = parse_term(term).ok_or_else(|| ModforgeError::InvalidConstraint {
                input: s.to_string(),
            })?;
            bounds = bounds.intersect(&term_bounds);
        }
        Ok(bounds)
    }
}

fn parse_term(term: &str) -> Option<VersionBounds> {
    let parse = |v: &str| Version::from_str(v.trim()).ok();

    if let Some(rest) = term.strip_prefix(">=") {
        return Some(VersionBounds::at_least(parse(rest)?));
    }
    if let Some(rest) = term.strip_prefix("<=") {
        return Some(VersionBounds {
            min: None,
            min_inclusive: true,
            max: Some(parse(rest)?),
            max_inclusive: true,
        });
    }
    if let Some(rest) = term.strip_prefix('>') {
        return Some(VersionBounds {
            min: Some(parse(rest)?),
            min_inclusive: false,
            max: None,
            max_inclusive: true,
        });
    }
    if let Some(rest) = term.strip_prefix('<') {
        return Some(VersionBounds {
            min: None,
            min_inclusive: true,
            max: Some(parse(rest)?),
            max_inclusive: false,
        });
    }
    Some(VersionBounds::exact(parse(term)?))
}

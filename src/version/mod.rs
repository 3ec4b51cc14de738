// src/version/mod.rs

//! Version identifiers and prerequisite match rules
//!
//! Plugin versions use the `major.minor.service` scheme. Ordering is total
//! and backed by semver; the match predicates implement the platform's
//! band arithmetic: `exact` pins major and minor, `compatible` pins major
//! only, and both accept any service level at or above the requested one.

use crate::error::{Error, Result};
use semver::Version;
use std::cmp::Ordering;
use std::fmt;

/// A parsed plugin version with major, minor, and service components
///
/// Missing components default to zero, so `"2"` and `"2.0.0"` denote the
/// same version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PluginVersion {
    pub major: u64,
    pub minor: u64,
    pub service: u64,
}

impl PluginVersion {
    pub fn new(major: u64, minor: u64, service: u64) -> Self {
        Self {
            major,
            minor,
            service,
        }
    }

    /// Parse a version string
    ///
    /// Accepts one to three dot-separated non-negative integers:
    /// - "2" → 2.0.0
    /// - "1.2" → 1.2.0
    /// - "1.2.3" → 1.2.3
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::VersionParse(s.to_string()));
        }
        let mut components = [0u64; 3];
        let mut count = 0;
        for part in s.split('.') {
            if count >= 3 {
                return Err(Error::VersionParse(s.to_string()));
            }
            components[count] = part
                .parse::<u64>()
                .map_err(|_| Error::VersionParse(s.to_string()))?;
            count += 1;
        }
        Ok(Self {
            major: components[0],
            minor: components[1],
            service: components[2],
        })
    }

    /// Parse a version string, falling back to `1.0.0` on any failure
    ///
    /// The resolver never rejects a descriptor over a malformed version;
    /// anything unparseable is treated as the baseline `1.0.0`.
    pub fn parse_lenient(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }

    /// Convert to a semver::Version for comparison
    fn to_semver(self) -> Version {
        Version::new(self.major, self.minor, self.service)
    }

    /// Strict ordering test on (major, minor, service)
    pub fn is_greater_than(&self, other: &PluginVersion) -> bool {
        self > other
    }

    /// Equivalence test, used for exact prerequisite matches
    ///
    /// True when major and minor agree and this version's service level is
    /// at least the required one.
    pub fn is_equivalent_to(&self, other: &PluginVersion) -> bool {
        self.major == other.major && self.minor == other.minor && self.service >= other.service
    }

    /// Compatibility test, used for compatible prerequisite matches
    ///
    /// True when the major components agree and this version is not older
    /// than the required one.
    pub fn is_compatible_with(&self, other: &PluginVersion) -> bool {
        self.major == other.major
            && (self.minor, self.service) >= (other.minor, other.service)
    }
}

impl Default for PluginVersion {
    /// The baseline version assumed for descriptors that carry none
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

impl fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.service)
    }
}

impl Ord for PluginVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_semver().cmp(&other.to_semver())
    }
}

impl PartialOrd for PluginVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// How a prerequisite's version requirement is matched against candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// Candidate must be equivalent to the required version
    Exact,
    /// Candidate must be compatible with the required version
    Compatible,
    /// Any version is acceptable; the newest wins
    Latest,
}

impl MatchRule {
    /// Check whether a candidate version satisfies this rule
    pub fn satisfies(self, candidate: &PluginVersion, required: &PluginVersion) -> bool {
        match self {
            MatchRule::Exact => candidate.is_equivalent_to(required),
            MatchRule::Compatible => candidate.is_compatible_with(required),
            MatchRule::Latest => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchRule::Exact => "exact",
            MatchRule::Compatible => "compatible",
            MatchRule::Latest => "latest",
        }
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

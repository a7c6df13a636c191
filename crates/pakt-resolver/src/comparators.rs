use semver::Version;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparator {
    Exact(Version),
    GreaterThan(Version),
    GreaterThanOrEqual(Version),
    LessThan(Version),
    LessThanOrEqual(Version),
    Wildcard, // *
}

impl Comparator {
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Exact(v) => version == v,
            Self::GreaterThan(v) => version > v,
            Self::GreaterThanOrEqual(v) => version >= v,
            Self::LessThan(v) => version < v,
            Self::LessThanOrEqual(v) => version <= v,
            Self::Wildcard => true,
        }
    }

    const fn bound(&self) -> Option<&Version> {
        match self {
            Self::Exact(v)
            | Self::GreaterThan(v)
            | Self::GreaterThanOrEqual(v)
            | Self::LessThan(v)
            | Self::LessThanOrEqual(v) => Some(v),
            Self::Wildcard => None,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "{v}"),
            Self::GreaterThan(v) => write!(f, ">{v}"),
            Self::GreaterThanOrEqual(v) => write!(f, ">={v}"),
            Self::LessThan(v) => write!(f, "<{v}"),
            Self::LessThanOrEqual(v) => write!(f, "<={v}"),
            Self::Wildcard => f.write_str("*"),
        }
    }
}

/// Comparators joined by AND (one `||` clause).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub comparators: Vec<Comparator>,
}

impl Range {
    #[must_use]
    pub const fn new(comparators: Vec<Comparator>) -> Self {
        Self { comparators }
    }

    /// A prerelease only matches when some comparator names a prerelease of
    /// the same `major.minor.patch`.
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        if !self.comparators.iter().all(|comp| comp.matches(version)) {
            return false;
        }
        if version.pre.is_empty() {
            return true;
        }
        self.comparators.iter().filter_map(Comparator::bound).any(|bound| {
            !bound.pre.is_empty()
                && bound.major == version.major
                && bound.minor == version.minor
                && bound.patch == version.patch
        })
    }

    #[must_use]
    pub fn mentions_prerelease(&self) -> bool {
        self.comparators
            .iter()
            .filter_map(Comparator::bound)
            .any(|bound| !bound.pre.is_empty())
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.comparators.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(" "))
    }
}

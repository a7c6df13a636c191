use semver::Version;
use std::fmt;
use std::str::FromStr;

use crate::comparators::{Comparator, Range};
use crate::version_utils::{PartialVersion, parse_partial_version};

/// An npm range: `||`-separated clauses of comparators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    ranges: Vec<Range>,
}

impl VersionRange {
    #[must_use]
    pub fn any() -> Self {
        Self {
            ranges: vec![Range::new(vec![Comparator::Wildcard])],
        }
    }

    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.ranges.iter().any(|range| range.matches(version))
    }

    #[must_use]
    pub fn mentions_prerelease(&self) -> bool {
        self.ranges.iter().any(Range::mentions_prerelease)
    }

    /// Highest version from `candidates` that satisfies the range.
    pub fn max_satisfying<'a, I>(&self, candidates: I) -> Option<Version>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates
            .into_iter()
            .filter_map(|v| Version::parse(v).ok())
            .filter(|v| self.matches(v))
            .max()
    }
}

impl FromStr for VersionRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            ranges: parse_npm_semver_ranges(s)?,
        })
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.ranges.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(" || "))
    }
}

pub fn parse_npm_semver_ranges(range_str: &str) -> Result<Vec<Range>, String> {
    let range_str = range_str.trim();

    if range_str.is_empty() || range_str == "*" {
        return Ok(vec![Range::new(vec![Comparator::Wildcard])]);
    }

    let mut ranges = Vec::new();
    for clause in range_str.split("||").map(str::trim) {
        ranges.push(parse_range_clause(clause)?);
    }

    Ok(ranges)
}

fn parse_range_clause(clause: &str) -> Result<Range, String> {
    if clause.is_empty() || clause == "*" {
        return Ok(Range::new(vec![Comparator::Wildcard]));
    }

    if let Some((low, high)) = clause.split_once(" - ") {
        return hyphen_range(low, high);
    }

    let mut comparators = Vec::new();
    let mut remaining = clause;

    loop {
        remaining = remaining.trim_start();
        if remaining.is_empty() {
            break;
        }

        let (op, rest) = split_operator(remaining);
        let (version_str, next) = extract_version_and_remaining(rest)?;
        let version = parse_partial_version(&version_str)?;
        comparators.extend(desugar(op, &version));
        remaining = next;
    }

    if comparators.is_empty() {
        comparators.push(Comparator::Wildcard);
    }
    Ok(Range::new(comparators))
}

fn split_operator(input: &str) -> (&str, &str) {
    for op in [">=", "<=", ">", "<", "^", "~>", "~", "="] {
        if let Some(rest) = input.strip_prefix(op) {
            return (op, rest);
        }
    }
    ("", input)
}

fn extract_version_and_remaining(input: &str) -> Result<(String, &str), String> {
    let input = input.trim_start();

    let end_pos = input
        .char_indices()
        .find(|(i, c)| c.is_whitespace() || (*i > 0 && ['>', '<', '^', '~'].contains(c)))
        .map_or(input.len(), |(i, _)| i);

    let version_str = input.get(..end_pos).unwrap_or_default().trim().to_string();
    let remaining = input.get(end_pos..).unwrap_or_default();

    if version_str.is_empty() {
        return Err("Expected version string but found end of input".to_string());
    }

    Ok((version_str, remaining))
}

fn bump_major(p: &PartialVersion) -> Version {
    Version::new(p.major.unwrap_or(0) + 1, 0, 0)
}

fn bump_minor(p: &PartialVersion) -> Version {
    Version::new(p.major.unwrap_or(0), p.minor.unwrap_or(0) + 1, 0)
}

/// Upper bound for a partial used as an inclusive maximum (`<=1.2` means `<1.3.0`).
fn partial_ceiling(p: &PartialVersion) -> Option<Comparator> {
    match (p.major, p.minor, p.patch) {
        (None, _, _) => None,
        (Some(_), None, _) => Some(Comparator::LessThan(bump_major(p))),
        (Some(_), Some(_), None) => Some(Comparator::LessThan(bump_minor(p))),
        _ => Some(Comparator::LessThanOrEqual(p.floor())),
    }
}

fn desugar(op: &str, p: &PartialVersion) -> Vec<Comparator> {
    use Comparator::{Exact, GreaterThan, GreaterThanOrEqual, LessThan, Wildcard};

    if p.is_any() {
        return match op {
            // Nothing is greater or less than "any version".
            ">" | "<" => vec![LessThan(Version::new(0, 0, 0))],
            _ => vec![Wildcard],
        };
    }

    let floor = p.floor();
    match op {
        "^" => {
            let upper = match (p.major, p.minor, p.patch) {
                (Some(m), _, _) if m > 0 => bump_major(p),
                (_, None, _) => bump_major(p),
                (_, Some(n), _) if n > 0 => bump_minor(p),
                (_, _, None) => bump_minor(p),
                (_, _, Some(patch)) => Version::new(0, 0, patch + 1),
            };
            vec![GreaterThanOrEqual(floor), LessThan(upper)]
        }
        "~" | "~>" => {
            let upper = if p.minor.is_none() {
                bump_major(p)
            } else {
                bump_minor(p)
            };
            vec![GreaterThanOrEqual(floor), LessThan(upper)]
        }
        ">" => match (p.minor, p.patch) {
            (None, _) => vec![GreaterThanOrEqual(bump_major(p))],
            (Some(_), None) => vec![GreaterThanOrEqual(bump_minor(p))],
            _ => vec![GreaterThan(floor)],
        },
        ">=" => vec![GreaterThanOrEqual(floor)],
        "<" => vec![LessThan(floor)],
        "<=" => partial_ceiling(p).into_iter().collect(),
        _ => match (p.minor, p.patch) {
            (None, _) => vec![GreaterThanOrEqual(floor), LessThan(bump_major(p))],
            (Some(_), None) => vec![GreaterThanOrEqual(floor), LessThan(bump_minor(p))],
            _ => vec![Exact(floor)],
        },
    }
}

fn hyphen_range(low: &str, high: &str) -> Result<Range, String> {
    let low = parse_partial_version(low)?;
    let high = parse_partial_version(high)?;

    let mut comparators = Vec::new();
    if !low.is_any() {
        comparators.push(Comparator::GreaterThanOrEqual(low.floor()));
    }
    comparators.extend(partial_ceiling(&high));
    if comparators.is_empty() {
        comparators.push(Comparator::Wildcard);
    }
    Ok(Range::new(comparators))
}

use semver::Version;

/// A version as written inside a range: any component may be missing or a wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialVersion {
    pub major: Option<u64>,
    pub minor: Option<u64>,
    pub patch: Option<u64>,
    /// Set only when all three components are present.
    pub full: Option<Version>,
}

impl PartialVersion {
    /// Lowest version the partial covers; missing components become zero.
    #[must_use]
    pub fn floor(&self) -> Version {
        self.full.clone().unwrap_or_else(|| {
            Version::new(
                self.major.unwrap_or(0),
                self.minor.unwrap_or(0),
                self.patch.unwrap_or(0),
            )
        })
    }

    #[must_use]
    pub const fn is_any(&self) -> bool {
        self.major.is_none()
    }
}

fn is_wildcard(part: &str) -> bool {
    matches!(part, "*" | "x" | "X")
}

/// Parse a single version string, handling partial versions such as `1`, `1.2` or `1.x`
pub fn parse_partial_version(version_str: &str) -> Result<PartialVersion, String> {
    let cleaned = version_str.trim();
    let cleaned = cleaned.strip_prefix('=').unwrap_or(cleaned);
    let cleaned = cleaned
        .strip_prefix('v')
        .or_else(|| cleaned.strip_prefix('V'))
        .unwrap_or(cleaned)
        .trim();

    if cleaned.is_empty() || is_wildcard(cleaned) {
        return Ok(PartialVersion {
            major: None,
            minor: None,
            patch: None,
            full: None,
        });
    }

    let core_end = cleaned.find(['-', '+']).unwrap_or(cleaned.len());
    let core = cleaned.get(..core_end).unwrap_or(cleaned);

    let mut parts = [None; 3];
    let mut wildcard_seen = false;
    let mut count = 0;
    for (i, part) in core.split('.').enumerate() {
        let Some(slot) = parts.get_mut(i) else {
            return Err(format!("Invalid version '{cleaned}': too many components"));
        };
        count += 1;
        if is_wildcard(part) {
            wildcard_seen = true;
            continue;
        }
        if wildcard_seen {
            // `1.x.3` is treated like `1.x`
            continue;
        }
        *slot = Some(
            part.parse::<u64>()
                .map_err(|_| format!("Invalid version component '{part}' in '{cleaned}'"))?,
        );
    }
    if count == 0 {
        return Err(format!("Invalid version '{cleaned}'"));
    }

    let [major, minor, patch] = parts;
    let full = if patch.is_some() {
        Some(Version::parse(cleaned).map_err(|e| format!("Invalid version '{cleaned}': {e}"))?)
    } else {
        None
    };

    Ok(PartialVersion {
        major,
        minor,
        patch,
        full,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partials_fill_missing_components_with_zero() {
        let p = parse_partial_version("1.2").unwrap();
        assert_eq!((p.major, p.minor, p.patch), (Some(1), Some(2), None));
        assert_eq!(p.floor(), Version::new(1, 2, 0));
        assert!(p.full.is_none());
    }

    #[test]
    fn wildcards_truncate_the_version() {
        let p = parse_partial_version("1.x.3").unwrap();
        assert_eq!((p.major, p.minor, p.patch), (Some(1), None, None));
        assert!(parse_partial_version("*").unwrap().is_any());
        assert!(parse_partial_version("X").unwrap().is_any());
    }

    #[test]
    fn full_versions_keep_prerelease() {
        let p = parse_partial_version("v1.0.0-rc.1").unwrap();
        assert_eq!(p.full.unwrap().pre.as_str(), "rc.1");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_partial_version("latest").is_err());
        assert!(parse_partial_version("1.2.3.4").is_err());
    }
}

use pakt_constants::{RUNTIME_ENGINE, SELF_ENGINE, VERSION};
use semver::Version;

use crate::graph::ResolvedPackage;
use crate::platform::Platform;
use crate::semver_range::VersionRange;

/// What installed packages are checked against.
#[derive(Debug, Clone)]
pub struct EngineContext {
    /// Runtime version; `engines.node` is not checked when unknown.
    pub node_version: Option<Version>,
    pub self_version: Option<Version>,
    pub platform: Platform,
}

impl Default for EngineContext {
    fn default() -> Self {
        Self {
            node_version: None,
            self_version: Version::parse(VERSION).ok(),
            platform: Platform::current(),
        }
    }
}

impl EngineContext {
    /// Problems with a set of declared `engines`; unparsable ranges are ignored.
    #[must_use]
    pub fn check_engines<'a, I>(&self, engines: I) -> Vec<String>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut issues = Vec::new();
        for (engine, range) in engines {
            let current = match engine.as_str() {
                RUNTIME_ENGINE => self.node_version.as_ref(),
                SELF_ENGINE => self.self_version.as_ref(),
                _ => None,
            };
            let (Some(current), Ok(parsed)) = (current, range.parse::<VersionRange>()) else {
                continue;
            };
            // Compare on the release part so a prerelease runtime is not rejected outright.
            let release = Version::new(current.major, current.minor, current.patch);
            if !parsed.matches(current) && !parsed.matches(&release) {
                issues.push(format!("requires {engine} {range}, current is {current}"));
            }
        }
        issues
    }

    #[must_use]
    pub fn check_package(&self, package: &ResolvedPackage) -> Vec<String> {
        let mut issues = self.check_engines(&package.engines);
        if !self.platform.is_compatible(&package.os, &package.cpu) {
            issues.push(format!(
                "unsupported platform: wants os {:?} cpu {:?}, current is {}/{}",
                package.os, package.cpu, self.platform.os, self.platform.cpu
            ));
        }
        issues
    }
}

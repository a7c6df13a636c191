use std::process::{Command, Stdio};

/// Version of the `node` on `PATH`, checked against `engines.node` when no
/// version is configured.
pub fn detect_node_version() -> Option<String> {
    let output = Command::new("node")
        .arg("--version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_node_version(&String::from_utf8_lossy(&output.stdout))
}

fn parse_node_version(stdout: &str) -> Option<String> {
    let version = stdout.lines().next()?.trim();
    let version = version.strip_prefix('v').unwrap_or(version);
    semver::Version::parse(version).ok().map(|v| v.to_string())
}

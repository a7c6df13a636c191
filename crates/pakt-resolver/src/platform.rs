use std::env;

/// The `os`/`cpu` pair packages are checked against, in npm's naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub cpu: String,
}

impl Platform {
    #[must_use]
    pub fn current() -> Self {
        Self {
            os: get_current_os(),
            cpu: get_current_cpu(),
        }
    }

    /// Empty lists mean "no restriction".
    #[must_use]
    pub fn is_compatible(&self, os_list: &[String], cpu_list: &[String]) -> bool {
        is_platform_field_compatible(&self.os, os_list)
            && is_platform_field_compatible(&self.cpu, cpu_list)
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

fn is_platform_field_compatible(current_platform: &str, requirements: &[String]) -> bool {
    let mut has_allow_list = false;
    let mut allowed = false;

    for requirement in requirements {
        if let Some(blocked_platform) = requirement.strip_prefix('!') {
            if current_platform == blocked_platform {
                return false;
            }
        } else {
            has_allow_list = true;
            if current_platform == requirement {
                allowed = true;
            }
        }
    }

    !has_allow_list || allowed
}

#[must_use]
pub fn get_current_os() -> String {
    match env::consts::OS {
        "windows" => "win32".to_string(),
        "macos" => "darwin".to_string(),
        "solaris" => "sunos".to_string(),
        other => other.to_string(),
    }
}

#[must_use]
pub fn get_current_cpu() -> String {
    match env::consts::ARCH {
        "x86_64" => "x64".to_string(),
        "x86" => "ia32".to_string(),
        "aarch64" => "arm64".to_string(),
        "powerpc" => "ppc".to_string(),
        "powerpc64" => "ppc64".to_string(),
        other => other.to_string(),
    }
}

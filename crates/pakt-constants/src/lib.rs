pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = "Installation engine: resolve, hoist and link node_modules";
pub const BIN_NAME: &str = "pakt";
pub const COMMANDS: &[(&str, &str, &[&str])] = &[
    (
        "install",
        "Installs all dependencies of the workspace projects",
        &["i"],
    ),
    ("add", "Adds packages to a project and installs them", &[]),
    ("remove", "Removes packages from a project", &["rm", "uninstall"]),
    (
        "update",
        "Re-resolves packages ignoring the lockfile",
        &["up", "upgrade"],
    ),
    ("help", "Shows help for pakt or one of its commands", &[]),
];

pub const EXAMPLES: &[(&str, &str)] = &[
    ("pakt install", "Install every project of the workspace"),
    ("pakt install --frozen-lockfile", "Install exactly what the lockfile records"),
    ("pakt add lodash", "Add a package"),
    ("pakt add typescript --dev", "Add a dev dependency"),
    ("pakt add old-lodash@npm:lodash@^3", "Add a package under an alias"),
    ("pakt update lodash --latest", "Move a package to its latest version"),
    ("pakt remove lodash", "Remove a package"),
];

pub const USER_AGENT: &str = concat!("pakt/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

/// Retry budget shared by index requests and per-entry link operations.
pub const MAX_ATTEMPTS: u32 = 4;

pub const LOCKFILE_NAME: &str = "pakt-lock.json";
pub const LOCKFILE_VERSION: u32 = 1;
pub const MANIFEST_NAME: &str = "package.json";
pub const MODULES_DIR: &str = "node_modules";
pub const BIN_DIR: &str = ".bin";

/// Virtual store directory used by the isolated layout, relative to the root `node_modules`.
pub const VIRTUAL_STORE_DIR: &str = ".pakt";
pub const MODULES_STATE_FILE: &str = ".pakt-state.json";
pub const TEMP_PREFIX: &str = ".pakt-tmp-";

/// Layout version of the content-addressed store.
pub const STORE_LAYOUT: &str = "v1";
pub const STORE_INDEX_FILE: &str = "index.json";
pub const STORE_PACKAGE_DIR: &str = "package";

pub const DEFAULT_TAG: &str = "latest";
pub const DEFAULT_SAVE_PREFIX: &str = "^";

/// Engine name checked against the runtime version in `engines`.
pub const RUNTIME_ENGINE: &str = "node";
/// Engine name checked against this crate's own version in `engines`.
pub const SELF_ENGINE: &str = "pakt";

/// Key of the settings object inside the root `package.json`.
pub const SETTINGS_KEY: &str = "pakt";

pub const LIFECYCLE_SCRIPTS: &[&str] = &["preinstall", "install", "postinstall"];

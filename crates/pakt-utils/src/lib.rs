pub mod fs_utils;
pub mod package_spec;
pub mod path_utils;
pub mod version_utils;

pub use fs_utils::write_if_changed;
pub use package_spec::{
    is_valid_package_name, parse_npm_alias, parse_package_spec, split_name_version,
};
pub use path_utils::*;
pub use version_utils::*;

pub mod extract;
pub mod file_index;
pub mod integrity;
pub mod package_linker;
pub mod path_resolver;
pub mod store_manager;

pub use extract::extract_tarball;
pub use file_index::FileIndex;
pub use integrity::{HashAlgorithm, Integrity};
pub use package_linker::{ImportMethod, PackageLinker};
pub use path_resolver::PathResolver;
pub use store_manager::{StoreManager, TreeHandle};

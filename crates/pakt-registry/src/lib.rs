pub mod client;
pub mod memory;
pub mod metadata;

pub use client::{HttpIndexClient, IndexClient};
pub use memory::{MemoryIndex, PublishSpec};
pub use metadata::{Dist, PackageMetadata, PeerMeta, Tarball, VersionMetadata};

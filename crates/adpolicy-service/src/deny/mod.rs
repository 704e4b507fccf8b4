//! Package deny list: downloaded deny data, its cache and the resolver.

pub mod cache;
pub mod resolver;
pub mod sources;

pub use cache::DenyGroupCache;
pub use resolver::{DenySources, PackageDenyProcessStatus, PackageDenyResolver};
pub use sources::{
    CacheStore, ClientFile, ClientFileGroup, DenyFileSource, DirectoryFileSource, FileStorage,
    InstalledPackage, InstalledPackages, JsonFileCacheStore, JsonInstalledPackages,
    LocalFileStorage, MemoryCacheStore,
};

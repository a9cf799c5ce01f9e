//! In-memory, package-aware virtual filesystem index.
//!
//! An [`Index`] ingests `(pkgver, path[, target])` records from a
//! [`RecordSource`] into a tree where every node may be owned by more than
//! one package version, serves read queries against it behind a
//! reader-writer lock, and can audit its own consistency with
//! [`Index::vfsck`].

mod audit;
mod error;
mod index;
mod loader;
mod owner;
mod pkgver;
mod query;
mod tree;

#[cfg(test)]
mod test_support;

pub use audit::AuditReport;
pub use error::{LoadError, LoadResult};
pub use index::{Index, ReadTxn};
pub use loader::RecordSource;
pub use owner::{OwnerType, OwnerTypeCounts};
pub use pkgver::Pkgver;
pub use query::DEFAULT_LINK_DEPTH;
pub use tree::{NodeId, ROOT};

//! HTTP/HTML presentation collaborator for [`xldb`]: a catch-all browsing
//! route plus a health endpoint, hand-building response bodies the way
//! `protocol-s3` hand-builds its own.

pub mod handlers;
pub mod server;

pub use server::BrowseServer;

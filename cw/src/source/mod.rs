//! Remote commit source
//!
//! `CommitSource` is the HTTP boundary: one call, one request. `GitHubClient`
//! is the production implementation.

mod client;
mod error;
mod github;
#[cfg(test)]
pub mod mock;

pub use client::{CommitPage, CommitSource, PageRequest};
pub use error::FetchError;
pub use github::{GitHubClient, next_link};

//! Durable de-duplication log
//!
//! CommitLogStore owns the CommitLog and processes messages via channels,
//! giving concurrent pollers serialized access to one JSON document.

mod log;
mod manager;
mod messages;

pub use log::{CommitLog, Insertion, LogFile, inspect, load};
pub use manager::CommitLogStore;
pub use messages::{PersistError, StoreCommand, StoreResponse};

//! Offline-first bidirectional replication engine for posts, likes, and
//! comments with attached media.
//!
//! A host embedding wires up a [`store::LocalStore`] (SQLite for a real
//! device, in-memory for tests or ephemeral profiles), a
//! [`remote::RemoteStore`] + [`media::ObjectStore`] pointed at its backend,
//! and hands them to a [`sync::SyncManager`], which owns the push/pull/prune
//! cycle from then on.

pub mod config;
pub mod error;
pub mod media;
pub mod model;
pub mod notify;
pub mod path;
pub mod remote;
pub mod retry;
pub mod store;
pub mod sync;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::SyncConfig;
pub use error::{RemoteError, StoreError};
pub use model::{Comment, Like, MediaType, Post, RecordId, SystemSettings};
pub use notify::{ChangeEvent, Entity, Notifier};
pub use sync::SyncManager;

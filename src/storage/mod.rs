//! Durable key-value storage.
//!
//! Plays the role of browser local storage: string keys to string values,
//! persisted as one JSON object file.

pub mod local;

pub use local::{LocalStorage, StorageError};

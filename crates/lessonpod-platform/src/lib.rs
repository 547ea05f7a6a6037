//! Platform abstraction layer for lessonpod.
//!
//! Provides traits for the platform-dependent pieces the voice layer
//! touches (environment variables, durable key-value storage, wall-clock
//! time) so the core can be tested with in-memory implementations.
//!
//! | Trait | Native | In-memory |
//! |-------|--------|-----------|
//! | [`Environment`] | [`NativeEnvironment`] | [`MapEnvironment`] |
//! | [`KeyValueStore`] | [`FileStore`] | [`MemoryStore`] |
//! | [`Clock`] | [`SystemClock`] | [`ManualClock`] |

pub mod clock;
pub mod config_loader;
pub mod env;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use env::{Environment, MapEnvironment, NativeEnvironment};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};

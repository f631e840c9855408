//! Atomic store implementations.
//!
//! This module contains concrete implementations of the `AtomicStore` trait
//! for different backends.

pub mod memory;
pub mod redis;
mod scripts;

pub use self::memory::InMemoryStore;
pub use self::redis::RedisStore;

//! Backing store implementations for txcache
//!
//! [`MemoryStore`] is the local synchronous key/value structure the resource
//! coordinator assumes; the [`testing`] module adds a fault-injecting wrapper
//! for exercising commit failure paths.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod testing;

pub use memory::MemoryStore;

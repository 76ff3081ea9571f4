// src/store/mod.rs

//! Collaborator abstractions consumed by the engine, plus in-memory adapters.
//!
//! - [`kv`]: key-value store with a conditional `get_or_set`.
//! - [`bimap`]: bijective key <-> value index built on two key-value stores.
//! - [`queue`]: push / transactional-pop queue (`Delivery` commit or rollback).
//! - [`bus`]: publish / subscribe event bus.
//! - [`relational`]: transactional tables backing dependencies and groups.
//!
//! Production adapters (SQL, Redis, brokers) implement the same traits; the
//! in-memory adapters are what the engine wires by default and what the
//! tests run against.

pub mod bimap;
pub mod bus;
pub mod kv;
pub mod queue;
pub mod relational;

pub use bimap::{Bimap, KvBimap};
pub use bus::{Bus, Event, MemoryBus};
pub use kv::{KeyValue, MemoryKv};
pub use queue::{Delivery, DeliveryHandle, MemoryQueue, Queue};
pub use relational::{DepsTransaction, MemoryRelational, RelationalStore};

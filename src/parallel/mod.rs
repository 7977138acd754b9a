//! # Parallel Module
//!
//! Asynchronous execution layer of the engine:
//! - Lazily-started, awaitable [`task::Task`]s
//! - The work-stealing [`pool::ThreadPool`]
//! - Join combinators ([`when_all::when_all`], [`when_all::when_all_ready`])
//! - The blocking bridge [`sync_wait::sync_wait`]
//! - Spin and thread-local rng utilities shared by the above
//!
//! Public API exposure is controlled by `lib.rs`.

pub mod pool;
pub mod rng;
pub mod spin;
pub mod sync_wait;
pub mod task;
pub mod when_all;

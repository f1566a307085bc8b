//! Background Tasks Module
//!
//! Optional tokio tasks that keep a cache tidy.
//!
//! # Tasks
//! - Expiry sweep: runs `Cache::manual_gc` at a fixed or configured interval

mod gc;

pub use gc::{spawn_configured_gc_task, spawn_gc_task};

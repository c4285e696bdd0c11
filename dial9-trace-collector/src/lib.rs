#![doc = include_str!("../README.md")]

pub mod trace;
pub mod traced;

pub use trace::{CategoryId, DynamicKey, StaticKey, TimeStamp, TraceCollection, TraceCollector};
pub use traced::{TraceFutureExt, Traced};

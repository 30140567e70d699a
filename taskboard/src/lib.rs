//! Realtime task board client library.
//!
//! A [`store::TaskStore`] caches project tasks and applies mutations
//! optimistically over a [`api::TaskApi`]; a [`realtime::RealtimeClient`]
//! keeps a reconnecting WebSocket open and [`sync::SyncBinding`] merges its
//! task events into the store. [`board`] turns drag gestures into moves.

pub mod api;
pub mod board;
pub mod config;
pub mod realtime;
pub mod store;
pub mod sync;

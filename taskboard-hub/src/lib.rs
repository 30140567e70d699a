//! Taskboard reference hub library.
//!
//! Serves the task REST API under `/api` and project-room realtime events
//! at `/ws`, backed by an in-memory board. Exposed as a library for tests
//! and embedding.

pub mod api;
pub mod config;
pub mod error;
pub mod hub;
pub mod rooms;
pub mod store;

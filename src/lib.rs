/// PageRelay - relays a short text message from a web form to on-call
/// paging providers.
///
/// This library provides the dispatcher, the notification channels and the
/// HTTP boundary; `main.rs` only wires them to configuration and signals.
pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod internal_metrics;
pub mod notification;
pub mod page;
pub mod server;
pub mod services;
pub mod suggest;
pub mod task_manager;

// Re-export core types for convenience
pub use crate::core::*;

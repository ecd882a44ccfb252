//! Terminal chat client for a MongoDB RAG query API.
//! Library surface shared by the `ragchat` binary and the integration tests.

pub mod api;
pub mod app;
pub mod config;
pub mod handler;
pub mod tui;
pub mod ui;

pub use api::{ApiClient, Stats};
pub use app::{App, ChatMessage, ChatRole};
pub use config::Config;

//! bookclub - Telegram bot for a reading club
//!
//! Members record how far they are in the club's current book; admins manage
//! the book, the meeting date and the member list. Multi-step commands are
//! driven by a per-member conversation state machine.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, logging, validation and common utilities
//! - `storage`: SQLite record store (pool, migrations, queries)
//! - `conversation`: Conversation router, state registry and flows
//! - `telegram`: Telegram bot integration and handlers

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod cli;
pub mod conversation;
pub mod core;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use conversation::{ConversationRouter, InboundEvent, Reply, StateRegistry};
pub use crate::core::{config, AppError, AppResult};
pub use storage::{create_pool, get_connection, DbConnection, DbPool, RecordStore, SqliteStore};

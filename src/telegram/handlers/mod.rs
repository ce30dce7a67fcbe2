//! Telegram bot handler tree configuration
//!
//! The handlers only translate between Telegram messages and the
//! conversation core; all decisions are made by the router.

mod schema;
mod types;

pub use schema::{schema, send_reply};
pub use types::{inbound_event, keyboard_markup, HandlerDeps, HandlerError, USERNAME_REQUIRED};

//! Per-member conversation state machine
//!
//! - `status`: the stored step marker as a tagged union
//! - `flow`: the flow-handler trait and step transitions
//! - `registry`: immutable step -> handler map
//! - `flows`: SetProgress, SetBook, AddUser and RemoveUser
//! - `commands`: one-shot commands and reports
//! - `router`: the entry point for every inbound event

pub mod commands;
pub mod flow;
pub mod flows;
pub mod registry;
pub mod router;
pub mod status;
pub mod types;

pub use commands::ClubCommand;
pub use flow::{FlowContext, FlowHandler, Transition};
pub use registry::StateRegistry;
pub use router::ConversationRouter;
pub use status::{ConversationStatus, FlowId, Step};
pub use types::{InboundEvent, ParsedCommand, Reply, ReplyKeyboard};

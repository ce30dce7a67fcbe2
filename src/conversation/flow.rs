use async_trait::async_trait;
use chrono::NaiveDate;

use super::status::{ConversationStatus, FlowId, Step};
use super::types::{InboundEvent, Reply};
use crate::core::error::{AppError, AppResult};
use crate::storage::db::{Book, User};
use crate::storage::RecordStore;

/// Everything a step handler may touch while consuming one event.
pub struct FlowContext<'a> {
    pub store: &'a dyn RecordStore,
    /// The sender's member row
    pub sender: &'a User,
    pub today: NaiveDate,
}

impl FlowContext<'_> {
    pub fn handle(&self) -> &str {
        &self.sender.handle
    }

    /// The active book, or `NotFound` with the member-facing text
    pub async fn require_active_book(&self) -> AppResult<Book> {
        self.store
            .get_active_book()
            .await?
            .ok_or_else(|| AppError::NotFound("No active book found.".to_string()))
    }
}

/// Result of one step: where the member goes next and what they are told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: ConversationStatus,
    pub reply: Reply,
}

impl Transition {
    /// Move to `step` and send `reply`
    pub fn to(step: Step, reply: Reply) -> Self {
        Self {
            next: ConversationStatus::at(step),
            reply,
        }
    }

    /// Finish the flow
    pub fn done(reply: Reply) -> Self {
        Self {
            next: ConversationStatus::Idle,
            reply,
        }
    }
}

/// One bounded multi-step flow.
///
/// `step` is called with `at = None` when the flow is started from idle and
/// with the member's current step otherwise. Invalid input is reported as
/// `AppError::Validation(prompt)`: the member is re-prompted and stays put.
#[async_trait]
pub trait FlowHandler: Send + Sync {
    fn id(&self) -> FlowId;

    /// Steps this flow owns
    fn steps(&self) -> &'static [Step];

    async fn step(&self, ctx: &FlowContext<'_>, at: Option<Step>, event: &InboundEvent) -> AppResult<Transition>;
}

/// Error for a step routed to a flow that does not own it
pub(crate) fn foreign_step(flow: FlowId, step: Step) -> AppError {
    AppError::UnknownStatus(format!("{} routed to {}", step, flow))
}

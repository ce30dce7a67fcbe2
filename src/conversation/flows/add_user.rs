//! `/addUser`: admit a new member.
//!
//! ```text
//! "" -> enter_nickname -> enter_username -> ""
//! ```
//!
//! The nickname captured in the first step is parked in the admin's
//! `pending_handle` so the second step can name exactly that member. The
//! router clears it once the admin's idle status is stored, so a failed
//! status write leaves the last step retryable.

use async_trait::async_trait;

use crate::conversation::flow::{foreign_step, FlowContext, FlowHandler, Transition};
use crate::conversation::status::{FlowId, Step};
use crate::conversation::types::{InboundEvent, Reply};
use crate::core::error::{AppError, AppResult};
use crate::core::validation::{normalize_quotes, parse_nickname, parse_text};

pub const NICKNAME_PROMPT: &str = "Enter user telegram nick name:";
pub const FULL_NAME_PROMPT: &str = "Enter full user name:";
pub const ADD_USER_DONE: &str = "Thank you!";

const STEPS: &[Step] = &[Step::EnterNickname, Step::EnterUsername];

pub struct AddUserFlow;

impl AddUserFlow {
    async fn enter_nickname(&self, ctx: &FlowContext<'_>, event: &InboundEvent) -> AppResult<Transition> {
        let nickname = parse_nickname(&event.text)?;

        if ctx.store.create_user(nickname, "").await? {
            log::info!("👤 {} added member {}", ctx.handle(), nickname);
        }
        ctx.store.set_pending_handle(ctx.handle(), Some(nickname)).await?;

        Ok(Transition::to(Step::EnterUsername, Reply::text(FULL_NAME_PROMPT)))
    }

    async fn enter_username(&self, ctx: &FlowContext<'_>, event: &InboundEvent) -> AppResult<Transition> {
        let name = normalize_quotes(&event.text);
        let name = parse_text(&name)?;

        let nickname = ctx
            .store
            .get_pending_handle(ctx.handle())
            .await?
            .ok_or_else(|| AppError::NotFound("No member is being added. Use /addUser to start again.".to_string()))?;

        ctx.store.set_user_name(&nickname, name).await?;
        log::info!("👤 Member {} is now known as '{}'", nickname, name);

        Ok(Transition::done(Reply::text(ADD_USER_DONE)))
    }
}

#[async_trait]
impl FlowHandler for AddUserFlow {
    fn id(&self) -> FlowId {
        FlowId::AddUser
    }

    fn steps(&self) -> &'static [Step] {
        STEPS
    }

    async fn step(&self, ctx: &FlowContext<'_>, at: Option<Step>, event: &InboundEvent) -> AppResult<Transition> {
        match at {
            None => Ok(Transition::to(Step::EnterNickname, Reply::text(NICKNAME_PROMPT))),
            Some(Step::EnterNickname) => self.enter_nickname(ctx, event).await,
            Some(Step::EnterUsername) => self.enter_username(ctx, event).await,
            Some(other) => Err(foreign_step(self.id(), other)),
        }
    }
}

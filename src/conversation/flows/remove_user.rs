//! `/removeUser`: `"" -> enter_nickname_to_remove -> ""`

use async_trait::async_trait;

use crate::conversation::flow::{foreign_step, FlowContext, FlowHandler, Transition};
use crate::conversation::status::{FlowId, Step};
use crate::conversation::types::{InboundEvent, Reply};
use crate::core::error::AppResult;
use crate::core::validation::{normalize_handle, parse_text};

pub const REMOVE_PROMPT: &str = "Enter user telegram nick name:";
pub const REMOVE_DONE: &str = "User removed successfully!";

const STEPS: &[Step] = &[Step::EnterNicknameToRemove];

pub struct RemoveUserFlow;

#[async_trait]
impl FlowHandler for RemoveUserFlow {
    fn id(&self) -> FlowId {
        FlowId::RemoveUser
    }

    fn steps(&self) -> &'static [Step] {
        STEPS
    }

    async fn step(&self, ctx: &FlowContext<'_>, at: Option<Step>, event: &InboundEvent) -> AppResult<Transition> {
        match at {
            None => Ok(Transition::to(Step::EnterNicknameToRemove, Reply::text(REMOVE_PROMPT))),
            Some(Step::EnterNicknameToRemove) => {
                // Unknown handles are a silent no-op
                let nickname = parse_text(normalize_handle(&event.text))?;
                ctx.store.delete_user(nickname).await?;
                log::info!("👤 {} removed member {}", ctx.handle(), nickname);
                Ok(Transition::done(Reply::text(REMOVE_DONE)))
            }
            Some(other) => Err(foreign_step(self.id(), other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::flows::test_support::Fixture;
    use crate::conversation::status::ConversationStatus;
    use crate::storage::RecordStore;

    #[tokio::test]
    async fn test_remove_existing_and_unknown_member() {
        let fx = Fixture::new().await;
        let admin = fx.admin("club_admin").await;
        fx.member("leaving_one").await;
        let ctx = fx.ctx(&admin);

        let t = RemoveUserFlow.step(&ctx, None, &fx.event(&admin, "/removeUser")).await.unwrap();
        assert_eq!(t.next, ConversationStatus::at(Step::EnterNicknameToRemove));

        let t = RemoveUserFlow
            .step(&ctx, Some(Step::EnterNicknameToRemove), &fx.event(&admin, "@leaving_one"))
            .await
            .unwrap();
        assert_eq!(t.next, ConversationStatus::Idle);
        assert_eq!(t.reply.text, REMOVE_DONE);
        assert!(fx.store.get_user("leaving_one").await.unwrap().is_none());

        let t = RemoveUserFlow
            .step(&ctx, Some(Step::EnterNicknameToRemove), &fx.event(&admin, "never_was"))
            .await
            .unwrap();
        assert_eq!(t.next, ConversationStatus::Idle);
    }
}

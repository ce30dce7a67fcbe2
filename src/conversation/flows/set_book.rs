//! `/addBook` (and `/setMeetingDate`): make a new book the club's current read.
//!
//! ```text
//! "" -> enter_book_name -> enter_author -> enter_finishing_date -> ""
//! ```

use async_trait::async_trait;

use crate::conversation::flow::{foreign_step, FlowContext, FlowHandler, Transition};
use crate::conversation::status::{FlowId, Step};
use crate::conversation::types::{InboundEvent, Reply};
use crate::core::error::AppResult;
use crate::core::validation::{format_meeting_date, normalize_quotes, parse_meeting_date, parse_text};

pub const BOOK_NAME_PROMPT: &str = "Enter the name of the book:";
pub const AUTHOR_PROMPT: &str = "Enter the author of the book:";
pub const MEETING_DATE_PROMPT: &str = "Enter date of club's meeting. Format 'dd.mm.yyyy'";
pub const SET_BOOK_DONE: &str = "Thank you!";

const STEPS: &[Step] = &[Step::EnterBookName, Step::EnterAuthor, Step::EnterFinishingDate];

pub struct SetBookFlow;

impl SetBookFlow {
    /// Jumps straight to the meeting date question for the active book
    pub async fn begin_meeting_date(ctx: &FlowContext<'_>) -> AppResult<Transition> {
        let book = ctx.require_active_book().await?;
        log::info!("📅 {} is rescheduling the meeting for '{}'", ctx.handle(), book.title);
        Ok(Transition::to(Step::EnterFinishingDate, Reply::text(MEETING_DATE_PROMPT)))
    }

    async fn enter_book_name(&self, ctx: &FlowContext<'_>, event: &InboundEvent) -> AppResult<Transition> {
        let title = normalize_quotes(&event.text);
        let title = parse_text(&title)?;

        // A resend after a lost status write finds its own book still without an author
        if let Some(book) = ctx.store.get_active_book().await? {
            if book.title == title && book.author.is_empty() {
                log::info!("📚 {} resent title of book {} '{}'", ctx.handle(), book.id, book.title);
                return Ok(Transition::to(Step::EnterAuthor, Reply::text(AUTHOR_PROMPT)));
            }
        }

        let book = ctx.store.create_book_and_deactivate_previous(title).await?;
        log::info!("📚 {} added book {} '{}'", ctx.handle(), book.id, book.title);

        Ok(Transition::to(Step::EnterAuthor, Reply::text(AUTHOR_PROMPT)))
    }

    async fn enter_author(&self, ctx: &FlowContext<'_>, event: &InboundEvent) -> AppResult<Transition> {
        let author = normalize_quotes(&event.text);
        let author = parse_text(&author)?;

        let book = ctx.require_active_book().await?;
        ctx.store.update_book_author(book.id, author).await?;

        Ok(Transition::to(Step::EnterFinishingDate, Reply::text(MEETING_DATE_PROMPT)))
    }

    async fn enter_finishing_date(&self, ctx: &FlowContext<'_>, event: &InboundEvent) -> AppResult<Transition> {
        let date = parse_meeting_date(&event.text, ctx.today)?;

        let book = ctx.require_active_book().await?;
        ctx.store.update_book_meeting_date(book.id, date).await?;
        log::info!("📅 Meeting for '{}' set to {}", book.title, format_meeting_date(date));

        Ok(Transition::done(Reply::text(SET_BOOK_DONE)))
    }
}

#[async_trait]
impl FlowHandler for SetBookFlow {
    fn id(&self) -> FlowId {
        FlowId::SetBook
    }

    fn steps(&self) -> &'static [Step] {
        STEPS
    }

    async fn step(&self, ctx: &FlowContext<'_>, at: Option<Step>, event: &InboundEvent) -> AppResult<Transition> {
        match at {
            None => Ok(Transition::to(Step::EnterBookName, Reply::text(BOOK_NAME_PROMPT))),
            Some(Step::EnterBookName) => self.enter_book_name(ctx, event).await,
            Some(Step::EnterAuthor) => self.enter_author(ctx, event).await,
            Some(Step::EnterFinishingDate) => self.enter_finishing_date(ctx, event).await,
            Some(other) => Err(foreign_step(self.id(), other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::flows::test_support::Fixture;
    use crate::conversation::status::ConversationStatus;
    use crate::core::error::AppError;
    use crate::storage::RecordStore;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_full_flow_creates_active_book() {
        let fx = Fixture::new().await;
        let admin = fx.admin("club_admin").await;
        let ctx = fx.ctx(&admin);

        let t = SetBookFlow.step(&ctx, None, &fx.event(&admin, "/addBook")).await.unwrap();
        assert_eq!(t.next, ConversationStatus::at(Step::EnterBookName));

        let t = SetBookFlow
            .step(&ctx, Some(Step::EnterBookName), &fx.event(&admin, "\u{201C}Dune\u{201D}"))
            .await
            .unwrap();
        assert_eq!(t.reply.text, AUTHOR_PROMPT);

        SetBookFlow
            .step(&ctx, Some(Step::EnterAuthor), &fx.event(&admin, "Frank Herbert"))
            .await
            .unwrap();
        let t = SetBookFlow
            .step(&ctx, Some(Step::EnterFinishingDate), &fx.event(&admin, "01.06.2024"))
            .await
            .unwrap();
        assert_eq!(t.next, ConversationStatus::Idle);

        let book = fx.store.get_active_book().await.unwrap().unwrap();
        assert_eq!(book.title, "\"Dune\"");
        assert_eq!(book.author, "Frank Herbert");
        assert_eq!(book.meeting_date, NaiveDate::from_ymd_opt(2024, 6, 1));
    }

    #[tokio::test]
    async fn test_resent_title_reuses_book_without_author() {
        let fx = Fixture::new().await;
        let admin = fx.admin("club_admin").await;
        let ctx = fx.ctx(&admin);

        for _ in 0..2 {
            let t = SetBookFlow
                .step(&ctx, Some(Step::EnterBookName), &fx.event(&admin, "Dune"))
                .await
                .unwrap();
            assert_eq!(t.next, ConversationStatus::at(Step::EnterAuthor));
        }
        assert_eq!(fx.store.list_books().await.unwrap().len(), 1);

        // Once the author is set, the same title is a new book
        let book = fx.store.get_active_book().await.unwrap().unwrap();
        fx.store.update_book_author(book.id, "Frank Herbert").await.unwrap();
        SetBookFlow
            .step(&ctx, Some(Step::EnterBookName), &fx.event(&admin, "Dune"))
            .await
            .unwrap();

        let books = fx.store.list_books().await.unwrap();
        assert_eq!(books.len(), 2);
        assert!(!books[0].active);
        assert!(books[1].active);
    }

    #[tokio::test]
    async fn test_blank_title_is_rejected() {
        let fx = Fixture::new().await;
        let admin = fx.admin("club_admin").await;
        let ctx = fx.ctx(&admin);

        let err = SetBookFlow
            .step(&ctx, Some(Step::EnterBookName), &fx.event(&admin, "   "))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(fx.store.list_books().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_past_or_impossible_date_keeps_step() {
        let fx = Fixture::new().await;
        fx.book("Dune").await;
        let admin = fx.admin("club_admin").await;
        let ctx = fx.ctx(&admin);

        for input in ["31.02.2099", "10.05.2024", "2024-06-01"] {
            let err = SetBookFlow
                .step(&ctx, Some(Step::EnterFinishingDate), &fx.event(&admin, input))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "input: {}", input);
        }
        assert_eq!(fx.store.get_active_book().await.unwrap().unwrap().meeting_date, None);
    }

    #[tokio::test]
    async fn test_begin_meeting_date_requires_active_book() {
        let fx = Fixture::new().await;
        let admin = fx.admin("club_admin").await;
        let ctx = fx.ctx(&admin);

        let err = SetBookFlow::begin_meeting_date(&ctx).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        fx.book("Dune").await;
        let t = SetBookFlow::begin_meeting_date(&ctx).await.unwrap();
        assert_eq!(t.next, ConversationStatus::at(Step::EnterFinishingDate));
        assert_eq!(t.reply.text, MEETING_DATE_PROMPT);
    }
}

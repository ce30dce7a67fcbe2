//! `/setProgress`: record how far a member is in the active book.
//!
//! ```text
//! "" -> enter_book_type -> enter_total_pages -> enter_page -> ""
//!                       \-> enter_percent ----------------> ""
//! ```
//!
//! A member who already has a progress row for the active book skips the
//! type question and goes straight to their page or percent.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::conversation::flow::{foreign_step, FlowContext, FlowHandler, Transition};
use crate::conversation::status::{FlowId, Step};
use crate::conversation::types::{InboundEvent, Reply, ReplyKeyboard};
use crate::core::error::{AppError, AppResult};
use crate::core::validation::{format_meeting_date, parse_page, parse_percent, parse_total_pages};
use crate::storage::db::{BookKind, ReadingProgress};

pub const BOOK_TYPE_PROMPT: &str = "Select the book's type (audio or regular):";
pub const BOOK_TYPE_RETRY: &str = "Sorry, I didn't understand you. Please select the book type - audio or regular:";
pub const TOTAL_PAGES_PROMPT: &str = "Enter total pages of the book:";
pub const PAGE_PROMPT: &str = "Enter the page you are currently reading:";
pub const PERCENT_PROMPT: &str = "Enter percent of your listening:";
pub const REGULAR_DONE: &str = "Thank you!";
pub const AUDIO_DONE: &str = "Thank you for updating your audiobook progress!";

const STEPS: &[Step] = &[
    Step::EnterBookType,
    Step::EnterTotalPages,
    Step::EnterPage,
    Step::EnterPercent,
];

pub struct SetProgressFlow;

/// The two-button keyboard shown with the book type question
pub fn book_type_keyboard() -> ReplyKeyboard {
    ReplyKeyboard {
        rows: vec![vec!["Regular Book".to_string(), "Audio Book".to_string()]],
        one_time: true,
    }
}

/// Percent of a regular book read, rounded down
pub fn regular_progress(page: u32, total_pages: u32) -> u8 {
    if total_pages == 0 {
        return 0;
    }
    let percent = u64::from(page) * 100 / u64::from(total_pages);
    u8::try_from(percent.min(100)).unwrap_or(100)
}

/// Daily pace needed to finish by the meeting, if the meeting is still ahead.
///
/// `remaining` is pages left for regular books and percent left for audiobooks.
pub fn pace_hint(kind: BookKind, remaining: u32, meeting_date: Option<NaiveDate>, today: NaiveDate) -> Option<String> {
    let meeting_date = meeting_date?;
    let days = (meeting_date - today).num_days();
    if days <= 0 {
        return None;
    }
    let per_day = f64::from(remaining) / days as f64;
    let date = format_meeting_date(meeting_date);

    Some(match kind {
        BookKind::Regular => format!(
            "You need to read {:.1} pages per day to finish the book by the meeting date {}.",
            per_day, date
        ),
        BookKind::Audio => format!(
            "You need to complete {:.1}% of the audiobook per day to finish it by the meeting date {}.",
            per_day, date
        ),
    })
}

fn with_hint(text: &str, hint: Option<String>) -> Reply {
    match hint {
        Some(hint) => Reply::text(format!("{}\n{}", text, hint)),
        None => Reply::text(text),
    }
}

impl SetProgressFlow {
    async fn start(&self, ctx: &FlowContext<'_>) -> AppResult<Transition> {
        let book = ctx.require_active_book().await?;
        let existing = ctx.store.get_progress(ctx.handle(), book.id).await?;

        Ok(match existing {
            None => Transition::to(
                Step::EnterBookType,
                Reply::text(BOOK_TYPE_PROMPT).with_keyboard(book_type_keyboard()),
            ),
            Some(record) => match record.kind {
                // Type was picked but the page count never arrived
                BookKind::Regular if record.total_pages == 0 => {
                    Transition::to(Step::EnterTotalPages, Reply::text(TOTAL_PAGES_PROMPT))
                }
                BookKind::Regular => Transition::to(Step::EnterPage, Reply::text(PAGE_PROMPT)),
                BookKind::Audio => Transition::to(Step::EnterPercent, Reply::text(PERCENT_PROMPT)),
            },
        })
    }

    async fn enter_book_type(&self, ctx: &FlowContext<'_>, event: &InboundEvent) -> AppResult<Transition> {
        let answer = event.text.to_lowercase();
        let kind = if answer.contains("regular") {
            BookKind::Regular
        } else if answer.contains("audio") {
            BookKind::Audio
        } else {
            return Err(AppError::Validation(BOOK_TYPE_RETRY.to_string()));
        };

        let book = ctx.require_active_book().await?;
        ctx.store
            .set_progress(&ReadingProgress::started(ctx.handle(), book.id, kind))
            .await?;
        log::info!("📖 {} reads '{}' as {} book", ctx.handle(), book.title, kind);

        Ok(match kind {
            BookKind::Regular => Transition::to(Step::EnterTotalPages, Reply::text(TOTAL_PAGES_PROMPT)),
            BookKind::Audio => Transition::to(Step::EnterPercent, Reply::text(PERCENT_PROMPT)),
        })
    }

    async fn enter_total_pages(&self, ctx: &FlowContext<'_>, event: &InboundEvent) -> AppResult<Transition> {
        let total_pages = parse_total_pages(&event.text)?;
        let book = ctx.require_active_book().await?;

        let record = ReadingProgress {
            total_pages,
            ..ReadingProgress::started(ctx.handle(), book.id, BookKind::Regular)
        };
        ctx.store.set_progress(&record).await?;

        Ok(Transition::to(Step::EnterPage, Reply::text(PAGE_PROMPT)))
    }

    async fn enter_page(&self, ctx: &FlowContext<'_>, event: &InboundEvent) -> AppResult<Transition> {
        let book = ctx.require_active_book().await?;
        let record = ctx
            .store
            .get_progress(ctx.handle(), book.id)
            .await?
            .ok_or_else(|| AppError::NotFound("No reading progress found. Use /setProgress to start again.".to_string()))?;

        let page = parse_page(&event.text, record.total_pages)?;
        let progress = regular_progress(page, record.total_pages);
        ctx.store
            .set_progress(&ReadingProgress {
                kind: BookKind::Regular,
                page_number: page,
                progress,
                ..record.clone()
            })
            .await?;
        log::info!(
            "📖 {} is on page {}/{} of '{}' ({}%)",
            ctx.handle(),
            page,
            record.total_pages,
            book.title,
            progress
        );

        let hint = pace_hint(BookKind::Regular, record.total_pages - page, book.meeting_date, ctx.today);
        Ok(Transition::done(with_hint(REGULAR_DONE, hint)))
    }

    async fn enter_percent(&self, ctx: &FlowContext<'_>, event: &InboundEvent) -> AppResult<Transition> {
        let percent = parse_percent(&event.text)?;
        let book = ctx.require_active_book().await?;

        ctx.store
            .set_progress(&ReadingProgress {
                progress: percent,
                ..ReadingProgress::started(ctx.handle(), book.id, BookKind::Audio)
            })
            .await?;
        log::info!("🎧 {} listened to {}% of '{}'", ctx.handle(), percent, book.title);

        let hint = pace_hint(BookKind::Audio, u32::from(100 - percent), book.meeting_date, ctx.today);
        Ok(Transition::done(with_hint(AUDIO_DONE, hint)))
    }
}

#[async_trait]
impl FlowHandler for SetProgressFlow {
    fn id(&self) -> FlowId {
        FlowId::SetProgress
    }

    fn steps(&self) -> &'static [Step] {
        STEPS
    }

    async fn step(&self, ctx: &FlowContext<'_>, at: Option<Step>, event: &InboundEvent) -> AppResult<Transition> {
        match at {
            None => self.start(ctx).await,
            Some(Step::EnterBookType) => self.enter_book_type(ctx, event).await,
            Some(Step::EnterTotalPages) => self.enter_total_pages(ctx, event).await,
            Some(Step::EnterPage) => self.enter_page(ctx, event).await,
            Some(Step::EnterPercent) => self.enter_percent(ctx, event).await,
            Some(other) => Err(foreign_step(self.id(), other)),
        }
    }
}

//! Commands a member can issue while idle
//!
//! One-shot commands answer immediately and leave the member idle. Flow
//! commands hand the event to the flow's entry step.

use std::collections::HashMap;
use std::fmt::Write as _;
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use super::flow::{FlowContext, Transition};
use super::flows::SetBookFlow;
use super::registry::StateRegistry;
use super::status::FlowId;
use super::types::{InboundEvent, Reply};
use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::validation::format_meeting_date;
use crate::storage::db::{Book, ReadingProgress, User};

pub const UNKNOWN_COMMAND: &str = "I don't recognize that command. Use /help to see the list of commands.";
pub const NOTHING_TO_CANCEL: &str = "There is nothing to cancel.";
pub const CANCELLED: &str = "Cancelled. Use /help to see the list of commands.";

/// Every command the club bot understands, by its Telegram name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, EnumIter)]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
pub enum ClubCommand {
    #[strum(to_string = "help", serialize = "start")]
    Help,
    SetProgress,
    GetCurrentBook,
    GetGroupProgress,
    GetBookList,
    GetUserList,
    AddBook,
    SetMeetingDate,
    RemoveBook,
    AddUser,
    RemoveUser,
    Cancel,
}

impl ClubCommand {
    pub fn parse(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    pub fn name(self) -> &'static str {
        self.into()
    }

    /// What a non-admin is told they may not do, for admin-only commands
    pub fn admin_action(self) -> Option<&'static str> {
        match self {
            ClubCommand::AddBook => Some("add a book"),
            ClubCommand::SetMeetingDate => Some("set the meeting date"),
            ClubCommand::RemoveBook => Some("remove a book"),
            ClubCommand::AddUser => Some("add a user"),
            ClubCommand::RemoveUser => Some("remove a user"),
            _ => None,
        }
    }

    /// Flow started by this command, if any
    pub fn flow(self) -> Option<FlowId> {
        match self {
            ClubCommand::SetProgress => Some(FlowId::SetProgress),
            ClubCommand::AddBook => Some(FlowId::SetBook),
            ClubCommand::AddUser => Some(FlowId::AddUser),
            ClubCommand::RemoveUser => Some(FlowId::RemoveUser),
            _ => None,
        }
    }

    /// Listed in /help for ordinary members
    fn shown_to_members(self) -> bool {
        matches!(
            self,
            ClubCommand::Help
                | ClubCommand::SetProgress
                | ClubCommand::GetCurrentBook
                | ClubCommand::GetGroupProgress
                | ClubCommand::Cancel
        )
    }
}

/// Handles a command from an idle member.
///
/// Unknown commands and plain text get the fixed "unknown command" reply.
pub async fn dispatch(ctx: &FlowContext<'_>, registry: &StateRegistry, event: &InboundEvent) -> AppResult<Transition> {
    let Some(parsed) = event.command.as_ref() else {
        return Ok(Transition::done(Reply::text(UNKNOWN_COMMAND)));
    };
    let Some(command) = ClubCommand::parse(&parsed.name) else {
        log::info!("{} sent unknown command /{}", ctx.handle(), parsed.name);
        return Ok(Transition::done(Reply::text(UNKNOWN_COMMAND)));
    };

    if let Some(action) = command.admin_action() {
        if !ctx.sender.is_admin {
            log::warn!("🚫 {} tried admin command /{}", ctx.handle(), command.name());
            return Err(AppError::Authorization(format!("You are not authorized to {}.", action)));
        }
    }

    if let Some(flow) = command.flow() {
        let handler = registry
            .flow(flow)
            .ok_or_else(|| AppError::Config(format!("flow {} is not registered", flow)))?;
        return handler.step(ctx, None, event).await;
    }

    let reply = match command {
        ClubCommand::Help => help_text(ctx.sender.is_admin),
        ClubCommand::GetUserList => user_list(&ctx.store.list_users().await?),
        ClubCommand::GetBookList => book_list(&ctx.store.list_books().await?),
        ClubCommand::GetCurrentBook => current_book(&ctx.require_active_book().await?),
        ClubCommand::GetGroupProgress => group_progress(ctx).await?,
        ClubCommand::RemoveBook => remove_book(ctx, &parsed.args).await?,
        ClubCommand::SetMeetingDate => return SetBookFlow::begin_meeting_date(ctx).await,
        ClubCommand::Cancel => NOTHING_TO_CANCEL.to_string(),
        ClubCommand::SetProgress | ClubCommand::AddBook | ClubCommand::AddUser | ClubCommand::RemoveUser => {
            return Err(AppError::Config(format!("/{} has no flow", command.name())));
        }
    };

    Ok(Transition::done(Reply::text(reply)))
}

/// Role-aware command list; admins also see the version
pub fn help_text(is_admin: bool) -> String {
    let mut text = String::from("Here are the commands you can use: \n");
    for command in ClubCommand::iter().filter(|c| is_admin || c.shown_to_members()) {
        let _ = writeln!(text, "/{}", command.name());
    }
    if is_admin {
        let _ = write!(text, "\napplicationVersion: {}", config::APP_VERSION);
    }
    text.trim_end().to_string()
}

pub fn user_list(users: &[User]) -> String {
    let mut text = String::from("Here is the list of users: \n");
    for user in users {
        let _ = writeln!(text, "{} : {}", user.handle, user.name);
    }
    text.trim_end().to_string()
}

pub fn book_list(books: &[Book]) -> String {
    if books.is_empty() {
        return "No books have been added yet.".to_string();
    }
    let mut text = String::from("Here is the list of books: \n");
    for book in books {
        let _ = writeln!(
            text,
            "{} by {} (id - {}; active - {})",
            book.title, book.author, book.id, book.active
        );
    }
    text.trim_end().to_string()
}

pub fn current_book(book: &Book) -> String {
    let mut text = format!("The current book is: {} by {} (id - {})", book.title, book.author, book.id);
    if let Some(date) = book.meeting_date {
        let _ = write!(text, "\nMeeting date: {}", format_meeting_date(date));
    }
    text
}

/// One `"{name}: {progress}%"` line per member, furthest along first
pub fn group_progress_report(rows: &[ReadingProgress], users: &[User]) -> Option<String> {
    if rows.is_empty() {
        return None;
    }
    let names: HashMap<String, &str> = users
        .iter()
        .map(|user| (user.handle.to_lowercase(), user.display_name()))
        .collect();

    let mut rows: Vec<&ReadingProgress> = rows.iter().collect();
    rows.sort_by(|a, b| b.progress.cmp(&a.progress));

    let lines: Vec<String> = rows
        .iter()
        .map(|row| {
            let name = names
                .get(&row.handle.to_lowercase())
                .copied()
                .unwrap_or(row.handle.as_str());
            format!("{}: {}%", name, row.progress)
        })
        .collect();
    Some(lines.join("\n"))
}

async fn group_progress(ctx: &FlowContext<'_>) -> AppResult<String> {
    let book = ctx.require_active_book().await?;
    let rows = ctx.store.list_progress_for_book(book.id).await?;
    let users = ctx.store.list_users().await?;
    group_progress_report(&rows, &users)
        .ok_or_else(|| AppError::NotFound("No users have set their progress yet.".to_string()))
}

async fn remove_book(ctx: &FlowContext<'_>, args: &str) -> AppResult<String> {
    let book_id: i64 = args
        .trim()
        .parse()
        .map_err(|_| AppError::Validation("Please use the format: /removeBook <book id>".to_string()))?;

    if ctx.store.delete_book(book_id).await? {
        log::info!("🗑️ {} removed book {}", ctx.handle(), book_id);
        Ok("Done".to_string())
    } else {
        Err(AppError::NotFound(format!("Book with id {} not found.", book_id)))
    }
}

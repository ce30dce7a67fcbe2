//! The four multi-step flows

mod add_user;
mod remove_user;
mod set_book;
mod set_progress;

pub use add_user::AddUserFlow;
pub use remove_user::RemoveUserFlow;
pub use set_book::{SetBookFlow, MEETING_DATE_PROMPT};
pub use set_progress::{book_type_keyboard, pace_hint, regular_progress, SetProgressFlow};

//! Handler dependencies and Telegram <-> conversation conversions

use std::sync::Arc;

use teloxide::types::{KeyboardButton, KeyboardMarkup, Message};

use crate::conversation::{ConversationRouter, InboundEvent, ReplyKeyboard};

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub router: Arc<ConversationRouter>,
}

impl HandlerDeps {
    pub fn new(router: Arc<ConversationRouter>) -> Self {
        Self { router }
    }
}

/// Reply for senders who have no Telegram username to identify them by
pub const USERNAME_REQUIRED: &str =
    "Please set a username in your Telegram settings so the club can recognise you, then try again.";

/// Builds the conversation event for a text message.
///
/// Returns `None` when the sender has no username (or the message has no text).
pub fn inbound_event(msg: &Message) -> Option<InboundEvent> {
    let text = msg.text()?;
    let username = msg.from.as_ref()?.username.as_deref()?;
    Some(InboundEvent::new(username, text))
}

/// Maps a conversation keyboard to Telegram's reply keyboard
pub fn keyboard_markup(keyboard: &ReplyKeyboard) -> KeyboardMarkup {
    let rows: Vec<Vec<KeyboardButton>> = keyboard
        .rows
        .iter()
        .map(|row| row.iter().map(KeyboardButton::new).collect())
        .collect();

    let mut markup = KeyboardMarkup::new(rows);
    markup.one_time_keyboard = keyboard.one_time;
    markup.resize_keyboard = true;
    markup
}

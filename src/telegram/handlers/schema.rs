//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::types::{inbound_event, keyboard_markup, HandlerDeps, HandlerError, USERNAME_REQUIRED};
use crate::conversation::{InboundEvent, Reply};
use crate::core::config;
use crate::core::error::{AppError, AppResult};

/// Creates the main dispatcher schema for the Telegram bot.
///
/// The same schema is used in production and can be used in integration tests.
///
/// # Arguments
/// * `deps` - Handler dependencies (conversation router)
///
/// # Returns
/// The complete handler tree for the bot
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    dptree::entry()
        // Senders without a username cannot be matched to a member
        .branch(anonymous_sender_handler())
        // Every text message goes through the conversation router
        .branch(message_handler(deps))
}

fn anonymous_sender_handler() -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some() && inbound_event(&msg).is_none())
        .endpoint(|bot: Bot, msg: Message| async move {
            log::info!("Message without username in chat {}", msg.chat.id);
            if let Err(e) = send_reply(&bot, msg.chat.id, &Reply::text(USERNAME_REQUIRED)).await {
                log::error!("❌ Failed to send reply to chat {}: {}", msg.chat.id, e);
            }
            Ok(())
        })
}

fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter_map(|msg: Message| inbound_event(&msg))
        .endpoint(move |bot: Bot, msg: Message, event: InboundEvent| {
            let deps = deps.clone();
            async move {
                let reply = deps.router.route(&event).await;

                // The member's step is already stored; resending the message resumes it
                if let Err(e) = send_reply(&bot, msg.chat.id, &reply).await {
                    log::error!(
                        "❌ Failed to deliver reply to {} (chat {}): {}",
                        event.sender_handle,
                        msg.chat.id,
                        e
                    );
                }
                Ok(())
            }
        })
}

/// Sends one reply, bounded by the delivery timeout
pub async fn send_reply(bot: &Bot, chat_id: ChatId, reply: &Reply) -> AppResult<()> {
    let mut request = bot.send_message(chat_id, reply.text.clone());
    if let Some(keyboard) = &reply.keyboard {
        request = request.reply_markup(keyboard_markup(keyboard));
    }

    let limit = config::delivery::timeout();
    match tokio::time::timeout(limit, request).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(AppError::Telegram(e)),
        Err(_) => Err(AppError::DeliveryTimeout(limit)),
    }
}

//! Telegram message conversion tests
//!
//! Run with: cargo test --test telegram_message_test

mod common;

use common::{create_message_json, TestEnvironment};
use pretty_assertions::assert_eq;
use teloxide::types::Message;

use bookclub::telegram::handlers::inbound_event;

fn message(username: Option<&str>, text: &str) -> Message {
    serde_json::from_str(&create_message_json(123456789, username, text)).unwrap()
}

#[test]
fn test_plain_text_becomes_flow_input() {
    let event = inbound_event(&message(Some("reader42"), "60")).unwrap();

    assert_eq!(event.sender_handle, "reader42");
    assert_eq!(event.text, "60");
    assert!(event.command.is_none());
}

#[test]
fn test_command_with_bot_suffix_and_args() {
    let event = inbound_event(&message(Some("club_admin"), "/removeBook@BookClubBot 7")).unwrap();

    let command = event.command.unwrap();
    assert_eq!(command.name, "removeBook");
    assert_eq!(command.args, "7");
}

#[test]
fn test_sender_without_username_is_skipped() {
    assert!(inbound_event(&message(None, "/help")).is_none());
}

#[tokio::test]
async fn test_telegram_message_routes_through_conversation() {
    let env = TestEnvironment::new();
    env.add_member("reader42", "Ann").await;

    let event = inbound_event(&message(Some("reader42"), "/getCurrentBook")).unwrap();
    let reply = env.router.route(&event).await;

    assert_eq!(reply.text, "No active book found.");
}

//! Test fixtures for conversation tests
//!
//! Provides TestEnvironment that sets up everything needed to drive the
//! conversation router end to end:
//! - Temp-file SQLite database with migrations applied
//! - Router with a pinned calendar date
//! - Helpers to create members and books and to read rows back

#![allow(dead_code)]

use chrono::NaiveDate;
use std::sync::Arc;
use tempfile::TempDir;

use bookclub::conversation::{ConversationRouter, InboundEvent, Reply, StateRegistry};
use bookclub::core::clock::FixedClock;
use bookclub::storage::db::{Book, ReadingProgress};
use bookclub::storage::{create_pool, RecordStore, SqliteStore};

/// Complete test environment for conversation tests
///
/// # Example
/// ```ignore
/// let env = TestEnvironment::new();
/// env.add_member("reader42", "Ann").await;
///
/// let reply = env.send("reader42", "/help").await;
/// assert!(reply.text.contains("/setProgress"));
/// ```
pub struct TestEnvironment {
    _dir: TempDir,
    pub store: SqliteStore,
    pub router: Arc<ConversationRouter>,
    pub today: NaiveDate,
}

impl TestEnvironment {
    /// New environment with "today" pinned to 10.05.2024
    pub fn new() -> Self {
        Self::with_today(NaiveDate::from_ymd_opt(2024, 5, 10).unwrap())
    }

    pub fn with_today(today: NaiveDate) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bookclub_test.sqlite");
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        let store = SqliteStore::new(Arc::new(pool));

        let router = ConversationRouter::new(
            Arc::new(store.clone()),
            Arc::new(StateRegistry::with_default_flows().unwrap()),
            Arc::new(FixedClock(today)),
        )
        .with_admin_contact("@club_admin");

        Self {
            _dir: dir,
            store,
            router: Arc::new(router),
            today,
        }
    }

    pub async fn add_member(&self, handle: &str, name: &str) {
        self.store.create_user(handle, name).await.unwrap();
    }

    pub async fn add_admin(&self, handle: &str, name: &str) {
        self.store.set_admin(handle, name).await.unwrap();
    }

    pub async fn add_book(&self, title: &str, author: &str) -> Book {
        let book = self.store.create_book_and_deactivate_previous(title).await.unwrap();
        self.store.update_book_author(book.id, author).await.unwrap();
        book
    }

    /// Routes one message and returns the single reply
    pub async fn send(&self, handle: &str, text: &str) -> Reply {
        self.router.route(&InboundEvent::new(handle, text)).await
    }

    /// Routes several messages in order and returns the last reply
    pub async fn send_all(&self, handle: &str, texts: &[&str]) -> Reply {
        let mut last = None;
        for text in texts {
            last = Some(self.send(handle, text).await);
        }
        last.unwrap()
    }

    pub async fn status(&self, handle: &str) -> String {
        self.store.get_user_status(handle).await.unwrap()
    }

    pub async fn progress(&self, handle: &str) -> Option<ReadingProgress> {
        let book = self.store.get_active_book().await.unwrap()?;
        self.store.get_progress(handle, book.id).await.unwrap()
    }

    pub async fn active_books(&self) -> Vec<Book> {
        self.store
            .list_books()
            .await
            .unwrap()
            .into_iter()
            .filter(|b| b.active)
            .collect()
    }
}

/// Telegram message JSON as the Bot API would deliver it
pub fn create_message_json(chat_id: i64, username: Option<&str>, text: &str) -> String {
    let mut from = serde_json::json!({
        "id": chat_id,
        "is_bot": false,
        "first_name": "Test"
    });
    if let Some(username) = username {
        from["username"] = serde_json::Value::from(username);
    }

    serde_json::json!({
        "message_id": 1,
        "date": 1234567890,
        "chat": {
            "id": chat_id,
            "type": "private",
            "first_name": "Test"
        },
        "from": from,
        "text": text
    })
    .to_string()
}

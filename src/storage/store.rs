//! Async Record Store seam
//!
//! The conversation core only talks to [`RecordStore`]. [`SqliteStore`] runs
//! every blocking rusqlite query on the blocking thread pool and bounds it
//! with a timeout, so a wedged database turns into an `AppError` instead of a
//! hung update handler.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::storage::db::{self, Book, DbConnection, DbPool, ReadingProgress, User};

/// Operations the conversation core needs from persistent storage.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // users
    async fn get_user_status(&self, handle: &str) -> AppResult<String>;
    async fn set_user_status(&self, handle: &str, status: &str) -> AppResult<()>;
    async fn get_user(&self, handle: &str) -> AppResult<Option<User>>;
    async fn is_member(&self, handle: &str) -> AppResult<bool> {
        Ok(self.get_user(handle).await?.is_some())
    }
    async fn create_user(&self, handle: &str, name: &str) -> AppResult<bool>;
    async fn set_admin(&self, handle: &str, name: &str) -> AppResult<()>;
    async fn set_user_name(&self, handle: &str, name: &str) -> AppResult<()>;
    async fn delete_user(&self, handle: &str) -> AppResult<()>;
    async fn list_users(&self) -> AppResult<Vec<User>>;
    async fn set_pending_handle(&self, handle: &str, pending: Option<&str>) -> AppResult<()>;
    async fn get_pending_handle(&self, handle: &str) -> AppResult<Option<String>>;
    async fn list_stale_members(&self, older_than: Duration) -> AppResult<Vec<String>>;
    async fn reset_stale_status(&self, handle: &str, older_than: Duration) -> AppResult<bool>;

    // books
    async fn create_book_and_deactivate_previous(&self, title: &str) -> AppResult<Book>;
    async fn update_book_author(&self, book_id: i64, author: &str) -> AppResult<()>;
    async fn update_book_meeting_date(&self, book_id: i64, date: NaiveDate) -> AppResult<()>;
    async fn get_active_book(&self) -> AppResult<Option<Book>>;
    async fn delete_book(&self, book_id: i64) -> AppResult<bool>;
    async fn list_books(&self) -> AppResult<Vec<Book>>;

    // reading progress
    async fn set_progress(&self, record: &ReadingProgress) -> AppResult<()>;
    async fn get_progress(&self, handle: &str, book_id: i64) -> AppResult<Option<ReadingProgress>>;
    async fn list_progress_for_book(&self, book_id: i64) -> AppResult<Vec<ReadingProgress>>;
}

/// SQLite-backed [`RecordStore`]
#[derive(Clone)]
pub struct SqliteStore {
    pool: Arc<DbPool>,
    timeout: Duration,
}

impl SqliteStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self::with_timeout(pool, config::storage::timeout())
    }

    pub fn with_timeout(pool: Arc<DbPool>, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn pool(&self) -> Arc<DbPool> {
        Arc::clone(&self.pool)
    }

    /// Runs `query` on a pooled connection off the async runtime
    async fn run<T, F>(&self, query: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut DbConnection) -> AppResult<T> + Send + 'static,
    {
        let pool = Arc::clone(&self.pool);
        let task = tokio::task::spawn_blocking(move || {
            let mut conn = db::get_connection(&pool)?;
            query(&mut conn)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(AppError::StorageTask(join_err.to_string())),
            Err(_) => {
                log::error!("⏱️ Record store call exceeded {:?}", self.timeout);
                Err(AppError::StorageTimeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn get_user_status(&self, handle: &str) -> AppResult<String> {
        let handle = handle.to_string();
        self.run(move |conn| Ok(db::get_user_status(conn, &handle)?)).await
    }

    async fn set_user_status(&self, handle: &str, status: &str) -> AppResult<()> {
        let (handle, status) = (handle.to_string(), status.to_string());
        self.run(move |conn| Ok(db::set_user_status(conn, &handle, &status)?))
            .await
    }

    async fn get_user(&self, handle: &str) -> AppResult<Option<User>> {
        let handle = handle.to_string();
        self.run(move |conn| Ok(db::get_user(conn, &handle)?)).await
    }

    async fn create_user(&self, handle: &str, name: &str) -> AppResult<bool> {
        let (handle, name) = (handle.to_string(), name.to_string());
        self.run(move |conn| Ok(db::create_user(conn, &handle, &name)?)).await
    }

    async fn set_admin(&self, handle: &str, name: &str) -> AppResult<()> {
        let (handle, name) = (handle.to_string(), name.to_string());
        self.run(move |conn| Ok(db::upsert_admin(conn, &handle, &name)?)).await
    }

    async fn set_user_name(&self, handle: &str, name: &str) -> AppResult<()> {
        let (handle, name) = (handle.to_string(), name.to_string());
        self.run(move |conn| {
            db::set_user_name(conn, &handle, &name)?;
            Ok(())
        })
        .await
    }

    async fn delete_user(&self, handle: &str) -> AppResult<()> {
        let handle = handle.to_string();
        self.run(move |conn| {
            db::delete_user(conn, &handle)?;
            Ok(())
        })
        .await
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        self.run(|conn| Ok(db::list_users(conn)?)).await
    }

    async fn set_pending_handle(&self, handle: &str, pending: Option<&str>) -> AppResult<()> {
        let handle = handle.to_string();
        let pending = pending.map(str::to_string);
        self.run(move |conn| Ok(db::set_pending_handle(conn, &handle, pending.as_deref())?))
            .await
    }

    async fn get_pending_handle(&self, handle: &str) -> AppResult<Option<String>> {
        let handle = handle.to_string();
        self.run(move |conn| Ok(db::get_pending_handle(conn, &handle)?)).await
    }

    async fn list_stale_members(&self, older_than: Duration) -> AppResult<Vec<String>> {
        self.run(move |conn| Ok(db::list_stale_members(conn, older_than)?))
            .await
    }

    async fn reset_stale_status(&self, handle: &str, older_than: Duration) -> AppResult<bool> {
        let handle = handle.to_string();
        self.run(move |conn| Ok(db::reset_stale_status(conn, &handle, older_than)?))
            .await
    }

    async fn create_book_and_deactivate_previous(&self, title: &str) -> AppResult<Book> {
        let title = title.to_string();
        self.run(move |conn| Ok(db::create_book_and_deactivate_previous(conn, &title)?))
            .await
    }

    async fn update_book_author(&self, book_id: i64, author: &str) -> AppResult<()> {
        let author = author.to_string();
        self.run(move |conn| {
            db::update_book_author(conn, book_id, &author)?;
            Ok(())
        })
        .await
    }

    async fn update_book_meeting_date(&self, book_id: i64, date: NaiveDate) -> AppResult<()> {
        self.run(move |conn| {
            db::update_book_meeting_date(conn, book_id, date)?;
            Ok(())
        })
        .await
    }

    async fn get_active_book(&self) -> AppResult<Option<Book>> {
        self.run(|conn| Ok(db::get_active_book(conn)?)).await
    }

    async fn delete_book(&self, book_id: i64) -> AppResult<bool> {
        self.run(move |conn| Ok(db::delete_book(conn, book_id)?)).await
    }

    async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.run(|conn| Ok(db::list_books(conn)?)).await
    }

    async fn set_progress(&self, record: &ReadingProgress) -> AppResult<()> {
        let record = record.clone();
        self.run(move |conn| Ok(db::set_progress(conn, &record)?)).await
    }

    async fn get_progress(&self, handle: &str, book_id: i64) -> AppResult<Option<ReadingProgress>> {
        let handle = handle.to_string();
        self.run(move |conn| Ok(db::get_progress(conn, &handle, book_id)?))
            .await
    }

    async fn list_progress_for_book(&self, book_id: i64) -> AppResult<Vec<ReadingProgress>> {
        self.run(move |conn| Ok(db::list_progress_for_book(conn, book_id)?))
            .await
    }
}

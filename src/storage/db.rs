use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Result, Row, TransactionBehavior};
use std::time::Duration;
use strum::{Display, EnumString};

use crate::core::config;
use crate::core::error::AppResult;
use crate::storage::migrations::run_migrations;

/// A club member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Telegram username without the leading `@`
    pub handle: String,
    /// Display name shown in progress reports (may be empty)
    pub name: String,
    pub is_admin: bool,
    /// Conversation step marker; empty when idle
    pub status: String,
}

impl User {
    /// Name for reports, falling back to the handle
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.handle
        } else {
            &self.name
        }
    }
}

/// A book the club reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub active: bool,
    pub meeting_date: Option<NaiveDate>,
}

/// How a member consumes the active book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum BookKind {
    Regular,
    Audio,
}

/// A member's progress on one book, keyed by (handle, book_id).
///
/// Regular books track `total_pages`/`page_number` and derive `progress`;
/// audiobooks store the percent directly in `progress`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingProgress {
    pub handle: String,
    pub book_id: i64,
    pub kind: BookKind,
    pub total_pages: u32,
    pub page_number: u32,
    pub progress: u8,
}

impl ReadingProgress {
    /// Fresh row right after the member picked the book type
    pub fn started(handle: &str, book_id: i64, kind: BookKind) -> Self {
        Self {
            handle: handle.to_string(),
            book_id,
            kind,
            total_pages: 0,
            page_number: 0,
            progress: 0,
        }
    }
}

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Every pooled connection enables foreign keys (progress rows cascade with
/// their member and book) and waits on a busy database instead of failing.
/// Schema migrations run once on the first connection.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
///
/// # Example
///
/// ```no_run
/// use bookclub::storage::db;
///
/// let pool = db::create_pool("bookclub_dev.sqlite")?;
/// # Ok::<(), bookclub::core::error::AppError>(())
/// ```
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(config::storage::busy_timeout())?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
    });
    let pool = Pool::builder()
        .max_size(config::storage::POOL_SIZE)
        .connection_timeout(config::storage::timeout())
        .build(manager)?;

    let mut conn = pool.get()?;
    run_migrations(&mut conn)?;

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is automatically returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> std::result::Result<DbConnection, r2d2::Error> {
    pool.get()
}

fn user_from_row(row: &Row<'_>) -> Result<User> {
    Ok(User {
        handle: row.get(0)?,
        name: row.get(1)?,
        is_admin: row.get(2)?,
        status: row.get(3)?,
    })
}

fn book_from_row(row: &Row<'_>) -> Result<Book> {
    let meeting_date: Option<String> = row.get(4)?;
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        active: row.get(3)?,
        meeting_date: meeting_date.and_then(|raw| NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok()),
    })
}

fn progress_from_row(row: &Row<'_>) -> Result<ReadingProgress> {
    let kind: String = row.get(2)?;
    let kind = kind.parse::<BookKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(ReadingProgress {
        handle: row.get(0)?,
        book_id: row.get(1)?,
        kind,
        total_pages: row.get(3)?,
        page_number: row.get(4)?,
        progress: row.get(5)?,
    })
}

// ==================== users ====================

/// Fetches a member by handle (case-insensitive).
///
/// # Returns
///
/// `Ok(Some(User))` if the member exists, `Ok(None)` otherwise.
pub fn get_user(conn: &Connection, handle: &str) -> Result<Option<User>> {
    conn.query_row(
        "SELECT handle, name, is_admin, status FROM users WHERE handle = ?1",
        params![handle],
        user_from_row,
    )
    .optional()
}

/// Returns the member's step marker, or an empty string when idle or unknown
pub fn get_user_status(conn: &Connection, handle: &str) -> Result<String> {
    let status: Option<String> = conn
        .query_row("SELECT status FROM users WHERE handle = ?1", params![handle], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(status.unwrap_or_default())
}

/// Writes the member's step marker and stamps when it changed
pub fn set_user_status(conn: &Connection, handle: &str, status: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET status = ?1, status_updated_at = datetime('now') WHERE handle = ?2",
        params![status, handle],
    )?;
    Ok(())
}

/// Creates a member. Creating an existing handle is a silent no-op.
///
/// # Returns
///
/// `true` if a new row was inserted.
pub fn create_user(conn: &Connection, handle: &str, name: &str) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO users (handle, name) VALUES (?1, ?2)",
        params![handle, name],
    )?;
    if inserted == 0 {
        log::info!("User {} already exists", handle);
    }
    Ok(inserted > 0)
}

/// Creates or promotes an admin. A non-empty `name` replaces the stored one.
pub fn upsert_admin(conn: &Connection, handle: &str, name: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO users (handle, name, is_admin) VALUES (?1, ?2, 1)
         ON CONFLICT(handle) DO UPDATE SET
             is_admin = 1,
             name = CASE WHEN excluded.name != '' THEN excluded.name ELSE users.name END",
        params![handle, name],
    )?;
    Ok(())
}

/// Sets one member's display name
pub fn set_user_name(conn: &Connection, handle: &str, name: &str) -> Result<usize> {
    conn.execute("UPDATE users SET name = ?1 WHERE handle = ?2", params![name, handle])
}

/// Deletes a member; deleting an unknown handle is a silent no-op
pub fn delete_user(conn: &Connection, handle: &str) -> Result<usize> {
    let deleted = conn.execute("DELETE FROM users WHERE handle = ?1", params![handle])?;
    if deleted > 0 {
        log::info!("User {} removed", handle);
    }
    Ok(deleted)
}

/// All members ordered by handle
pub fn list_users(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare("SELECT handle, name, is_admin, status FROM users ORDER BY handle COLLATE NOCASE")?;
    let rows = stmt.query_map([], user_from_row)?;
    rows.collect()
}

/// Remembers (or clears) the handle an admin is adding in /addUser
pub fn set_pending_handle(conn: &Connection, handle: &str, pending: Option<&str>) -> Result<()> {
    conn.execute(
        "UPDATE users SET pending_handle = ?1 WHERE handle = ?2",
        params![pending, handle],
    )?;
    Ok(())
}

pub fn get_pending_handle(conn: &Connection, handle: &str) -> Result<Option<String>> {
    let pending: Option<Option<String>> = conn
        .query_row(
            "SELECT pending_handle FROM users WHERE handle = ?1",
            params![handle],
            |row| row.get(0),
        )
        .optional()?;
    Ok(pending.flatten())
}

const STALE_CONDITION: &str = "status != ''
         AND (status_updated_at IS NULL OR status_updated_at < datetime('now', ?1))";

fn age_modifier(older_than: Duration) -> String {
    format!("-{} seconds", older_than.as_secs())
}

/// Members whose flow has not moved for longer than `older_than`.
pub fn list_stale_members(conn: &Connection, older_than: Duration) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("SELECT handle FROM users WHERE {}", STALE_CONDITION))?;
    let handles = stmt
        .query_map(params![age_modifier(older_than)], |row| row.get(0))?
        .collect::<Result<Vec<String>>>()?;
    Ok(handles)
}

/// Puts one member back to idle if their flow is still older than `older_than`.
///
/// # Returns
///
/// `true` if the member was reset; `false` if they moved on in the meantime.
pub fn reset_stale_status(conn: &Connection, handle: &str, older_than: Duration) -> Result<bool> {
    let count = conn.execute(
        &format!(
            "UPDATE users SET status = '', pending_handle = NULL, status_updated_at = datetime('now')
             WHERE handle = ?2 AND {}",
            STALE_CONDITION
        ),
        params![age_modifier(older_than), handle],
    )?;
    Ok(count > 0)
}

// ==================== books ====================

/// Adds a new active book, deactivating the previous one in the same transaction.
///
/// The partial unique index on `books.active` guarantees no interleaving
/// writer can leave two active books behind.
pub fn create_book_and_deactivate_previous(conn: &mut Connection, title: &str) -> Result<Book> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let deactivated = tx.execute("UPDATE books SET active = 0 WHERE active = 1", [])?;
    tx.execute("INSERT INTO books (title, active) VALUES (?1, 1)", params![title])?;
    let id = tx.last_insert_rowid();
    tx.commit()?;

    log::info!(
        "Added book {} '{}' as active ({} previous book(s) deactivated)",
        id,
        title,
        deactivated
    );

    Ok(Book {
        id,
        title: title.to_string(),
        author: String::new(),
        active: true,
        meeting_date: None,
    })
}

pub fn update_book_author(conn: &Connection, book_id: i64, author: &str) -> Result<usize> {
    conn.execute("UPDATE books SET author = ?1 WHERE id = ?2", params![author, book_id])
}

pub fn update_book_meeting_date(conn: &Connection, book_id: i64, date: NaiveDate) -> Result<usize> {
    conn.execute(
        "UPDATE books SET meeting_date = ?1 WHERE id = ?2",
        params![date.format("%Y-%m-%d").to_string(), book_id],
    )
}

/// The club's current read, if any
pub fn get_active_book(conn: &Connection) -> Result<Option<Book>> {
    conn.query_row(
        "SELECT id, title, author, active, meeting_date FROM books WHERE active = 1 LIMIT 1",
        [],
        book_from_row,
    )
    .optional()
}

/// Deletes a book together with its progress rows
///
/// # Returns
///
/// `true` if the book existed.
pub fn delete_book(conn: &Connection, book_id: i64) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM books WHERE id = ?1", params![book_id])?;
    if deleted > 0 {
        log::info!("Book with ID '{}' removed successfully.", book_id);
    }
    Ok(deleted > 0)
}

/// All books, oldest first
pub fn list_books(conn: &Connection) -> Result<Vec<Book>> {
    let mut stmt = conn.prepare("SELECT id, title, author, active, meeting_date FROM books ORDER BY id")?;
    let rows = stmt.query_map([], book_from_row)?;
    rows.collect()
}

// ==================== reading progress ====================

/// Inserts or overwrites the (handle, book) progress row
pub fn set_progress(conn: &Connection, record: &ReadingProgress) -> Result<()> {
    conn.execute(
        "INSERT INTO reading_progress (handle, book_id, kind, total_pages, page_number, progress, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
         ON CONFLICT(handle, book_id) DO UPDATE SET
             kind = excluded.kind,
             total_pages = excluded.total_pages,
             page_number = excluded.page_number,
             progress = excluded.progress,
             updated_at = excluded.updated_at",
        params![
            record.handle,
            record.book_id,
            record.kind.to_string(),
            record.total_pages,
            record.page_number,
            record.progress,
        ],
    )?;
    log::debug!(
        "Updated reading progress for user '{}' on book '{}'",
        record.handle,
        record.book_id
    );
    Ok(())
}

pub fn get_progress(conn: &Connection, handle: &str, book_id: i64) -> Result<Option<ReadingProgress>> {
    conn.query_row(
        "SELECT handle, book_id, kind, total_pages, page_number, progress
         FROM reading_progress WHERE handle = ?1 AND book_id = ?2",
        params![handle, book_id],
        progress_from_row,
    )
    .optional()
}

/// Progress rows of one book, furthest along first
pub fn list_progress_for_book(conn: &Connection, book_id: i64) -> Result<Vec<ReadingProgress>> {
    let mut stmt = conn.prepare(
        "SELECT handle, book_id, kind, total_pages, page_number, progress
         FROM reading_progress WHERE book_id = ?1
         ORDER BY progress DESC, handle COLLATE NOCASE",
    )?;
    let rows = stmt.query_map(params![book_id], progress_from_row)?;
    rows.collect()
}

use std::sync::Arc;
use std::time::Duration;

use super::commands::{self, ClubCommand, NOTHING_TO_CANCEL};
use super::flow::FlowContext;
use super::registry::StateRegistry;
use super::status::{ConversationStatus, FlowId};
use super::types::{InboundEvent, Reply};
use crate::core::clock::Clock;
use crate::core::config;
use crate::core::error::{AppError, AppResult, ErrorKind};
use crate::core::user_locks::UserLocks;
use crate::storage::db::User;
use crate::storage::RecordStore;

/// Reply after a corrupted status was reset
pub const STATUS_RESET_APOLOGY: &str = "Sorry, something went wrong. Please retry your command.";

/// Reply when storage fails; the member's step is kept so resending resumes it
pub const TEMPORARY_FAILURE: &str = "Sorry, I couldn't process your message right now. Please try again in a moment.";

/// Entry point of the conversation core.
///
/// For every inbound event it loads the sender, serializes them against
/// their own concurrent events, and either continues their current flow or
/// dispatches a command. Exactly one reply comes back per event and no
/// error escapes: every failure is turned into a reply here.
pub struct ConversationRouter {
    store: Arc<dyn RecordStore>,
    registry: Arc<StateRegistry>,
    clock: Arc<dyn Clock>,
    locks: UserLocks,
    admin_contact: String,
}

impl ConversationRouter {
    pub fn new(store: Arc<dyn RecordStore>, registry: Arc<StateRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            registry,
            clock,
            locks: UserLocks::new(),
            admin_contact: config::ADMIN_CONTACT.clone(),
        }
    }

    /// Overrides who non-members are told to contact
    pub fn with_admin_contact(mut self, contact: impl Into<String>) -> Self {
        self.admin_contact = contact.into();
        self
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn locks(&self) -> &UserLocks {
        &self.locks
    }

    /// Text for senders who are not club members
    pub fn not_a_member_text(&self) -> String {
        format!(
            "You are not a member of the club. Please contact {} to join the club.",
            self.admin_contact
        )
    }

    /// Routes one event and returns the reply to send back.
    pub async fn route(&self, event: &InboundEvent) -> Reply {
        let _guard = self.locks.acquire(&event.sender_handle).await;

        match self.route_locked(event).await {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("❌ Failed to process message from {}: {}", event.sender_handle, e);
                Reply::text(TEMPORARY_FAILURE)
            }
        }
    }

    async fn route_locked(&self, event: &InboundEvent) -> AppResult<Reply> {
        let Some(sender) = self.store.get_user(&event.sender_handle).await? else {
            log::info!("🚪 Message from non-member {}", event.sender_handle);
            return Ok(Reply::text(self.not_a_member_text()));
        };

        let status = ConversationStatus::decode(&sender.status);
        log::debug!(
            "Routing message from {} (status: {:?}, command: {:?})",
            sender.handle,
            status,
            event.command.as_ref().map(|c| c.name.as_str())
        );

        if is_cancel(event) {
            return self.cancel(&sender, &status).await;
        }

        let ctx = FlowContext {
            store: self.store.as_ref(),
            sender: &sender,
            today: self.clock.today(),
        };

        let outcome = match &status {
            ConversationStatus::Idle => commands::dispatch(&ctx, &self.registry, event).await,
            _ => match self.registry.resolve(&status) {
                Ok((handler, step)) => handler.step(&ctx, Some(step), event).await,
                Err(e) => Err(e),
            },
        };

        match outcome {
            Ok(transition) => {
                if transition.next != status {
                    self.store
                        .set_user_status(&sender.handle, transition.next.encode())
                        .await?;
                    log::debug!("{}: {:?} -> {:?}", sender.handle, status, transition.next);
                    self.release_pending_handle(&sender, &status, &transition.next).await;
                }
                Ok(transition.reply)
            }
            Err(err) => self.recover(&sender, &status, err).await,
        }
    }

    /// Applies the recovery policy of each error kind.
    ///
    /// Storage and configuration failures are passed up so the member's
    /// status stays exactly where it was.
    async fn recover(&self, sender: &User, status: &ConversationStatus, err: AppError) -> AppResult<Reply> {
        match err.kind() {
            ErrorKind::Validation | ErrorKind::Authorization => {
                log::info!("{} at {:?}: {}", sender.handle, status, err);
                Ok(Reply::text(err.user_message().unwrap_or(TEMPORARY_FAILURE)))
            }
            ErrorKind::NotFound => {
                log::info!("{} at {:?}: {}", sender.handle, status, err);
                if !status.is_idle() {
                    self.reset(sender, status).await?;
                }
                Ok(Reply::text(err.user_message().unwrap_or(TEMPORARY_FAILURE)))
            }
            ErrorKind::UnknownStatus => {
                log::error!(
                    "⚠️ Corrupted conversation status {:?} for {}, resetting to idle: {}",
                    sender.status,
                    sender.handle,
                    err
                );
                self.reset(sender, status).await?;
                Ok(Reply::text(STATUS_RESET_APOLOGY))
            }
            ErrorKind::Storage | ErrorKind::Delivery | ErrorKind::Config => Err(err),
        }
    }

    async fn cancel(&self, sender: &User, status: &ConversationStatus) -> AppResult<Reply> {
        if status.is_idle() {
            return Ok(Reply::text(NOTHING_TO_CANCEL));
        }
        self.reset(sender, status).await?;
        log::info!("↩️ {} cancelled {:?}", sender.handle, status);
        Ok(Reply::text(commands::CANCELLED))
    }

    async fn reset(&self, sender: &User, status: &ConversationStatus) -> AppResult<()> {
        self.store
            .set_user_status(&sender.handle, ConversationStatus::Idle.encode())
            .await?;
        self.release_pending_handle(sender, status, &ConversationStatus::Idle).await;
        Ok(())
    }

    /// Clears the handle an admin's `/addUser` was working on once the
    /// admin's status has left that flow.
    ///
    /// Runs only after the new status is stored. A leftover value is
    /// harmless: the nickname step overwrites it before anything reads it.
    async fn release_pending_handle(&self, sender: &User, from: &ConversationStatus, to: &ConversationStatus) {
        if !in_add_user(from) || in_add_user(to) {
            return;
        }
        if let Err(e) = self.store.set_pending_handle(&sender.handle, None).await {
            log::warn!("Failed to clear pending handle of {}: {}", sender.handle, e);
        }
    }

    /// Puts members whose flow has not moved for `older_than` back to idle.
    ///
    /// Each member is reset under their own lock and only if still stale, so
    /// a message being routed for them at the same moment is never cut short.
    pub async fn sweep_abandoned(&self, older_than: Duration) -> AppResult<usize> {
        let mut reset = 0;
        for handle in self.store.list_stale_members(older_than).await? {
            let _guard = self.locks.acquire(&handle).await;
            if self.store.reset_stale_status(&handle, older_than).await? {
                reset += 1;
            }
        }
        if reset > 0 {
            log::info!("⏰ Reset {} abandoned conversation(s)", reset);
        }
        Ok(reset)
    }
}

fn in_add_user(status: &ConversationStatus) -> bool {
    matches!(status, ConversationStatus::InFlow { flow: FlowId::AddUser, .. })
}

fn is_cancel(event: &InboundEvent) -> bool {
    event
        .command
        .as_ref()
        .and_then(|c| ClubCommand::parse(&c.name))
        .is_some_and(|c| c == ClubCommand::Cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::flows::test_support::Fixture;
    use crate::conversation::status::Step;
    use crate::core::clock::FixedClock;
    use crate::storage::SqliteStore;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn router(fx: &Fixture) -> ConversationRouter {
        ConversationRouter::new(
            Arc::new(fx.store.clone()),
            Arc::new(StateRegistry::with_default_flows().unwrap()),
            Arc::new(FixedClock(fx.today)),
        )
        .with_admin_contact("@club_admin")
    }

    #[tokio::test]
    async fn test_non_member_is_turned_away() {
        let fx = Fixture::new().await;
        let reply = router(&fx).route(&InboundEvent::new("stranger", "/help")).await;
        assert_eq!(
            reply.text,
            "You are not a member of the club. Please contact @club_admin to join the club."
        );
    }

    #[tokio::test]
    async fn test_corrupted_status_is_reset_with_apology() {
        let fx = Fixture::new().await;
        fx.member("reader42").await;
        fx.store.set_user_status("reader42", "bogus_step").await.unwrap();

        let reply = router(&fx).route(&InboundEvent::new("reader42", "60")).await;

        assert_eq!(reply.text, STATUS_RESET_APOLOGY);
        assert_eq!(fx.store.get_user_status("reader42").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_validation_error_keeps_status() {
        let fx = Fixture::new().await;
        fx.book("Dune").await;
        fx.member("reader42").await;
        fx.store.set_user_status("reader42", "enter_percent").await.unwrap();

        let reply = router(&fx).route(&InboundEvent::new("reader42", "101")).await;

        assert_eq!(reply.text, "Please enter a number between 0 and 100.");
        assert_eq!(fx.store.get_user_status("reader42").await.unwrap(), "enter_percent");
    }

    #[tokio::test]
    async fn test_cancel_resets_any_step_and_pending_handle() {
        let fx = Fixture::new().await;
        fx.admin("club_admin").await;
        let router = router(&fx);

        router.route(&InboundEvent::new("club_admin", "/addUser")).await;
        router.route(&InboundEvent::new("club_admin", "new_reader")).await;
        assert_eq!(fx.store.get_user_status("club_admin").await.unwrap(), "enter_username");

        let reply = router.route(&InboundEvent::new("club_admin", "/cancel")).await;
        assert_eq!(reply.text, commands::CANCELLED);
        assert_eq!(fx.store.get_user_status("club_admin").await.unwrap(), "");
        assert_eq!(fx.store.get_pending_handle("club_admin").await.unwrap(), None);

        let reply = router.route(&InboundEvent::new("club_admin", "/cancel")).await;
        assert_eq!(reply.text, NOTHING_TO_CANCEL);
    }

    #[tokio::test]
    async fn test_not_found_mid_flow_returns_to_idle() {
        let fx = Fixture::new().await;
        fx.member("reader42").await;
        fx.store.set_user_status("reader42", "enter_page").await.unwrap();

        let reply = router(&fx).route(&InboundEvent::new("reader42", "10")).await;

        assert_eq!(reply.text, "No active book found.");
        assert_eq!(fx.store.get_user_status("reader42").await.unwrap(), "");
    }

    /// Store whose next `failures` status writes time out
    struct FailingWrites {
        inner: SqliteStore,
        failures: AtomicUsize,
    }

    impl FailingWrites {
        fn always(inner: SqliteStore) -> Self {
            Self::times(inner, usize::MAX)
        }

        fn times(inner: SqliteStore, failures: usize) -> Self {
            Self {
                inner,
                failures: AtomicUsize::new(failures),
            }
        }
    }

    #[async_trait]
    impl RecordStore for FailingWrites {
        async fn get_user_status(&self, handle: &str) -> AppResult<String> {
            self.inner.get_user_status(handle).await
        }
        async fn set_user_status(&self, handle: &str, status: &str) -> AppResult<()> {
            let failing = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(AppError::StorageTimeout(Duration::from_secs(1)));
            }
            self.inner.set_user_status(handle, status).await
        }
        async fn get_user(&self, handle: &str) -> AppResult<Option<User>> {
            self.inner.get_user(handle).await
        }
        async fn create_user(&self, handle: &str, name: &str) -> AppResult<bool> {
            self.inner.create_user(handle, name).await
        }
        async fn set_admin(&self, handle: &str, name: &str) -> AppResult<()> {
            self.inner.set_admin(handle, name).await
        }
        async fn set_user_name(&self, handle: &str, name: &str) -> AppResult<()> {
            self.inner.set_user_name(handle, name).await
        }
        async fn delete_user(&self, handle: &str) -> AppResult<()> {
            self.inner.delete_user(handle).await
        }
        async fn list_users(&self) -> AppResult<Vec<User>> {
            self.inner.list_users().await
        }
        async fn set_pending_handle(&self, handle: &str, pending: Option<&str>) -> AppResult<()> {
            self.inner.set_pending_handle(handle, pending).await
        }
        async fn get_pending_handle(&self, handle: &str) -> AppResult<Option<String>> {
            self.inner.get_pending_handle(handle).await
        }
        async fn list_stale_members(&self, older_than: Duration) -> AppResult<Vec<String>> {
            self.inner.list_stale_members(older_than).await
        }
        async fn reset_stale_status(&self, handle: &str, older_than: Duration) -> AppResult<bool> {
            self.inner.reset_stale_status(handle, older_than).await
        }
        async fn create_book_and_deactivate_previous(&self, title: &str) -> AppResult<crate::storage::db::Book> {
            self.inner.create_book_and_deactivate_previous(title).await
        }
        async fn update_book_author(&self, book_id: i64, author: &str) -> AppResult<()> {
            self.inner.update_book_author(book_id, author).await
        }
        async fn update_book_meeting_date(&self, book_id: i64, date: NaiveDate) -> AppResult<()> {
            self.inner.update_book_meeting_date(book_id, date).await
        }
        async fn get_active_book(&self) -> AppResult<Option<crate::storage::db::Book>> {
            self.inner.get_active_book().await
        }
        async fn delete_book(&self, book_id: i64) -> AppResult<bool> {
            self.inner.delete_book(book_id).await
        }
        async fn list_books(&self) -> AppResult<Vec<crate::storage::db::Book>> {
            self.inner.list_books().await
        }
        async fn set_progress(&self, record: &crate::storage::db::ReadingProgress) -> AppResult<()> {
            self.inner.set_progress(record).await
        }
        async fn get_progress(
            &self,
            handle: &str,
            book_id: i64,
        ) -> AppResult<Option<crate::storage::db::ReadingProgress>> {
            self.inner.get_progress(handle, book_id).await
        }
        async fn list_progress_for_book(&self, book_id: i64) -> AppResult<Vec<crate::storage::db::ReadingProgress>> {
            self.inner.list_progress_for_book(book_id).await
        }
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_status_and_replies_generically() {
        let fx = Fixture::new().await;
        fx.book("Dune").await;
        fx.member("reader42").await;
        fx.store.set_user_status("reader42", "enter_book_type").await.unwrap();

        let router = ConversationRouter::new(
            Arc::new(FailingWrites::always(fx.store.clone())),
            Arc::new(StateRegistry::with_default_flows().unwrap()),
            Arc::new(FixedClock(fx.today)),
        );
        let reply = router.route(&InboundEvent::new("reader42", "Regular Book")).await;

        assert_eq!(reply.text, TEMPORARY_FAILURE);
        assert_eq!(
            fx.store.get_user_status("reader42").await.unwrap(),
            Step::EnterBookType.as_str()
        );
    }

    fn flaky_router(fx: &Fixture, failures: usize) -> ConversationRouter {
        ConversationRouter::new(
            Arc::new(FailingWrites::times(fx.store.clone(), failures)),
            Arc::new(StateRegistry::with_default_flows().unwrap()),
            Arc::new(FixedClock(fx.today)),
        )
    }

    #[tokio::test]
    async fn test_add_user_naming_resumes_after_failed_status_write() {
        let fx = Fixture::new().await;
        fx.admin("club_admin").await;
        let router = flaky_router(&fx, 0);
        router.route(&InboundEvent::new("club_admin", "/addUser")).await;
        router.route(&InboundEvent::new("club_admin", "new_reader")).await;

        let flaky = flaky_router(&fx, 1);
        let reply = flaky.route(&InboundEvent::new("club_admin", "Nina Reader")).await;
        assert_eq!(reply.text, TEMPORARY_FAILURE);
        assert_eq!(
            fx.store.get_user_status("club_admin").await.unwrap(),
            Step::EnterUsername.as_str()
        );

        let reply = flaky.route(&InboundEvent::new("club_admin", "Nina Reader")).await;
        assert_eq!(reply.text, "Thank you!");
        assert_eq!(fx.store.get_user_status("club_admin").await.unwrap(), "");
        assert_eq!(fx.store.get_pending_handle("club_admin").await.unwrap(), None);
        assert_eq!(fx.store.get_user("new_reader").await.unwrap().unwrap().name, "Nina Reader");
    }

    #[tokio::test]
    async fn test_book_title_resend_after_failed_status_write_adds_one_book() {
        let fx = Fixture::new().await;
        fx.admin("club_admin").await;
        router(&fx).route(&InboundEvent::new("club_admin", "/addBook")).await;

        let flaky = flaky_router(&fx, 1);
        let reply = flaky.route(&InboundEvent::new("club_admin", "Dune")).await;
        assert_eq!(reply.text, TEMPORARY_FAILURE);

        let reply = flaky.route(&InboundEvent::new("club_admin", "Dune")).await;
        assert_eq!(reply.text, "Enter the author of the book:");

        let books = fx.store.list_books().await.unwrap();
        assert_eq!(books.len(), 1);
        assert!(books[0].active);
    }

    fn backdate_status(fx: &Fixture, handle: &str) {
        let conn = crate::storage::get_connection(&fx.store.pool()).unwrap();
        conn.execute(
            "UPDATE users SET status_updated_at = datetime('now', '-2 days') WHERE handle = ?1",
            [handle],
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_sweep_resets_abandoned_flows() {
        let fx = Fixture::new().await;
        fx.admin("club_admin").await;
        fx.member("reader42").await;
        let router = router(&fx);
        router.route(&InboundEvent::new("club_admin", "/addUser")).await;
        router.route(&InboundEvent::new("club_admin", "new_reader")).await;
        fx.store.set_user_status("reader42", "enter_page").await.unwrap();
        backdate_status(&fx, "club_admin");

        let reset = router.sweep_abandoned(Duration::from_secs(24 * 60 * 60)).await.unwrap();

        assert_eq!(reset, 1);
        assert_eq!(fx.store.get_user_status("club_admin").await.unwrap(), "");
        assert_eq!(fx.store.get_pending_handle("club_admin").await.unwrap(), None);
        assert_eq!(fx.store.get_user_status("reader42").await.unwrap(), "enter_page");
    }

    #[tokio::test]
    async fn test_sweep_waits_for_member_being_routed() {
        let fx = Fixture::new().await;
        fx.member("reader42").await;
        fx.store.set_user_status("reader42", "enter_total_pages").await.unwrap();
        backdate_status(&fx, "reader42");
        let router = router(&fx);

        let guard = router.locks().acquire("reader42").await;
        let mut sweep = Box::pin(router.sweep_abandoned(Duration::from_secs(24 * 60 * 60)));
        assert!(tokio::time::timeout(Duration::from_millis(100), &mut sweep)
            .await
            .is_err());

        // The in-flight message moves the member on before releasing the lock
        fx.store.set_user_status("reader42", "enter_page").await.unwrap();
        drop(guard);

        assert_eq!(sweep.await.unwrap(), 0);
        assert_eq!(fx.store.get_user_status("reader42").await.unwrap(), "enter_page");
    }
}

use std::sync::Mutex;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CHAT_FALLBACK_SECS;
use crate::error::{AppError, Result};
use crate::messages;
use crate::types::{ChatEvent, LinkedAccount, ListingState, ListingUpdate, LoginState};

use super::{ChatGateway, CredentialStore, Marketplace};

/// Owns the collaborators and all shared mutable state of the pipeline.
/// Cloned via `Arc` into the feed poller, the worker pool and the chat loop.
pub struct DispatchEngine<M, C, S> {
    pub(super) marketplace: M,
    pub(super) chat: C,
    pub(super) store: S,
    /// Low-water mark for the chat poll. Guarded because the poll loop and
    /// future concurrent readers may race; only ever moves forward.
    last_seen_id: Mutex<i64>,
}

impl<M, C, S> DispatchEngine<M, C, S>
where
    M: Marketplace,
    C: ChatGateway,
    S: CredentialStore,
{
    pub fn new(marketplace: M, chat: C, store: S) -> Self {
        Self {
            marketplace,
            chat,
            store,
            last_seen_id: Mutex::new(0),
        }
    }

    // -----------------------------------------------------------------------
    // Listing updates (worker side)
    // -----------------------------------------------------------------------

    /// Fetch the next feed batch. Used by the poller only.
    pub async fn listing_updates(&self, since: i64) -> Result<Vec<ListingUpdate>> {
        self.marketplace.listing_updates(since).await
    }

    /// Apply the notification rule to one update.
    ///
    /// Only `sold_out` acts. Every other state, including ones the feed may
    /// invent later, is a no-op — enumerated here so a new enum variant is a
    /// compile error, not a silently changed behavior.
    pub async fn handle_listing_update(&self, update: ListingUpdate) -> Result<()> {
        debug!(
            state = %update.state,
            listing_id = update.listing_id,
            "Listing update",
        );

        match update.state {
            ListingState::SoldOut => self.notify_sold_out(&update).await,
            ListingState::Active
            | ListingState::Expired
            | ListingState::Removed
            | ListingState::Edit
            | ListingState::Vacation
            | ListingState::Private
            | ListingState::Unavailable
            | ListingState::Unknown => Ok(()),
        }
    }

    async fn notify_sold_out(&self, update: &ListingUpdate) -> Result<()> {
        let Some(account) = self.store.linked_account(update.seller_id).await? else {
            // Seller never linked a chat. Expected, not an error.
            return Ok(());
        };

        let msg = messages::low_stock(&update.skus, &update.shop_name);
        self.chat.send_text(account.chat_id, &msg).await
    }

    // -----------------------------------------------------------------------
    // Chat commands
    // -----------------------------------------------------------------------

    /// Sequential chat loop: long-poll events after the last seen id, handle
    /// them in arrival order, back off a fixed interval on poll failure.
    pub async fn run_chat_loop(&self, cancel: CancellationToken) {
        info!("Chat command loop started");
        loop {
            let batch = tokio::select! {
                _ = cancel.cancelled() => break,
                res = self.chat.events_after(self.last_seen_id()) => res,
            };

            match batch {
                Ok(events) => self.handle_chat_events(events).await,
                Err(e) => {
                    warn!("Failed to fetch chat events: {e}");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(CHAT_FALLBACK_SECS)) => {}
                    }
                }
            }
        }
        info!("Chat command loop stopped");
    }

    /// Handle a batch in order. The last-seen id advances for every event,
    /// even when its handler fails — a poisoned message must not wedge the
    /// poll offset.
    pub async fn handle_chat_events(&self, events: Vec<ChatEvent>) {
        for event in events {
            self.track_last_seen(event.message_id);
            if let Err(e) = self.handle_chat_event(&event).await {
                warn!(
                    chat_user_id = event.chat_user_id,
                    command = %event.command,
                    "Failed to handle chat event: {e}",
                );
            }
        }
    }

    async fn handle_chat_event(&self, event: &ChatEvent) -> Result<()> {
        match event.command.as_str() {
            "/start" => self.do_start(event).await,
            "/pin" => self.do_pin(event).await,
            "/help" => self.do_help(event).await,
            other => {
                debug!(command = other, "Unsupported command, ignoring");
                Ok(())
            }
        }
    }

    /// `/start`: begin the OAuth flow. Persist the request pair first, then
    /// hand the login URL to the user. Re-running `/start` overwrites any
    /// previous state — re-linking is allowed.
    async fn do_start(&self, event: &ChatEvent) -> Result<()> {
        let (login_url, request_pair) = self.marketplace.begin_login().await?;

        self.store
            .save_login_state(event.chat_user_id, &LoginState::Pending(request_pair))
            .await?;

        self.chat
            .send_login_prompt(event.chat_id, messages::START_MSG, &login_url)
            .await
    }

    /// `/pin <code>`: finish the OAuth flow.
    async fn do_pin(&self, event: &ChatEvent) -> Result<()> {
        let pin = event
            .text
            .strip_prefix("/pin")
            .unwrap_or(&event.text)
            .trim();

        if pin.is_empty() {
            self.chat
                .send_text(event.chat_id, messages::EMPTY_PIN_MSG)
                .await?;
            return Err(AppError::EmptyPin);
        }

        let pending = match self.store.login_state(event.chat_user_id).await? {
            Some(LoginState::Pending(pair)) => pair,
            // Already linked or never started: nothing to exchange against.
            Some(LoginState::Linked { .. }) | None => {
                return Err(AppError::NoPendingLogin(event.chat_user_id))
            }
        };

        let access = self.marketplace.exchange_pin(pin, &pending).await?;
        let marketplace_user_id = self.marketplace.resolve_user_id(&access).await?;

        let account = LinkedAccount {
            marketplace_user_id,
            chat_user_id: event.chat_user_id,
            chat_id: event.chat_id,
            token: access.token,
            token_secret: access.secret,
        };

        info!(
            marketplace_user_id,
            chat_user_id = event.chat_user_id,
            "Linking account",
        );

        self.store.save_linked_account(&account).await?;
        self.store
            .save_login_state(event.chat_user_id, &LoginState::Linked { marketplace_user_id })
            .await?;

        self.chat
            .send_text(event.chat_id, messages::SUCCESS_MSG)
            .await
    }

    async fn do_help(&self, event: &ChatEvent) -> Result<()> {
        self.chat.send_text(event.chat_id, messages::HELP_MSG).await
    }

    // -----------------------------------------------------------------------
    // Last-seen counter
    // -----------------------------------------------------------------------

    pub fn last_seen_id(&self) -> i64 {
        *self.last_seen_id.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Advance the low-water mark. Strictly-greater guard: a stale or
    /// out-of-order id is absorbed, never panics, never regresses.
    fn track_last_seen(&self, id: i64) {
        let mut last = self.last_seen_id.lock().unwrap_or_else(|e| e.into_inner());
        if *last < id {
            *last = id;
        }
    }
}

//! The dispatch engine: feed poller → bounded queue → worker pool, plus the
//! sequential chat-command loop driving the OAuth PIN state machine.
//!
//! Collaborators (marketplace API, chat API, credential store) sit behind
//! narrow traits so the engine can be exercised with in-memory fakes.

mod dispatch;
mod feed;
mod workers;

#[cfg(test)]
pub(crate) mod testutil;

pub use dispatch::DispatchEngine;
pub use feed::FeedPoller;
pub use workers::spawn_update_workers;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatEvent, LinkedAccount, ListingUpdate, LoginState, TokenPair};

/// Marketplace side: the listing-update feed and the OAuth 1.0a PIN flow.
#[async_trait]
pub trait Marketplace: Send + Sync {
    /// Listing state changes since the given unix-seconds offset.
    async fn listing_updates(&self, since: i64) -> Result<Vec<ListingUpdate>>;

    /// Start a login: returns the URL the user must visit plus the
    /// temporary request-token pair to exchange later.
    async fn begin_login(&self) -> Result<(String, TokenPair)>;

    /// Exchange the user-supplied PIN and the pending request pair for a
    /// final access pair.
    async fn exchange_pin(&self, pin: &str, request: &TokenPair) -> Result<TokenPair>;

    /// Resolve the marketplace user id owning the access pair.
    async fn resolve_user_id(&self, access: &TokenPair) -> Result<i64>;
}

/// Chat side: inbound command events and outbound notifications.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Messages with id strictly greater than `after_id`, in increasing
    /// id order. Long-polls; returns an empty batch on timeout.
    async fn events_after(&self, after_id: i64) -> Result<Vec<ChatEvent>>;

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;

    async fn send_login_prompt(&self, chat_id: i64, text: &str, login_url: &str) -> Result<()>;
}

/// Persisted per-user credentials. Absence of a record is a normal
/// condition, not an error. Per-key write atomicity is the store's concern.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn linked_account(&self, marketplace_user_id: i64) -> Result<Option<LinkedAccount>>;

    async fn save_linked_account(&self, account: &LinkedAccount) -> Result<()>;

    async fn login_state(&self, chat_user_id: i64) -> Result<Option<LoginState>>;

    async fn save_login_state(&self, chat_user_id: i64, state: &LoginState) -> Result<()>;
}

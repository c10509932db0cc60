//! In-memory collaborator fakes shared by the engine tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::types::{ChatEvent, LinkedAccount, ListingState, ListingUpdate, LoginState, TokenPair};

use super::{ChatGateway, CredentialStore, Marketplace};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub(crate) fn update_with_state(wire_state: &str) -> ListingUpdate {
    let state: ListingState =
        serde_json::from_str(&format!("\"{wire_state}\"")).expect("state string");
    ListingUpdate {
        state,
        title: "Test product".to_string(),
        shop_name: "Test shop".to_string(),
        listing_id: 42,
        seller_id: 123_456,
        quantity: 0,
        skus: vec!["SKU-1".to_string(), "SKU-2".to_string()],
        creation_tsz: 1_700_000_000,
        last_modified_tsz: 1_700_086_400,
    }
}

pub(crate) fn sold_out_update(seller_id: i64) -> ListingUpdate {
    let mut update = update_with_state("sold_out");
    update.seller_id = seller_id;
    update
}

/// Chat event with the fixed test chat (100500) and user (9500).
/// The command token is derived the way the wire layer does it: the leading
/// `/word`, empty for plain text.
pub(crate) fn chat_event(message_id: i64, text: &str) -> ChatEvent {
    let command = if text.starts_with('/') {
        text.split_whitespace().next().unwrap_or("").to_string()
    } else {
        String::new()
    };
    ChatEvent {
        message_id,
        chat_id: 100_500,
        chat_user_id: 9_500,
        command,
        text: text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// MockMarketplace
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct MockMarketplace {
    login: Mutex<Option<(String, TokenPair)>>,
    exchange: Mutex<Option<TokenPair>>,
    user_id: Mutex<Option<i64>>,
    /// Scripted feed responses, consumed in order; an empty script pends
    /// forever, mimicking a poll with nothing to say.
    feed_script: Mutex<VecDeque<Result<Vec<ListingUpdate>>>>,
    feed_calls: Mutex<Vec<i64>>,
    exchange_calls: Mutex<Vec<(String, TokenPair)>>,
}

impl MockMarketplace {
    pub fn set_login(&self, url: &str, pair: TokenPair) {
        *self.login.lock().unwrap() = Some((url.to_string(), pair));
    }

    pub fn set_exchange(&self, pair: TokenPair) {
        *self.exchange.lock().unwrap() = Some(pair);
    }

    pub fn set_user_id(&self, id: i64) {
        *self.user_id.lock().unwrap() = Some(id);
    }

    pub fn queue_feed(&self, batch: Result<Vec<ListingUpdate>>) {
        self.feed_script.lock().unwrap().push_back(batch);
    }

    pub fn feed_calls(&self) -> Vec<i64> {
        self.feed_calls.lock().unwrap().clone()
    }

    pub fn exchange_calls(&self) -> Vec<(String, TokenPair)> {
        self.exchange_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Marketplace for MockMarketplace {
    async fn listing_updates(&self, since: i64) -> Result<Vec<ListingUpdate>> {
        self.feed_calls.lock().unwrap().push(since);
        let next = self.feed_script.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            None => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn begin_login(&self) -> Result<(String, TokenPair)> {
        self.login
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::Api("mock: begin_login not scripted".to_string()))
    }

    async fn exchange_pin(&self, pin: &str, request: &TokenPair) -> Result<TokenPair> {
        self.exchange_calls
            .lock()
            .unwrap()
            .push((pin.to_string(), request.clone()));
        self.exchange
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::Api("mock: exchange_pin not scripted".to_string()))
    }

    async fn resolve_user_id(&self, _access: &TokenPair) -> Result<i64> {
        self.user_id
            .lock()
            .unwrap()
            .ok_or_else(|| AppError::Api("mock: resolve_user_id not scripted".to_string()))
    }
}

// ---------------------------------------------------------------------------
// MockChat
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct MockChat {
    texts: Mutex<Vec<(i64, String)>>,
    prompts: Mutex<Vec<(i64, String, String)>>,
    event_script: Mutex<VecDeque<Result<Vec<ChatEvent>>>>,
    fail_next_send: AtomicBool,
    send_attempts: AtomicUsize,
}

impl MockChat {
    pub fn sent_texts(&self) -> Vec<(i64, String)> {
        self.texts.lock().unwrap().clone()
    }

    pub fn sent_login_prompts(&self) -> Vec<(i64, String, String)> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    pub fn fail_next_send(&self) {
        self.fail_next_send.store(true, Ordering::SeqCst);
    }

    pub fn queue_events(&self, batch: Result<Vec<ChatEvent>>) {
        self.event_script.lock().unwrap().push_back(batch);
    }
}

#[async_trait]
impl ChatGateway for MockChat {
    async fn events_after(&self, _after_id: i64) -> Result<Vec<ChatEvent>> {
        let next = self.event_script.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            None => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_send.swap(false, Ordering::SeqCst) {
            return Err(AppError::Api("mock: send failed".to_string()));
        }
        self.texts.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn send_login_prompt(&self, chat_id: i64, text: &str, login_url: &str) -> Result<()> {
        self.prompts
            .lock()
            .unwrap()
            .push((chat_id, text.to_string(), login_url.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct MockStore {
    accounts: Mutex<HashMap<i64, LinkedAccount>>,
    states: Mutex<HashMap<i64, LoginState>>,
    saved_accounts: Mutex<Vec<LinkedAccount>>,
    account_lookups: AtomicUsize,
}

impl MockStore {
    pub fn insert_account(&self, account: LinkedAccount) {
        self.accounts
            .lock()
            .unwrap()
            .insert(account.marketplace_user_id, account);
    }

    pub fn set_login_state(&self, chat_user_id: i64, state: LoginState) {
        self.states.lock().unwrap().insert(chat_user_id, state);
    }

    pub fn login_state_of(&self, chat_user_id: i64) -> Option<LoginState> {
        self.states.lock().unwrap().get(&chat_user_id).cloned()
    }

    pub fn saved_accounts(&self) -> Vec<LinkedAccount> {
        self.saved_accounts.lock().unwrap().clone()
    }

    pub fn account_lookups(&self) -> usize {
        self.account_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for MockStore {
    async fn linked_account(&self, marketplace_user_id: i64) -> Result<Option<LinkedAccount>> {
        self.account_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.accounts.lock().unwrap().get(&marketplace_user_id).cloned())
    }

    async fn save_linked_account(&self, account: &LinkedAccount) -> Result<()> {
        self.saved_accounts.lock().unwrap().push(account.clone());
        self.accounts
            .lock()
            .unwrap()
            .insert(account.marketplace_user_id, account.clone());
        Ok(())
    }

    async fn login_state(&self, chat_user_id: i64) -> Result<Option<LoginState>> {
        Ok(self.states.lock().unwrap().get(&chat_user_id).cloned())
    }

    async fn save_login_state(&self, chat_user_id: i64, state: &LoginState) -> Result<()> {
        self.states.lock().unwrap().insert(chat_user_id, state.clone());
        Ok(())
    }
}

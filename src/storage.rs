//! SQLite-backed credential store: completed marketplace↔chat links and the
//! per-user login state machine. Per-key write atomicity comes from SQLite
//! itself; callers never coordinate around it.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::Row;

use crate::engine::CredentialStore;
use crate::error::{AppError, Result};
use crate::types::{LinkedAccount, LoginState, TokenPair};

pub struct SqliteStore {
    pool: sqlx::SqlitePool,
}

impl SqliteStore {
    pub async fn connect(db_path: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    #[cfg(test)]
    async fn connect_in_memory() -> Result<Self> {
        // One connection only: every pooled connection would otherwise get
        // its own private in-memory database.
        let opts = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn linked_account(&self, marketplace_user_id: i64) -> Result<Option<LinkedAccount>> {
        let account = sqlx::query_as::<_, LinkedAccount>(
            "SELECT marketplace_user_id, chat_user_id, chat_id, token, token_secret \
             FROM linked_accounts WHERE marketplace_user_id = ?",
        )
        .bind(marketplace_user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn save_linked_account(&self, account: &LinkedAccount) -> Result<()> {
        sqlx::query(
            "INSERT INTO linked_accounts \
                 (marketplace_user_id, chat_user_id, chat_id, token, token_secret) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(marketplace_user_id) DO UPDATE SET \
                 chat_user_id = excluded.chat_user_id, \
                 chat_id = excluded.chat_id, \
                 token = excluded.token, \
                 token_secret = excluded.token_secret",
        )
        .bind(account.marketplace_user_id)
        .bind(account.chat_user_id)
        .bind(account.chat_id)
        .bind(&account.token)
        .bind(&account.token_secret)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn login_state(&self, chat_user_id: i64) -> Result<Option<LoginState>> {
        let row = sqlx::query(
            "SELECT state, token, token_secret, marketplace_user_id \
             FROM login_states WHERE chat_user_id = ?",
        )
        .bind(chat_user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };

        let state: String = row.try_get("state")?;
        match state.as_str() {
            "pending" => {
                let token: Option<String> = row.try_get("token")?;
                let secret: Option<String> = row.try_get("token_secret")?;
                Ok(Some(LoginState::Pending(TokenPair {
                    token: token.unwrap_or_default(),
                    secret: secret.unwrap_or_default(),
                })))
            }
            "linked" => {
                let marketplace_user_id: Option<i64> = row.try_get("marketplace_user_id")?;
                Ok(Some(LoginState::Linked {
                    marketplace_user_id: marketplace_user_id.unwrap_or_default(),
                }))
            }
            other => Err(AppError::Storage(format!(
                "login state row for chat user {chat_user_id} has unknown state {other:?}"
            ))),
        }
    }

    async fn save_login_state(&self, chat_user_id: i64, state: &LoginState) -> Result<()> {
        let (tag, token, secret, marketplace_user_id) = match state {
            LoginState::Pending(pair) => {
                ("pending", Some(pair.token.as_str()), Some(pair.secret.as_str()), None)
            }
            LoginState::Linked { marketplace_user_id } => {
                ("linked", None, None, Some(*marketplace_user_id))
            }
        };

        sqlx::query(
            "INSERT INTO login_states \
                 (chat_user_id, state, token, token_secret, marketplace_user_id) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(chat_user_id) DO UPDATE SET \
                 state = excluded.state, \
                 token = excluded.token, \
                 token_secret = excluded.token_secret, \
                 marketplace_user_id = excluded.marketplace_user_id",
        )
        .bind(chat_user_id)
        .bind(tag)
        .bind(token)
        .bind(secret)
        .bind(marketplace_user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

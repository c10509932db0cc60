use serde::Deserialize;

// ---------------------------------------------------------------------------
// Listing updates
// ---------------------------------------------------------------------------

/// Listing lifecycle state as reported by the marketplace feed.
///
/// The feed is a firehose of every state transition; only `SoldOut` drives a
/// notification. States the feed may grow in the future land in `Unknown`
/// and are treated exactly like the enumerated no-op states.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingState {
    Active,
    SoldOut,
    Expired,
    Removed,
    Edit,
    Vacation,
    Private,
    Unavailable,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ListingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ListingState::Active => "active",
            ListingState::SoldOut => "sold_out",
            ListingState::Expired => "expired",
            ListingState::Removed => "removed",
            ListingState::Edit => "edit",
            ListingState::Vacation => "vacation",
            ListingState::Private => "private",
            ListingState::Unavailable => "unavailable",
            ListingState::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// One listing state change pulled from the marketplace feed.
/// Produced by the poller, consumed exactly once by exactly one worker.
#[derive(Debug, Clone)]
pub struct ListingUpdate {
    pub state: ListingState,
    pub title: String,
    pub shop_name: String,
    pub listing_id: i64,
    /// Marketplace id of the seller owning the listing.
    pub seller_id: i64,
    pub quantity: i64,
    pub skus: Vec<String>,
    pub creation_tsz: i64,
    pub last_modified_tsz: i64,
}

// ---------------------------------------------------------------------------
// Chat events
// ---------------------------------------------------------------------------

/// One inbound chat message, already reduced to what the dispatcher needs.
///
/// `message_id` is source-assigned and monotonic; it only matters for
/// computing the next poll offset, not for ordering between events.
/// `command` is the leading `/word` token when the message is a bot command,
/// empty otherwise.
#[derive(Debug, Clone)]
pub struct ChatEvent {
    pub message_id: i64,
    pub chat_id: i64,
    pub chat_user_id: i64,
    pub command: String,
    pub text: String,
}

// ---------------------------------------------------------------------------
// OAuth credentials
// ---------------------------------------------------------------------------

/// An OAuth 1.0a token/secret pair — either a temporary request pair or a
/// final access pair depending on where in the flow it sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub token: String,
    pub secret: String,
}

/// A completed marketplace↔chat link. Keyed by marketplace user id so a
/// sold_out update can be resolved straight to a chat.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LinkedAccount {
    pub marketplace_user_id: i64,
    pub chat_user_id: i64,
    pub chat_id: i64,
    pub token: String,
    pub token_secret: String,
}

/// Login state machine per chat user: no row → never started,
/// `Pending` → `/start` issued and awaiting the PIN,
/// `Linked` → PIN exchange completed.
///
/// Kept as an explicit tagged state so `/pin` before `/start` is a
/// representable error rather than an implicit key miss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    Pending(TokenPair),
    Linked { marketplace_user_id: i64 },
}

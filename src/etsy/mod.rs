//! Marketplace client: the public listing feed plus the OAuth 1.0a PIN login
//! flow against the v2 REST API.

mod oauth;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{Config, FEED_PAGE_LIMIT, FEED_TIME_LIMIT_SECS};
use crate::engine::Marketplace;
use crate::error::{AppError, Result};
use crate::types::{ListingState, ListingUpdate, TokenPair};

use self::oauth::Signer;

/// Read-only shop access is all the notifications need.
const OAUTH_SCOPE: &str = "listings_r";

pub struct EtsyClient {
    http: reqwest::Client,
    api_url: String,
    feed_url: String,
    api_key: String,
    shared_secret: String,
}

impl EtsyClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_url: cfg.etsy_api_url.clone(),
            feed_url: cfg.etsy_feed_url.clone(),
            api_key: cfg.etsy_api_key.clone(),
            shared_secret: cfg.etsy_shared_secret.clone(),
        })
    }

    fn signer<'a>(&'a self, pair: Option<&'a TokenPair>) -> Signer<'a> {
        Signer {
            consumer_key: &self.api_key,
            consumer_secret: &self.shared_secret,
            token: pair.map(|p| p.token.as_str()),
            token_secret: pair.map(|p| p.secret.as_str()),
        }
    }

    /// POST an OAuth endpoint and parse the form-encoded token response.
    async fn token_request(
        &self,
        url: &str,
        query: &[(&str, &str)],
        pair: Option<&TokenPair>,
        oauth_extra: &[(&str, &str)],
    ) -> Result<HashMap<String, String>> {
        let header = self
            .signer(pair)
            .authorization_header("POST", url, query, oauth_extra);

        let resp = self
            .http
            .post(url)
            .query(query)
            .header(reqwest::header::AUTHORIZATION, header)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(AppError::Api(format!(
                "OAuth endpoint returned {status}: {body}"
            )));
        }

        Ok(parse_form(&body))
    }
}

#[async_trait]
impl Marketplace for EtsyClient {
    async fn listing_updates(&self, since: i64) -> Result<Vec<ListingUpdate>> {
        let url = format!("{}/feeds/listings/latest", self.feed_url);
        let since = since.to_string();
        let limit = FEED_PAGE_LIMIT.to_string();
        let time_limit = FEED_TIME_LIMIT_SECS.to_string();

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("limit", limit.as_str()),
                ("offset", "0"),
                ("time_limit", time_limit.as_str()),
                ("time_offset", since.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Api(format!("feed returned {status}: {body}")));
        }

        let feed: FeedResponse = resp.json().await?;
        Ok(feed.results.into_iter().map(to_update).collect())
    }

    async fn begin_login(&self) -> Result<(String, TokenPair)> {
        let url = format!("{}/oauth/request_token", self.api_url);
        let fields = self
            .token_request(
                &url,
                &[("scope", OAUTH_SCOPE)],
                None,
                &[("oauth_callback", "oob")],
            )
            .await?;

        let login_url = take_field(&fields, "login_url")?;
        let pair = token_pair(&fields)?;
        Ok((login_url, pair))
    }

    async fn exchange_pin(&self, pin: &str, request: &TokenPair) -> Result<TokenPair> {
        let url = format!("{}/oauth/access_token", self.api_url);
        let fields = self
            .token_request(&url, &[], Some(request), &[("oauth_verifier", pin)])
            .await?;
        token_pair(&fields)
    }

    async fn resolve_user_id(&self, access: &TokenPair) -> Result<i64> {
        let url = format!("{}/users/__SELF__", self.api_url);
        let header = self
            .signer(Some(access))
            .authorization_header("GET", &url, &[], &[]);

        let resp = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, header)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Api(format!(
                "user lookup returned {status}: {body}"
            )));
        }

        let info: UserInfoResponse = resp.json().await?;
        info.results
            .first()
            .map(|u| u.user_id)
            .ok_or_else(|| AppError::Api("user lookup returned no results".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    results: Vec<FeedListing>,
}

#[derive(Debug, Deserialize)]
struct FeedListing {
    listing_id: i64,
    state: ListingState,
    user_id: i64,
    quantity: i64,
    title: String,
    #[serde(default)]
    sku: Vec<String>,
    creation_tsz: i64,
    last_modified_tsz: i64,
    #[serde(rename = "Shop", default)]
    shop: FeedShop,
}

#[derive(Debug, Default, Deserialize)]
struct FeedShop {
    #[serde(default)]
    shop_name: String,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    #[serde(default)]
    results: Vec<UserInfo>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    user_id: i64,
}

fn to_update(l: FeedListing) -> ListingUpdate {
    ListingUpdate {
        state: l.state,
        title: l.title,
        shop_name: l.shop.shop_name,
        listing_id: l.listing_id,
        seller_id: l.user_id,
        quantity: l.quantity,
        skus: l.sku,
        creation_tsz: l.creation_tsz,
        last_modified_tsz: l.last_modified_tsz,
    }
}

// ---------------------------------------------------------------------------
// Form-encoded token responses
// ---------------------------------------------------------------------------

/// Decode an `application/x-www-form-urlencoded` body into key/value pairs.
fn parse_form(body: &str) -> HashMap<String, String> {
    body.split('&')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            Some((form_decode(k), form_decode(v)))
        })
        .collect()
}

fn form_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                match hex {
                    Some(byte) => {
                        out.push(byte);
                        i += 2;
                    }
                    None => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn take_field(fields: &HashMap<String, String>, key: &str) -> Result<String> {
    fields
        .get(key)
        .cloned()
        .ok_or_else(|| AppError::OauthResponse(format!("missing field {key}")))
}

fn token_pair(fields: &HashMap<String, String>) -> Result<TokenPair> {
    Ok(TokenPair {
        token: take_field(fields, "oauth_token")?,
        secret: take_field(fields, "oauth_token_secret")?,
    })
}

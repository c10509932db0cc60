//! OAuth 1.0a request signing (HMAC-SHA1) for the out-of-band PIN flow.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Credentials for signing one request. `token`/`token_secret` are empty for
/// the initial request-token call, the temporary pair for the PIN exchange,
/// and the access pair for API calls after linking.
pub struct Signer<'a> {
    pub consumer_key: &'a str,
    pub consumer_secret: &'a str,
    pub token: Option<&'a str>,
    pub token_secret: Option<&'a str>,
}

impl Signer<'_> {
    /// Build the `Authorization: OAuth ...` header value for a request.
    ///
    /// `query` are the request's query parameters (they participate in the
    /// signature but stay on the URL); `oauth_extra` are additional oauth_*
    /// protocol parameters such as `oauth_callback` or `oauth_verifier`.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        query: &[(&str, &str)],
        oauth_extra: &[(&str, &str)],
    ) -> String {
        self.header_with(method, url, query, oauth_extra, &nonce(), &timestamp())
    }

    fn header_with(
        &self,
        method: &str,
        url: &str,
        query: &[(&str, &str)],
        oauth_extra: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> String {
        let mut oauth_params: Vec<(String, String)> = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.to_string()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];
        if let Some(token) = self.token {
            oauth_params.push(("oauth_token".to_string(), token.to_string()));
        }
        for (k, v) in oauth_extra {
            oauth_params.push((k.to_string(), v.to_string()));
        }

        let mut signed: Vec<(String, String)> = oauth_params.clone();
        signed.extend(query.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        let base = signature_base_string(method, url, &signed);
        let signature = self.sign(&base);
        oauth_params.push(("oauth_signature".to_string(), signature));

        let fields: Vec<String> = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect();
        format!("OAuth {}", fields.join(", "))
    }

    fn sign(&self, base: &str) -> String {
        let key = format!(
            "{}&{}",
            percent_encode(self.consumer_secret),
            percent_encode(self.token_secret.unwrap_or("")),
        );
        let mut mac =
            HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
        mac.update(base.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }
}

/// RFC 5849 §3.4.1: METHOD & enc(url) & enc(sorted params joined with &).
fn signature_base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let joined = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(url),
        percent_encode(&joined),
    )
}

/// RFC 3986 strict percent-encoding; only unreserved characters pass through.
fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

fn timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_encoding_is_rfc3986_strict() {
        assert_eq!(percent_encode("abcXYZ019.-_~"), "abcXYZ019.-_~");
        assert_eq!(percent_encode("a b"), "a%20b");
        assert_eq!(percent_encode("a/b&c=d"), "a%2Fb%26c%3Dd");
        assert_eq!(percent_encode("é"), "%C3%A9");
        assert_eq!(percent_encode("+"), "%2B");
    }

    #[test]
    fn base_string_sorts_and_double_encodes() {
        let params = vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
        ];
        let base = signature_base_string("get", "https://api.example.com/path", &params);
        assert_eq!(
            base,
            "GET&https%3A%2F%2Fapi.example.com%2Fpath&a%3D1%26b%3D2",
        );
    }

    #[test]
    fn header_carries_all_protocol_params() {
        let signer = Signer {
            consumer_key: "ck",
            consumer_secret: "cs",
            token: Some("tok"),
            token_secret: Some("ts"),
        };
        let header = signer.header_with(
            "POST",
            "https://api.example.com/oauth/access_token",
            &[],
            &[("oauth_verifier", "42")],
            "fixednonce",
            "1700000000",
        );

        assert!(header.starts_with("OAuth "));
        for field in [
            "oauth_consumer_key=\"ck\"",
            "oauth_nonce=\"fixednonce\"",
            "oauth_signature_method=\"HMAC-SHA1\"",
            "oauth_timestamp=\"1700000000\"",
            "oauth_version=\"1.0\"",
            "oauth_token=\"tok\"",
            "oauth_verifier=\"42\"",
            "oauth_signature=",
        ] {
            assert!(header.contains(field), "missing {field} in {header}");
        }
    }

    #[test]
    fn signature_is_deterministic_for_fixed_inputs() {
        let signer = Signer {
            consumer_key: "ck",
            consumer_secret: "cs",
            token: None,
            token_secret: None,
        };
        let a = signer.header_with("GET", "https://x.example/u", &[], &[], "n", "1");
        let b = signer.header_with("GET", "https://x.example/u", &[], &[], "n", "1");
        assert_eq!(a, b);
    }
}

//! OAuth 1.0a request signing for user-context writes.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use scribe_core::XCredentials;

type HmacSha1 = Hmac<Sha1>;

/// Signs requests with the app's consumer key and the bot account's token.
#[derive(Clone)]
pub struct OAuthSigner {
    consumer_key: String,
    consumer_secret: String,
    access_token: String,
    access_secret: String,
}

impl OAuthSigner {
    /// Creates a signer from X credentials.
    pub fn new(credentials: &XCredentials) -> Self {
        Self {
            consumer_key: credentials.api_key.clone(),
            consumer_secret: credentials.api_secret.clone(),
            access_token: credentials.access_token.clone(),
            access_secret: credentials.access_secret.clone(),
        }
    }

    /// Builds the `Authorization` header for a request.
    ///
    /// `params` are the query or form parameters that take part in the
    /// signature. JSON bodies do not.
    pub fn authorization(&self, method: &str, url: &str, params: &[(&str, &str)]) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            .to_string();
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        self.authorization_with(method, url, params, &nonce, &timestamp)
    }

    fn authorization_with(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> String {
        let oauth_params = [
            ("oauth_consumer_key", self.consumer_key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp),
            ("oauth_token", self.access_token.as_str()),
            ("oauth_version", "1.0"),
        ];

        let signature = self.signature(method, url, params, &oauth_params);

        let header = oauth_params
            .iter()
            .copied()
            .chain(std::iter::once(("oauth_signature", signature.as_str())))
            .map(|(k, v)| format!("{}=\"{}\"", k, percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");

        format!("OAuth {}", header)
    }

    fn signature(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        oauth_params: &[(&str, &str)],
    ) -> String {
        let mut encoded: Vec<(String, String)> = params
            .iter()
            .chain(oauth_params.iter())
            .map(|(k, v)| (percent_encode(k), percent_encode(v)))
            .collect();
        encoded.sort();

        let param_string = encoded
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let base_string = format!(
            "{}&{}&{}",
            method.to_uppercase(),
            percent_encode(url),
            percent_encode(&param_string)
        );
        let signing_key = format!(
            "{}&{}",
            percent_encode(&self.consumer_secret),
            percent_encode(&self.access_secret)
        );

        // HMAC accepts keys of any length, so this cannot fail.
        let mut mac = match HmacSha1::new_from_slice(signing_key.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return String::new(),
        };
        mac.update(base_string.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for OAuthSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthSigner").finish_non_exhaustive()
    }
}

/// Percent-encodes per RFC 3986, as OAuth 1.0a requires.
pub fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

//! Cookie sessions signed with the per-install secret.
//!
//! The cookie value is `base64url(json) "." hex(hmac-sha256)`. Anything that
//! does not verify is treated as an empty session.

use std::collections::BTreeMap;
use std::path::PathBuf;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

pub const SESSION_COOKIE: &str = "lookyloo";
const TREE_KEY: &str = "tree";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session(BTreeMap<String, String>);

impl Session {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Snapshot of the last loaded capture tree.
    pub fn tree(&self) -> Option<PathBuf> {
        self.get(TREE_KEY).map(PathBuf::from)
    }

    pub fn set_tree(&mut self, snapshot: &std::path::Path) {
        self.insert(TREE_KEY, snapshot.to_string_lossy());
    }
}

pub struct SessionSigner {
    key: Vec<u8>,
}

impl SessionSigner {
    pub fn new(secret: &[u8]) -> Self {
        let key = [secret, SESSION_COOKIE.as_bytes()].concat();
        Self { key }
    }

    fn new_hmac(&self) -> Hmac<Sha256> {
        Hmac::<Sha256>::new_from_slice(&self.key)
            .expect("HMAC can take a key of any size so this cannot fail")
    }

    pub fn encode(&self, session: &Session) -> String {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(session).unwrap_or_default());
        let mut mac = self.new_hmac();
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        format!("{payload}.{signature}")
    }

    pub fn decode(&self, value: &str) -> Option<Session> {
        let (payload, signature) = value.rsplit_once('.')?;
        let signature = hex::decode(signature).ok()?;
        let mut mac = self.new_hmac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;

        let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
        serde_json::from_slice(&json).ok()
    }

    /// Session carried by the request, empty when absent or tampered with.
    pub fn load(&self, jar: &CookieJar) -> Session {
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Session::default();
        };
        self.decode(cookie.value()).unwrap_or_else(|| {
            tracing::debug!("ignoring session cookie with bad signature");
            Session::default()
        })
    }

    /// Attach the session to the response; an empty session drops the cookie.
    pub fn save(&self, jar: CookieJar, session: &Session) -> CookieJar {
        if session.is_empty() {
            return jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
        }
        jar.add(
            Cookie::build((SESSION_COOKIE, self.encode(session)))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax),
        )
    }
}

//! SaneJS lookups: identify known JavaScript libraries by body hash.

use std::time::Duration;

use serde_json::{json, Value};

use lookyloo_common::error::Result;

#[derive(Debug, Clone)]
pub struct SaneJsClient {
    client: reqwest::Client,
    url: String,
}

impl SaneJsClient {
    pub fn new(url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, url: url.to_string() })
    }

    /// Look up a SHA-512 body hash. Any failure yields an empty object.
    pub async fn query(&self, sha512: &str) -> Value {
        match self.try_query(sha512).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "SaneJS lookup failed");
                json!({})
            }
        }
    }

    async fn try_query(&self, sha512: &str) -> Result<Value> {
        let resp = self
            .client
            .post(&self.url)
            .json(&json!({ "sha512": sha512 }))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }
}

/// The `response` member of a lookup result, when it carries anything.
pub fn details(lookup: &Value) -> Option<&Value> {
    lookup.get("response").filter(|r| match r {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    })
}

//! Capture tree: the hosts contacted during a capture and the URLs each served.
//!
//! A loaded tree is written to a snapshot file so that follow-up requests
//! (host details, body downloads) can reopen it without rebuilding it from
//! the HAR files.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{LookylooError, Result};

/// Placeholder filename for URLs whose path has no last segment.
pub const DEFAULT_FILENAME: &str = "file.bin";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UrlNode {
    pub uuid: String,
    /// Full URL.
    pub name: String,
    pub hostname: String,
    pub filename: String,
    pub status: Option<u16>,
    pub mimetype: Option<String>,
    #[serde(default, with = "body_base64", skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_hash: Option<String>,
}

/// JSON view of a URL node returned by the host details endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UrlDetails {
    pub uuid: String,
    pub name: String,
    pub hostname: String,
    pub filename: String,
    pub status: Option<u16>,
    pub mimetype: Option<String>,
    pub body_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sane_js_details: Option<Value>,
}

impl UrlNode {
    /// The response body, if the server sent a non-empty one.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref().filter(|b| !b.is_empty())
    }

    pub fn details(&self) -> UrlDetails {
        UrlDetails {
            uuid: self.uuid.clone(),
            name: self.name.clone(),
            hostname: self.hostname.clone(),
            filename: self.filename.clone(),
            status: self.status,
            mimetype: self.mimetype.clone(),
            body_size: self.body.as_ref().map_or(0, Vec::len),
            body_hash: self.body_hash.clone(),
            sane_js_details: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostNode {
    pub uuid: String,
    /// Hostname.
    pub name: String,
    pub urls: Vec<UrlNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaptureTree {
    /// Identifier of the capture the tree was built from.
    pub uuid: String,
    pub root_url: String,
    pub start_time: String,
    pub user_agent: String,
    pub host_nodes: Vec<HostNode>,
}

impl CaptureTree {
    pub fn host_node(&self, uuid: &str) -> Option<&HostNode> {
        self.host_nodes.iter().find(|h| h.uuid == uuid)
    }

    pub fn url_node(&self, uuid: &str) -> Option<&UrlNode> {
        self.host_nodes
            .iter()
            .flat_map(|h| h.urls.iter())
            .find(|u| u.uuid == uuid)
    }

    /// Hierarchy rendered by the tree page: the first host is the root and
    /// every other host hangs directly off it.
    pub fn to_tree_json(&self) -> Value {
        let node = |h: &HostNode| {
            json!({
                "uuid": h.uuid,
                "name": h.name,
                "urls_count": h.urls.len(),
            })
        };
        match self.host_nodes.split_first() {
            None => json!({}),
            Some((root, rest)) => {
                let mut root_json = node(root);
                root_json["children"] = Value::Array(rest.iter().map(node).collect());
                root_json
            }
        }
    }

    pub async fn write_snapshot(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec(self)?;
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    pub async fn read_snapshot(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                LookylooError::NotFound(format!("tree snapshot {}", path.display()))
            }
            _ => LookylooError::Io(e),
        })?;
        Ok(serde_json::from_slice(&data)?)
    }
}

/// Everything the tree page needs after a tree load.
#[derive(Debug, Clone)]
pub struct LoadedTree {
    /// Snapshot file to remember in the session.
    pub snapshot_path: std::path::PathBuf,
    pub tree_json: Value,
    pub start_time: String,
    pub user_agent: String,
    pub root_url: String,
    pub meta: Value,
}

mod body_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match body {
            Some(bytes) => s.serialize_some(&STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|encoded| STANDARD.decode(encoded).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn url(uuid: &str, name: &str, body: Option<&[u8]>) -> UrlNode {
        UrlNode {
            uuid: uuid.into(),
            name: name.into(),
            hostname: "example.com".into(),
            filename: "index.html".into(),
            status: Some(200),
            mimetype: Some("text/html".into()),
            body: body.map(<[u8]>::to_vec),
            body_hash: None,
        }
    }

    fn sample() -> CaptureTree {
        CaptureTree {
            uuid: "capture".into(),
            root_url: "https://example.com/".into(),
            start_time: "2020-01-01T00:00:00Z".into(),
            user_agent: "Mozilla/5.0".into(),
            host_nodes: vec![
                HostNode {
                    uuid: "h1".into(),
                    name: "example.com".into(),
                    urls: vec![url("u1", "https://example.com/", Some(b"<html></html>"))],
                },
                HostNode {
                    uuid: "h2".into(),
                    name: "cdn.example.com".into(),
                    urls: vec![url("u2", "https://cdn.example.com/a.js", Some(b""))],
                },
            ],
        }
    }

    #[test]
    fn test_lookup_by_uuid() {
        let tree = sample();
        assert_eq!(tree.host_node("h2").unwrap().name, "cdn.example.com");
        assert_eq!(tree.url_node("u2").unwrap().name, "https://cdn.example.com/a.js");
        assert!(tree.host_node("u1").is_none());
        assert!(tree.url_node("missing").is_none());
    }

    #[test]
    fn test_empty_body_counts_as_absent() {
        let tree = sample();
        assert!(tree.url_node("u1").unwrap().body().is_some());
        assert!(tree.url_node("u2").unwrap().body().is_none());
    }

    #[test]
    fn test_tree_json_hangs_hosts_off_root() {
        let json = sample().to_tree_json();
        assert_eq!(json["name"], "example.com");
        assert_eq!(json["children"][0]["uuid"], "h2");
        assert_eq!(json["children"][0]["urls_count"], 1);
    }

    #[test]
    fn test_details_omit_body() {
        let details = serde_json::to_value(sample().url_node("u1").unwrap().details()).unwrap();
        assert!(details.get("body").is_none());
        assert_eq!(details["body_size"], 13);
    }

    #[tokio::test]
    async fn test_snapshot_keeps_bodies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let tree = sample();
        tree.write_snapshot(&path).await.unwrap();
        let back = CaptureTree::read_snapshot(&path).await.unwrap();
        assert_eq!(back, tree);
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = CaptureTree::read_snapshot(&dir.path().join("gone.json")).await.unwrap_err();
        assert!(matches!(err, LookylooError::NotFound(_)));
    }
}

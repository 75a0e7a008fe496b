//! Custom-scheme resource reference parsing.
//!
//! A reference looks like `ar://<target>/path?query#fragment` (or the browser
//! protocol-handler form `web+ar://...`). The target is either a 43-character
//! base64url transaction id or a human-readable name.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::GatewayId;

static TRANSACTION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{43}$").expect("valid regex"));

static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_-]{1,51}$").expect("valid regex"));

/// What a reference points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    /// Content addressed by transaction id; routed as the first path segment.
    Transaction(String),
    /// Named resource; routed as a subdomain of the gateway host.
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub target: Target,
    /// Path after the target, including its leading `/`; may be empty.
    pub path: String,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
    #[error("invalid resource target: {0}")]
    InvalidTarget(String),
}

impl ResourceRef {
    /// Parse `raw` if it uses `scheme` (case-insensitive).
    pub fn parse(raw: &str, scheme: &str) -> Result<Self, ReferenceError> {
        let trimmed = raw.trim();
        let rest = strip_scheme(trimmed, scheme)
            .ok_or_else(|| ReferenceError::UnsupportedScheme(trimmed.to_string()))?;

        let (rest, fragment) = match rest.split_once('#') {
            Some((before, frag)) => (before, Some(frag.to_string())),
            None => (rest, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((before, q)) => (before, Some(q.to_string())),
            None => (rest, None),
        };
        let (target, path) = match rest.find('/') {
            Some(idx) => rest.split_at(idx),
            None => (rest, ""),
        };

        let target = if TRANSACTION_ID.is_match(target) {
            Target::Transaction(target.to_string())
        } else {
            let lowered = target.to_ascii_lowercase();
            if NAME.is_match(&lowered) {
                Target::Name(lowered)
            } else {
                return Err(ReferenceError::InvalidTarget(target.to_string()));
            }
        };

        Ok(Self {
            target,
            path: path.to_string(),
            query,
            fragment,
        })
    }

    /// Whether serving this reference needs a name-resolving gateway.
    pub fn needs_name_resolution(&self) -> bool {
        matches!(self.target, Target::Name(_))
    }

    /// Rewrite the reference onto a gateway, preserving path, query and
    /// fragment.
    pub fn to_gateway_url(&self, gateway: &GatewayId) -> String {
        let mut url = match &self.target {
            Target::Transaction(id) => format!("{}/{}{}", gateway.base_url(), id, self.path),
            Target::Name(name) => {
                let path = if self.path.is_empty() { "/" } else { self.path.as_str() };
                format!("{}://{}.{}{}", gateway.protocol, name, gateway.authority(), path)
            }
        };
        if let Some(query) = &self.query {
            url.push('?');
            url.push_str(query);
        }
        if let Some(fragment) = &self.fragment {
            url.push('#');
            url.push_str(fragment);
        }
        url
    }
}

/// Strip `scheme://` or `web+scheme://` from the front of `raw`.
fn strip_scheme<'a>(raw: &'a str, scheme: &str) -> Option<&'a str> {
    let (head, rest) = raw.split_once("://")?;
    let lowered = head.to_ascii_lowercase();
    let name = lowered.strip_prefix("web+").unwrap_or(lowered.as_str());
    name.eq_ignore_ascii_case(scheme).then_some(rest)
}

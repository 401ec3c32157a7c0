//! In-memory per-host cookie jar.
//!
//! This is deliberately not full HTTP cookie semantics: there is no expiry, path, or domain
//! scoping. A host maps to an ordered list of `name=value` pairs.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared cookie store, keyed by lower-cased host name.
///
/// Cloning yields another handle to the same store. The hosting process creates one jar and hands
/// it to every executor; tests construct isolated jars.
///
/// Each operation is atomic, but a request's read (building the `Cookie` header) and its later
/// write (storing `Set-Cookie` values) are separate operations. Concurrent persisted requests to
/// the same host therefore race, and the last write wins.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    hosts: Arc<RwLock<HashMap<String, Vec<(String, String)>>>>,
}

impl CookieJar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a `Cookie` header value (`a=1; b=2`) for `host`, in storage order.
    #[must_use]
    pub fn cookie_header(&self, host: &str) -> Option<String> {
        let hosts = self.hosts.read();
        let jar = hosts.get(&host.to_ascii_lowercase())?;
        if jar.is_empty() {
            return None;
        }
        let header = jar
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        Some(header)
    }

    /// Merge cookies into the host's entry, creating it if absent.
    ///
    /// A name that is already stored keeps its position and takes the new value.
    pub fn store<I>(&self, host: &str, cookies: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut hosts = self.hosts.write();
        let jar = hosts.entry(host.to_ascii_lowercase()).or_default();
        for (name, value) in cookies {
            if let Some(slot) = jar.iter_mut().find(|(k, _)| *k == name) {
                slot.1 = value;
            } else {
                jar.push((name, value));
            }
        }
    }

    /// Drop the cookies for `host`, or for every host when `host` is `None`.
    pub fn clear(&self, host: Option<&str>) {
        let mut hosts = self.hosts.write();
        match host {
            Some(h) => {
                hosts.remove(&h.to_ascii_lowercase());
            }
            None => hosts.clear(),
        }
    }

    /// Snapshot of the cookies stored for `host`.
    #[must_use]
    pub fn cookies(&self, host: &str) -> Vec<(String, String)> {
        self.hosts
            .read()
            .get(&host.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn host_count(&self) -> usize {
        self.hosts.read().len()
    }
}

/// Extract the `name=value` pair from a raw `Set-Cookie` value.
///
/// Attributes after the first `;` are ignored. Values without `=` or with an empty name yield
/// `None`.
#[must_use]
pub fn parse_set_cookie(raw: &str) -> Option<(String, String)> {
    let pair = raw.split(';').next().unwrap_or_default();
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

//! Repository record - 영속 레코드
//!
//! `short_name` is unique per requester, so `(requester_id, short_name)` is
//! both the persistence key and the workspace lock key.

use super::types::RequesterId;
use crate::strings::truncate_chars;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `(requester_id, short_name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoKey {
    pub requester_id: RequesterId,
    pub short_name: String,
}

impl RepoKey {
    pub fn new(requester_id: RequesterId, short_name: impl Into<String>) -> Self {
        Self {
            requester_id,
            short_name: short_name.into(),
        }
    }
}

impl std::fmt::Display for RepoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.requester_id, self.short_name)
    }
}

/// Persisted description of a registered remote repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub requester_id: RequesterId,
    pub short_name: String,
    pub remote_url: String,
    #[serde(default)]
    pub registered: bool,
    #[serde(default)]
    pub primed: bool,
    #[serde(default)]
    pub last_primed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub prime_output: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RepositoryRecord {
    /// Freshly accepted, not yet registered
    pub fn new(
        requester_id: RequesterId,
        short_name: impl Into<String>,
        remote_url: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            requester_id,
            short_name: short_name.into(),
            remote_url: remote_url.into(),
            registered: false,
            primed: false,
            last_primed_at: None,
            prime_output: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> RepoKey {
        RepoKey::new(self.requester_id.clone(), self.short_name.clone())
    }

    /// Record the outcome of a priming run.
    ///
    /// `last_primed_at` is stamped whenever priming was attempted, so
    /// `primed == true` always implies it is set.
    pub fn record_priming(
        &mut self,
        primed: bool,
        output: &str,
        at: DateTime<Utc>,
        output_limit: usize,
    ) {
        self.registered = true;
        self.primed = primed;
        self.last_primed_at = Some(at);
        self.prime_output = Some(truncate_chars(output, output_limit).into_owned());
        self.updated_at = at;
    }

    /// Registered without a successful prime
    pub fn mark_registered(&mut self) {
        self.registered = true;
        self.updated_at = Utc::now();
    }

    /// Ready to answer a duplicate register without re-running anything
    pub fn is_fully_registered(&self) -> bool {
        self.registered && self.primed
    }
}

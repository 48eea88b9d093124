//! Update policy: decides whether the next run loads the full list, applies
//! the diff, or does nothing.

mod fetch;
mod probe;

pub use fetch::*;
pub use probe::*;

use crate::error::Result;
use crate::store::{MediaStore, RemoteCheck};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// What to do before any network access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePlan {
    Skip,
    Full,
    CheckRemote,
}

/// Outcome of an update check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "metadata", rename_all = "snake_case")]
pub enum UpdateDecision {
    /// Checked recently; nothing was fetched
    SkipCheck,
    /// The store is empty, load the full list
    RequestFull,
    /// The remote list changed, apply the diff
    RequestDiff(RemoteMetadata),
    /// The remote list is unchanged
    UpToDate(RemoteMetadata),
    /// The probe failed; the store was not touched
    CheckFailed(String),
}

/// Pure decision table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdatePolicy {
    pub check_interval: Duration,
}

impl UpdatePolicy {
    pub fn new(check_interval: Duration) -> Self {
        Self { check_interval }
    }

    /// An empty store always needs the full list. Otherwise the remote is
    /// only consulted when forced or when the check interval has passed.
    pub fn plan(store_is_empty: bool, force: bool, interval_elapsed: bool) -> UpdatePlan {
        if store_is_empty {
            UpdatePlan::Full
        } else if force || interval_elapsed {
            UpdatePlan::CheckRemote
        } else {
            UpdatePlan::Skip
        }
    }

    /// Whether the last check of a list is older than the interval
    pub fn interval_elapsed(&self, last: Option<&RemoteCheck>, now: DateTime<Utc>) -> bool {
        let Some(checked_at) = last.and_then(RemoteCheck::checked_at) else {
            return true;
        };
        match now.signed_duration_since(checked_at).to_std() {
            Ok(age) => age >= self.check_interval,
            // Checked "in the future": clock moved backwards
            Err(_) => false,
        }
    }
}

/// Runs the policy against the store and, when needed, the remote list
pub struct UpdateSelector<P> {
    probe: P,
    policy: UpdatePolicy,
    list_url: String,
}

impl<P: MetadataProbe> UpdateSelector<P> {
    /// `list_url` is the full list whose metadata signals new content
    pub fn new(probe: P, policy: UpdatePolicy, list_url: impl Into<String>) -> Self {
        Self {
            probe,
            policy,
            list_url: list_url.into(),
        }
    }

    pub fn list_url(&self) -> &str {
        &self.list_url
    }

    pub async fn decide(&self, store: &MediaStore, force: bool) -> Result<UpdateDecision> {
        let empty = store.is_empty().await?;
        let last = store.get_remote_check(&self.list_url).await?;
        let elapsed = self.policy.interval_elapsed(last.as_ref(), Utc::now());

        let plan = UpdatePolicy::plan(empty, force, elapsed);
        debug!(empty, force, elapsed, ?plan, "Update plan");

        let decision = match plan {
            UpdatePlan::Skip => UpdateDecision::SkipCheck,
            UpdatePlan::Full => UpdateDecision::RequestFull,
            UpdatePlan::CheckRemote => match self.probe.probe(&self.list_url).await {
                Ok(current) => {
                    let previous = last.as_ref().map(RemoteCheck::metadata);
                    if current.changed_since(previous.as_ref()) {
                        UpdateDecision::RequestDiff(current)
                    } else {
                        UpdateDecision::UpToDate(current)
                    }
                }
                Err(err) => {
                    warn!(url = %self.list_url, error = %err, "Update check failed");
                    UpdateDecision::CheckFailed(err.to_string())
                }
            },
        };

        info!(?decision, "Update decision");
        Ok(decision)
    }
}

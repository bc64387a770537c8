use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::discovery::{
    Discovery, DiscoveryEditHistory, DiscoveryFeature, DiscoverySummary, DiscoveryUpdate,
    DiscoveryUser, NewFeature, NewUser,
};
use crate::error::{ForgeError, Result};
use crate::locks::{discovery_key, project_key, KeyedLocks};
use crate::metadata::{self, ExtractedData};
use crate::orchestration::CompletionHook;
use crate::prd::Prd;
use crate::store::Store;

/// Result of a successful confirmation.
#[derive(Debug, Clone, Serialize)]
pub struct Confirmation {
    pub discovery: Discovery,
    pub summary: DiscoverySummary,
    /// PRDs created for MVP features by this confirmation.
    pub seeded: Vec<Prd>,
}

/// Owns the intake state machine.
pub struct DiscoveryController {
    store: Arc<dyn Store>,
    locks: KeyedLocks,
    completion: Option<Arc<dyn CompletionHook>>,
}

impl DiscoveryController {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
            completion: None,
        }
    }

    pub fn with_completion_hook(mut self, hook: Arc<dyn CompletionHook>) -> Self {
        self.completion = Some(hook);
        self
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Return the project's discovery, creating one at `welcome` on first use.
    pub fn get_or_create(&self, project_id: &str) -> Result<Discovery> {
        if let Some(existing) = self.store.discovery_for_project(project_id)? {
            return Ok(existing);
        }
        self.locks.with(&project_key(project_id), || {
            if let Some(existing) = self.store.discovery_for_project(project_id)? {
                return Ok(existing);
            }
            let discovery = Discovery::new(project_id);
            self.store.create_discovery(&discovery)?;
            info!(project = project_id, discovery = %discovery.id, "created discovery");
            Ok(discovery)
        })
    }

    pub fn get(&self, id: &str) -> Result<Discovery> {
        self.store
            .get_discovery(id)?
            .ok_or_else(|| ForgeError::DiscoveryNotFound(id.to_string()))
    }

    /// The project's discovery, without creating one.
    pub fn find_for_project(&self, project_id: &str) -> Result<Discovery> {
        self.store
            .discovery_for_project(project_id)?
            .ok_or_else(|| ForgeError::DiscoveryNotFound(project_id.to_string()))
    }

    /// True while the project has a discovery that is not yet complete.
    pub fn is_discovery_mode(&self, project_id: &str) -> Result<bool> {
        Ok(self
            .store
            .discovery_for_project(project_id)?
            .is_some_and(|d| !d.is_complete()))
    }

    pub fn summary(&self, id: &str) -> Result<DiscoverySummary> {
        let discovery = self.get(id)?;
        self.build_summary(&discovery)
    }

    /// Edit history, newest first.
    pub fn history(&self, id: &str) -> Result<Vec<DiscoveryEditHistory>> {
        let discovery = self.get(id)?;
        let mut entries = self.store.list_history(&discovery.id)?;
        entries.reverse();
        Ok(entries)
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    pub fn advance_stage(&self, id: &str) -> Result<Discovery> {
        self.locks.with(&discovery_key(id), || {
            let mut discovery = self.get(id)?;
            self.advance_locked(&mut discovery)?;
            Ok(discovery)
        })
    }

    pub fn update_data(&self, id: &str, update: &DiscoveryUpdate) -> Result<Discovery> {
        self.locks.with(&discovery_key(id), || {
            let mut discovery = self.get(id)?;
            self.update_locked(&mut discovery, update)?;
            Ok(discovery)
        })
    }

    pub fn add_user(&self, id: &str, user: NewUser) -> Result<DiscoveryUser> {
        self.locks.with(&discovery_key(id), || {
            let discovery = self.get(id)?;
            discovery.ensure_mutable()?;
            let user = user.into_user(&discovery.id)?;
            self.store.add_user(&user)?;
            debug!(discovery = id, user = %user.id, "added persona");
            Ok(user)
        })
    }

    pub fn add_feature(&self, id: &str, feature: NewFeature) -> Result<DiscoveryFeature> {
        self.locks.with(&discovery_key(id), || {
            let discovery = self.get(id)?;
            discovery.ensure_mutable()?;
            let feature = feature.into_feature(&discovery.id)?;
            self.store.add_feature(&feature)?;
            debug!(discovery = id, feature = %feature.id, version = %feature.version, "added feature");
            Ok(feature)
        })
    }

    /// Confirm from `summary`. Seeds PRDs before the stage is committed.
    pub fn confirm(&self, id: &str) -> Result<Confirmation> {
        self.locks.with(&discovery_key(id), || {
            let mut discovery = self.get(id)?;
            discovery.confirm()?;
            let summary = self.build_summary(&discovery)?;
            let seeded = self.complete(&discovery, &summary)?;
            self.store.update_discovery(&discovery)?;
            info!(
                discovery = id,
                mvp_features = summary.mvp_features.len(),
                seeded = seeded.len(),
                "discovery confirmed"
            );
            Ok(Confirmation {
                discovery,
                summary,
                seeded,
            })
        })
    }

    /// Delete the discovery with its children and start over at `welcome`.
    pub fn reset(&self, id: &str) -> Result<Discovery> {
        let project_id = self.get(id)?.project_id;
        self.locks.with(&project_key(&project_id), || {
            self.locks.with(&discovery_key(id), || {
                // gone if a concurrent reset won the race
                let old = self.get(id)?;
                self.store.delete_discovery(&old.id)?;
                let fresh = Discovery::new(&old.project_id);
                self.store.create_discovery(&fresh)?;
                info!(project = %project_id, old = id, new = %fresh.id, "discovery reset");
                Ok(fresh)
            })
        })
    }

    /// Apply the `DISCOVERY_DATA` block of an assistant reply: merge fields,
    /// add personas and features, then advance if the stage is done.
    /// A reply without a block leaves the discovery untouched.
    pub fn apply_response(&self, id: &str, response: &str) -> Result<Discovery> {
        let Some(meta) = metadata::parse(response) else {
            return self.get(id);
        };
        self.locks.with(&discovery_key(id), || {
            let mut discovery = self.get(id)?;
            if meta.extracted.is_empty() && !meta.stage_complete {
                return Ok(discovery);
            }
            discovery.ensure_mutable()?;

            let ExtractedData {
                update,
                users,
                features,
            } = meta.extracted;
            self.update_locked(&mut discovery, &update)?;
            for user in users {
                self.store.add_user(&user.into_user(&discovery.id)?)?;
            }
            for feature in features {
                self.store.add_feature(&feature.into_feature(&discovery.id)?)?;
            }

            if meta.stage_complete {
                self.advance_locked(&mut discovery)?;
            }
            Ok(discovery)
        })
    }

    // -----------------------------------------------------------------------
    // Helpers (caller holds the discovery lock)
    // -----------------------------------------------------------------------

    fn update_locked(&self, discovery: &mut Discovery, update: &DiscoveryUpdate) -> Result<()> {
        let changes = discovery.apply(update)?;
        if changes.is_empty() {
            return Ok(());
        }
        self.store.update_discovery(discovery)?;
        for change in &changes {
            if let Some(original) = &change.original {
                let entry =
                    DiscoveryEditHistory::record(discovery, change.field, original, &change.new);
                self.store.append_history(&entry)?;
            }
        }
        debug!(discovery = %discovery.id, fields = changes.len(), "updated discovery data");
        Ok(())
    }

    fn advance_locked(&self, discovery: &mut Discovery) -> Result<Vec<Prd>> {
        let mut next = discovery.clone();
        let from = next.stage;
        let to = next.advance()?;
        let seeded = if to.is_complete() {
            let summary = self.build_summary(&next)?;
            self.complete(&next, &summary)?
        } else {
            Vec::new()
        };
        self.store.update_discovery(&next)?;
        info!(discovery = %next.id, %from, %to, "advanced discovery stage");
        *discovery = next;
        Ok(seeded)
    }

    fn complete(&self, discovery: &Discovery, summary: &DiscoverySummary) -> Result<Vec<Prd>> {
        match &self.completion {
            Some(hook) => hook.discovery_completed(discovery, summary),
            None => Ok(Vec::new()),
        }
    }

    fn build_summary(&self, discovery: &Discovery) -> Result<DiscoverySummary> {
        let users = self.store.list_users(&discovery.id)?;
        let features = self.store.list_features(&discovery.id)?;
        Ok(DiscoverySummary::build(discovery, users, features))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

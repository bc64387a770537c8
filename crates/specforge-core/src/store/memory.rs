use super::{DiscoveryRepository, PrdRepository};
use crate::discovery::{Discovery, DiscoveryEditHistory, DiscoveryFeature, DiscoveryUser};
use crate::error::{ForgeError, Result};
use crate::prd::{sort_prds, Prd};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

type Children<T> = RwLock<HashMap<String, Vec<T>>>;

/// In-process backend. Each table has its own lock; nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    discoveries: RwLock<HashMap<String, Discovery>>,
    users: Children<DiscoveryUser>,
    features: Children<DiscoveryFeature>,
    history: Children<DiscoveryEditHistory>,
    prds: RwLock<HashMap<String, Prd>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn push_child<T: Clone>(table: &Children<T>, parent: &str, item: &T) {
    write(table)
        .entry(parent.to_string())
        .or_default()
        .push(item.clone());
}

fn list_children<T: Clone>(table: &Children<T>, parent: &str) -> Vec<T> {
    read(table).get(parent).cloned().unwrap_or_default()
}

impl DiscoveryRepository for MemoryStore {
    fn get_discovery(&self, id: &str) -> Result<Option<Discovery>> {
        Ok(read(&self.discoveries).get(id).cloned())
    }

    fn discovery_for_project(&self, project_id: &str) -> Result<Option<Discovery>> {
        Ok(read(&self.discoveries)
            .values()
            .find(|d| d.project_id == project_id)
            .cloned())
    }

    fn create_discovery(&self, discovery: &Discovery) -> Result<()> {
        let mut table = write(&self.discoveries);
        if table.values().any(|d| d.project_id == discovery.project_id) {
            return Err(ForgeError::DiscoveryExists(discovery.project_id.clone()));
        }
        table.insert(discovery.id.clone(), discovery.clone());
        Ok(())
    }

    fn update_discovery(&self, discovery: &Discovery) -> Result<()> {
        let mut table = write(&self.discoveries);
        let slot = table
            .get_mut(&discovery.id)
            .ok_or_else(|| ForgeError::DiscoveryNotFound(discovery.id.clone()))?;
        *slot = discovery.clone();
        Ok(())
    }

    fn delete_discovery(&self, id: &str) -> Result<()> {
        write(&self.discoveries).remove(id);
        write(&self.users).remove(id);
        write(&self.features).remove(id);
        write(&self.history).remove(id);
        Ok(())
    }

    fn add_user(&self, user: &DiscoveryUser) -> Result<()> {
        push_child(&self.users, &user.discovery_id, user);
        Ok(())
    }

    fn list_users(&self, discovery_id: &str) -> Result<Vec<DiscoveryUser>> {
        Ok(list_children(&self.users, discovery_id))
    }

    fn add_feature(&self, feature: &DiscoveryFeature) -> Result<()> {
        push_child(&self.features, &feature.discovery_id, feature);
        Ok(())
    }

    fn list_features(&self, discovery_id: &str) -> Result<Vec<DiscoveryFeature>> {
        Ok(list_children(&self.features, discovery_id))
    }

    fn append_history(&self, entry: &DiscoveryEditHistory) -> Result<()> {
        push_child(&self.history, &entry.discovery_id, entry);
        Ok(())
    }

    fn list_history(&self, discovery_id: &str) -> Result<Vec<DiscoveryEditHistory>> {
        Ok(list_children(&self.history, discovery_id))
    }
}

impl PrdRepository for MemoryStore {
    fn get_prd(&self, id: &str) -> Result<Option<Prd>> {
        Ok(read(&self.prds).get(id).cloned())
    }

    fn prd_for_feature(&self, feature_id: &str) -> Result<Option<Prd>> {
        Ok(read(&self.prds)
            .values()
            .find(|p| p.feature_id == feature_id)
            .cloned())
    }

    fn create_prd(&self, prd: &Prd) -> Result<()> {
        let mut table = write(&self.prds);
        if table.values().any(|p| p.feature_id == prd.feature_id) {
            return Err(ForgeError::PrdExists(prd.feature_id.clone()));
        }
        table.insert(prd.id.clone(), prd.clone());
        Ok(())
    }

    fn update_prd(&self, prd: &Prd) -> Result<()> {
        let mut table = write(&self.prds);
        let slot = table
            .get_mut(&prd.id)
            .ok_or_else(|| ForgeError::PrdNotFound(prd.id.clone()))?;
        *slot = prd.clone();
        Ok(())
    }

    fn list_prds(&self, project_id: &str) -> Result<Vec<Prd>> {
        let mut prds: Vec<Prd> = read(&self.prds)
            .values()
            .filter(|p| p.project_id == project_id)
            .cloned()
            .collect();
        sort_prds(&mut prds);
        Ok(prds)
    }
}

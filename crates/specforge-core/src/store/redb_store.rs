//! Persistent backend on redb.
//!
//! # Table design
//!
//! Entities are JSON values under `&str` keys. Child rows (users, features,
//! history) and the project → PRD index use composite keys:
//! ```text
//! <parent-id>/<seq: 10 digits>     users, features, history
//! <project-id>/<prd-id>            prd_by_project
//! ```
//! A prefix range `<parent>/ .. <parent>0` lists one parent's rows; `'0'` is
//! the byte after `'/'`. Children are append-only, so the row count under a
//! prefix is the next sequence number and key order is insertion order.

use std::path::Path;

use redb::{Database, ReadableTable, Table, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{DiscoveryRepository, PrdRepository};
use crate::discovery::{Discovery, DiscoveryEditHistory, DiscoveryFeature, DiscoveryUser};
use crate::error::{ForgeError, Result};
use crate::prd::{sort_prds, Prd};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

type Blobs = TableDefinition<'static, &'static str, &'static [u8]>;
type Index = TableDefinition<'static, &'static str, &'static str>;

const DISCOVERIES: Blobs = TableDefinition::new("discoveries");
/// project id → discovery id
const DISCOVERY_BY_PROJECT: Index = TableDefinition::new("discovery_by_project");
const USERS: Blobs = TableDefinition::new("discovery_users");
const FEATURES: Blobs = TableDefinition::new("discovery_features");
const HISTORY: Blobs = TableDefinition::new("discovery_history");
const PRDS: Blobs = TableDefinition::new("prds");
/// feature id → prd id
const PRD_BY_FEATURE: Index = TableDefinition::new("prd_by_feature");
/// `<project>/<prd>` → prd id
const PRD_BY_PROJECT: Index = TableDefinition::new("prd_by_project");

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

fn child_bounds(parent: &str) -> (String, String) {
    (format!("{parent}/"), format!("{parent}0"))
}

fn project_prd_key(project_id: &str, prd_id: &str) -> String {
    format!("{project_id}/{prd_id}")
}

fn db_err(e: impl std::fmt::Display) -> ForgeError {
    ForgeError::Store(e.to_string())
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

fn remove_children(table: &mut Table<'_, &'static str, &'static [u8]>, parent: &str) -> Result<()> {
    let (lo, hi) = child_bounds(parent);
    let keys = table
        .range(lo.as_str()..hi.as_str())
        .map_err(db_err)?
        .map(|entry| entry.map(|(k, _)| k.value().to_string()).map_err(db_err))
        .collect::<Result<Vec<_>>>()?;
    for key in keys {
        table.remove(key.as_str()).map_err(db_err)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// RedbStore
// ---------------------------------------------------------------------------

pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create the database at `path`, creating every table up front
    /// so read transactions never see a missing table.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(db_err)?;
        let wt = db.begin_write().map_err(db_err)?;
        for def in [DISCOVERIES, USERS, FEATURES, HISTORY, PRDS] {
            wt.open_table(def).map_err(db_err)?;
        }
        for def in [DISCOVERY_BY_PROJECT, PRD_BY_FEATURE, PRD_BY_PROJECT] {
            wt.open_table(def).map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(Self { db })
    }

    fn get_blob<T: DeserializeOwned>(&self, def: Blobs, key: &str) -> Result<Option<T>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(def).map_err(db_err)?;
        let found = table.get(key).map_err(db_err)?;
        found.map(|v| decode(v.value())).transpose()
    }

    /// Follow a unique index into a blob table inside one read transaction.
    fn get_indexed<T: DeserializeOwned>(
        &self,
        index: Index,
        blobs: Blobs,
        key: &str,
    ) -> Result<Option<T>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let index = rt.open_table(index).map_err(db_err)?;
        let Some(id) = index.get(key).map_err(db_err)?.map(|g| g.value().to_string()) else {
            return Ok(None);
        };
        let table = rt.open_table(blobs).map_err(db_err)?;
        let found = table.get(id.as_str()).map_err(db_err)?;
        found.map(|v| decode(v.value())).transpose()
    }

    fn append_child<T: Serialize>(&self, def: Blobs, parent: &str, item: &T) -> Result<()> {
        let value = serde_json::to_vec(item)?;
        let (lo, hi) = child_bounds(parent);
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(def).map_err(db_err)?;
            let seq = table.range(lo.as_str()..hi.as_str()).map_err(db_err)?.count();
            let key = format!("{lo}{seq:010}");
            table.insert(key.as_str(), value.as_slice()).map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    fn list_children<T: DeserializeOwned>(&self, def: Blobs, parent: &str) -> Result<Vec<T>> {
        let (lo, hi) = child_bounds(parent);
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(def).map_err(db_err)?;
        let mut out = Vec::new();
        for entry in table.range(lo.as_str()..hi.as_str()).map_err(db_err)? {
            let (_, v) = entry.map_err(db_err)?;
            out.push(decode(v.value())?);
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Discovery tables
// ---------------------------------------------------------------------------

impl DiscoveryRepository for RedbStore {
    fn get_discovery(&self, id: &str) -> Result<Option<Discovery>> {
        self.get_blob(DISCOVERIES, id)
    }

    fn discovery_for_project(&self, project_id: &str) -> Result<Option<Discovery>> {
        self.get_indexed(DISCOVERY_BY_PROJECT, DISCOVERIES, project_id)
    }

    fn create_discovery(&self, discovery: &Discovery) -> Result<()> {
        let value = serde_json::to_vec(discovery)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut index = wt.open_table(DISCOVERY_BY_PROJECT).map_err(db_err)?;
            if index
                .get(discovery.project_id.as_str())
                .map_err(db_err)?
                .is_some()
            {
                return Err(ForgeError::DiscoveryExists(discovery.project_id.clone()));
            }
            index
                .insert(discovery.project_id.as_str(), discovery.id.as_str())
                .map_err(db_err)?;
            let mut table = wt.open_table(DISCOVERIES).map_err(db_err)?;
            table
                .insert(discovery.id.as_str(), value.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    fn update_discovery(&self, discovery: &Discovery) -> Result<()> {
        let value = serde_json::to_vec(discovery)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(DISCOVERIES).map_err(db_err)?;
            if table.get(discovery.id.as_str()).map_err(db_err)?.is_none() {
                return Err(ForgeError::DiscoveryNotFound(discovery.id.clone()));
            }
            table
                .insert(discovery.id.as_str(), value.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    fn delete_discovery(&self, id: &str) -> Result<()> {
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(DISCOVERIES).map_err(db_err)?;
            let removed = table.remove(id).map_err(db_err)?;
            let existing: Option<Discovery> =
                removed.map(|v| decode(v.value())).transpose()?;
            if let Some(discovery) = existing {
                let mut index = wt.open_table(DISCOVERY_BY_PROJECT).map_err(db_err)?;
                let points_here = index
                    .get(discovery.project_id.as_str())
                    .map_err(db_err)?
                    .is_some_and(|g| g.value() == id);
                if points_here {
                    index
                        .remove(discovery.project_id.as_str())
                        .map_err(db_err)?;
                }
            }
            for def in [USERS, FEATURES, HISTORY] {
                let mut children = wt.open_table(def).map_err(db_err)?;
                remove_children(&mut children, id)?;
            }
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    fn add_user(&self, user: &DiscoveryUser) -> Result<()> {
        self.append_child(USERS, &user.discovery_id, user)
    }

    fn list_users(&self, discovery_id: &str) -> Result<Vec<DiscoveryUser>> {
        self.list_children(USERS, discovery_id)
    }

    fn add_feature(&self, feature: &DiscoveryFeature) -> Result<()> {
        self.append_child(FEATURES, &feature.discovery_id, feature)
    }

    fn list_features(&self, discovery_id: &str) -> Result<Vec<DiscoveryFeature>> {
        self.list_children(FEATURES, discovery_id)
    }

    fn append_history(&self, entry: &DiscoveryEditHistory) -> Result<()> {
        self.append_child(HISTORY, &entry.discovery_id, entry)
    }

    fn list_history(&self, discovery_id: &str) -> Result<Vec<DiscoveryEditHistory>> {
        self.list_children(HISTORY, discovery_id)
    }
}

// ---------------------------------------------------------------------------
// PRD tables
// ---------------------------------------------------------------------------

impl PrdRepository for RedbStore {
    fn get_prd(&self, id: &str) -> Result<Option<Prd>> {
        self.get_blob(PRDS, id)
    }

    fn prd_for_feature(&self, feature_id: &str) -> Result<Option<Prd>> {
        self.get_indexed(PRD_BY_FEATURE, PRDS, feature_id)
    }

    fn create_prd(&self, prd: &Prd) -> Result<()> {
        let value = serde_json::to_vec(prd)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut by_feature = wt.open_table(PRD_BY_FEATURE).map_err(db_err)?;
            if by_feature
                .get(prd.feature_id.as_str())
                .map_err(db_err)?
                .is_some()
            {
                return Err(ForgeError::PrdExists(prd.feature_id.clone()));
            }
            by_feature
                .insert(prd.feature_id.as_str(), prd.id.as_str())
                .map_err(db_err)?;

            let mut by_project = wt.open_table(PRD_BY_PROJECT).map_err(db_err)?;
            let key = project_prd_key(&prd.project_id, &prd.id);
            by_project
                .insert(key.as_str(), prd.id.as_str())
                .map_err(db_err)?;

            let mut table = wt.open_table(PRDS).map_err(db_err)?;
            table
                .insert(prd.id.as_str(), value.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    fn update_prd(&self, prd: &Prd) -> Result<()> {
        let value = serde_json::to_vec(prd)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(PRDS).map_err(db_err)?;
            if table.get(prd.id.as_str()).map_err(db_err)?.is_none() {
                return Err(ForgeError::PrdNotFound(prd.id.clone()));
            }
            table
                .insert(prd.id.as_str(), value.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    fn list_prds(&self, project_id: &str) -> Result<Vec<Prd>> {
        let (lo, hi) = child_bounds(project_id);
        let rt = self.db.begin_read().map_err(db_err)?;
        let by_project = rt.open_table(PRD_BY_PROJECT).map_err(db_err)?;
        let table = rt.open_table(PRDS).map_err(db_err)?;

        let mut prds = Vec::new();
        for entry in by_project
            .range(lo.as_str()..hi.as_str())
            .map_err(db_err)?
        {
            let (_, id) = entry.map_err(db_err)?;
            if let Some(v) = table.get(id.value()).map_err(db_err)? {
                let prd = decode::<Prd>(v.value())?;
                // "acme/" also prefixes the keys of project "acme/mobile"
                if prd.project_id == project_id {
                    prds.push(prd);
                }
            }
        }
        sort_prds(&mut prds);
        Ok(prds)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::NewUser;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, RedbStore) {
        let dir = TempDir::new().unwrap();
        let db = RedbStore::open(&dir.path().join("test.redb")).unwrap();
        (dir, db)
    }

    crate::store::contract::backend_contract!(open_tmp().1);

    #[test]
    fn data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("specforge.redb");
        let d = Discovery::new("proj-1");
        {
            let store = RedbStore::open(&path).unwrap();
            store.create_discovery(&d).unwrap();
            let user = NewUser {
                description: "Bakers".into(),
                ..Default::default()
            }
            .into_user(&d.id)
            .unwrap();
            store.add_user(&user).unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.discovery_for_project("proj-1").unwrap().unwrap(), d);
        assert_eq!(store.list_users(&d.id).unwrap()[0].description, "Bakers");
    }

    #[test]
    fn prefix_scan_does_not_bleed_into_similar_ids() {
        let (_dir, store) = open_tmp();
        let a = Discovery::new("p");
        let b = Discovery::new("p-2");
        store.create_discovery(&a).unwrap();
        store.create_discovery(&b).unwrap();
        for disc in [&a, &b] {
            let user = NewUser {
                description: "Ops".into(),
                ..Default::default()
            }
            .into_user(&disc.id)
            .unwrap();
            store.add_user(&user).unwrap();
        }
        assert_eq!(store.list_users(&a.id).unwrap().len(), 1);
        assert_eq!(store.list_users(&b.id).unwrap().len(), 1);
    }

    #[test]
    fn children_past_ten_keep_order() {
        let (_dir, store) = open_tmp();
        let d = Discovery::new("proj");
        store.create_discovery(&d).unwrap();
        for i in 0..12 {
            let user = NewUser {
                description: format!("group {i}"),
                ..Default::default()
            }
            .into_user(&d.id)
            .unwrap();
            store.add_user(&user).unwrap();
        }
        let users = store.list_users(&d.id).unwrap();
        assert_eq!(users.len(), 12);
        assert_eq!(users[11].description, "group 11");
    }
}

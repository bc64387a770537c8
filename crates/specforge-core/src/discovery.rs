use crate::error::{ForgeError, Result};
use crate::types::{is_mvp_version, Stage, MVP_VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Intake record for a project. One per project, created lazily.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discovery {
    pub id: String,
    pub project_id: String,
    pub stage: Stage,
    pub stage_started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_statement: Option<String>,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solves_statement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_returning_user: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Discovery {
    pub fn new(project_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            stage: Stage::Welcome,
            stage_started_at: now,
            business_context: None,
            problem_statement: None,
            goals: Vec::new(),
            project_name: None,
            solves_statement: None,
            is_returning_user: None,
            used_template_id: None,
            confirmed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.stage.is_complete()
    }

    /// Fails with `AlreadyComplete` once the discovery has been confirmed.
    pub fn ensure_mutable(&self) -> Result<()> {
        if self.is_complete() {
            return Err(ForgeError::AlreadyComplete);
        }
        Ok(())
    }

    /// Move one step along the fixed stage sequence.
    pub fn advance(&mut self) -> Result<Stage> {
        self.ensure_mutable()?;
        let next = self
            .stage
            .next()
            .ok_or_else(|| ForgeError::InvalidStageTransition {
                from: self.stage.to_string(),
                reason: "no successor stage".to_string(),
            })?;
        self.enter(next);
        Ok(next)
    }

    /// Confirm from `summary`, entering the terminal stage.
    pub fn confirm(&mut self) -> Result<()> {
        self.ensure_mutable()?;
        if self.stage != Stage::Summary {
            return Err(ForgeError::InvalidStageTransition {
                from: self.stage.to_string(),
                reason: "must be in summary stage to confirm".to_string(),
            });
        }
        self.enter(Stage::Complete);
        Ok(())
    }

    fn enter(&mut self, stage: Stage) {
        let now = Utc::now();
        self.stage = stage;
        self.stage_started_at = now;
        self.updated_at = now;
        if stage.is_complete() && self.confirmed_at.is_none() {
            self.confirmed_at = Some(now);
        }
    }

    /// Merge the set fields of `update`. Returns one change per field whose
    /// stored value actually differs.
    pub fn apply(&mut self, update: &DiscoveryUpdate) -> Result<Vec<FieldChange>> {
        self.ensure_mutable()?;
        let mut changes = Vec::new();

        merge_text(
            &mut self.business_context,
            &update.business_context,
            "business_context",
            &mut changes,
        );
        merge_text(
            &mut self.problem_statement,
            &update.problem_statement,
            "problem_statement",
            &mut changes,
        );
        if let Some(goals) = &update.goals {
            if *goals != self.goals {
                let original = if self.goals.is_empty() {
                    None
                } else {
                    Some(serde_json::to_string(&self.goals)?)
                };
                changes.push(FieldChange {
                    field: "goals",
                    original,
                    new: serde_json::to_string(goals)?,
                });
                self.goals = goals.clone();
            }
        }
        merge_text(
            &mut self.project_name,
            &update.project_name,
            "project_name",
            &mut changes,
        );
        merge_text(
            &mut self.solves_statement,
            &update.solves_statement,
            "solves_statement",
            &mut changes,
        );
        if let Some(flag) = update.is_returning_user {
            if self.is_returning_user != Some(flag) {
                changes.push(FieldChange {
                    field: "is_returning_user",
                    original: self.is_returning_user.map(|b| b.to_string()),
                    new: flag.to_string(),
                });
                self.is_returning_user = Some(flag);
            }
        }
        merge_text(
            &mut self.used_template_id,
            &update.used_template_id,
            "used_template_id",
            &mut changes,
        );

        if !changes.is_empty() {
            self.updated_at = Utc::now();
        }
        Ok(changes)
    }

    pub fn view(&self) -> DiscoveryView {
        DiscoveryView {
            discovery: self.clone(),
            stage_number: self.stage.number(),
            total_stages: Stage::visible_count(),
        }
    }
}

fn merge_text(
    slot: &mut Option<String>,
    incoming: &Option<String>,
    field: &'static str,
    changes: &mut Vec<FieldChange>,
) {
    let Some(value) = incoming else {
        return;
    };
    if slot.as_deref() == Some(value.as_str()) {
        return;
    }
    changes.push(FieldChange {
        field,
        original: slot.clone(),
        new: value.clone(),
    });
    *slot = Some(value.clone());
}

/// A single field overwritten by [`Discovery::apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: &'static str,
    pub original: Option<String>,
    pub new: String,
}

/// Partial update of the free-form discovery fields. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryUpdate {
    #[serde(default)]
    pub business_context: Option<String>,
    #[serde(default)]
    pub problem_statement: Option<String>,
    #[serde(default)]
    pub goals: Option<Vec<String>>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub solves_statement: Option<String>,
    #[serde(default)]
    pub is_returning_user: Option<bool>,
    #[serde(default)]
    pub used_template_id: Option<String>,
}

impl DiscoveryUpdate {
    pub fn is_empty(&self) -> bool {
        *self == DiscoveryUpdate::default()
    }
}

/// Discovery plus progress fields for API responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryView {
    #[serde(flatten)]
    pub discovery: Discovery,
    pub stage_number: usize,
    pub total_stages: usize,
}

// ---------------------------------------------------------------------------
// Personas
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryUser {
    pub id: String,
    pub discovery_id: String,
    pub description: String,
    #[serde(rename = "count")]
    pub user_count: u32,
    pub has_permissions: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "count")]
    pub user_count: u32,
    #[serde(default)]
    pub has_permissions: bool,
    #[serde(default)]
    pub permission_notes: Option<String>,
}

impl NewUser {
    pub fn into_user(self, discovery_id: &str) -> Result<DiscoveryUser> {
        let description = self.description.trim();
        if description.is_empty() {
            return Err(ForgeError::Validation("description is required".to_string()));
        }
        Ok(DiscoveryUser {
            id: Uuid::new_v4().to_string(),
            discovery_id: discovery_id.to_string(),
            description: description.to_string(),
            user_count: self.user_count,
            has_permissions: self.has_permissions,
            permission_notes: self.permission_notes.filter(|n| !n.trim().is_empty()),
            created_at: Utc::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryFeature {
    pub id: String,
    pub discovery_id: String,
    pub name: String,
    pub priority: i32,
    pub version: String,
    pub created_at: DateTime<Utc>,
}

impl DiscoveryFeature {
    pub fn is_mvp(&self) -> bool {
        is_mvp_version(&self.version)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFeature {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub version: Option<String>,
}

impl NewFeature {
    pub fn into_feature(self, discovery_id: &str) -> Result<DiscoveryFeature> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ForgeError::Validation("name is required".to_string()));
        }
        let version = self
            .version
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| MVP_VERSION.to_string());
        Ok(DiscoveryFeature {
            id: Uuid::new_v4().to_string(),
            discovery_id: discovery_id.to_string(),
            name: name.to_string(),
            priority: self.priority,
            version,
            created_at: Utc::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// Edit history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryEditHistory {
    pub id: String,
    pub discovery_id: String,
    pub stage: Stage,
    pub field_edited: String,
    pub original_value: String,
    pub new_value: String,
    pub edited_at: DateTime<Utc>,
}

impl DiscoveryEditHistory {
    pub fn record(discovery: &Discovery, field: &str, original: &str, new: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            discovery_id: discovery.id.clone(),
            stage: discovery.stage,
            field_edited: field.to_string(),
            original_value: original.to_string(),
            new_value: new.to_string(),
            edited_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Read model shown before confirmation. Never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverySummary {
    pub project_name: String,
    pub solves_statement: String,
    pub users: Vec<DiscoveryUser>,
    pub mvp_features: Vec<DiscoveryFeature>,
    pub future_features: Vec<DiscoveryFeature>,
}

impl DiscoverySummary {
    /// Split features by version tag. MVP features sort by priority, future
    /// features by version then priority.
    pub fn build(
        discovery: &Discovery,
        mut users: Vec<DiscoveryUser>,
        features: Vec<DiscoveryFeature>,
    ) -> Self {
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let (mut mvp_features, mut future_features): (Vec<_>, Vec<_>) =
            features.into_iter().partition(DiscoveryFeature::is_mvp);
        mvp_features.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        future_features.sort_by(|a, b| {
            a.version
                .cmp(&b.version)
                .then(a.priority.cmp(&b.priority))
                .then(a.created_at.cmp(&b.created_at))
        });
        Self {
            project_name: discovery.project_name.clone().unwrap_or_default(),
            solves_statement: discovery.solves_statement.clone().unwrap_or_default(),
            users,
            mvp_features,
            future_features,
        }
    }

    pub fn feature(&self, feature_id: &str) -> Option<&DiscoveryFeature> {
        self.mvp_features
            .iter()
            .chain(self.future_features.iter())
            .find(|f| f.id == feature_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

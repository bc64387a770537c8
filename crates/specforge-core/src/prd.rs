use crate::error::{ForgeError, Result};
use crate::generation::GeneratedContent;
use crate::types::{is_mvp_version, PrdStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Content sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStory {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub as_a: String,
    #[serde(default)]
    pub i_want: String,
    #[serde(default)]
    pub so_that: String,
    /// must / should / could
    #[serde(default)]
    pub priority: String,
    /// low / medium / high
    #[serde(default)]
    pub complexity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptanceCriterion {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub given: String,
    #[serde(default)]
    pub when: String,
    #[serde(default)]
    pub then: String,
    #[serde(default)]
    pub user_story_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalNote {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

// ---------------------------------------------------------------------------
// Prd
// ---------------------------------------------------------------------------

/// Requirement document for exactly one discovery feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prd {
    pub id: String,
    pub discovery_id: String,
    pub feature_id: String,
    pub project_id: String,

    pub title: String,
    #[serde(default)]
    pub overview: String,
    pub version: String,
    pub priority: i32,

    #[serde(default)]
    pub user_stories: Vec<UserStory>,
    #[serde(default)]
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
    #[serde(default)]
    pub technical_notes: Vec<TechnicalNote>,

    pub status: PrdStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub generation_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Arguments for creating a PRD.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPrd {
    pub discovery_id: String,
    pub feature_id: String,
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub overview: String,
    pub version: String,
    #[serde(default)]
    pub priority: i32,
}

impl Prd {
    pub fn new(new: NewPrd) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            discovery_id: new.discovery_id,
            feature_id: new.feature_id,
            project_id: new.project_id,
            title: new.title,
            overview: new.overview,
            version: new.version,
            priority: new.priority,
            user_stories: Vec::new(),
            acceptance_criteria: Vec::new(),
            technical_notes: Vec::new(),
            status: PrdStatus::Pending,
            generated_at: None,
            approved_at: None,
            started_at: None,
            completed_at: None,
            generation_attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_mvp(&self) -> bool {
        is_mvp_version(&self.version)
    }

    pub fn is_active(&self) -> bool {
        self.status == PrdStatus::InProgress
    }

    /// Move along the transition table, stamping the timestamp that belongs
    /// to the target status. Timestamps are written once and never cleared.
    pub fn transition(&mut self, target: PrdStatus) -> Result<()> {
        self.ensure_transition(target)?;
        let now = Utc::now();
        let stamp = match target {
            PrdStatus::Draft => Some(&mut self.generated_at),
            PrdStatus::Ready => Some(&mut self.approved_at),
            PrdStatus::InProgress => Some(&mut self.started_at),
            PrdStatus::Complete => Some(&mut self.completed_at),
            PrdStatus::Pending => None,
        };
        if let Some(slot) = stamp {
            slot.get_or_insert(now);
        }
        self.status = target;
        self.updated_at = now;
        Ok(())
    }

    /// Fails with `InvalidStatusChange` when `target` is not reachable from
    /// the current status.
    pub fn ensure_transition(&self, target: PrdStatus) -> Result<()> {
        if self.status.can_transition_to(target) {
            return Ok(());
        }
        let allowed = self.status.allowed_next();
        let reason = if allowed.is_empty() {
            format!("{} is terminal", self.status)
        } else {
            let names: Vec<_> = allowed.iter().map(|s| s.as_str()).collect();
            format!("{} can only move to {}", self.status, names.join(", "))
        };
        Err(ForgeError::InvalidStatusChange {
            from: self.status.to_string(),
            to: target.to_string(),
            reason,
        })
    }

    /// Content edits are only allowed on drafts.
    pub fn ensure_editable(&self) -> Result<()> {
        if self.status != PrdStatus::Draft {
            return Err(ForgeError::InvalidStatusChange {
                from: self.status.to_string(),
                to: PrdStatus::Draft.to_string(),
                reason: "can only edit draft PRDs".to_string(),
            });
        }
        Ok(())
    }

    /// Store generated sections and move to `draft`.
    pub fn accept_generated(&mut self, content: GeneratedContent) -> Result<()> {
        self.transition(PrdStatus::Draft)?;
        self.overview = content.overview;
        self.user_stories = content.user_stories;
        self.acceptance_criteria = content.acceptance_criteria;
        self.technical_notes = content.technical_notes;
        self.last_error = None;
        Ok(())
    }

    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
        self.updated_at = Utc::now();
    }

    pub fn apply_content(&mut self, update: PrdContentUpdate) -> Result<()> {
        self.ensure_editable()?;
        if let Some(title) = update.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(ForgeError::Validation("title cannot be empty".to_string()));
            }
            self.title = title;
        }
        if let Some(overview) = update.overview {
            self.overview = overview;
        }
        if let Some(stories) = update.user_stories {
            self.user_stories = stories;
        }
        if let Some(criteria) = update.acceptance_criteria {
            self.acceptance_criteria = criteria;
        }
        if let Some(notes) = update.technical_notes {
            self.technical_notes = notes;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Append a story, numbering it `US-NNN` when no id is given.
    pub fn add_user_story(&mut self, mut story: UserStory) -> Result<UserStory> {
        self.ensure_editable()?;
        if story.id.trim().is_empty() {
            story.id = format!("US-{:03}", self.user_stories.len() + 1);
        }
        self.user_stories.push(story.clone());
        self.updated_at = Utc::now();
        Ok(story)
    }

    pub fn replace_user_story(&mut self, story_id: &str, mut story: UserStory) -> Result<UserStory> {
        self.ensure_editable()?;
        let slot = self
            .user_stories
            .iter_mut()
            .find(|s| s.id == story_id)
            .ok_or_else(|| ForgeError::UserStoryNotFound(story_id.to_string()))?;
        story.id = story_id.to_string();
        *slot = story.clone();
        self.updated_at = Utc::now();
        Ok(story)
    }

    pub fn remove_user_story(&mut self, story_id: &str) -> Result<()> {
        self.ensure_editable()?;
        let before = self.user_stories.len();
        self.user_stories.retain(|s| s.id != story_id);
        if self.user_stories.len() == before {
            return Err(ForgeError::UserStoryNotFound(story_id.to_string()));
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn reference(&self) -> PrdReference {
        PrdReference {
            id: self.id.clone(),
            title: self.title.clone(),
            status: self.status,
            priority: self.priority,
            version: self.version.clone(),
            is_mvp: self.is_mvp(),
        }
    }

    pub fn view(&self) -> PrdView {
        PrdView {
            prd: self.clone(),
            is_mvp: self.is_mvp(),
        }
    }
}

/// Ordering used by every PRD listing: version, priority, creation.
pub fn sort_prds(prds: &mut [Prd]) {
    prds.sort_by(|a, b| {
        a.version
            .cmp(&b.version)
            .then(a.priority.cmp(&b.priority))
            .then(a.created_at.cmp(&b.created_at))
    });
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrdContentUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub user_stories: Option<Vec<UserStory>>,
    #[serde(default)]
    pub acceptance_criteria: Option<Vec<AcceptanceCriterion>>,
    #[serde(default)]
    pub technical_notes: Option<Vec<TechnicalNote>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrdReference {
    pub id: String,
    pub title: String,
    pub status: PrdStatus,
    pub priority: i32,
    pub version: String,
    pub is_mvp: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrdView {
    #[serde(flatten)]
    pub prd: Prd,
    pub is_mvp: bool,
}

/// Response shape for project PRD listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrdList {
    pub prds: Vec<PrdReference>,
    pub total_count: usize,
    pub mvp_count: usize,
}

impl PrdList {
    pub fn from_prds(prds: &[Prd]) -> Self {
        Self {
            prds: prds.iter().map(Prd::reference).collect(),
            total_count: prds.len(),
            mvp_count: prds.iter().filter(|p| p.is_mvp()).count(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! PRD content generation: request building, prompt rendering, response
//! parsing, and the [`Generator`] seam the language-model client plugs into.

use crate::discovery::{DiscoveryFeature, DiscoveryUser};
use crate::prd::{AcceptanceCriterion, TechnicalNote, UserStory};
use crate::types::is_mvp_version;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;
use thiserror::Error;

pub const SYSTEM_PROMPT: &str = "You are a Product Manager. Output only valid JSON.";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("generation failed: {0}")]
    Failed(String),

    #[error("malformed generation response: {0}")]
    Malformed(String),
}

/// Produces raw PRD text for a request. Implementations block; callers run
/// them off the async runtime.
pub trait Generator: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Generator used when no model client is configured. Every attempt fails,
/// so PRDs stay pending with a recorded error.
pub struct UnconfiguredGenerator;

impl Generator for UnconfiguredGenerator {
    fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
        Err(GenerationError::Failed(
            "no generator configured (set CLAUDE_API_KEY)".to_string(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prd_id: String,
    pub feature_name: String,
    pub version: String,
    pub priority: i32,
    pub project_name: String,
    pub problem_statement: String,
    pub users: Vec<DiscoveryUser>,
    /// Other features of the same discovery, for context.
    pub related_features: Vec<DiscoveryFeature>,
}

impl GenerationRequest {
    pub fn is_mvp(&self) -> bool {
        is_mvp_version(&self.version)
    }

    /// Full prompt for MVP features, a short overview-only prompt otherwise.
    pub fn prompt(&self) -> String {
        if self.is_mvp() {
            self.full_prompt()
        } else {
            self.lightweight_prompt()
        }
    }

    fn context_header(&self, out: &mut String, lead: &str) {
        let _ = writeln!(out, "{lead}\n");
        let _ = writeln!(out, "## Project Context");
        let _ = writeln!(out, "Project: {}", self.project_name);
        let _ = writeln!(out, "Problem Statement: {}", self.problem_statement);
    }

    fn feature_block(&self, out: &mut String) {
        let _ = writeln!(out, "\n## Feature to Document");
        let _ = writeln!(out, "Feature: {}", self.feature_name);
        let _ = writeln!(out, "Version: {}", self.version);
        let _ = writeln!(out, "Priority: {}", self.priority);
    }

    fn full_prompt(&self) -> String {
        let mut out = String::new();
        self.context_header(
            &mut out,
            "You are a Product Manager creating a PRD for a specific feature.",
        );
        let _ = writeln!(out, "Target Users:");
        for user in &self.users {
            let perms = if user.has_permissions {
                ", elevated permissions"
            } else {
                ""
            };
            let _ = writeln!(
                out,
                "- {} ({} users{perms})",
                user.description, user.user_count
            );
        }
        self.feature_block(&mut out);

        let _ = writeln!(out, "\n## Related Features (for context)");
        for feature in &self.related_features {
            let _ = writeln!(
                out,
                "- {} ({}, Priority {})",
                feature.name, feature.version, feature.priority
            );
        }

        out.push_str(FULL_INSTRUCTIONS);
        out
    }

    fn lightweight_prompt(&self) -> String {
        let mut out = String::new();
        self.context_header(
            &mut out,
            "You are a Product Manager creating a brief PRD for a future feature.",
        );
        self.feature_block(&mut out);
        out.push_str(LIGHTWEIGHT_INSTRUCTIONS);
        out
    }
}

const FULL_INSTRUCTIONS: &str = r#"
## Instructions
Create a PRD for this feature with the following structure:

1. **Overview** (2-3 sentences): what this feature does and why it matters to users.

2. **User Stories** (3-5 stories). For each story provide:
   - ID (US-001, US-002, etc.)
   - As a [user type], I want [action], so that [benefit]
   - Priority: must/should/could
   - Complexity: low/medium/high

3. **Acceptance Criteria** (Gherkin format), 2-3 per user story:
   - ID (AC-001, AC-002, etc.)
   - Given [precondition]
   - When [action]
   - Then [expected result]

4. **Technical Notes**: data considerations, UI/UX notes, integration points.

Output as JSON matching this structure:
{
  "overview": "string",
  "userStories": [
    {"id": "US-001", "asA": "user type", "iWant": "action", "soThat": "benefit", "priority": "must", "complexity": "low"}
  ],
  "acceptanceCriteria": [
    {"id": "AC-001", "given": "precondition", "when": "action", "then": "expected result", "userStoryId": "US-001"}
  ],
  "technicalNotes": [
    {"category": "data", "title": "title", "description": "description", "suggestions": ["suggestion"]}
  ]
}

IMPORTANT: Output ONLY the JSON object. No markdown code blocks, no additional text.
"#;

const LIGHTWEIGHT_INSTRUCTIONS: &str = r#"
## Instructions
Create a brief overview for this future feature. Just 2-3 sentences describing
what it will do, why it matters to users, and key considerations for later.

Output as JSON matching this structure:
{
  "overview": "string",
  "userStories": [],
  "acceptanceCriteria": [],
  "technicalNotes": []
}

IMPORTANT: Output ONLY the JSON object. No markdown code blocks, no additional text.
"#;

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedContent {
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub user_stories: Vec<UserStory>,
    #[serde(default)]
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
    #[serde(default)]
    pub technical_notes: Vec<TechnicalNote>,
}

/// Parse model output, tolerating a surrounding markdown code fence.
pub fn parse_generated(raw: &str) -> Result<GeneratedContent, GenerationError> {
    let body = strip_fence(raw);
    let content: GeneratedContent = serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        GenerationError::Malformed(format!("{e} (response starts: {preview:?})"))
    })?;
    if content.overview.trim().is_empty() {
        return Err(GenerationError::Malformed(
            "response has no overview".to_string(),
        ));
    }
    Ok(content)
}

fn strip_fence(raw: &str) -> &str {
    let s = raw.trim();
    let s = s
        .strip_prefix("```json")
        .or_else(|| s.strip_prefix("```"))
        .unwrap_or(s);
    let s = s.strip_suffix("```").unwrap_or(s);
    s.trim()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

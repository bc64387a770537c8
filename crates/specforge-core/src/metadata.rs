//! Structured data embedded in assistant replies as
//! `<!--DISCOVERY_DATA:{...}-->`.
//!
//! The payload is loosely typed: fields of the wrong type are skipped rather
//! than rejected, and an unparseable payload is treated as absent.

use crate::discovery::{DiscoveryUpdate, NewFeature, NewUser};
use crate::types::MVP_VERSION;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

const FUTURE_VERSION: &str = "v2";

fn marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<!--DISCOVERY_DATA:(.+?)-->").expect("metadata pattern is valid")
    })
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryMetadata {
    pub stage_complete: bool,
    pub extracted: ExtractedData,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractedData {
    pub update: DiscoveryUpdate,
    pub users: Vec<NewUser>,
    pub features: Vec<NewFeature>,
}

impl ExtractedData {
    pub fn is_empty(&self) -> bool {
        self.update.is_empty() && self.users.is_empty() && self.features.is_empty()
    }
}

/// Find and decode the first metadata marker. `None` when there is no
/// marker or its payload is not a JSON object.
pub fn parse(response: &str) -> Option<DiscoveryMetadata> {
    let raw = marker().captures(response)?.get(1)?.as_str().trim();
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring malformed discovery metadata");
            return None;
        }
    };
    let obj = value.as_object()?;
    Some(DiscoveryMetadata {
        stage_complete: obj
            .get("stage_complete")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        extracted: obj
            .get("extracted")
            .and_then(Value::as_object)
            .map(extract)
            .unwrap_or_default(),
    })
}

/// Remove every metadata marker, leaving the text shown to the user.
pub fn strip(response: &str) -> String {
    marker().replace_all(response, "").trim().to_string()
}

fn extract(obj: &Map<String, Value>) -> ExtractedData {
    let summary = obj.get("summary").and_then(Value::as_object);
    let nested = |key: &str| text(obj, key).or_else(|| summary.and_then(|s| text(s, key)));

    let goals: Vec<String> = obj
        .get("goals")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let update = DiscoveryUpdate {
        business_context: text(obj, "business_context"),
        problem_statement: text(obj, "problem_statement"),
        goals: (!goals.is_empty()).then_some(goals),
        project_name: nested("project_name"),
        solves_statement: nested("solves_statement"),
        ..Default::default()
    };

    let users = objects(obj, "users")
        .filter_map(|u| {
            let description = text(u, "description")?;
            Some(NewUser {
                description,
                user_count: u
                    .get("count")
                    .and_then(Value::as_f64)
                    .map(|c| c.max(0.0) as u32)
                    .unwrap_or(0),
                has_permissions: u
                    .get("has_permissions")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                permission_notes: text(u, "permission_notes"),
            })
        })
        .collect::<Vec<_>>();

    let mut features = Vec::new();
    for (i, f) in objects(obj, "mvp_features").enumerate() {
        let Some(name) = text(f, "name") else { continue };
        let priority = f
            .get("priority")
            .and_then(Value::as_f64)
            .map(|p| p as i32)
            .unwrap_or(i as i32 + 1);
        features.push(NewFeature {
            name,
            priority,
            version: Some(MVP_VERSION.to_string()),
        });
    }
    for (i, f) in objects(obj, "future_features").enumerate() {
        let Some(name) = text(f, "name") else { continue };
        features.push(NewFeature {
            name,
            priority: i as i32 + 1,
            version: Some(text(f, "version").unwrap_or_else(|| FUTURE_VERSION.to_string())),
        });
    }

    ExtractedData {
        update,
        users,
        features,
    }
}

fn text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn objects<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
) -> impl Iterator<Item = &'a Map<String, Value>> {
    obj.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_marker_means_no_metadata() {
        assert!(parse("Tell me about your business.").is_none());
    }

    #[test]
    fn malformed_payload_is_ignored() {
        assert!(parse("hi <!--DISCOVERY_DATA:{not json}-->").is_none());
    }

    #[test]
    fn strips_marker_for_display() {
        let reply = "Great, thanks!\n<!--DISCOVERY_DATA:{\"stage_complete\":true}-->";
        assert_eq!(strip(reply), "Great, thanks!");
    }

    #[test]
    fn extracts_problem_fields_and_goals() {
        let reply = r#"Got it. <!--DISCOVERY_DATA:{"stage_complete":true,"extracted":{"business_context":"bakery","problem_statement":"orders get lost","goals":["track orders",3,"cut waste"]}}-->"#;
        let meta = parse(reply).unwrap();
        assert!(meta.stage_complete);
        let update = &meta.extracted.update;
        assert_eq!(update.business_context.as_deref(), Some("bakery"));
        assert_eq!(update.problem_statement.as_deref(), Some("orders get lost"));
        assert_eq!(
            update.goals.as_deref(),
            Some(&["track orders".to_string(), "cut waste".to_string()][..])
        );
    }

    #[test]
    fn summary_fields_may_be_nested() {
        let reply = r#"<!--DISCOVERY_DATA:{"extracted":{"summary":{"project_name":"OrderBook","solves_statement":"no lost orders"}}}-->"#;
        let update = parse(reply).unwrap().extracted.update;
        assert_eq!(update.project_name.as_deref(), Some("OrderBook"));
        assert_eq!(update.solves_statement.as_deref(), Some("no lost orders"));
    }

    #[test]
    fn users_without_description_are_dropped() {
        let reply = r#"<!--DISCOVERY_DATA:{"extracted":{"users":[{"description":"Bakers","count":4,"has_permissions":true,"permission_notes":"admin"},{"count":2}]}}-->"#;
        let users = parse(reply).unwrap().extracted.users;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].description, "Bakers");
        assert_eq!(users[0].user_count, 4);
        assert!(users[0].has_permissions);
        assert_eq!(users[0].permission_notes.as_deref(), Some("admin"));
    }

    #[test]
    fn feature_versions_and_priorities_default_by_position() {
        let reply = r#"<!--DISCOVERY_DATA:{"extracted":{"mvp_features":[{"name":"Orders"},{"name":"Stock","priority":7},{"priority":1}],"future_features":[{"name":"Loyalty"},{"name":"Delivery","version":"v3"}]}}-->"#;
        let features = parse(reply).unwrap().extracted.features;
        let summary: Vec<_> = features
            .iter()
            .map(|f| (f.name.as_str(), f.priority, f.version.as_deref().unwrap()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Orders", 1, "v1"),
                ("Stock", 7, "v1"),
                ("Loyalty", 1, "v2"),
                ("Delivery", 2, "v3"),
            ]
        );
    }

    #[test]
    fn stage_complete_alone_has_empty_extraction() {
        let meta = parse("<!--DISCOVERY_DATA:{\"stage_complete\":true}-->").unwrap();
        assert!(meta.stage_complete);
        assert!(meta.extracted.is_empty());
    }
}

//! Source provenance for entities and relationships.
//!
//! Every created entity or relationship must carry at least one
//! [`ProvenanceRecord`]. Records are persisted as `Source` nodes keyed by a
//! stable fingerprint of (origin system, origin identifier), so the same
//! Jira issue cited twice resolves to one source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProvenanceError;

/// The external system a piece of data came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Jira,
    Confluence,
    Slack,
    Teams,
    TeamsMeeting,
    Email,
    Github,
    Gitlab,
    Jenkins,
    Salesforce,
    Zendesk,
    Sharepoint,
    Ldap,
    Spreadsheet,
    Database,
    UserInput,
    /// Inferred by a language model.
    Llm,
    Other,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Jira => "jira",
            SourceKind::Confluence => "confluence",
            SourceKind::Slack => "slack",
            SourceKind::Teams => "teams",
            SourceKind::TeamsMeeting => "teams_meeting",
            SourceKind::Email => "email",
            SourceKind::Github => "github",
            SourceKind::Gitlab => "gitlab",
            SourceKind::Jenkins => "jenkins",
            SourceKind::Salesforce => "salesforce",
            SourceKind::Zendesk => "zendesk",
            SourceKind::Sharepoint => "sharepoint",
            SourceKind::Ldap => "ldap",
            SourceKind::Spreadsheet => "spreadsheet",
            SourceKind::Database => "database",
            SourceKind::UserInput => "user_input",
            SourceKind::Llm => "llm",
            SourceKind::Other => "other",
        }
    }

    /// Map a URI scheme to a source kind. Unknown schemes map to `Other`.
    pub fn from_scheme(scheme: &str) -> Self {
        match scheme.to_ascii_lowercase().as_str() {
            "jira" => SourceKind::Jira,
            "confluence" => SourceKind::Confluence,
            "slack" => SourceKind::Slack,
            "teams" => SourceKind::Teams,
            "teams_meeting" => SourceKind::TeamsMeeting,
            "email" | "mailto" => SourceKind::Email,
            "github" => SourceKind::Github,
            "gitlab" => SourceKind::Gitlab,
            "jenkins" => SourceKind::Jenkins,
            "salesforce" => SourceKind::Salesforce,
            "zendesk" => SourceKind::Zendesk,
            "sharepoint" => SourceKind::Sharepoint,
            "ldap" => SourceKind::Ldap,
            "spreadsheet" => SourceKind::Spreadsheet,
            "database" => SourceKind::Database,
            "user_input" | "user" => SourceKind::UserInput,
            "llm" => SourceKind::Llm,
            _ => SourceKind::Other,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identifier of a source: hex blake3 of `origin \0 origin_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey(pub String);

impl std::fmt::Display for SourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One reference to the origin of an entity or relationship.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProvenanceRecord {
    pub origin: SourceKind,
    pub origin_id: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl ProvenanceRecord {
    pub fn new(origin: SourceKind, origin_id: impl Into<String>) -> Self {
        Self {
            origin,
            origin_id: origin_id.into(),
            timestamp: Utc::now(),
            url: None,
            confidence: default_confidence(),
        }
    }

    /// Parse a source URI such as `jira://company.atlassian.net/browse/PROJ-123`.
    ///
    /// The scheme selects the origin system and everything after `://` is the
    /// origin identifier. The URI itself is kept as the record's url.
    pub fn from_uri(uri: &str) -> Result<Self, ProvenanceError> {
        let uri = uri.trim();
        let (scheme, rest) = uri
            .split_once("://")
            .or_else(|| uri.split_once(':').filter(|(s, _)| *s == "mailto"))
            .ok_or_else(|| ProvenanceError::InvalidUri {
                uri: uri.to_string(),
            })?;
        if scheme.is_empty() || rest.trim().is_empty() {
            return Err(ProvenanceError::InvalidUri {
                uri: uri.to_string(),
            });
        }

        let mut record = Self::new(SourceKind::from_scheme(scheme), rest.trim());
        record.url = Some(uri.to_string());
        Ok(record)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Stable fingerprint used as the `Source` node key.
    pub fn key(&self) -> SourceKey {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.origin.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(self.origin_id.as_bytes());
        SourceKey(hasher.finalize().to_hex().to_string())
    }

    pub fn validate(&self) -> Result<(), ProvenanceError> {
        if self.origin_id.trim().is_empty() {
            return Err(ProvenanceError::Invalid(format!(
                "{} source has an empty identifier",
                self.origin
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ProvenanceError::Invalid(format!(
                "confidence {} is outside 0.0..=1.0",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// Enforce the provenance gate for one record type.
///
/// Fails with [`ProvenanceError::Missing`] on an empty list, validates every
/// record, and drops duplicates that share a key (first one wins).
pub fn require_provenance(
    type_name: &str,
    records: Vec<ProvenanceRecord>,
) -> Result<Vec<ProvenanceRecord>, ProvenanceError> {
    if records.is_empty() {
        return Err(ProvenanceError::Missing {
            type_name: type_name.to_string(),
        });
    }

    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::with_capacity(records.len());
    for record in records {
        record.validate()?;
        if seen.insert(record.key()) {
            unique.push(record);
        }
    }
    Ok(unique)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_scheme_selects_origin() {
        let rec = ProvenanceRecord::from_uri("jira://company.atlassian.net/browse/PROJ-123").unwrap();
        assert_eq!(rec.origin, SourceKind::Jira);
        assert_eq!(rec.origin_id, "company.atlassian.net/browse/PROJ-123");
        assert_eq!(
            rec.url.as_deref(),
            Some("jira://company.atlassian.net/browse/PROJ-123")
        );

        let rec = ProvenanceRecord::from_uri("mailto:alice@company.com").unwrap();
        assert_eq!(rec.origin, SourceKind::Email);

        let rec = ProvenanceRecord::from_uri("notion://page/1").unwrap();
        assert_eq!(rec.origin, SourceKind::Other);
    }

    #[test]
    fn malformed_uris_are_rejected() {
        assert!(ProvenanceRecord::from_uri("no scheme here").is_err());
        assert!(ProvenanceRecord::from_uri("jira://").is_err());
        assert!(ProvenanceRecord::from_uri("://x").is_err());
    }

    #[test]
    fn key_is_stable_and_ignores_timestamp() {
        let a = ProvenanceRecord::new(SourceKind::Slack, "C123/p456");
        let mut b = a.clone();
        b.timestamp = Utc::now() + chrono::TimeDelta::try_hours(1).unwrap();
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), ProvenanceRecord::new(SourceKind::Teams, "C123/p456").key());
        assert_eq!(a.key().0.len(), 64);
    }

    #[test]
    fn empty_provenance_is_missing() {
        let err = require_provenance("Person", Vec::new()).unwrap_err();
        assert_eq!(
            err,
            ProvenanceError::Missing {
                type_name: "Person".into()
            }
        );
        assert_eq!(err.to_string(), "Person requires at least one source");
    }

    #[test]
    fn duplicates_collapse_and_invalid_records_fail() {
        let rec = ProvenanceRecord::new(SourceKind::Github, "org/repo#1");
        let out = require_provenance("Team", vec![rec.clone(), rec]).unwrap();
        assert_eq!(out.len(), 1);

        let bad = ProvenanceRecord::new(SourceKind::Github, "x").with_confidence(1.5);
        assert!(require_provenance("Team", vec![bad]).is_err());
        let blank = ProvenanceRecord::new(SourceKind::Github, "  ");
        assert!(require_provenance("Team", vec![blank]).is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let rec: ProvenanceRecord =
            serde_json::from_str(r#"{"origin":"confluence","origin_id":"pages/1"}"#).unwrap();
        assert_eq!(rec.origin, SourceKind::Confluence);
        assert_eq!(rec.confidence, 1.0);
        assert!(rec.url.is_none());
    }
}

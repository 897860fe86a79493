//! Built-in catalog of entity and relationship types.
//!
//! Every type is registered explicitly here. Confluence content types share
//! a common field block and the `Confluence:<Kind>` label scheme through
//! [`confluence_entity`].

use crate::error::SchemaError;
use crate::schema::{EntityTypeDescriptor, FieldSpec, RelationshipTypeDescriptor, SchemaRegistry};

pub const EMAIL_PATTERN: &str = r"^[\w.+-]+@[\w.-]+\.\w+$";

pub const PROJECT_STATUSES: &[&str] = &["planning", "active", "on_hold", "completed", "cancelled"];

pub const ACCOUNT_SERVICES: &[&str] = &[
    "confluence",
    "jira",
    "github",
    "gitlab",
    "ms_teams",
    "slack",
    "email",
    "salesforce",
    "zendesk",
    "other",
];

/// Build the registry with every built-in type.
pub fn builtin() -> Result<SchemaRegistry, SchemaError> {
    SchemaRegistry::builder()
        .entity(person())
        .entity(account())
        .entity(team())
        .entity(project())
        .entity(confluence_space())
        .entity(confluence_page())
        .entity(confluence_comment())
        .entity(confluence_attachment())
        .relationship(works_on())
        .relationship(belongs_to())
        .relationship(manages())
        .relationship(has_account())
        .relationship(authored())
        .relationship(modified())
        .relationship(parent_of())
        .relationship(has_attachment())
        .relationship(mentioned_in())
        .build()
}

// ── Entities ──────────────────────────────────────────────────────

pub fn person() -> EntityTypeDescriptor {
    EntityTypeDescriptor::new("Person")
        .describe("An individual team member or stakeholder")
        .field(
            FieldSpec::string("email")
                .primary()
                .lowercase()
                .pattern(EMAIL_PATTERN)
                .describe("Email address (unique identifier)"),
        )
        .field(
            FieldSpec::string("name")
                .required()
                .indexed()
                .trim()
                .length(1, 100)
                .describe("Full name"),
        )
        .field(
            FieldSpec::string("title")
                .indexed()
                .trim()
                .max_length(100)
                .describe("Job title"),
        )
        .field(FieldSpec::string("phone").trim().describe("Contact phone number"))
        .field(FieldSpec::date("hire_date").describe("Date of hire"))
        .field(
            FieldSpec::string("department")
                .indexed()
                .trim()
                .default_value("")
                .describe("Department name"),
        )
        .field(
            FieldSpec::string("primary_location")
                .indexed()
                .trim()
                .default_value("")
                .describe("Primary office location"),
        )
        .field(
            FieldSpec::string("employee_id")
                .unique()
                .trim()
                .describe("Employee ID number"),
        )
}

/// Accounts have no single lookup key: `account_id` is optional and only
/// unique when present.
pub fn account() -> EntityTypeDescriptor {
    EntityTypeDescriptor::new("Account")
        .describe("A user account on an external service, owned by a Person")
        .field(
            FieldSpec::string("username")
                .required()
                .indexed()
                .trim()
                .describe("Username on the service"),
        )
        .field(
            FieldSpec::string("email")
                .required()
                .indexed()
                .lowercase()
                .pattern(EMAIL_PATTERN)
                .describe("Email associated with the account"),
        )
        .field(
            FieldSpec::choice("service", ACCOUNT_SERVICES)
                .required()
                .describe("Service type"),
        )
        .field(FieldSpec::string("display_name").trim().default_value(""))
        .field(FieldSpec::string("avatar_url").default_value(""))
        .field(FieldSpec::string("profile_url"))
        .field(FieldSpec::datetime("last_active"))
        .field(
            FieldSpec::string("account_id")
                .unique()
                .describe("Service-specific ID"),
        )
        .field(FieldSpec::boolean("is_primary").default_value(false))
}

pub fn team() -> EntityTypeDescriptor {
    EntityTypeDescriptor::new("Team")
        .describe("A group of people working together")
        .field(
            FieldSpec::string("name")
                .primary()
                .trim()
                .length(1, 100)
                .describe("Team name (unique identifier)"),
        )
        .field(FieldSpec::string("description").max_length(500))
        .field(FieldSpec::string("department").indexed().trim())
        .field(FieldSpec::date("formation_date"))
}

pub fn project() -> EntityTypeDescriptor {
    EntityTypeDescriptor::new("Project")
        .describe("A business initiative")
        .field(
            FieldSpec::string("name")
                .primary()
                .trim()
                .length(1, 200)
                .describe("Project name (unique identifier)"),
        )
        .field(FieldSpec::string("description").max_length(2000))
        .field(FieldSpec::date("start_date"))
        .field(FieldSpec::date("end_date"))
        .field(
            FieldSpec::float("budget")
                .range(0.0, f64::MAX)
                .describe("Project budget"),
        )
        .field(
            FieldSpec::choice("status", PROJECT_STATUSES)
                .indexed()
                .lowercase()
                .default_value("planning")
                .describe("Current project status"),
        )
}

/// Shared shape of Confluence content: labels `Confluence:<kind>`, keyed by
/// Confluence's own id.
pub fn confluence_entity(type_name: &'static str, kind: &'static str) -> EntityTypeDescriptor {
    EntityTypeDescriptor::new(type_name)
        .labels(&["Confluence", kind])
        .field(
            FieldSpec::string("confluence_id")
                .primary()
                .trim()
                .describe("Confluence's internal ID (unique identifier)"),
        )
        .field(FieldSpec::string("url").required().describe("URL to the entity"))
        .field(
            FieldSpec::string("creator_username")
                .required()
                .indexed()
                .describe("Username of the creator"),
        )
        .field(FieldSpec::datetime("created_at"))
        .field(FieldSpec::datetime("updated_at"))
}

pub fn confluence_space() -> EntityTypeDescriptor {
    confluence_entity("ConfluenceSpace", "Space")
        .describe("A Confluence space")
        .field(FieldSpec::string("key").required().unique().describe("Space key"))
        .field(FieldSpec::string("name").required().indexed().trim())
        .field(FieldSpec::string("description").default_value(""))
        .field(
            FieldSpec::choice("type", &["global", "personal"])
                .indexed()
                .default_value("global"),
        )
        .field(FieldSpec::boolean("is_archived").default_value(false))
}

pub fn confluence_page() -> EntityTypeDescriptor {
    confluence_entity("ConfluencePage", "Page")
        .describe("A Confluence page or document")
        .field(FieldSpec::string("title").required().indexed().trim())
        .field(FieldSpec::string("content").required())
        .field(FieldSpec::string("space_key").required().indexed())
        .field(FieldSpec::integer("version").default_value(1).range(1.0, f64::MAX))
        .field(FieldSpec::string("parent_id").indexed())
        .field(FieldSpec::string("last_modifier_username").indexed())
        .field(FieldSpec::string_list("tags").default_value(serde_json::json!([])))
        .field(FieldSpec::boolean("is_draft").default_value(false))
}

pub fn confluence_comment() -> EntityTypeDescriptor {
    confluence_entity("ConfluenceComment", "Comment")
        .describe("A comment on a Confluence page")
        .field(FieldSpec::string("content").required())
        .field(FieldSpec::string("page_id").required().indexed())
        .field(FieldSpec::string("parent_comment_id").indexed())
}

pub fn confluence_attachment() -> EntityTypeDescriptor {
    confluence_entity("ConfluenceAttachment", "Attachment")
        .describe("A file attached to a Confluence page")
        .field(FieldSpec::string("filename").required().indexed())
        .field(FieldSpec::string("media_type").required().indexed())
        .field(FieldSpec::integer("file_size").required().range(0.0, f64::MAX))
        .field(FieldSpec::string("page_id").required().indexed())
        .field(FieldSpec::string("download_url").required())
}

// ── Relationships ─────────────────────────────────────────────────

pub fn works_on() -> RelationshipTypeDescriptor {
    RelationshipTypeDescriptor::new("WORKS_ON")
        .describe("Person works on a Project")
        .field(FieldSpec::string("role").indexed().trim())
        .field(FieldSpec::date("joined_date"))
        .field(
            FieldSpec::float("allocation_percentage")
                .default_value(100.0)
                .range(0.0, 100.0),
        )
}

pub fn belongs_to() -> RelationshipTypeDescriptor {
    RelationshipTypeDescriptor::new("BELONGS_TO")
        .describe("Person belongs to a Team")
        .field(FieldSpec::string("role").indexed().trim())
        .field(FieldSpec::date("joined_date"))
}

pub fn manages() -> RelationshipTypeDescriptor {
    RelationshipTypeDescriptor::new("MANAGES")
        .describe("Person manages a Team or Project")
        .field(FieldSpec::date("since"))
}

pub fn has_account() -> RelationshipTypeDescriptor {
    RelationshipTypeDescriptor::new("HAS_ACCOUNT")
        .describe("Person owns an Account")
        .field(FieldSpec::boolean("is_primary").indexed().default_value(false))
        .field(FieldSpec::boolean("verified").default_value(false))
}

pub fn authored() -> RelationshipTypeDescriptor {
    RelationshipTypeDescriptor::new("AUTHORED")
        .describe("Content authored by a person")
        .field(FieldSpec::datetime("timestamp"))
}

pub fn modified() -> RelationshipTypeDescriptor {
    RelationshipTypeDescriptor::new("MODIFIED")
        .describe("Content modified by a person")
        .field(FieldSpec::datetime("timestamp"))
        .field(FieldSpec::integer("version").indexed().default_value(1))
}

pub fn parent_of() -> RelationshipTypeDescriptor {
    RelationshipTypeDescriptor::new("PARENT_OF").describe("Parent page or comment of another")
}

pub fn has_attachment() -> RelationshipTypeDescriptor {
    RelationshipTypeDescriptor::new("HAS_ATTACHMENT").describe("Page carries an attachment")
}

pub fn mentioned_in() -> RelationshipTypeDescriptor {
    RelationshipTypeDescriptor::new("MENTIONED_IN")
        .describe("Entity mentioned in content")
        .field(
            FieldSpec::string("context")
                .default_value("")
                .describe("Surrounding text for context"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RecordSchema;

    #[test]
    fn builtin_catalog_builds() {
        let registry = builtin().unwrap();
        assert_eq!(registry.entity_names().len(), 8);
        assert_eq!(registry.relationship_names().len(), 9);
    }

    #[test]
    fn primary_keys_match_lookup_fields() {
        let registry = builtin().unwrap();
        assert_eq!(registry.primary_key_of("Person").unwrap(), "email");
        assert_eq!(registry.primary_key_of("Team").unwrap(), "name");
        assert_eq!(registry.primary_key_of("Project").unwrap(), "name");
        assert_eq!(
            registry.primary_key_of("ConfluencePage").unwrap(),
            "confluence_id"
        );
        assert!(registry.primary_key_of("Account").is_err());
    }

    #[test]
    fn confluence_types_carry_both_labels() {
        let registry = builtin().unwrap();
        let page = registry.lookup("ConfluencePage").unwrap();
        assert_eq!(page.native_labels(), &["Confluence", "Page"]);
        assert!(page.field("creator_username").is_some());
        assert!(page.field("tags").is_some());
    }

    #[test]
    fn every_type_requires_provenance() {
        let registry = builtin().unwrap();
        assert!(registry.entity_types().all(|d| d.requires_provenance()));
        assert!(registry.relationship_types().all(|d| d.requires_provenance()));
    }
}

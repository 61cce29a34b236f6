//! API request/response models for tags.

use crate::db::models::tags::TagDBResponse;
use crate::errors::FieldError;
use crate::types::TagId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const TAG_NAME_MAX_LENGTH: usize = 200;
pub const TAG_SLUG_MAX_LENGTH: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagCreate {
    pub name: String,
    /// Hex color code such as `#49B64E`
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TagUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: TagId,
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl From<TagDBResponse> for TagResponse {
    fn from(db: TagDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            color: db.color,
            slug: db.slug,
        }
    }
}

impl TagCreate {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_name(&self.name, &mut errors);
        check_color(&self.color, &mut errors);
        check_slug(&self.slug, &mut errors);
        errors
    }
}

impl TagUpdate {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if let Some(name) = &self.name {
            check_name(name, &mut errors);
        }
        if let Some(color) = &self.color {
            check_color(color, &mut errors);
        }
        if let Some(slug) = &self.slug {
            check_slug(slug, &mut errors);
        }
        errors
    }
}

fn check_name(name: &str, errors: &mut Vec<FieldError>) {
    if name.trim().is_empty() || name.chars().count() > TAG_NAME_MAX_LENGTH {
        errors.push(FieldError::new("name", format!("must be between 1 and {TAG_NAME_MAX_LENGTH} characters")));
    }
}

fn check_color(color: &str, errors: &mut Vec<FieldError>) {
    if !is_hex_color(color) {
        errors.push(FieldError::new("color", "must be a hex color such as #49B64E"));
    }
}

fn check_slug(slug: &str, errors: &mut Vec<FieldError>) {
    let well_formed = !slug.is_empty()
        && slug.len() <= TAG_SLUG_MAX_LENGTH
        && slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !well_formed {
        errors.push(FieldError::new(
            "slug",
            format!("must be 1 to {TAG_SLUG_MAX_LENGTH} letters, digits, hyphens or underscores"),
        ));
    }
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7 && color.starts_with('#') && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_tag() {
        let tag = TagCreate {
            name: "Завтрак".to_string(),
            color: "#E26C2D".to_string(),
            slug: "breakfast".to_string(),
        };
        assert!(tag.validate().is_empty());
    }

    #[test]
    fn test_invalid_tag_reports_every_field() {
        let tag = TagCreate {
            name: "".to_string(),
            color: "red".to_string(),
            slug: "not a slug".to_string(),
        };
        let fields: Vec<_> = tag.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["name", "color", "slug"]);
    }

    #[test]
    fn test_update_only_checks_present_fields() {
        let update = TagUpdate {
            color: Some("#12345G".to_string()),
            ..Default::default()
        };
        let errors = update.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "color");
    }
}

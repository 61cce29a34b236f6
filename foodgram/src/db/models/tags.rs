//! Database models for tags.

use crate::api::models::tags::{TagCreate, TagUpdate};
use crate::types::TagId;
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct TagCreateDBRequest {
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl From<TagCreate> for TagCreateDBRequest {
    fn from(api: TagCreate) -> Self {
        Self {
            name: api.name,
            color: api.color,
            slug: api.slug,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TagUpdateDBRequest {
    pub name: Option<String>,
    pub color: Option<String>,
    pub slug: Option<String>,
}

impl From<TagUpdate> for TagUpdateDBRequest {
    fn from(api: TagUpdate) -> Self {
        Self {
            name: api.name,
            color: api.color,
            slug: api.slug,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct TagDBResponse {
    pub id: TagId,
    pub name: String,
    pub color: String,
    pub slug: String,
}

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::db::models::StudyMaterial;
use crate::db::types::MaterialKind;
use crate::schemas::{default_true, format_primitive};

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_kind_payload"))]
pub(crate) struct MaterialSave {
    #[validate(length(min = 1, max = 200, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default, alias = "categoryId")]
    pub(crate) category_id: Option<String>,
    pub(crate) kind: MaterialKind,
    #[serde(default)]
    #[validate(url(message = "url is invalid"))]
    pub(crate) url: Option<String>,
    #[serde(default)]
    pub(crate) body: Option<String>,
    #[serde(default = "default_true", alias = "isPublished")]
    pub(crate) is_published: bool,
}

fn validate_kind_payload(material: &MaterialSave) -> Result<(), ValidationError> {
    let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
    let (ok, message) = match material.kind {
        MaterialKind::Link => (present(&material.url), "link materials need a url"),
        MaterialKind::Note => (present(&material.body), "note materials need a body"),
    };
    if ok {
        Ok(())
    } else {
        let mut error = ValidationError::new("kind_payload");
        error.message = Some(message.into());
        Err(error)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct MaterialResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) category_id: Option<String>,
    pub(crate) kind: MaterialKind,
    pub(crate) url: Option<String>,
    pub(crate) body: Option<String>,
    pub(crate) is_published: bool,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl MaterialResponse {
    pub(crate) fn from_db(material: StudyMaterial) -> Self {
        Self {
            id: material.id,
            title: material.title,
            description: material.description,
            category_id: material.category_id,
            kind: material.kind,
            url: material.url,
            body: material.body,
            is_published: material.is_published,
            created_at: format_primitive(material.created_at),
            updated_at: format_primitive(material.updated_at),
        }
    }
}

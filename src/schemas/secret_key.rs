use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;
use validator::Validate;

use crate::db::models::SecretKey;
use crate::schemas::{deserialize_option_datetime_flexible, format_primitive};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SecretKeyGenerate {
    #[serde(default)]
    #[validate(length(max = 120, message = "label is too long"))]
    pub(crate) label: Option<String>,
    #[serde(default = "default_count")]
    #[validate(range(min = 1, max = 100, message = "count must be between 1 and 100"))]
    pub(crate) count: u32,
    #[serde(default, alias = "expiresAt", deserialize_with = "deserialize_option_datetime_flexible")]
    pub(crate) expires_at: Option<PrimitiveDateTime>,
}

/// Returned once at generation; the plain key is not stored.
#[derive(Debug, Serialize)]
pub(crate) struct GeneratedSecretKeyResponse {
    pub(crate) id: String,
    pub(crate) key: String,
    pub(crate) label: Option<String>,
    pub(crate) expires_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SecretKeyResponse {
    pub(crate) id: String,
    pub(crate) label: Option<String>,
    pub(crate) created_by: String,
    pub(crate) is_active: bool,
    pub(crate) redeemed_by: Option<String>,
    pub(crate) redeemed_at: Option<String>,
    pub(crate) expires_at: Option<String>,
    pub(crate) created_at: String,
}

impl SecretKeyResponse {
    pub(crate) fn from_db(key: SecretKey) -> Self {
        Self {
            id: key.id,
            label: key.label,
            created_by: key.created_by,
            is_active: key.is_active,
            redeemed_by: key.redeemed_by,
            redeemed_at: key.redeemed_at.map(format_primitive),
            expires_at: key.expires_at.map(format_primitive),
            created_at: format_primitive(key.created_at),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SecretKeyListQuery {
    #[serde(default, alias = "includeRedeemed")]
    pub(crate) include_redeemed: bool,
}

const fn default_count() -> u32 {
    1
}

use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;
use validator::Validate;

use crate::db::models::Subscription;
use crate::schemas::{
    default_true, deserialize_datetime_flexible, deserialize_option_datetime_flexible,
    format_primitive,
};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubscriptionSave {
    #[serde(alias = "userId")]
    #[validate(length(min = 1, message = "user_id is required"))]
    pub(crate) user_id: String,
    #[validate(length(min = 1, max = 80, message = "plan must not be empty"))]
    pub(crate) plan: String,
    #[serde(alias = "startsAt", deserialize_with = "deserialize_datetime_flexible")]
    pub(crate) starts_at: PrimitiveDateTime,
    #[serde(default, alias = "expiresAt", deserialize_with = "deserialize_option_datetime_flexible")]
    pub(crate) expires_at: Option<PrimitiveDateTime>,
    #[serde(default = "default_true", alias = "isActive")]
    pub(crate) is_active: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubscriptionListQuery {
    #[serde(default, alias = "userId")]
    pub(crate) user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubscriptionResponse {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) plan: String,
    pub(crate) starts_at: String,
    pub(crate) expires_at: Option<String>,
    pub(crate) is_active: bool,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl SubscriptionResponse {
    pub(crate) fn from_db(subscription: Subscription) -> Self {
        Self {
            id: subscription.id,
            user_id: subscription.user_id,
            plan: subscription.plan,
            starts_at: format_primitive(subscription.starts_at),
            expires_at: subscription.expires_at.map(format_primitive),
            is_active: subscription.is_active,
            created_at: format_primitive(subscription.created_at),
            updated_at: format_primitive(subscription.updated_at),
        }
    }
}

pub(crate) mod admin;
pub(crate) mod analytics;
pub(crate) mod auth;
pub(crate) mod catalog;
pub(crate) mod errors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod leaderboard;
pub(crate) mod materials;
pub(crate) mod pagination;
pub(crate) mod results;
pub(crate) mod router;
pub(crate) mod sessions;
pub(crate) mod subscriptions;
pub(crate) mod validation;

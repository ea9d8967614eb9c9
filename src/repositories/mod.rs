pub(crate) mod answers;
pub(crate) mod attempts;
pub(crate) mod categories;
pub(crate) mod health;
pub(crate) mod materials;
pub(crate) mod questions;
pub(crate) mod secret_keys;
pub(crate) mod stats;
pub(crate) mod subscriptions;
pub(crate) mod tests;
pub(crate) mod users;

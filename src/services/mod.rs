pub(crate) mod analytics;
pub(crate) mod leaderboard;
pub(crate) mod question_csv;
pub(crate) mod report;
pub(crate) mod results;
pub(crate) mod scoring;
pub(crate) mod secret_keys;
pub(crate) mod session;

//! Timed test-taking: one controller per attempt, shared by HTTP handlers and a countdown task.

pub(crate) mod cache;
pub(crate) mod controller;
pub(crate) mod countdown;
pub(crate) mod demo;
pub(crate) mod registry;
pub(crate) mod store;

pub(crate) use controller::{
    Navigation, Redirect, SessionError, SessionIdentity, SessionPhase, SubmitOutcome,
    SubmitTrigger,
};
pub(crate) use demo::{DemoResult, DemoVault};
pub(crate) use registry::{LiveSession, SessionRegistry};
pub(crate) use store::{AttemptStore, PgAttemptStore};

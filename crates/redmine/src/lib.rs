//! Client for the Redmine-compatible tracker that backs the bot.
//!
//! The tracker is the source of truth for user identities and issue
//! assignments. Everything here is fetched fresh per request; nothing is
//! cached between invocations.

pub mod client;
pub mod directory;
pub mod models;

pub use client::{RedmineClient, RedmineError};
pub use directory::find_user_id;
pub use models::{Issue, NamedReference, User};

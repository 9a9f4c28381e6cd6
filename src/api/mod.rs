//! REST client for the WorkFlowGo backend.
//!
//! The traits are the seams the rest of the crate depends on; `ApiClient` is
//! the reqwest-backed implementation used in production.

mod client;
mod error;

#[cfg(test)]
mod tests;

pub use client::{ApiClient, InterviewApi, NotificationApi, SettingsApi};
pub use error::ApiError;

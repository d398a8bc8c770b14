// Core moderation module - decides whether user-submitted text is visible.
//
// Profanity filter (local) + toxicity classifier (remote) composed by the
// content moderator.

pub mod moderation_models;
pub mod moderation_service;
pub mod profanity_filter;
pub mod toxicity_classifier;

pub use moderation_models::*;
pub use moderation_service::*;

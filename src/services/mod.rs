//! Business logic services.

pub mod aliases;
pub mod approval;
pub mod auth;
pub mod classifier;
pub mod engine;
pub mod extraction;
pub mod parsing;
pub mod regex_cache;
pub mod registry;
pub mod resolver;
pub mod unparsed;

//! Database models and DTOs for all domain entities.

pub mod category;
pub mod pattern;
pub mod transaction;
pub mod unparsed;
pub mod user;

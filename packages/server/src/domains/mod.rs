//! Business domains. Each owns its models (SQL persistence) and actions.

pub mod analysis;
pub mod content;
pub mod feedback;
pub mod projects;
pub mod recommend;
pub mod users;

//! User accounts. Owns every other entity; deletion cascades.

pub mod models;

pub use models::user::User;

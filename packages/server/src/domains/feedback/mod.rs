//! User feedback events and the preference learner built on them.

pub mod learner;
pub mod models;

pub use learner::{FeedbackLearner, PreferenceProfile};
pub use models::feedback::{FeedbackEvent, FeedbackType, NewFeedback};

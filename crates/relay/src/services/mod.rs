//! Request handling behind the HTTP routes.
//!
//! Each function takes the application state and the acting user and returns
//! an [`AppError`](crate::error::AppError) the routes turn into a response.

pub mod approvals;
pub mod notifications;
pub mod oauth;
pub mod previews;
pub mod projects;
pub mod subscriptions;
pub mod work_items;

pub mod access;
pub mod api;
pub mod models;
pub mod moderation;
pub mod validate;

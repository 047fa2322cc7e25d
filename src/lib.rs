pub mod analytics;
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod grading;
pub mod models;
pub mod records;
pub mod smsapi;
pub mod srcli;
pub mod srdb;

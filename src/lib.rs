pub mod admin;
pub mod app;
pub mod auth;
pub mod chirps;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod state;
pub mod users;

pub mod api;
pub mod config;
pub mod database;
pub mod dispatch;
pub mod error;
pub mod loader;
pub mod logger;
pub mod meter;
pub mod model;
pub mod store;
pub mod validation;

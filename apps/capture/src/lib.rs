//! Job capture pipeline: active tab → page markup → extraction service →
//! persistence service, with a list view that refetches after every
//! completed capture.

pub mod browser;
pub mod capture;
pub mod config;
pub mod errors;
pub mod list_view;
pub mod models;
pub mod service_client;

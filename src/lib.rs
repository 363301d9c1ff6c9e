//! Core (non-UI) layers of the Stockdesk facilities console.

pub mod api;
pub mod auth;
pub mod config;
pub mod model;
pub mod state;

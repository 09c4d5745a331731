//! folio-chat - assistant core for a portfolio site's chat widget
//!
//! Keeps the widget's transcript and pending state per browser tab, sends
//! user turns to the hosted chat endpoint with optimistic rollback, renders
//! assistant replies from a small markdown subset, and decides when the
//! floating launcher is shown.

use std::sync::Arc;

pub mod config;
pub mod conversation;
pub mod core;
pub mod providers;
pub mod render;
pub mod routes;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<crate::core::SessionHub>,
}

//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod ceremony;
pub mod health;

pub use crate::state::AppState;
pub use ceremony::{
    complete_authentication, complete_registration, current_session, logout,
    offer_authentication, offer_registration, RegisterQuery, SessionResponse,
};
pub use health::{health, ready, HealthResponse, ReadyResponse};

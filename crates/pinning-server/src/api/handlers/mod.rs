//! API request handlers

pub mod pins;

pub use pins::{get_pins, method_not_allowed, PinsQuery};

use crate::service::IssuanceService;

/// Application state shared across handlers
#[derive(Debug)]
pub struct AppState {
    /// The issuance pipeline
    pub service: IssuanceService,
}

impl AppState {
    pub fn new(service: IssuanceService) -> Self {
        Self { service }
    }
}

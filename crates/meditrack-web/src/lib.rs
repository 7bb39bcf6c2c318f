//! meditrack-web — JSON API for the MediTrack ML service.
//! Exposes:
//!   - Lab anomaly ensemble: train, predict, metrics
//!   - Provider performance: similarity search and ranking
//!   - Health and status probes

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

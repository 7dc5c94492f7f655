//! Try-on job tracking
//!
//! Client-side submission and tracking of long-running remote jobs (avatar
//! creation, virtual try-on): backend fallback on submission, bounded polling
//! with cancellation, optional pushed updates, and aggregation of pipeline
//! step metadata into a single monotonic progress figure.

pub mod app_state;
pub mod config;
pub mod models;
pub mod services;

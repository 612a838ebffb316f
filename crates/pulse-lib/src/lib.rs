//! Core library for the cluster forecasting service
//!
//! This crate provides the core functionality for:
//! - Metrics collection from node agents
//! - Per-timestamp aggregation and a bounded history cache
//! - Pluggable forecasting backends and their ensemble
//! - Z-score anomaly detection
//! - Cycle orchestration, the query API, health checks and observability

pub mod anomaly;
pub mod api;
pub mod collector;
pub mod ensemble;
pub mod forecast;
pub mod health;
pub mod history;
pub mod models;
pub mod observability;
pub mod orchestrator;
pub mod stats;

pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};

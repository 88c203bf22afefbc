//! # API Shared
//!
//! Shared wire types for the Convia APIs.
//!
//! Contains:
//! - Request/response DTOs (`dto` module) with serde and OpenAPI schemas
//! - Shared services like `HealthService`
//!
//! Used by `api-rest` and by `convia-core` read models so both sides of
//! the HTTP boundary agree on one set of shapes.

pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;

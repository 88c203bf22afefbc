//! # Convia Core
//!
//! Core business logic for the Convia clinic billing back office.
//!
//! This crate owns the contract/avenant versioning engine and price
//! resolution over SQLite:
//! - Contract lifecycle and agreement terms ([`contracts`])
//! - Specialty annexes and their price catalogues ([`annexes`], [`prices`])
//! - Amendment generations with supersede-on-write history ([`avenants`])
//! - Date-aware price resolution with general-contract fallback
//!   ([`resolver`])
//! - Acts performed on medical records ([`records`])
//! - Scheduled activation/expiry sweeps ([`sweeps`])
//!
//! **No API concerns**: HTTP routing, status-code mapping and OpenAPI
//! belong in `api-rest`; wire DTOs live in `api-shared`.

pub mod annexes;
pub mod avenants;
pub mod config;
pub mod contracts;
pub mod db;
pub mod domain;
pub mod error;
pub mod prices;
pub mod records;
pub mod resolver;
pub mod sweeps;

#[cfg(test)]
pub(crate) mod testing;

pub use annexes::AnnexService;
pub use avenants::AvenantService;
pub use config::CoreConfig;
pub use contracts::ContractService;
pub use error::{BillingError, BillingResult};
pub use prices::PrestationPriceService;
pub use records::RecordPrestationService;
pub use resolver::PriceResolver;
pub use sweeps::SweepService;

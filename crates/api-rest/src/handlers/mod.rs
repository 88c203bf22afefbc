//! Request handlers, grouped by resource.

pub mod annexes;
pub mod avenants;
pub mod contracts;
pub mod prices;
pub mod records;

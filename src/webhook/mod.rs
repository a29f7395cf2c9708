//! Marketplace webhook ingestion
//!
//! - [`signature`] - mandatory HMAC verification of raw deliveries
//! - [`normalizer`] - payload → canonical coordinator request

pub mod normalizer;
pub mod signature;

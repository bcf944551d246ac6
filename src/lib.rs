//! OAuth client application registry library crate.
//!
//! Registers OAuth2 client applications with generated credentials, validates
//! them before persistence, and looks them up by client identifier and secret.

pub mod config;
pub mod errors;
pub mod registry;
pub mod storage;

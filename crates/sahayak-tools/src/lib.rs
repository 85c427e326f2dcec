//! Operational-data tools for Sahayak
//!
//! Read-only lookups against the banking data service, exposed as
//! named tools a tool-calling provider can select and populate.
//! Every tool converts its own failures into a descriptive string so
//! a single bad lookup never crashes a provider call.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builtins;
pub mod client;
pub mod error;
pub mod registry;

pub use builtins::register_banking_tools;
pub use client::{BalanceInfo, BankingApiClient};
pub use error::{Error, Result};
pub use registry::{Tool, ToolRegistry};

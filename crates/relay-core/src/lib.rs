//! # relay-core
//!
//! Core types shared by every relay crate:
//! - The error taxonomy ([`errors::SyncError`]) with stable codes and
//!   structured context
//! - Record, run, and window types that flow between adapters, the store,
//!   and the orchestrator
//! - Status enums with their allowed transitions
//! - ID prefix constants for store-assigned identities

pub mod entities;
pub mod enums;
pub mod errors;
pub mod ids;
pub mod window;

//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software: operator telecommands, the
//! demands sent to the RC transmitter, and the ZMQ networking layer they travel over.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Operator telecommands
pub mod tc;

/// Command and response definitions for equipment (the RC transmitter)
pub mod eqpt;

/// Network module
pub mod net;

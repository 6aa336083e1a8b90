//! NamiChain - an append-only key/value ledger sealed with proof-of-work blocks
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, targets, chain state and validation
//! - [`transaction`] - Key/value transactions and their wire format
//! - [`mempool`] - Queue of writes awaiting a block
//!
//! ## Consensus & Mining
//! - [`miner`] - Proof-of-work nonce search
//!
//! ## Encoding & Storage
//! - [`codec`] - Byte reader and hex helpers
//! - [`persistence`] - Chain file storage
//!
//! ## Service
//! - [`node`] - Shared, lock-guarded ledger used by the server
//! - [`api`] - HTTP endpoints
//! - [`client`] - HTTP client for the mining binaries
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;

// ============================================================================
// Encoding & Storage
// ============================================================================
pub mod codec;
pub mod persistence;

// ============================================================================
// Service
// ============================================================================
#[cfg(feature = "api")]
pub mod api;
pub mod client;
pub mod node;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

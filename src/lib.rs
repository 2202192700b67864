//! CityCare - Complaint Lifecycle and Geo-Deduplication
//!
//! A Rust library for tracking municipal waste complaints from report to
//! resolution.
//!
//! # Features
//!
//! - Proximity-based duplicate merging (50 m radius by default)
//! - A strict complaint state machine with per-complaint optimistic commits
//! - Worker ranking for dispatch
//! - SLA sweeps that escalate overdue complaints
//! - Write-through persistence to an embedded journal
//! - CSV and JSON export

/// Audit trail of committed transitions
pub mod audit;
/// Photo storage collaborator
pub mod blob;
/// Injectable time source
pub mod clock;
/// Configuration management
pub mod config;
/// Duplicate detection and neighbourhood locking
pub mod dedupe;
/// Worker directory collaborator
pub mod directory;
/// Error types
pub mod error;
/// SLA sweeps and forced escalation
pub mod escalation;
/// CSV and JSON export
pub mod export;
/// Distance and spatial grid
pub mod geo;
/// Complaint code generation
pub mod ids;
/// Persistent complaint journal
pub mod journal;
/// Complaint state machine
pub mod lifecycle;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Worker ranking
pub mod scheduler;
/// Operation façade
pub mod service;
/// Status counts
pub mod stats;
/// Complaint store
pub mod store;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use error::{CoreError, ErrorKind, Result};
pub use models::{Actor, Complaint, ComplaintFilter, Coordinates, Role, Status, Submission, SubmitOutcome};
pub use service::{Collaborators, ComplaintService};

//! # reid-utils
//!
//! Training-side utilities for person re-identification: checkpoint transfer
//! into freshly built models, data loader planning, training curves and
//! bounding-box overlap. Models are built with the Burn ML framework.
//!
//! ## Modules
//!
//! - [`bbox`] — Inclusive-pixel bounding boxes and IoU
//! - [`checkpoint`] — Checkpoint records, storage and partial parameter transfer
//! - [`model`] — Re-ID classifier implementing the state-dict interface
//! - [`data`] — Dataset resolution, augmentation pipelines and loader plans
//! - [`curve`] — Per-epoch loss/precision history
//! - [`config`] — TOML configuration loading and validation
//! - [`error`] — Structured error types

pub mod bbox;
pub mod checkpoint;
pub mod config;
pub mod curve;
pub mod data;
pub mod error;
pub mod model;

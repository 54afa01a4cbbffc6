//! Library for LLM-backed newborn birth-weight estimation
//!
//! This crate provides the core functionality for:
//! - Loading maternal records from CSV and writing prediction results
//! - Normalizing records and building chat-completion prompts
//! - Decoding free-form model responses into structured predictions
//! - Low-birth-weight risk classification
//! - Sequential, paced batch orchestration with metrics and structured logs

pub mod dataset;
pub mod error;
pub mod inference;
pub mod models;
pub mod observability;
pub mod predictor;

pub use error::{DatasetError, DecodeFailure, PredictorError};
pub use models::*;
pub use observability::{BatchMetrics, StructuredLogger};

//! Error Handling Module
//!
//! This module provides the error taxonomy shared by every pipeline stage:
//! - Core error type (`PipelineError`) and its coarse `ErrorKind`
//! - Type conversions from common error types
//! - User-facing summaries that tell upload, analysis and configuration failures apart
//!
//! # Example
//!
//! ```rust,ignore
//! use medexplain::error::{ErrorKind, PipelineError};
//!
//! let error = PipelineError::upload(503, "service unavailable");
//! assert_eq!(error.kind(), ErrorKind::UploadError);
//! assert!(error.is_transient());
//! ```

mod conversions;
pub mod helpers;
pub mod types;

pub use helpers::*;
pub use types::*;

//! # REST API
//!
//! The request-to-query pipeline and generic CRUD handlers:
//! - `features`: query string → filter, sort, field limit, pagination
//! - `factory`: list / get / create / update / delete for any resource
//! - `errors`: error taxonomy and the central error translator
//! - `response`: the JSON envelope

pub mod errors;
pub mod extract;
pub mod factory;
pub mod features;
pub mod response;

pub use errors::{translate_errors, ApiError, ApiResult};
pub use extract::{AppForm, AppJson};
pub use features::{ApiFeatures, QueryParams};
pub use response::{ListResponse, MessageResponse, NoContent, SingleResponse};

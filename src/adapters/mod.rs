//! Infrastructure Adapters
//!
//! Concrete implementations of the domain ports.
//!
//! - [`QuotaApiClient`] - HTTP quota API implementing [`QuotaSource`](crate::domain::QuotaSource)

mod quota_api;

pub use quota_api::{decode_envelope, QuotaApiClient, SUCCESS_CODE};

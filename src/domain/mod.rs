//! Domain Layer
//!
//! Value objects describing quota usage and the port the collector reads
//! them through.
//!
//! - **Ports** (`ports.rs`) - [`QuotaRecord`] and the [`QuotaSource`] trait

pub mod ports;

pub use ports::{round_to_hundredths, QuotaRecord, QuotaSource, UNKNOWN_LABEL};

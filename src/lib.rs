//! imb: USPS Intelligent Mail Barcode encode/decode library.
//!
//! No I/O, no persisted state — just the codec. Encodes a [`Record`] to a
//! 65-symbol barcode string and back, repairing a single corrupted, inserted,
//! or deleted symbol where possible.

mod bignum;
mod bitlayout;
mod decode;
mod encode;
mod fcs;
mod recovery;
mod tables;
mod types;

// Re-export commonly used types at crate root
pub use decode::decode;
pub use encode::encode;
pub use types::{DecodeResult, DecodingReason, ImbError, Record, RepairStatus, Result, Symbol};

//! rifa-core: Core library for the charity raffle sales manager
//!
//! This library provides functionality to:
//! - Keep raffle ticket sales in a CSV-backed record store
//! - Register buyers against ticket numbers, one at a time or in batches
//! - List, look up, and search registered records
//! - Export the store file and verify its integrity
//! - Merge external CSV files into the store, first-write-wins on duplicates

pub mod error;
pub mod merger;
pub mod record;
pub mod store;

pub use error::{Error, Result};
pub use merger::{discover_sources, merge_files, MergeReport};
pub use record::{purchase_timestamp, valid_number, Record, PURCHASE_DATE_FORMAT, STORE_HEADER};
pub use store::{BatchOutcome, RaffleStore, VerifyReport};

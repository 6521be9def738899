//! Integration test suite for Satchel.
//!
//! Cross-crate tests drive the public wallet API the way a caller would:
//! seed to addresses, discovery against a scripted backend, unspent
//! ingestion, transaction creation and state round trips.

pub mod helpers;

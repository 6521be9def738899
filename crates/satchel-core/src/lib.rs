//! # satchel-core
//! Foundation types and traits for the Satchel wallet.

pub mod address;
pub mod constants;
pub mod error;
pub mod network;
pub mod traits;
pub mod types;

pub use bitcoin::Network;

//! Core business logic abstractions

pub mod config;
pub mod error;
pub mod log;
pub mod quote;
pub mod ticker;

// Re-export main types for cleaner imports
pub use error::StoreError;
pub use quote::{QuoteMap, QuotePoint, QuoteProvider, QuoteSeries};
pub use ticker::Ticker;

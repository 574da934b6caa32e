pub mod cryptocompare;
pub mod util;

pub use cryptocompare::CryptoCompareProvider;

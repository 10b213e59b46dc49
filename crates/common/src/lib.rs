pub mod config;
pub mod error;
pub mod fundamentals;
pub mod portfolio;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use fundamentals::{FundamentalsProvider, NoFundamentals, StaticFundamentals};
pub use portfolio::{InMemoryPortfolio, Portfolio};
pub use types::*;

pub mod config;
pub mod error;
pub mod month;
pub mod transaction;

pub use config::Config;
pub use error::*;
pub use month::*;
pub use transaction::*;

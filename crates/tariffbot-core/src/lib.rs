pub mod config;
pub mod duty;
pub mod error;
pub mod types;

pub use config::TariffConfig;
pub use duty::{calculate, DutyComponent, DutyRate, RateUnit, TariffBreakdown, TariffInput};
pub use error::{Result, TariffError};
pub use types::*;

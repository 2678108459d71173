//! Project parameter records and input loading

mod data;
pub mod loader;

pub use data::{ProjectParameters, RawParameters, RevenueMode, MODE_FULL_GRID, MODE_SELF_CONSUMPTION};
pub use loader::{load_parameters, load_portfolio, load_portfolio_from_reader, PortfolioEntry};

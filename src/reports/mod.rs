// Reports module - holdings projection and invested capital history

pub mod history;
pub mod holdings;

pub use history::{invested_series, HistoryPoint, Interval, Range};
pub use holdings::{
    calculate_portfolio, compute_holdings, compute_portfolio_totals, Holding, PortfolioReport,
    PortfolioTotals,
};

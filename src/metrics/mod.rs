pub mod classify;
pub mod report;
pub mod rollup;
pub mod stats;
pub mod types;

pub use classify::classify;
pub use report::{period_report, weekly_trend, TicketFilter};
pub use rollup::{build_weekly, weekly_windows, WeekWindow};
pub use stats::{quantile, resolution_stats};
pub use types::*;

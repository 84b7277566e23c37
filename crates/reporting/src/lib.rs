//! Funnel analytics: drop-off tables, summaries and the refreshing
//! dashboard that serves them.

pub mod dashboard;
pub mod funnel;
pub mod labels;

pub use dashboard::{FunnelDashboard, FunnelReport, StatsSource};
pub use funnel::{build_funnel_stats, summarize, zero_filled, FunnelStat, FunnelSummary};
pub use labels::{strip_tags, LabelTable};

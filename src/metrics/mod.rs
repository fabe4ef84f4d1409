pub mod stats;

pub use stats::{GatewayStats, StatsSnapshot};

pub mod aggregator;
pub mod store;

pub use aggregator::Stats;
pub use store::StatsStore;

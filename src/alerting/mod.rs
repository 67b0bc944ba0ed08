pub mod notification_gate;
pub mod status_aggregator;

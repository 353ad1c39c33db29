pub mod address_monitor;
pub mod global_monitor;

pub use address_monitor::{Monitor, MonitorState, DEFAULT_CHANNEL_CAPACITY, DEFAULT_POLL_INTERVAL};
pub use global_monitor::GlobalMonitor;

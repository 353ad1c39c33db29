//! Global monitor: the no-address-filter variant of [`Monitor`].
//! Kept as a distinct constructor rather than a separate type — it shares
//! every other part of the polling loop, and the Manager only ever holds it
//! behind the same opaque handle as an address-scoped monitor.

pub use super::address_monitor::Monitor as GlobalMonitor;

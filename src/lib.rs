pub mod api;
pub mod config;
pub mod flow;
pub mod inbox;
pub mod logger;
pub mod notifier;
pub mod report;
pub mod session;

pub use inbox_channel;

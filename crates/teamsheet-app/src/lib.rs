// Application layer: fixture sessions, notifications and the CLI glue.

pub mod notify;
pub mod session;

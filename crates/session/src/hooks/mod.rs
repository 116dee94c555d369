//! Hooks run by the application shell

pub mod bootstrap;

pub use bootstrap::bootstrap;

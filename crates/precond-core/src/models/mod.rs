//! Shared data models for the preconditioning service

mod command;
mod credential;
mod vehicle;
mod wake;

pub use command::*;
pub use credential::*;
pub use vehicle::*;
pub use wake::*;

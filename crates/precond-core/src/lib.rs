//! precond-core - Core types and traits for the preconditioning service
//!
//! This crate holds everything the orchestration layer shares with its
//! collaborators: the closed error taxonomy, the data model (credentials,
//! vehicle identity, commands, wake states), the key/value [`TokenStore`]
//! abstraction and the injectable [`Delay`] used by every retry loop.

pub mod delay;
pub mod error;
pub mod models;
pub mod store;

pub use delay::{Delay, TokioDelay};
pub use error::{PrecondError, Result};
pub use models::*;
pub use store::{keys, FileTokenStore, MemoryTokenStore, TokenStore};

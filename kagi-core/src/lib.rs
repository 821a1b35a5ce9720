//! Core functionality for the kagi token store
//!
//! This crate contains the domain types, the repository seam and the service layer
//! for single-active "remember me" / passwordless tokens.
//!
//! A user identifier (`uid`) owns at most one [`TokenRecord`] at a time. Storing a new
//! token for a uid replaces the previous record wholesale, so the previous token stops
//! authenticating immediately. Expiry is evaluated lazily when a token is presented.
//!
//! See [`TokenService`] for the validated entry point, [`TokenRepository`] for the storage
//! seam implemented by backends, and [`MemoryRepositoryProvider`] for the in-process backend.
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::Duration;
//! use kagi_core::{MemoryRepositoryProvider, TokenService, repositories::TokenRepositoryAdapter};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), kagi_core::Error> {
//! let provider = Arc::new(MemoryRepositoryProvider::new());
//! let service = TokenService::new(Arc::new(TokenRepositoryAdapter::new(provider)));
//!
//! service
//!     .store_or_update("s3cr3t", "user@example.com", Duration::minutes(15), Some("/inbox"))
//!     .await?;
//!
//! let auth = service.authenticate("s3cr3t", "user@example.com").await?;
//! assert_eq!(auth.referrer(), Some("/inbox"));
//! # Ok(())
//! # }
//! ```
pub mod crypto;
pub mod error;
pub mod repositories;
pub mod services;
pub mod storage;
pub mod validation;

pub use error::Error;
pub use repositories::{
    MemoryRepositoryProvider, MemoryTokenRepository, RepositoryProvider, TokenRepository,
    TokenRepositoryProvider,
};
pub use services::TokenService;
pub use storage::{Authentication, CleanupConfig, NewToken, NewTokenBuilder, TokenRecord};

//! Repository traits for data access layer
//!
//! Services talk to storage through these traits. A storage backend implements
//! [`TokenRepository`] for its record type, exposes it through [`TokenRepositoryProvider`],
//! and implements [`RepositoryProvider`] for lifecycle operations (migrations and health
//! checks).

pub mod adapter;
pub mod memory;
pub mod token;

pub use adapter::TokenRepositoryAdapter;
pub use memory::{MemoryRepositoryProvider, MemoryTokenRepository};
pub use token::TokenRepository;

use async_trait::async_trait;

use crate::Error;

/// Provider trait for token repository access.
pub trait TokenRepositoryProvider: Send + Sync + 'static {
    /// The token repository implementation type
    type TokenRepo: TokenRepository;

    /// Get the token repository
    fn token(&self) -> &Self::TokenRepo;
}

/// Provider trait that storage implementations must implement.
///
/// # Implementing a Custom Storage Backend
///
/// ```rust,ignore
/// use kagi_core::repositories::*;
///
/// struct MyStorage { token: MyTokenRepository }
///
/// impl TokenRepositoryProvider for MyStorage {
///     type TokenRepo = MyTokenRepository;
///     fn token(&self) -> &Self::TokenRepo { &self.token }
/// }
///
/// #[async_trait]
/// impl RepositoryProvider for MyStorage {
///     async fn migrate(&self) -> Result<(), Error> { /* ... */ }
///     async fn health_check(&self) -> Result<(), Error> { /* ... */ }
/// }
/// ```
#[async_trait]
pub trait RepositoryProvider: TokenRepositoryProvider {
    /// Run migrations for all repositories
    async fn migrate(&self) -> Result<(), Error>;

    /// Health check for all repositories
    async fn health_check(&self) -> Result<(), Error>;
}

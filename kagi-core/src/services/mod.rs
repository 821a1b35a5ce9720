//! Service layer for business logic
//!
//! Services validate caller input, apply the token state machine and delegate persistence to
//! a repository.

pub mod token;

pub use token::TokenService;

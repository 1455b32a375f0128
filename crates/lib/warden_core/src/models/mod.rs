//! Domain models.
//!
//! These are internal domain models, distinct from the request bodies in
//! [`crate::transfer`].

pub mod session;
pub mod user;
pub mod validation;

pub use session::{TokenClaims, TokenKind, TokenPair};
pub use user::{Client, Credential, Employee, Principal, PrincipalKind, PrincipalLink};
pub use validation::{NewValidation, Owner, ValidationKind, ValidationState, ValidationToken};

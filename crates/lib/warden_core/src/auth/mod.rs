//! Authentication and authorization building blocks.
//!
//! Password hashing, validation codes, session tokens and permission
//! evaluation. None of these touch the store directly except the role
//! lookup in [`permission::UserAccess`].

pub mod jwt;
pub mod luhn;
pub mod password;
pub mod permission;

pub use jwt::{SessionIssuer, TokenError};
pub use password::PasswordHasher;
pub use permission::{
    Action, Anonymous, IsOwner, Permission, Resource, ResourceKind, Role, Rule, UserAccess,
    ValidationGrant,
};

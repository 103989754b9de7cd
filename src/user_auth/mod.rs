//! Account security: verification codes, registration, login lockout, JWT

pub mod code_store;
pub mod handlers;
pub mod middleware;
pub mod password;
pub mod service;
pub mod token;

pub use code_store::{CodeStore, MemoryCodeStore};
pub use service::{AccountSecurity, SecuritySettings};
pub use token::{Claims, TokenService};

//! Authentication
//!
//! - [`JwtService`] - token issue and validation
//! - [`CurrentUser`] - authenticated caller, extracted per request
//! - [`SessionRegistry`] - sign-out revocation, also the profile
//!   bootstrap's session control

pub mod extractor;
pub mod jwt;
pub mod session;

pub use jwt::{Claims, CurrentUser, JwtConfig, JwtError, JwtService, generate_dev_secret};
pub use session::SessionRegistry;

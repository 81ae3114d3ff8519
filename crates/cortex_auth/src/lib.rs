#![warn(missing_docs)]
//! Authorization of remote calls to cortex services.
//!
//! Every request arrives with a [`Credentials`] record filled in by the
//! transport from the caller's certificate. [`AuthManager::auth_query`]
//! decides whether that caller may invoke a method:
//!
//! 1. credentials forwarded by a trusted gateway are replaced by the ones
//!    of the user the gateway acts for (one hop at most),
//! 2. the DN is mapped onto a registered host or group member,
//! 3. the method's required properties are looked up in the service's
//!    authorization section, falling back to the `Default` rule.
//!
//! The caller only ever learns yes or no. The reason for a denial goes to
//! the log.

mod credentials;
#[allow(missing_docs)]
mod error;
mod forward;
mod identity;
mod manager;
pub mod policy;
pub mod registry;

pub use credentials::*;
pub use error::*;
pub use forward::CredentialForwarder;
pub use identity::IdentityResolver;
pub use manager::{AuthManager, MAX_FORWARDING_HOPS};
pub use policy::{PolicyStore, RequiredProperties};
pub use registry::{ConfigRegistry, MockRegistry, Registry};

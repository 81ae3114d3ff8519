use thiserror::Error;

/// Why a caller was denied. Only ever logged, never returned to the caller.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("The credentials seem to be forwarded by a host, but it is not a trusted one")]
    UntrustedForwarding,

    #[error("Host is invalid: cannot find hostname for DN {dn}: {source}")]
    UnknownHost {
        dn: String,
        #[source]
        source: RegistryError,
    },

    #[error("Group {0} has no members")]
    EmptyGroup(String),

    #[error("User {dn} is invalid or does not belong to group {group}")]
    NotInGroup { dn: String, group: String },

    #[error("User has no DN")]
    NoDn,

    #[error("Peer group is not authorized to call {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors reported by the directory service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No entry in the registry for DN {0}")]
    UnknownDn(String),

    #[error("Directory service unavailable: {0}")]
    Unavailable(String),
}

/// Alias
pub type RegistryResult<T> = Result<T, RegistryError>;

//! Credentials forwarded by a trusted gateway on behalf of a user.

use crate::credentials::{Credentials, ExtraCredentials};
use crate::registry::Registry;
use std::sync::Arc;

/// Recognizes and unpacks forwarded credentials.
#[derive(Clone)]
pub struct CredentialForwarder {
    registry: Arc<dyn Registry>,
}

impl CredentialForwarder {
    /// Constructor
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self { registry }
    }

    /// True iff `cred` carries a forwarded `(DN, group)` pair and its own DN
    /// belongs to a trusted host.
    ///
    /// A failure to fetch the trusted host list is logged and treated as
    /// "not forwarded", which leaves the pair in place to be rejected.
    pub async fn is_forwarded(&self, cred: &Credentials) -> bool {
        let (Some(dn), Some(ExtraCredentials::Forwarded(..))) = (&cred.dn, &cred.extra_credentials)
        else {
            return false;
        };
        match self.registry.trusted_hosts().await {
            Ok(trusted) => trusted.iter().any(|host| host == dn),
            Err(err) => {
                tracing::error!(?err, "could not fetch the trusted hosts");
                false
            }
        }
    }

    /// The credentials of the user a gateway forwarded. The forwarding pair
    /// is consumed, so the result is never itself forwarded.
    ///
    /// Returns `None` when `cred` doesn't carry a forwarding pair.
    pub fn unpack(cred: &Credentials) -> Option<Credentials> {
        match &cred.extra_credentials {
            Some(ExtraCredentials::Forwarded(dn, group)) => Some(Credentials {
                dn: Some(dn.clone()),
                group: Some(group.clone()),
                extra_credentials: None,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use crate::registry::MockRegistry;
    use pretty_assertions::assert_eq;

    fn forwarder(trusted: &'static [&'static str]) -> CredentialForwarder {
        let mut registry = MockRegistry::new();
        registry
            .expect_trusted_hosts()
            .returning(move || Ok(trusted.iter().map(|s| s.to_string()).collect()));
        CredentialForwarder::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn only_trusted_hosts_forward() {
        let fw = forwarder(&["/CN=gw"]);
        assert!(
            fw.is_forwarded(&Credentials::forwarded("/CN=gw", "/CN=alice", "users"))
                .await
        );
        assert!(
            !fw.is_forwarded(&Credentials::forwarded("/CN=mallory", "/CN=alice", "users"))
                .await
        );
    }

    #[tokio::test]
    async fn markers_are_not_forwarding() {
        let fw = forwarder(&["/CN=gw"]);
        let cred = Credentials::with_dn("/CN=gw").extra(ExtraCredentials::hosts());
        assert!(!fw.is_forwarded(&cred).await);

        let no_dn = Credentials {
            dn: None,
            ..Credentials::forwarded("", "/CN=alice", "users")
        };
        assert!(!fw.is_forwarded(&no_dn).await);
    }

    #[tokio::test]
    async fn registry_failure_is_not_forwarding() {
        let mut registry = MockRegistry::new();
        registry
            .expect_trusted_hosts()
            .returning(|| Err(RegistryError::Unavailable("down".into())));
        let fw = CredentialForwarder::new(Arc::new(registry));
        assert!(
            !fw.is_forwarded(&Credentials::forwarded("/CN=gw", "/CN=alice", "users"))
                .await
        );
    }

    #[tokio::test]
    async fn unpacked_credentials_are_never_forwarded_again() {
        let fw = forwarder(&["/CN=gw", "/CN=alice"]);
        let original = Credentials::forwarded("/CN=gw", "/CN=alice", "users");
        let unpacked = CredentialForwarder::unpack(&original).unwrap();
        assert_eq!(unpacked, Credentials::with_dn("/CN=alice").group("users"));
        assert!(!fw.is_forwarded(&unpacked).await);
        assert_eq!(CredentialForwarder::unpack(&unpacked), None);
        // the caller's record is left alone
        assert_eq!(original.dn.as_deref(), Some("/CN=gw"));
    }
}

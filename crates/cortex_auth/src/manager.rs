use crate::credentials::{Credentials, ExtraCredentials, Identity, ResolvedCredentials, HOSTS_GROUP};
use crate::error::{AuthError, AuthResult};
use crate::forward::CredentialForwarder;
use crate::identity::IdentityResolver;
use crate::policy::{PolicyStore, RequiredProperties};
use crate::registry::Registry;
use cortex_config::ConfigSource;
use std::sync::Arc;

/// Credentials are forwarded by a gateway at most once. A gateway cannot
/// forward for another gateway.
pub const MAX_FORWARDING_HOPS: usize = 1;

/// Decides whether a caller may invoke a method of a service.
///
/// The manager only reads from its collaborators and holds no locks, so a
/// single instance can serve concurrent requests.
#[derive(Clone)]
pub struct AuthManager {
    forwarder: CredentialForwarder,
    resolver: IdentityResolver,
    policy: PolicyStore,
}

impl AuthManager {
    /// A manager for the rules found below `auth_section`.
    pub fn new(
        auth_section: impl Into<String>,
        config: Arc<dyn ConfigSource>,
        registry: Arc<dyn Registry>,
    ) -> Self {
        Self {
            forwarder: CredentialForwarder::new(registry.clone()),
            resolver: IdentityResolver::new(registry),
            policy: PolicyStore::new(auth_section, config),
        }
    }

    /// The rules this manager applies
    pub fn policy(&self) -> &PolicyStore {
        &self.policy
    }

    /// May the caller presenting `cred` call `method`?
    ///
    /// The reason for a denial is logged, never returned.
    pub async fn auth_query(&self, method: &str, cred: &Credentials) -> bool {
        match self.authorize(method, cred).await {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(%method, "{}", err);
                false
            }
        }
    }

    /// Like [`auth_query`](Self::auth_query), with the identity the caller
    /// was resolved to on success (`None` for anonymous access to an open
    /// method) and the reason on failure.
    pub async fn authorize(&self, method: &str, cred: &Credentials) -> AuthResult<Option<Identity>> {
        tracing::warn!("Trying to authenticate {}", cred);
        let resolved = self.resolve(cred).await?;
        let required = self.policy.required_properties(method);
        check(method, &required, resolved)
    }

    /// Work out who the caller is, without looking at any rule.
    ///
    /// Unpacks forwarded credentials, rejects untrusted forwarding and maps
    /// the DN onto a registered host or user. `cred` is left untouched.
    pub async fn resolve(&self, cred: &Credentials) -> AuthResult<ResolvedCredentials> {
        let mut current = cred.clone();
        let mut hops = 0;
        while self.forwarder.is_forwarded(&current).await {
            let Some(unpacked) = CredentialForwarder::unpack(&current) else {
                break;
            };
            hops += 1;
            assert!(
                hops <= MAX_FORWARDING_HOPS,
                "forwarded credentials were forwarded again"
            );
            tracing::warn!("Query comes from a gateway");
            current = unpacked;
        }

        let group = match &current.extra_credentials {
            None => current.group.clone(),
            Some(ExtraCredentials::Marker(marker)) if marker == HOSTS_GROUP => {
                Some(HOSTS_GROUP.to_string())
            }
            // Legacy clients send their group as a bare marker.
            Some(ExtraCredentials::Marker(marker)) => {
                current.group.clone().or_else(|| Some(marker.clone()))
            }
            Some(_) => return Err(AuthError::UntrustedForwarding),
        };

        let identity = match &current.dn {
            Some(dn) => Some(self.resolver.resolve(dn, group.as_deref()).await?),
            None => None,
        };
        Ok(ResolvedCredentials {
            group: identity.as_ref().map(|i| i.group.clone()).or(group),
            identity,
            forwarded_hops: hops,
        })
    }
}

fn check(
    method: &str,
    required: &RequiredProperties,
    resolved: ResolvedCredentials,
) -> AuthResult<Option<Identity>> {
    if required.is_open() {
        return Ok(resolved.identity);
    }
    let identity = resolved.identity.ok_or(AuthError::NoDn)?;
    if required.accepts_any_authenticated() || required.intersects(&identity.properties) {
        Ok(Some(identity))
    } else {
        Err(AuthError::Unauthorized(method.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use crate::registry::MockRegistry;
    use cortex_config::ConfigTree;
    use matches::assert_matches;
    use pretty_assertions::assert_eq;

    const AUTH: &str = "/Auth";

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn config() -> Arc<dyn ConfigSource> {
        Arc::new(
            ConfigTree::from_yaml(
                r#"
Auth:
  open: any
  everybody: all
  members: authenticated
  admin: ServiceAdministrator
  Jobs:
    Default: NormalUser
"#,
            )
            .unwrap(),
        )
    }

    /// gw is trusted, node1 is a host, alice is the only user
    fn registry() -> MockRegistry {
        let mut registry = MockRegistry::new();
        registry
            .expect_trusted_hosts()
            .returning(|| Ok(strings(&["/CN=gw"])));
        registry.expect_hostname_for_dn().returning(|dn| match dn {
            "/CN=node1" => Ok("node1".into()),
            other => Err(RegistryError::UnknownDn(other.into())),
        });
        registry
            .expect_host_properties()
            .returning(|_| Ok(strings(&["ServiceAdministrator"])));
        registry
            .expect_default_user_group()
            .returning(|| Ok("user".into()));
        registry.expect_group_properties().returning(|g| match g {
            "user" => Ok(strings(&["NormalUser"])),
            "admin" => Ok(strings(&["ServiceAdministrator"])),
            _ => Ok(vec![]),
        });
        registry.expect_users_in_group().returning(|g| match g {
            "user" | "admin" => Ok(strings(&["alice"])),
            _ => Ok(vec![]),
        });
        registry
            .expect_username_for_dn()
            .returning(|dn, _| match dn {
                "/CN=alice" => Ok("alice".into()),
                other => Err(RegistryError::UnknownDn(other.into())),
            });
        registry
    }

    fn manager() -> AuthManager {
        AuthManager::new(AUTH, config(), Arc::new(registry()))
    }

    #[tokio::test]
    async fn resolution_leaves_the_record_alone() {
        let cred = Credentials::forwarded("/CN=gw", "/CN=alice", "admin");
        let before = cred.clone();
        let resolved = manager().resolve(&cred).await.unwrap();
        assert_eq!(cred, before);
        assert_eq!(resolved.forwarded_hops, 1);
        assert_eq!(resolved.group.as_deref(), Some("admin"));
        assert_eq!(resolved.identity.unwrap().username, "alice");
    }

    #[tokio::test]
    async fn hosts_marker_selects_the_host_branch() {
        let cred = Credentials::with_dn("/CN=node1").extra(ExtraCredentials::hosts());
        let identity = manager().authorize("admin", &cred).await.unwrap().unwrap();
        assert!(identity.is_host());
        assert_eq!(identity.username, "node1");
    }

    #[tokio::test]
    async fn hosts_marker_overrides_an_explicit_group() {
        let cred = Credentials::with_dn("/CN=node1")
            .group("user")
            .extra(ExtraCredentials::hosts());
        let resolved = manager().resolve(&cred).await.unwrap();
        assert_eq!(resolved.group.as_deref(), Some(HOSTS_GROUP));
        let identity = resolved.identity.unwrap();
        assert!(identity.is_host());
        assert_eq!(identity.properties, strings(&["ServiceAdministrator"]));

        // a user DN claiming to be a host is looked up as a host, and fails
        let cred = Credentials::with_dn("/CN=alice")
            .group("user")
            .extra(ExtraCredentials::hosts());
        assert_matches!(
            manager().authorize("members", &cred).await,
            Err(AuthError::UnknownHost { ref dn, .. }) if dn == "/CN=alice"
        );
    }

    #[tokio::test]
    async fn legacy_marker_without_dn() {
        let cred = Credentials::anonymous().extra(ExtraCredentials::Marker("admin".into()));
        let resolved = manager().resolve(&cred).await.unwrap();
        assert_eq!(resolved.group.as_deref(), Some("admin"));
        assert_eq!(resolved.identity, None);
        assert!(!resolved.is_authenticated());

        assert_matches!(manager().authorize("open", &cred).await, Ok(None));
        assert_matches!(manager().authorize("admin", &cred).await, Err(AuthError::NoDn));
        assert!(!manager().auth_query("members", &cred).await);
    }

    #[tokio::test]
    async fn legacy_marker_is_used_as_group() {
        let cred = Credentials::with_dn("/CN=alice").extra(ExtraCredentials::Marker("admin".into()));
        let resolved = manager().resolve(&cred).await.unwrap();
        assert_eq!(resolved.group.as_deref(), Some("admin"));

        // an explicit group wins over the marker
        let cred = cred.group("user");
        let resolved = manager().resolve(&cred).await.unwrap();
        assert_eq!(resolved.group.as_deref(), Some("user"));
    }

    #[tokio::test]
    async fn untrusted_forwarding_is_rejected() {
        let cred = Credentials::forwarded("/CN=mallory", "/CN=alice", "admin");
        assert_matches!(
            manager().authorize("open", &cred).await,
            Err(AuthError::UntrustedForwarding)
        );
        assert!(!manager().auth_query("open", &cred).await);
    }

    #[tokio::test]
    async fn unrecognized_extra_credentials_are_rejected() {
        let cred = Credentials::with_dn("/CN=alice")
            .extra(ExtraCredentials::Unrecognized(serde_json::json!({"dn": "x"})));
        assert_matches!(
            manager().authorize("members", &cred).await,
            Err(AuthError::UntrustedForwarding)
        );
    }

    #[tokio::test]
    async fn decisions() {
        let m = manager();
        let alice = Credentials::with_dn("/CN=alice");
        assert_matches!(m.authorize("open", &Credentials::anonymous()).await, Ok(None));
        assert_matches!(m.authorize("everybody", &alice).await, Ok(Some(_)));
        assert_matches!(
            m.authorize("members", &Credentials::anonymous()).await,
            Err(AuthError::NoDn)
        );
        assert_matches!(m.authorize("members", &alice).await, Ok(Some(_)));
        assert_matches!(
            m.authorize("admin", &alice).await,
            Err(AuthError::Unauthorized(method)) if method == "admin"
        );
        assert!(m.auth_query("admin", &alice.clone().group("admin")).await);
        assert!(m.auth_query("Jobs/submit", &alice).await);
        assert!(!m.auth_query("unlisted", &alice).await);
        assert_matches!(
            m.authorize("open", &Credentials::with_dn("/CN=stranger")).await,
            Err(AuthError::NotInGroup { .. })
        );
    }
}

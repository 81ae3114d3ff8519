//! Mapping a certificate DN onto a registered host or user.

use crate::credentials::{Identity, HOSTS_GROUP};
use crate::error::{AuthError, AuthResult, RegistryError};
use crate::registry::Registry;
use std::sync::Arc;

/// Resolves DNs against the [`Registry`].
#[derive(Clone)]
pub struct IdentityResolver {
    registry: Arc<dyn Registry>,
}

impl IdentityResolver {
    /// Constructor
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self { registry }
    }

    /// Resolve `dn` in `group`, picking the host or user branch by group.
    pub async fn resolve(&self, dn: &str, group: Option<&str>) -> AuthResult<Identity> {
        match group {
            Some(HOSTS_GROUP) => self.resolve_host(dn).await,
            _ => self.resolve_user(dn, group).await,
        }
    }

    /// A service host presenting its certificate.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_host(&self, dn: &str) -> AuthResult<Identity> {
        let hostname = self
            .registry
            .hostname_for_dn(dn)
            .await
            .map_err(|source| AuthError::UnknownHost {
                dn: dn.to_string(),
                source,
            })?;
        let properties = self.registry.host_properties(&hostname).await?;
        Ok(Identity {
            dn: dn.to_string(),
            group: HOSTS_GROUP.to_string(),
            username: hostname,
            properties,
        })
    }

    /// A user acting in `group`, or in the default user group when none is
    /// given. The DN must belong to one of the group's members.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_user(&self, dn: &str, group: Option<&str>) -> AuthResult<Identity> {
        let group = match group {
            Some(g) => g.to_string(),
            None => self.registry.default_user_group().await?,
        };
        let properties = self.registry.group_properties(&group).await?;
        let members = self.registry.users_in_group(&group).await?;
        if members.is_empty() {
            return Err(AuthError::EmptyGroup(group));
        }
        let username = match self.registry.username_for_dn(dn, &members).await {
            Ok(username) => username,
            Err(RegistryError::UnknownDn(_)) => {
                return Err(AuthError::NotInGroup {
                    dn: dn.to_string(),
                    group,
                })
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Identity {
            dn: dn.to_string(),
            group,
            username,
            properties,
        })
    }
}

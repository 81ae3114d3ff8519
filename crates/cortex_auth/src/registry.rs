//! The directory service: who the users, groups and hosts are.

use crate::error::{RegistryError, RegistryResult};
use cortex_config::{join_path, paths::REGISTRY_SECTION, ConfigSource, ConfigSourceExt};
use std::sync::Arc;

/// Property marking a host whose forwarded credentials are accepted.
pub const TRUSTED_HOST_PROPERTY: &str = "TrustedHost";

/// Group used for users when the request names none and the registry
/// doesn't define `DefaultGroup`.
pub const FALLBACK_USER_GROUP: &str = "user";

/// Interface for the directory service
#[mockall::automock]
#[async_trait::async_trait]
pub trait Registry: Send + Sync {
    /// DNs of the hosts allowed to forward credentials on behalf of users
    async fn trusted_hosts(&self) -> RegistryResult<Vec<String>>;

    /// The host name registered for a host certificate DN
    async fn hostname_for_dn(&self, dn: &str) -> RegistryResult<String>;

    /// Properties granted to a host
    async fn host_properties(&self, host: &str) -> RegistryResult<Vec<String>>;

    /// The group users act in when they don't name one
    async fn default_user_group(&self) -> RegistryResult<String>;

    /// Properties granted to members of a group
    async fn group_properties(&self, group: &str) -> RegistryResult<Vec<String>>;

    /// User names of the members of a group
    async fn users_in_group(&self, group: &str) -> RegistryResult<Vec<String>>;

    /// Which of the `candidates` owns `dn`
    async fn username_for_dn(&self, dn: &str, candidates: &[String]) -> RegistryResult<String>;
}

/// A [`Registry`] backed by the `/Registry` section of the configuration.
///
/// ```yaml
/// Registry:
///   DefaultGroup: user
///   Users:
///     alice:
///       DN: /O=Cortex/CN=Alice
///   Groups:
///     user:
///       Users: alice
///       Properties: NormalUser
///   Hosts:
///     gateway.example.org:
///       DN: /O=Cortex/CN=gateway.example.org
///       Properties: TrustedHost
/// ```
pub struct ConfigRegistry {
    config: Arc<dyn ConfigSource>,
}

impl ConfigRegistry {
    /// Constructor
    pub fn new(config: Arc<dyn ConfigSource>) -> Self {
        Self { config }
    }

    fn path(&self, parts: &[&str]) -> String {
        join_path(std::iter::once(REGISTRY_SECTION).chain(parts.iter().copied()))
    }

    fn hosts(&self) -> Vec<String> {
        self.config.sections(&self.path(&["Hosts"]))
    }

    fn host_dns(&self, host: &str) -> Vec<String> {
        self.config.get_list(&self.path(&["Hosts", host, "DN"]))
    }
}

#[async_trait::async_trait]
impl Registry for ConfigRegistry {
    async fn trusted_hosts(&self) -> RegistryResult<Vec<String>> {
        let mut dns = Vec::new();
        for host in self.hosts() {
            let props = self.config.get_list(&self.path(&["Hosts", host.as_str(), "Properties"]));
            if props.iter().any(|p| p == TRUSTED_HOST_PROPERTY) {
                dns.extend(self.host_dns(&host));
            }
        }
        Ok(dns)
    }

    async fn hostname_for_dn(&self, dn: &str) -> RegistryResult<String> {
        self.hosts()
            .into_iter()
            .find(|host| self.host_dns(host).iter().any(|d| d == dn))
            .ok_or_else(|| RegistryError::UnknownDn(dn.to_string()))
    }

    async fn host_properties(&self, host: &str) -> RegistryResult<Vec<String>> {
        Ok(self.config.get_list(&self.path(&["Hosts", host, "Properties"])))
    }

    async fn default_user_group(&self) -> RegistryResult<String> {
        Ok(self
            .config
            .get_string(&self.path(&["DefaultGroup"]))
            .unwrap_or_else(|| FALLBACK_USER_GROUP.to_string()))
    }

    async fn group_properties(&self, group: &str) -> RegistryResult<Vec<String>> {
        Ok(self.config.get_list(&self.path(&["Groups", group, "Properties"])))
    }

    async fn users_in_group(&self, group: &str) -> RegistryResult<Vec<String>> {
        Ok(self.config.get_list(&self.path(&["Groups", group, "Users"])))
    }

    async fn username_for_dn(&self, dn: &str, candidates: &[String]) -> RegistryResult<String> {
        candidates
            .iter()
            .find(|user| {
                self.config
                    .get_list(&self.path(&["Users", user.as_str(), "DN"]))
                    .iter()
                    .any(|d| d == dn)
            })
            .cloned()
            .ok_or_else(|| RegistryError::UnknownDn(dn.to_string()))
    }
}

//! The credential record handed over by the transport layer, and the
//! identity resolved from it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The reserved group presented by service hosts.
pub const HOSTS_GROUP: &str = "hosts";

/// The `extraCredentials` field of a credential record.
///
/// Gateways forward the identity of the user they act for as a
/// `(DN, group)` pair. Hosts announce themselves with the [`HOSTS_GROUP`]
/// marker. Anything else is carried through so it can be rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraCredentials {
    /// A `(DN, group)` pair forwarded by a gateway
    Forwarded(String, String),
    /// A plain string marker
    Marker(String),
    /// Some other shape, never valid
    Unrecognized(serde_json::Value),
}

impl ExtraCredentials {
    /// The marker announcing a host identity
    pub fn hosts() -> Self {
        Self::Marker(HOSTS_GROUP.to_string())
    }

    /// Is this the [`HOSTS_GROUP`] marker?
    pub fn is_hosts_marker(&self) -> bool {
        matches!(self, Self::Marker(m) if m == HOSTS_GROUP)
    }
}

impl fmt::Display for ExtraCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forwarded(dn, group) => write!(f, "({dn}, {group})"),
            Self::Marker(m) => write!(f, "{m}"),
            Self::Unrecognized(v) => write!(f, "{v}"),
        }
    }
}

/// A raw credential record, as extracted from the caller's certificate and
/// request by the transport layer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Distinguished name of the peer certificate
    #[serde(rename = "DN", default, skip_serializing_if = "Option::is_none")]
    pub dn: Option<String>,
    /// The group the caller claims to act in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Forwarded identity or host marker
    #[serde(
        rename = "extraCredentials",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub extra_credentials: Option<ExtraCredentials>,
}

impl Credentials {
    /// A record without any identity
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A record carrying only a DN
    pub fn with_dn(dn: impl Into<String>) -> Self {
        Self {
            dn: Some(dn.into()),
            ..Self::default()
        }
    }

    /// Set the claimed group
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Set the extra credentials
    pub fn extra(mut self, extra: ExtraCredentials) -> Self {
        self.extra_credentials = Some(extra);
        self
    }

    /// A gateway with DN `gateway_dn` forwarding a call on behalf of
    /// `dn` acting in `group`
    pub fn forwarded(
        gateway_dn: impl Into<String>,
        dn: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self::with_dn(gateway_dn).extra(ExtraCredentials::Forwarded(dn.into(), group.into()))
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        if let Some(dn) = &self.dn {
            write!(f, "DN={dn}")?;
            sep = " ";
        }
        if let Some(group) = &self.group {
            write!(f, "{sep}group={group}")?;
            sep = " ";
        }
        if let Some(extra) = &self.extra_credentials {
            write!(f, "{sep}extraCredentials={extra}")?;
        }
        Ok(())
    }
}

/// A caller whose DN has been mapped onto a registered user or host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Distinguished name the identity was resolved from
    pub dn: String,
    /// Group the caller acts in
    pub group: String,
    /// Registered user name, or host name for host identities
    pub username: String,
    /// Properties granted to the group (or host)
    pub properties: Vec<String>,
}

impl Identity {
    /// Whether this identity is a service host
    pub fn is_host(&self) -> bool {
        self.group == HOSTS_GROUP
    }
}

/// The outcome of resolving a [`Credentials`] record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedCredentials {
    /// The group in effect after forwarding and marker handling
    pub group: Option<String>,
    /// The resolved identity. `None` for callers without a DN.
    pub identity: Option<Identity>,
    /// Number of forwarding hops that were unpacked (0 or 1)
    pub forwarded_hops: usize,
}

impl ResolvedCredentials {
    /// Whether the caller presented an authenticated identity
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

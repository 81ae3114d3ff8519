//! Which properties a caller needs to invoke a method.

use cortex_config::{join_path, path_segments, ConfigSource, ConfigSourceExt};
use std::sync::Arc;

/// Grants access to everybody, authenticated or not.
pub const ANY: &str = "any";
/// Same as [`ANY`].
pub const ALL: &str = "all";
/// Grants access to any caller with a resolved identity.
pub const AUTHENTICATED: &str = "authenticated";

/// Rule consulted when a method has no rule of its own.
pub const DEFAULT_RULE: &str = "Default";

/// The properties required to call a method, in configuration order
/// without duplicates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequiredProperties(Vec<String>);

impl RequiredProperties {
    /// Build from a configured list, dropping duplicates.
    pub fn new<I, S>(props: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for p in props {
            let p = p.into();
            if !out.contains(&p) {
                out.push(p);
            }
        }
        Self(out)
    }

    /// No rule at all
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Open to everybody
    pub fn is_open(&self) -> bool {
        self.has_marker(ANY) || self.has_marker(ALL)
    }

    /// Open to any authenticated caller
    pub fn accepts_any_authenticated(&self) -> bool {
        self.has_marker(AUTHENTICATED)
    }

    /// Does any of `granted` satisfy the rule?
    pub fn intersects(&self, granted: &[String]) -> bool {
        self.0.iter().any(|p| granted.contains(p))
    }

    /// The properties, in order
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    fn has_marker(&self, marker: &str) -> bool {
        self.0.iter().any(|p| p == marker)
    }
}

impl std::fmt::Display for RequiredProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}

/// The authorization rules of one service, read from its `Authorization`
/// configuration section.
#[derive(Clone)]
pub struct PolicyStore {
    auth_section: String,
    config: Arc<dyn ConfigSource>,
}

impl PolicyStore {
    /// Rules live below `auth_section`, keyed by method name.
    pub fn new(auth_section: impl Into<String>, config: Arc<dyn ConfigSource>) -> Self {
        Self {
            auth_section: auth_section.into(),
            config,
        }
    }

    /// The section the rules are read from
    pub fn auth_section(&self) -> &str {
        &self.auth_section
    }

    /// Properties required by `method`, falling back to the `Default` rule
    /// of the method's enclosing category.
    pub fn required_properties(&self, method: &str) -> RequiredProperties {
        let exact = self.rule(method);
        if !exact.is_empty() {
            return exact;
        }
        let fallback = default_rule_for(method);
        tracing::debug!(%method, %fallback, "no rule for method, trying the default");
        self.rule(&fallback)
    }

    fn rule(&self, name: &str) -> RequiredProperties {
        RequiredProperties::new(
            self.config
                .get_list(&join_path([self.auth_section.as_str(), name])),
        )
    }
}

/// `Sys/Method` -> `Sys/Default`, `Sys/Sub/Method` -> `Sys/Sub/Default`,
/// `Method` -> `Default`.
pub fn default_rule_for(method: &str) -> String {
    let segments: Vec<&str> = path_segments(method).collect();
    match segments.split_last() {
        Some((_, [])) | None => DEFAULT_RULE.to_string(),
        Some((_, category)) => format!("{}/{}", category.join("/"), DEFAULT_RULE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_config::ConfigTree;
    use test_case::test_case;

    #[test_case("Sys/Method" => "Sys/Default" ; "system method")]
    #[test_case("Sys/Sub/Method" => "Sys/Sub/Default" ; "nested category")]
    #[test_case("Method" => "Default" ; "bare method")]
    #[test_case("/Sys/Method/" => "Sys/Default" ; "surrounding slashes")]
    fn default_rules(method: &str) -> String {
        default_rule_for(method)
    }

    fn store() -> PolicyStore {
        let tree = ConfigTree::from_yaml(
            r#"
Systems:
  Jobs:
    Production:
      Services:
        JobManager:
          Authorization:
            Default: authenticated
            submitJob: [NormalUser, JobAdministrator, NormalUser]
            Monitoring:
              Default: ServiceAdministrator
              ping: any
"#,
        )
        .unwrap();
        PolicyStore::new(
            "/Systems/Jobs/Production/Services/JobManager/Authorization",
            Arc::new(tree),
        )
    }

    #[test]
    fn exact_rule_wins_and_is_deduplicated() {
        assert_eq!(
            store().required_properties("submitJob").as_slice(),
            ["NormalUser", "JobAdministrator"]
        );
    }

    #[test]
    fn falls_back_to_category_default() {
        let store = store();
        assert!(store.required_properties("killJob").accepts_any_authenticated());
        assert_eq!(
            store.required_properties("Monitoring/status").as_slice(),
            ["ServiceAdministrator"]
        );
        assert!(store.required_properties("Monitoring/ping").is_open());
    }

    #[test]
    fn no_rule_is_empty() {
        assert!(store().required_properties("Other/thing").is_empty());
    }

    #[test]
    fn markers_and_intersection() {
        assert!(RequiredProperties::new(["all"]).is_open());
        assert!(!RequiredProperties::new(["Any"]).is_open());
        let props = RequiredProperties::new(["JobAdministrator", "ServiceAdministrator"]);
        assert!(!props.is_open());
        assert!(props.intersects(&["ServiceAdministrator".to_string()]));
        assert!(!props.intersects(&["NormalUser".to_string()]));
        assert_eq!(props.to_string(), "JobAdministrator, ServiceAdministrator");
    }
}

use cortex_auth::*;
use cortex_config::{paths, ConfigSource, ConfigTree};
use std::sync::Arc;
use test_case::test_case;

const CONFIG: &str = r#"
Cortex:
  Setup: Production
  Setups:
    Production:
      WorkloadManagement: Prod
Registry:
  DefaultGroup: user
  Users:
    alice:
      DN: /O=Cortex/CN=Alice
    bob:
      DN: /O=Cortex/CN=Bob
  Groups:
    user:
      Users: alice, bob
      Properties: NormalUser
    admin:
      Users: alice
      Properties: [ServiceAdministrator, JobAdministrator]
    empty:
      Properties: NormalUser
  Hosts:
    web.example.org:
      DN: /O=Cortex/CN=web.example.org
      Properties: TrustedHost
    node1.example.org:
      DN: /O=Cortex/CN=node1.example.org
      Properties: ServiceAdministrator
Systems:
  WorkloadManagement:
    Prod:
      Services:
        JobManager:
          Authorization:
            Default: authenticated
            getStatus: any
            listAll: all
            submitJob: NormalUser
            killJob: [JobAdministrator]
            Admin:
              Default: ServiceAdministrator
              ping: any
"#;

const ALICE: &str = "/O=Cortex/CN=Alice";
const BOB: &str = "/O=Cortex/CN=Bob";
const WEB: &str = "/O=Cortex/CN=web.example.org";
const NODE: &str = "/O=Cortex/CN=node1.example.org";

fn manager() -> AuthManager {
    let _ = cortex_trace::test_run();
    let config: Arc<dyn ConfigSource> = Arc::new(ConfigTree::from_yaml(CONFIG).unwrap());
    let section = format!(
        "{}/Authorization",
        paths::service_section(config.as_ref(), "WorkloadManagement/JobManager", "Production")
            .unwrap()
    );
    let registry = Arc::new(ConfigRegistry::new(config.clone()));
    AuthManager::new(section, config, registry)
}

fn records() -> Vec<Credentials> {
    vec![
        Credentials::anonymous(),
        Credentials::anonymous().group("admin"),
        Credentials::with_dn(ALICE),
        Credentials::with_dn(BOB).group("admin"),
        Credentials::with_dn("/CN=unknown"),
        Credentials::with_dn(NODE).extra(ExtraCredentials::hosts()),
        Credentials::forwarded(WEB, ALICE, "admin"),
    ]
}

#[tokio::test(flavor = "multi_thread")]
async fn records_without_dn_only_reach_open_methods() {
    let m = manager();
    for method in ["submitJob", "killJob", "Admin/restart", "whatever"] {
        assert!(!m.auth_query(method, &Credentials::anonymous()).await, "{method}");
        assert!(
            !m.auth_query(method, &Credentials::anonymous().group("admin")).await,
            "{method}"
        );
    }
    assert!(m.auth_query("getStatus", &Credentials::anonymous()).await);
    assert!(m.auth_query("listAll", &Credentials::anonymous()).await);
}

#[test_case("getStatus")]
#[test_case("listAll")]
#[test_case("Admin/ping")]
#[tokio::test(flavor = "multi_thread")]
async fn open_methods_accept_every_resolvable_record(method: &str) {
    let m = manager();
    for cred in records() {
        let expected = m.resolve(&cred).await.is_ok();
        assert_eq!(m.auth_query(method, &cred).await, expected, "{cred}");
    }
    assert!(m.auth_query(method, &Credentials::anonymous()).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn authenticated_ignores_properties() {
    let m = manager();
    // No explicit rule: falls back to Default = authenticated
    assert!(m.auth_query("getJobs", &Credentials::with_dn(ALICE)).await);
    assert!(m.auth_query("getJobs", &Credentials::with_dn(BOB)).await);
    assert!(
        m.auth_query(
            "getJobs",
            &Credentials::with_dn(NODE).extra(ExtraCredentials::hosts())
        )
        .await
    );
}

#[test_case("submitJob" ; "user property")]
#[test_case("killJob" ; "admin property")]
#[test_case("Admin/restart" ; "category default")]
#[test_case("getStatus" ; "open")]
#[tokio::test(flavor = "multi_thread")]
async fn forwarding_is_transparent(method: &str) {
    let m = manager();
    for group in ["user", "admin"] {
        let direct = m
            .auth_query(method, &Credentials::with_dn(ALICE).group(group))
            .await;
        let forwarded = m
            .auth_query(method, &Credentials::forwarded(WEB, ALICE, group))
            .await;
        assert_eq!(direct, forwarded, "{method} as {group}");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn untrusted_hosts_cannot_forward() {
    let m = manager();
    let cred = Credentials::forwarded(NODE, ALICE, "admin");
    assert!(!m.auth_query("killJob", &cred).await);
    assert!(!m.auth_query("getStatus", &cred).await);
    assert!(matches!(
        m.authorize("killJob", &cred).await,
        Err(AuthError::UntrustedForwarding)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn group_properties_decide() {
    let m = manager();
    assert!(m.auth_query("submitJob", &Credentials::with_dn(BOB)).await);
    assert!(!m.auth_query("killJob", &Credentials::with_dn(BOB)).await);
    assert!(
        m.auth_query("killJob", &Credentials::with_dn(ALICE).group("admin"))
            .await
    );
    // bob is not a member of admin
    assert!(
        !m.auth_query("killJob", &Credentials::with_dn(BOB).group("admin"))
            .await
    );
    assert!(
        !m.auth_query("submitJob", &Credentials::with_dn(ALICE).group("empty"))
            .await
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn hosts_get_their_own_properties() {
    let m = manager();
    let node = Credentials::with_dn(NODE).extra(ExtraCredentials::hosts());
    assert!(m.auth_query("Admin/restart", &node).await);
    assert!(!m.auth_query("submitJob", &node).await);

    let unknown = Credentials::with_dn("/CN=rogue").extra(ExtraCredentials::hosts());
    assert!(!m.auth_query("getStatus", &unknown).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_queries_share_one_manager() {
    let m = Arc::new(manager());
    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let m = m.clone();
            tokio::spawn(async move {
                let (cred, method, expected) = if i % 2 == 0 {
                    (Credentials::with_dn(BOB), "submitJob", true)
                } else {
                    (Credentials::with_dn(BOB), "killJob", false)
                };
                assert_eq!(m.auth_query(method, &cred).await, expected);
            })
        })
        .collect();
    for t in tasks {
        t.await.unwrap();
    }
}

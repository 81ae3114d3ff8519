#![forbid(missing_docs)]
//! The `cortex` command: ask the authorization rules and the executor
//! configuration questions without starting a service.

use anyhow::Context;
use clap::{Parser, Subcommand};
use cortex_auth::{AuthManager, ConfigRegistry, Credentials, ExtraCredentials};
use cortex_config::{ConfigSource, ConfigTree};
use cortex_executor::{BootstrapParams, ExecutorConfig};
use cortex_trace::Output;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Inspect a cortex configuration.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cortex {
    /// YAML configuration file.
    #[arg(short, long, env = "CORTEX_CONFIG")]
    pub config: PathBuf,

    /// Log output format: Compact, Json, Log, LogTimed or None.
    #[arg(long, default_value = "Log")]
    pub structured: Output,

    /// What to do.
    #[command(subcommand)]
    pub cmd: Cmd,
}

/// The subcommands
#[derive(Debug, Subcommand)]
pub enum Cmd {
    /// Would a caller be allowed to invoke a method?
    /// Prints `allowed` or `denied`, and exits non-zero when denied.
    Auth {
        /// Section holding the service's authorization rules.
        auth_section: String,
        /// Method to call, e.g. `submitJob` or `Admin/restart`.
        method: String,
        /// DN of the caller's certificate.
        #[arg(long)]
        dn: Option<String>,
        /// Group the caller acts in.
        #[arg(long)]
        group: Option<String>,
        /// Extra credentials marker, e.g. `hosts`.
        #[arg(long, conflicts_with = "forward_dn")]
        extra: Option<String>,
        /// DN of the user a gateway forwards the call for.
        #[arg(long, requires = "forward_group")]
        forward_dn: Option<String>,
        /// Group of the user a gateway forwards the call for.
        #[arg(long, requires = "forward_dn")]
        forward_group: Option<String>,
    },

    /// Print the properties required to call a method.
    Properties {
        /// Section holding the service's authorization rules.
        auth_section: String,
        /// Method to look up.
        method: String,
    },

    /// Print where an executor finds its configuration and files.
    Executor {
        /// `<System>/<Name>` of the executor.
        name: String,
        /// Name the executor code is registered under.
        #[arg(long)]
        load_name: Option<String>,
        /// Overrides `/LocalSite/InstancePath`.
        #[arg(long)]
        instance_path: Option<PathBuf>,
        /// Overrides `/Cortex/Setup`.
        #[arg(long)]
        setup: Option<String>,
    },
}

impl Cortex {
    /// Run the command, printing to stdout. Returns false when the answer
    /// is a denial.
    pub async fn run(self) -> anyhow::Result<bool> {
        let config = ConfigTree::load_yaml(&self.config)
            .with_context(|| format!("loading {}", self.config.display()))?;
        let mut stdout = std::io::stdout();
        self.cmd.run(Arc::new(config), &mut stdout).await
    }
}

impl Cmd {
    /// Run against an already loaded configuration.
    pub async fn run(self, config: Arc<dyn ConfigSource>, out: &mut impl Write) -> anyhow::Result<bool> {
        match self {
            Cmd::Auth {
                auth_section,
                method,
                dn,
                group,
                extra,
                forward_dn,
                forward_group,
            } => {
                let cred = Credentials {
                    dn,
                    group,
                    extra_credentials: match (forward_dn, forward_group, extra) {
                        (Some(fdn), Some(fgroup), _) => Some(ExtraCredentials::Forwarded(fdn, fgroup)),
                        (_, _, Some(marker)) => Some(ExtraCredentials::Marker(marker)),
                        _ => None,
                    },
                };
                let registry = Arc::new(ConfigRegistry::new(config.clone()));
                let manager = AuthManager::new(auth_section, config, registry);
                let allowed = manager.auth_query(&method, &cred).await;
                writeln!(out, "{}", if allowed { "allowed" } else { "denied" })?;
                Ok(allowed)
            }

            Cmd::Properties {
                auth_section,
                method,
            } => {
                let registry = Arc::new(ConfigRegistry::new(config.clone()));
                let manager = AuthManager::new(auth_section, config, registry);
                for prop in manager.policy().required_properties(&method).as_slice() {
                    writeln!(out, "{prop}")?;
                }
                Ok(true)
            }

            Cmd::Executor {
                name,
                load_name,
                instance_path,
                setup,
            } => {
                let mut params = BootstrapParams::from_config(name, config.as_ref());
                if let Some(load_name) = load_name {
                    params = params.with_load_name(load_name);
                }
                if let Some(instance_path) = instance_path {
                    params.instance_path = instance_path;
                }
                if let Some(setup) = setup {
                    params = params.with_setup(setup);
                }
                let exe = ExecutorConfig::new(&params, config)?;
                let props = exe.properties();
                writeln!(out, "section: {}", props.section)?;
                writeln!(out, "loadSection: {}", props.load_section)?;
                writeln!(out, "setup: {}", props.setup)?;
                writeln!(out, "enabled: {}", exe.enabled())?;
                writeln!(out, "monitoringEnabled: {}", exe.monitoring_enabled())?;
                writeln!(out, "controlDirectory: {}", exe.control_directory().display())?;
                writeln!(out, "workDirectory: {}", exe.work_directory().display())?;
                writeln!(out, "reconnectRetries: {}", exe.reconnect_retries())?;
                writeln!(out, "reconnectSleep: {}s", exe.reconnect_sleep().as_secs())?;
                Ok(true)
            }
        }
    }
}

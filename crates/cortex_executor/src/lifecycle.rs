//! Start up of an executor: where its configuration lives, which defaults
//! apply, and the one-time `initialize` hook.

use crate::error::{BootstrapError, BootstrapResult};
use crate::hooks::Executor;
use crate::mind::MindBinding;
use crate::shifter::ProxyInstaller;
use cortex_config::{
    convert_value, join_path, path_segments, paths, ConfigSource, ConfigSourceExt, ConfigValue,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Option names with framework defaults
pub mod options {
    /// Whether the executor accepts tasks
    pub const ENABLED: &str = "Enabled";
    /// Whether activity is reported to monitoring
    pub const MONITORING_ENABLED: &str = "MonitoringEnabled";
    /// Directory for control files
    pub const CONTROL_DIRECTORY: &str = "ControlDirectory";
    /// Scratch space, also home of the shifter proxy
    pub const WORK_DIRECTORY: &str = "WorkDirectory";
    /// How often the transport retries connecting to the mind
    pub const RECONNECT_RETRIES: &str = "ReconnectRetries";
    /// Seconds between reconnection attempts
    pub const RECONNECT_SLEEP: &str = "ReconnectSleep";
}

/// Property names maintained by the framework
pub mod properties {
    /// `<System>/<Name>` of the running executor
    pub const FULL_NAME: &str = "fullName";
    /// Name the executor code is registered under
    pub const LOAD_NAME: &str = "loadName";
    /// Configuration section of [`FULL_NAME`]
    pub const SECTION: &str = "section";
    /// Configuration section of [`LOAD_NAME`]
    pub const LOAD_SECTION: &str = "loadSection";
    /// Setup label
    pub const SETUP: &str = "setup";
    /// Identity whose proxy is installed before each task
    pub const SHIFTER_PROXY: &str = "shifterProxy";
    /// Where that proxy is installed, minus the `-<identity>` suffix
    pub const SHIFTER_PROXY_LOCATION: &str = "shifterProxyLocation";
    /// Tasks received so far
    pub const MESSAGES_PROCESSED: &str = "messagesProcessed";
    /// Reconnections to the mind so far
    pub const RECONNECTS: &str = "reconnects";

    pub(crate) const READ_ONLY: [&str; 7] = [
        FULL_NAME,
        LOAD_NAME,
        SECTION,
        LOAD_SECTION,
        SETUP,
        MESSAGES_PROCESSED,
        RECONNECTS,
    ];
}

const DEFAULT_RECONNECT_RETRIES: u32 = 10;
const DEFAULT_RECONNECT_SLEEP: u64 = 5;
const SHIFTER_CRED_FILE: &str = ".shifterCred";

/// Who the executor is and where it runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapParams {
    /// `<System>/<Name>`
    pub name: String,
    /// Name the executor code is registered under, usually `name`
    pub load_name: String,
    /// Root of the installation's mutable state
    pub instance_path: PathBuf,
    /// Setup label
    pub setup: String,
}

impl BootstrapParams {
    /// An executor running its own code in the default setup
    pub fn new(name: impl Into<String>, instance_path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            load_name: name.clone(),
            name,
            instance_path: instance_path.into(),
            setup: paths::DEFAULT_SETUP.to_string(),
        }
    }

    /// Take the instance path and setup from the configuration. The
    /// instance path defaults to the current directory.
    pub fn from_config(name: impl Into<String>, source: &dyn ConfigSource) -> Self {
        let instance_path = source
            .get_string(paths::INSTANCE_PATH)
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(name, instance_path).with_setup(paths::setup(source))
    }

    /// Run code registered under another name
    pub fn with_load_name(mut self, load_name: impl Into<String>) -> Self {
        self.load_name = load_name.into();
        self
    }

    /// Use another setup
    pub fn with_setup(mut self, setup: impl Into<String>) -> Self {
        self.setup = setup.into();
        self
    }
}

/// Properties fixed at bootstrap.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutorProperties {
    /// `<System>/<Name>`
    pub full_name: String,
    /// Name the executor code is registered under
    pub load_name: String,
    /// Configuration section of `full_name`
    pub section: String,
    /// Configuration section of `load_name`
    pub load_section: String,
    /// Setup label
    pub setup: String,
    /// Empty when the executor runs with its own credentials
    pub shifter_proxy: String,
    /// Proxy file path without the `-<identity>` suffix
    pub shifter_proxy_location: PathBuf,
    /// Anything set through [`ExecutorSetup::set_property`]
    pub extra: HashMap<String, ConfigValue>,
}

impl ExecutorProperties {
    fn get(&self, name: &str) -> Option<ConfigValue> {
        let value = match name {
            properties::FULL_NAME => self.full_name.clone(),
            properties::LOAD_NAME => self.load_name.clone(),
            properties::SECTION => self.section.clone(),
            properties::LOAD_SECTION => self.load_section.clone(),
            properties::SETUP => self.setup.clone(),
            properties::SHIFTER_PROXY => self.shifter_proxy.clone(),
            properties::SHIFTER_PROXY_LOCATION => {
                self.shifter_proxy_location.display().to_string()
            }
            other => return self.extra.get(other).cloned(),
        };
        Some(ConfigValue::String(value))
    }
}

/// The configuration of a running executor. Read-only once bootstrap is
/// over, so it can be shared between concurrent tasks without locking.
pub struct ExecutorConfig {
    properties: ExecutorProperties,
    defaults: HashMap<String, ConfigValue>,
    mind: Option<MindBinding>,
    source: Arc<dyn ConfigSource>,
}

impl std::fmt::Debug for ExecutorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorConfig")
            .field("properties", &self.properties)
            .field("defaults", &self.defaults)
            .field("mind", &self.mind)
            .finish()
    }
}

impl ExecutorConfig {
    /// Resolve sections and framework defaults for `params`.
    ///
    /// Fails if the executor's system has no instance in the setup.
    pub fn new(params: &BootstrapParams, source: Arc<dyn ConfigSource>) -> BootstrapResult<Self> {
        let section = paths::executor_section(source.as_ref(), &params.name, &params.setup)?;
        let load_section =
            paths::executor_section(source.as_ref(), &params.load_name, &params.setup)?;

        let control_dir = name_dir(&params.instance_path, "control", &params.name);
        let work_dir = name_dir(&params.instance_path, "work", &params.name);

        let mut defaults: HashMap<String, ConfigValue> = HashMap::new();
        defaults.insert(options::ENABLED.to_string(), true.into());
        defaults.insert(options::MONITORING_ENABLED.to_string(), true.into());
        defaults.insert(
            options::CONTROL_DIRECTORY.to_string(),
            control_dir.display().to_string().into(),
        );
        defaults.insert(
            options::WORK_DIRECTORY.to_string(),
            work_dir.display().to_string().into(),
        );
        defaults.insert(
            options::RECONNECT_RETRIES.to_string(),
            DEFAULT_RECONNECT_RETRIES.into(),
        );
        defaults.insert(
            options::RECONNECT_SLEEP.to_string(),
            DEFAULT_RECONNECT_SLEEP.into(),
        );

        Ok(Self {
            properties: ExecutorProperties {
                full_name: params.name.clone(),
                load_name: params.load_name.clone(),
                section,
                load_section,
                setup: params.setup.clone(),
                shifter_proxy: String::new(),
                shifter_proxy_location: work_dir.join(SHIFTER_CRED_FILE),
                extra: HashMap::new(),
            },
            defaults,
            mind: None,
            source,
        })
    }

    /// Look `name` up in the executor's section, then its load section,
    /// then the registered defaults. Names starting with `/` are absolute
    /// configuration paths.
    pub fn get_option(&self, name: &str) -> Option<ConfigValue> {
        self.lookup(name).or_else(|| self.defaults.get(name).cloned())
    }

    /// Like [`get_option`](Self::get_option) but with an explicit default
    /// that takes the place of the registered one.
    pub fn get_option_or<T: DeserializeOwned>(&self, name: &str, default: T) -> T {
        match self.lookup(name) {
            Some(value) => convert(name, value).unwrap_or(default),
            None => default,
        }
    }

    /// [`get_option`](Self::get_option), converted to `T`
    pub fn get_option_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.get_option(name).and_then(|value| convert(name, value))
    }

    fn lookup(&self, name: &str) -> Option<ConfigValue> {
        if name.starts_with('/') {
            return self.source.get(name);
        }
        [&self.properties.section, &self.properties.load_section]
            .into_iter()
            .find_map(|section| self.source.get(&join_path([section.as_str(), name])))
    }

    /// Whether the executor accepts tasks
    pub fn enabled(&self) -> bool {
        self.get_option_as(options::ENABLED).unwrap_or(true)
    }

    /// Whether activity is reported to monitoring
    pub fn monitoring_enabled(&self) -> bool {
        self.get_option_as(options::MONITORING_ENABLED)
            .unwrap_or(true)
    }

    /// `<instance>/control/<name segments>` unless configured otherwise
    pub fn control_directory(&self) -> PathBuf {
        self.get_option_as::<String>(options::CONTROL_DIRECTORY)
            .map(PathBuf::from)
            .unwrap_or_default()
    }

    /// `<instance>/work/<name segments>` unless configured otherwise
    pub fn work_directory(&self) -> PathBuf {
        self.get_option_as::<String>(options::WORK_DIRECTORY)
            .map(PathBuf::from)
            .unwrap_or_default()
    }

    /// How often the transport retries connecting to the mind
    pub fn reconnect_retries(&self) -> u32 {
        self.get_option_as(options::RECONNECT_RETRIES)
            .unwrap_or(DEFAULT_RECONNECT_RETRIES)
    }

    /// Pause between reconnection attempts
    pub fn reconnect_sleep(&self) -> Duration {
        Duration::from_secs(
            self.get_option_as(options::RECONNECT_SLEEP)
                .unwrap_or(DEFAULT_RECONNECT_SLEEP),
        )
    }

    /// A property fixed at bootstrap. The live counters are available from
    /// [`ExecutorModule::property`].
    pub fn property(&self, name: &str) -> Option<ConfigValue> {
        self.properties.get(name)
    }

    /// All properties fixed at bootstrap
    pub fn properties(&self) -> &ExecutorProperties {
        &self.properties
    }

    /// The mind this executor registers with
    pub fn mind(&self) -> Option<&MindBinding> {
        self.mind.as_ref()
    }

    /// Identity whose proxy is installed before each task, if any
    pub fn shifter_proxy(&self) -> Option<&str> {
        Some(self.properties.shifter_proxy.as_str()).filter(|s| !s.is_empty())
    }

    /// `<WorkDirectory>/.shifterCred-<identity>` for the configured
    /// identity
    pub fn shifter_proxy_location(&self) -> Option<PathBuf> {
        let identity = self.shifter_proxy()?;
        let mut location = self.properties.shifter_proxy_location.clone().into_os_string();
        location.push("-");
        location.push(identity);
        Some(location.into())
    }
}

fn convert<T: DeserializeOwned>(name: &str, value: ConfigValue) -> Option<T> {
    convert_value(value)
        .map_err(|err| tracing::warn!(option = %name, ?err, "ignoring malformed option"))
        .ok()
}

fn name_dir(instance_path: &Path, kind: &str, name: &str) -> PathBuf {
    let mut dir = instance_path.join(kind);
    dir.extend(path_segments(name));
    dir
}

/// The configuration while [`Executor::initialize`] runs. This is the only
/// time it can be changed.
pub struct ExecutorSetup {
    config: ExecutorConfig,
}

impl ExecutorSetup {
    /// The configuration as it stands
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Register the default of an option
    pub fn set_option(&mut self, name: impl Into<String>, value: impl Into<ConfigValue>) {
        self.config.defaults.insert(name.into(), value.into());
    }

    /// Set a property. The identity properties are owned by the framework.
    pub fn set_property(
        &mut self,
        name: &str,
        value: impl Into<ConfigValue>,
    ) -> BootstrapResult<()> {
        if properties::READ_ONLY.contains(&name) {
            return Err(BootstrapError::ReadOnlyProperty(name.to_string()));
        }
        let value = value.into();
        match name {
            properties::SHIFTER_PROXY => {
                self.config.properties.shifter_proxy = value_string(value);
            }
            properties::SHIFTER_PROXY_LOCATION => {
                self.config.properties.shifter_proxy_location = value_string(value).into();
            }
            _ => {
                self.config.properties.extra.insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    /// Install the proxy of `identity` before processing each task
    pub fn set_shifter_proxy(&mut self, identity: impl Into<String>) {
        self.config.properties.shifter_proxy = identity.into();
    }

    /// Bind the executor to its mind. Can only be done once.
    pub fn set_mind(&mut self, mind: MindBinding) -> BootstrapResult<()> {
        if let Some(current) = &self.config.mind {
            return Err(BootstrapError::MindAlreadyBound(current.name().to_string()));
        }
        self.config.mind = Some(mind);
        Ok(())
    }
}

fn value_string(value: ConfigValue) -> String {
    match value {
        ConfigValue::String(s) => s,
        ConfigValue::Null => String::new(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// A bootstrapped executor, ready to process tasks.
pub struct ExecutorModule<E: Executor> {
    pub(crate) executor: E,
    pub(crate) config: Arc<ExecutorConfig>,
    pub(crate) installer: Arc<dyn ProxyInstaller>,
    messages_processed: AtomicU64,
    reconnects: AtomicU64,
}

impl<E: Executor> std::fmt::Debug for ExecutorModule<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorModule")
            .field("config", &self.config)
            .field("messages_processed", &self.messages_processed())
            .field("reconnects", &self.reconnects())
            .finish()
    }
}

impl<E: Executor> ExecutorModule<E> {
    /// Resolve the configuration for `params` and run the executor's
    /// `initialize` hook once.
    ///
    /// A hook error becomes [`BootstrapError::Initialize`] and the process
    /// should not start. A panicking hook is not caught.
    pub async fn bootstrap(
        params: BootstrapParams,
        source: Arc<dyn ConfigSource>,
        installer: Arc<dyn ProxyInstaller>,
        mut executor: E,
    ) -> BootstrapResult<Self> {
        let config = ExecutorConfig::new(&params, source)?;
        let mut setup = ExecutorSetup { config };
        tracing::info!(
            name = %params.name,
            load_name = %params.load_name,
            section = %setup.config.properties.section,
            "initializing executor"
        );
        if let Err(err) = executor.initialize(&mut setup).await {
            tracing::error!(name = %params.load_name, ?err, "exception while initializing");
            return Err(BootstrapError::Initialize {
                name: params.load_name,
                message: format!("{err:#}"),
            });
        }
        Ok(Self {
            executor,
            config: Arc::new(setup.config),
            installer,
            messages_processed: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
        })
    }

    /// The frozen configuration
    pub fn config(&self) -> &Arc<ExecutorConfig> {
        &self.config
    }

    /// The executor's hooks
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Whether the executor accepts tasks
    pub fn enabled(&self) -> bool {
        self.config.enabled()
    }

    /// A property, including the live counters
    pub fn property(&self, name: &str) -> Option<ConfigValue> {
        match name {
            properties::MESSAGES_PROCESSED => Some(self.messages_processed().into()),
            properties::RECONNECTS => Some(self.reconnects().into()),
            _ => self.config.property(name),
        }
    }

    /// Tasks received so far
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    /// Reconnections to the mind so far
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Called by the transport each time it reconnects to the mind
    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_message(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }
}

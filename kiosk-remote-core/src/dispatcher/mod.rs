//! # Dispatcher
//!
//! Classifies inbound requests and executes them. Resolution order is fixed:
//!
//! 1. a request naming a `route` resolves through the widget-contributed
//!    capability routes, whatever its `action` is called,
//! 2. otherwise its `action` against the built-in action vocabulary,
//! 3. its `data` selector against the built-in query vocabulary,
//! 4. anything else is a validation error and nothing is emitted.
//!
//! State-changing actions emit a notification and return without waiting
//! for the display. Queries that need the live display state ask the display
//! process for a refresh and wait for its acknowledgement, falling back to
//! the last known snapshot after the timeout.

mod action;
mod request;

pub use action::{Alert, BuiltinAction, DataQuery, MonitorAction, WindowControl};
pub use request::{Channel, RemoteRequest, RemoteResponse};

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::bus::{InboundMessage, NotificationBus, names};
use crate::capability::CapabilityRoutes;
use crate::command::{CommandOutput, CommandRunner, ShellRunner, quote};
use crate::config::RemoteConfig;
use crate::config_store::ConfigStore;
use crate::defaults::WidgetDefaults;
use crate::discovery::{CapabilityDiscovery, SourceScan, discover_all};
use crate::error::{RemoteError, RemoteResult};
use crate::index::RefreshOutcome;
use crate::lifecycle::LifecycleManager;
use crate::net::flat_ip_addresses;
use crate::pending::SnapshotRequests;
use crate::registry::ModuleRegistry;
use crate::snapshot::{DisplaySettings, DisplaySnapshot};
use crate::translation::Translations;
use crate::vcs::{GitCli, VersionControl};

/// Screen power state parsed from the status command output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    On,
    Off,
    Unknown,
}

impl MonitorState {
    pub fn from_status_output(stdout: &str) -> Self {
        if stdout.contains("TV is off") || stdout.contains("false") {
            MonitorState::Off
        } else if stdout.contains("HDMI") || stdout.contains("true") {
            MonitorState::On
        } else {
            MonitorState::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorState::On => "on",
            MonitorState::Off => "off",
            MonitorState::Unknown => "unknown",
        }
    }
}

/// Combines request parameters into a notification payload.
///
/// A lone path parameter is sent as a string. Together with query
/// parameters it becomes the `param` field of an object. A body object is
/// merged on top.
pub fn notification_payload(
    path_param: Option<String>,
    query: Map<String, Value>,
    body: Option<Value>,
) -> Value {
    let payload = match path_param {
        Some(param) if query.is_empty() => Value::String(param),
        Some(param) => {
            let mut object = Map::new();
            object.insert("param".to_string(), Value::String(param));
            object.extend(query);
            Value::Object(object)
        }
        None => Value::Object(query),
    };
    merge_payload(payload, body.as_ref())
}

/// Overlays the fields of `overlay` onto `base`. A non-object base is kept
/// under `param`.
pub fn merge_payload(base: Value, overlay: Option<&Value>) -> Value {
    let Some(Value::Object(overlay)) = overlay else {
        return base;
    };
    let mut merged = match base {
        Value::Object(object) => object,
        Value::Null => Map::new(),
        other => {
            let mut object = Map::new();
            object.insert("param".to_string(), other);
            object
        }
    };
    merged.extend(overlay.clone());
    Value::Object(merged)
}

#[derive(Default)]
struct DisplayState {
    snapshot: Option<DisplaySnapshot>,
    user_presence: Value,
}

struct MonitorCommands {
    on: String,
    off: String,
    status: String,
}

pub struct Dispatcher {
    config: Arc<RemoteConfig>,
    bus: NotificationBus,
    runner: Arc<dyn CommandRunner>,
    registry: Arc<ModuleRegistry>,
    lifecycle: LifecycleManager,
    config_store: ConfigStore,
    routes: CapabilityRoutes,
    discovery: Box<dyn CapabilityDiscovery>,
    snapshots: Arc<SnapshotRequests>,
    display: Arc<RwLock<DisplayState>>,
    translations: RwLock<Map<String, Value>>,
}

impl Dispatcher {
    /// Dispatcher running host commands through the shell and git.
    pub fn new(config: RemoteConfig, bus: NotificationBus) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(ShellRunner::new());
        let vcs = Arc::new(GitCli::new(runner.clone(), config.dependency_timeout));
        Self::with_runtime(config, bus, runner, vcs)
    }

    pub fn with_runtime(
        config: RemoteConfig,
        bus: NotificationBus,
        runner: Arc<dyn CommandRunner>,
        vcs: Arc<dyn VersionControl>,
    ) -> Self {
        let config = Arc::new(config);
        let defaults = WidgetDefaults::new();
        let registry = Arc::new(ModuleRegistry::new(
            config.clone(),
            vcs.clone(),
            defaults.clone(),
        ));
        Self {
            lifecycle: LifecycleManager::new(config.clone(), vcs, runner.clone(), registry.clone()),
            config_store: ConfigStore::new(&config, defaults),
            snapshots: Arc::new(SnapshotRequests::new(bus.clone(), config.snapshot_timeout)),
            discovery: Box::new(SourceScan::new(config.clone())),
            routes: CapabilityRoutes::new(),
            display: Arc::new(RwLock::new(DisplayState::default())),
            translations: RwLock::new(Map::new()),
            registry,
            runner,
            bus,
            config,
        }
    }

    pub fn with_discovery(mut self, discovery: Box<dyn CapabilityDiscovery>) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    pub fn routes(&self) -> &CapabilityRoutes {
        &self.routes
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.config_store
    }

    /// Loads the host configuration, translations and the module catalog.
    #[instrument(skip(self))]
    pub async fn start(&self) {
        self.config_store.load().await;
        self.reload_translations().await;
        let modules = self.registry.refresh().await;
        info!(modules, "Remote control ready");
    }

    /// Refreshes the third-party module index and rescans when it changed.
    pub async fn refresh_module_index(&self, force: bool) -> RefreshOutcome {
        let outcome = self.registry.index().refresh(force).await;
        if outcome == RefreshOutcome::Updated {
            self.registry.refresh().await;
        }
        outcome
    }

    async fn reload_translations(&self) {
        let translations = Translations::new(self.config.translations_path());
        let language = self.config_store.language().await;
        let mut languages = vec![self.config.fallback_language.as_str()];
        if let Some(language) = language.as_deref() {
            languages.push(language);
        }
        *self.translations.write().await = translations.load(&languages).await;
    }

    pub async fn is_initialized(&self) -> bool {
        self.display.read().await.snapshot.is_some()
    }

    /// Key guarding the HTTP API, if one is configured.
    pub async fn api_key(&self) -> Option<String> {
        if let Some(key) = &self.config.api_key {
            return Some(key.expose_secret().to_string());
        }
        self.config_store
            .widget_config(&self.config.own_module)
            .await?
            .get("apiKey")?
            .as_str()
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }

    /// Executes `request` and produces a normalized response. Responses to
    /// socket requests are also emitted as `REMOTE_ACTION_RESULT`.
    #[instrument(skip(self, request), fields(action = ?request.action, data = ?request.data, route = ?request.route))]
    pub async fn dispatch(&self, request: RemoteRequest) -> RemoteResponse {
        let channel = request.channel;
        let response: RemoteResponse = self.execute(request).await.into();
        if channel.is_socket() {
            self.bus
                .send(names::REMOTE_ACTION_RESULT, response.to_json());
        }
        response
    }

    /// Like [`Dispatcher::dispatch`] but keeps the error typed.
    pub async fn execute(&self, request: RemoteRequest) -> RemoteResult<RemoteResponse> {
        let result = self.classify_and_run(&request).await;
        if let Err(e) = &result {
            match e {
                RemoteError::Validation(_) | RemoteError::NotInitialized => {
                    debug!("Rejected {}: {}", request.describe(), e)
                }
                _ => error!("Failed {}: {}", request.describe(), e),
            }
        }
        result
    }

    async fn classify_and_run(&self, request: &RemoteRequest) -> RemoteResult<RemoteResponse> {
        if let Some(route) = request.route.as_deref() {
            return self.external(route, request);
        }
        if let Some(action) = BuiltinAction::parse(request) {
            return self.run_action(action?).await;
        }
        if let Some(query) = DataQuery::parse(request) {
            return self.answer(query, request).await;
        }
        Err(match (&request.action, &request.data) {
            (Some(action), _) => RemoteError::validation(format!("Invalid Option: {}", action)),
            (None, Some(data)) => {
                RemoteError::validation(format!("Unknown or Bad Command: {}", data))
            }
            (None, None) => RemoteError::validation(format!(
                "Unknown or Bad Command: {}",
                request.describe()
            )),
        })
    }

    async fn run_action(&self, action: BuiltinAction) -> RemoteResult<RemoteResponse> {
        debug!(?action, "Running built-in action");
        match action {
            BuiltinAction::Show(params) => self.relay(names::SHOW, Value::Object(params)),
            BuiltinAction::Hide(params) => self.relay(names::HIDE, Value::Object(params)),
            BuiltinAction::Toggle(params) => self.relay(names::TOGGLE, Value::Object(params)),
            BuiltinAction::Brightness(value) => self.relay(names::BRIGHTNESS, value),
            BuiltinAction::Monitor(action) => self.monitor(action).await,
            BuiltinAction::Shutdown => {
                self.host_command(&self.config.commands.shutdown).await?;
                Ok(RemoteResponse::ok())
            }
            BuiltinAction::Reboot => {
                self.host_command(&self.config.commands.reboot).await?;
                Ok(RemoteResponse::ok())
            }
            BuiltinAction::Restart => self.restart().await,
            BuiltinAction::UserPresence(value) => {
                self.display.write().await.user_presence = value.clone();
                self.bus.send(names::USER_PRESENCE, value.clone());
                Ok(RemoteResponse::ok().with("value", value))
            }
            BuiltinAction::Save => {
                self.save_settings_after_refresh();
                Ok(RemoteResponse::ok())
            }
            BuiltinAction::ModuleData => {
                let snapshot = self.current_snapshot().await?;
                match serde_json::to_value(snapshot)? {
                    Value::Object(object) => Ok(RemoteResponse::ok().extend(object)),
                    _ => Err(RemoteError::internal("snapshot is not an object")),
                }
            }
            BuiltinAction::Install { url } => {
                let outcome = self.lifecycle.install(&url).await?;
                Ok(RemoteResponse::ok()
                    .with("module", outcome.module)
                    .with("stdout", outcome.stdout))
            }
            BuiltinAction::Update { module } => {
                let outcome = self.lifecycle.update(module.as_deref()).await?;
                Ok(RemoteResponse::ok()
                    .with("code", serde_json::to_value(outcome.code)?)
                    .with("info", outcome.info))
            }
            BuiltinAction::Delete { module } => {
                self.lifecycle.delete(&module).await?;
                Ok(RemoteResponse::ok().with("module", module))
            }
            BuiltinAction::Refresh => self.relay(names::REFRESH, Value::Null),
            BuiltinAction::ShowAlert(alert) => self.relay(names::SHOW_ALERT, alert.payload()),
            BuiltinAction::HideAlert => self.relay(names::HIDE_ALERT, Value::Null),
            BuiltinAction::Notification { name, payload } => {
                self.bus.send(
                    names::NOTIFICATION,
                    json!({"notification": name, "payload": payload}),
                );
                Ok(RemoteResponse::ok())
            }
            BuiltinAction::Window(control) => self.relay(control.notification(), Value::Null),
        }
    }

    fn relay(&self, notification: &str, payload: Value) -> RemoteResult<RemoteResponse> {
        self.bus.send(notification, payload);
        Ok(RemoteResponse::ok())
    }

    async fn host_command(&self, command: &str) -> RemoteResult<CommandOutput> {
        let output = self
            .runner
            .run(command, None, self.config.command_timeout)
            .await?;
        info!(command, status = ?output.status, "Host command finished");
        if !output.stdout.is_empty() {
            debug!(command, stdout = %output.stdout.trim_end());
        }
        if !output.stderr.is_empty() {
            debug!(command, stderr = %output.stderr.trim_end());
        }
        output.into_result(command)
    }

    async fn monitor_commands(&self) -> MonitorCommands {
        let defaults = &self.config.commands;
        let display = self.display.read().await;
        let custom = display.snapshot.as_ref().and_then(|s| s.custom_commands());
        let pick = |custom: Option<&String>, default: &String| {
            custom.cloned().unwrap_or_else(|| default.clone())
        };
        MonitorCommands {
            on: pick(
                custom.and_then(|c| c.monitor_on_command.as_ref()),
                &defaults.monitor_on,
            ),
            off: pick(
                custom.and_then(|c| c.monitor_off_command.as_ref()),
                &defaults.monitor_off,
            ),
            status: pick(
                custom.and_then(|c| c.monitor_status_command.as_ref()),
                &defaults.monitor_status,
            ),
        }
    }

    async fn monitor(&self, action: MonitorAction) -> RemoteResult<RemoteResponse> {
        let commands = self.monitor_commands().await;
        let turn_on = match action {
            MonitorAction::On => true,
            MonitorAction::Off => false,
            MonitorAction::Status | MonitorAction::Toggle => {
                let output = self.host_command(&commands.status).await?;
                let state = MonitorState::from_status_output(&output.stdout);
                match (action, state) {
                    (MonitorAction::Toggle, MonitorState::Off) => true,
                    (MonitorAction::Toggle, MonitorState::On) => false,
                    _ => return Ok(RemoteResponse::ok().with("monitor", state.as_str())),
                }
            }
        };

        self.bus.send(names::USER_PRESENCE, Value::Bool(turn_on));
        let (command, state) = if turn_on {
            (&commands.on, MonitorState::On)
        } else {
            (&commands.off, MonitorState::Off)
        };
        self.host_command(command).await?;
        Ok(RemoteResponse::ok().with("monitor", state.as_str()))
    }

    async fn restart(&self) -> RemoteResult<RemoteResponse> {
        let commands = &self.config.commands;
        let listing = self.host_command(&commands.process_list).await?;
        let name = commands
            .process_names
            .iter()
            .find(|name| listing.stdout.contains(&format!(" {} ", name)))
            .ok_or_else(|| {
                RemoteError::execution(format!(
                    "None of the processes {:?} is managed by the process manager",
                    commands.process_names
                ))
            })?;
        info!(process = %name, "Restarting display process");
        self.host_command(&format!("{} {}", commands.process_restart, quote(name)))
            .await?;
        self.bus.send(names::RESTART, Value::Null);
        Ok(RemoteResponse::ok())
    }

    fn save_settings_after_refresh(&self) {
        let snapshots = self.snapshots.clone();
        let display = self.display.clone();
        let path = self.config.settings_path();
        tokio::spawn(async move {
            let snapshot = match snapshots.fresh_snapshot().await {
                Some(snapshot) => Some(snapshot),
                None => display.read().await.snapshot.clone(),
            };
            let Some(snapshot) = snapshot else {
                warn!("No display state received yet, settings not saved");
                return;
            };
            if let Err(e) = DisplaySettings::from(&snapshot).save(&path).await {
                error!("Could not save display settings: {}", e);
            }
        });
    }

    /// Fresh snapshot, or the last known one when the display does not
    /// acknowledge in time.
    async fn current_snapshot(&self) -> RemoteResult<DisplaySnapshot> {
        if !self.is_initialized().await {
            return Err(RemoteError::NotInitialized);
        }
        if let Some(snapshot) = self.snapshots.fresh_snapshot().await {
            return Ok(snapshot);
        }
        debug!("Display did not acknowledge, answering with last known state");
        self.display
            .read()
            .await
            .snapshot
            .clone()
            .ok_or(RemoteError::NotInitialized)
    }

    async fn last_snapshot(&self) -> RemoteResult<DisplaySnapshot> {
        self.display
            .read()
            .await
            .snapshot
            .clone()
            .ok_or(RemoteError::NotInitialized)
    }

    async fn answer(
        &self,
        query: DataQuery,
        request: &RemoteRequest,
    ) -> RemoteResult<RemoteResponse> {
        let response = RemoteResponse::ok().with("query", Value::Object(request.params.clone()));
        let snapshot = if query.needs_snapshot() {
            Some(self.current_snapshot().await?)
        } else {
            None
        };
        let response = match query {
            DataQuery::ModulesAvailable => {
                response.with_data(serde_json::to_value(self.registry.list_available().await)?)
            }
            DataQuery::ModulesInstalled => {
                response.with_data(serde_json::to_value(self.registry.list_installed().await)?)
            }
            DataQuery::Translations => {
                response.with_data(Value::Object(self.translations.read().await.clone()))
            }
            DataQuery::MmUpdateAvailable => {
                response.with_result(self.registry.host_update_available().await)
            }
            DataQuery::Config => {
                response.with_data(Value::Object(self.config_store.get_merged().await))
            }
            DataQuery::DefaultConfig { module } => {
                response.with_data(Value::Object(self.widget_defaults(module.as_deref())))
            }
            DataQuery::Modules => {
                let widgets = snapshot.map(|s| s.module_data).unwrap_or_default();
                response.with_data(serde_json::to_value(widgets)?)
            }
            DataQuery::Brightness => response.with_result(
                snapshot
                    .and_then(|s| s.brightness)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            ),
            DataQuery::UserPresence => {
                response.with_result(self.display.read().await.user_presence.clone())
            }
            DataQuery::Categories => {
                response.with_data(self.registry.index().categories().await)
            }
        };
        Ok(response)
    }

    /// Declared defaults of `module`, empty when unknown.
    pub fn widget_defaults(&self, module: Option<&str>) -> Map<String, Value> {
        module
            .and_then(|m| self.config_store.widget_defaults().get(m))
            .unwrap_or_default()
    }

    fn external(&self, route_key: &str, request: &RemoteRequest) -> RemoteResult<RemoteResponse> {
        let route = self.routes.get(route_key).ok_or_else(|| {
            RemoteError::validation(format!("No API routes found for {}.", route_key))
        })?;
        let Some(action_name) = request.action.as_deref() else {
            return match serde_json::to_value(&route)? {
                Value::Object(object) => Ok(RemoteResponse::ok().extend(object)),
                _ => Err(RemoteError::internal("route is not an object")),
            };
        };
        let action = route.actions.get(action_name).ok_or_else(|| {
            RemoteError::validation(format!(
                "Action {} is not a valid action for {}.",
                action_name, route.owner_module
            ))
        })?;
        let method = request.method.as_deref().unwrap_or("GET");
        if !action.allows(method) {
            return Err(RemoteError::validation(format!(
                "Method {} is not allowed for {}/{}.",
                method, route_key, action_name
            )));
        }

        let base = request
            .param("payload")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        let payload = merge_payload(base, action.payload.as_ref());
        Ok(self.relay_notification(&action.notification, payload))
    }

    /// Every capability route keyed by route key.
    pub fn list_routes(&self) -> RemoteResponse {
        self.routes
            .list()
            .into_iter()
            .fold(RemoteResponse::ok(), |response, route| {
                let key = route.route_key.clone();
                match serde_json::to_value(route) {
                    Ok(value) => response.with(&key, value),
                    Err(_) => response,
                }
            })
    }

    /// Emits `NOTIFICATION` carrying `name` and `payload`.
    pub fn relay_notification(&self, name: &str, payload: Value) -> RemoteResponse {
        self.bus.send(
            names::NOTIFICATION,
            json!({"notification": name, "payload": payload.clone()}),
        );
        RemoteResponse::ok()
            .with("notification", name)
            .with("payload", payload)
    }

    /// Show, hide, toggle or inspect widgets by name or identifier.
    #[instrument(skip(self))]
    pub async fn module_command(
        &self,
        name: &str,
        action: Option<&str>,
    ) -> RemoteResult<RemoteResponse> {
        let snapshot = self.last_snapshot().await?;
        let action = action.map(str::to_uppercase);

        let visibility = |action: &str, module: &str| -> Option<(&'static str, Value)> {
            let (notification, force) = match action {
                "SHOW" => (names::SHOW, false),
                "HIDE" => (names::HIDE, false),
                "TOGGLE" => (names::TOGGLE, false),
                "FORCE" => (names::SHOW, true),
                _ => return None,
            };
            let mut payload = json!({"module": module, "action": notification});
            if force {
                payload["force"] = Value::Bool(true);
            }
            Some((notification, payload))
        };

        if name == "all" {
            let action = action.as_deref().unwrap_or_default();
            let (notification, payload) = visibility(action, "all").ok_or_else(|| {
                RemoteError::validation(format!("Action: {} is not a valid action.", action))
            })?;
            self.bus.send(notification, payload);
            return Ok(RemoteResponse::ok());
        }

        let widgets = snapshot.widgets_named(name);
        if widgets.is_empty() {
            return Err(RemoteError::validation("Module Name or Identifier Not Found!"));
        }
        let Some(action) = action else {
            return Ok(RemoteResponse::ok().with_data(serde_json::to_value(&widgets)?));
        };

        if action == "DEFAULTS" {
            return Ok(RemoteResponse::ok()
                .with_data(Value::Object(self.widget_defaults(Some(&widgets[0].name)))));
        }
        let mut emitted = Vec::new();
        for widget in &widgets {
            let (notification, payload) = visibility(&action, &widget.identifier).ok_or_else(|| {
                RemoteError::validation(format!("Action: {} is not a valid action.", action))
            })?;
            emitted.push((notification, payload));
        }
        for (notification, payload) in emitted {
            self.bus.send(notification, payload);
        }
        Ok(RemoteResponse::ok())
    }

    /// Saves a new host configuration through the backup path.
    pub async fn save_config(&self, config: Value) -> RemoteResult<RemoteResponse> {
        let outcome = self.config_store.save(config).await?;
        Ok(RemoteResponse::ok()
            .with("query", json!({"data": "config_update"}))
            .with("backup", outcome.backup.to_string_lossy().to_string())
            .with("config", Value::Object(outcome.config)))
    }

    /// Saves a new host configuration and asks the display to reload.
    pub async fn update_config(&self, config: Value) -> RemoteResult<RemoteResponse> {
        let response = self.save_config(config).await?;
        self.bus.send(names::REFRESH, Value::Null);
        Ok(response)
    }

    /// Reacts to a message from the display process.
    #[instrument(skip(self, message))]
    pub async fn handle_inbound(&self, message: InboundMessage) {
        match message {
            InboundMessage::CurrentStatus(snapshot) => self.on_current_status(snapshot).await,
            InboundMessage::RequestDefaultSettings => {
                self.bus
                    .send(names::IP_ADDRESSES, json!(flat_ip_addresses()));
                if let Some(settings) = DisplaySettings::load(&self.config.settings_path()).await {
                    match serde_json::to_value(settings) {
                        Ok(settings) => self.bus.send(names::DEFAULT_SETTINGS, settings),
                        Err(e) => warn!("Could not encode display settings: {}", e),
                    }
                }
            }
            InboundMessage::RemoteAction(request) => {
                self.dispatch(request).await;
            }
            InboundMessage::NewConfig(config) => {
                let response: RemoteResponse = self.save_config(config).await.into();
                self.bus
                    .send(names::REMOTE_ACTION_RESULT, response.to_json());
            }
            InboundMessage::UserPresence(value) => {
                self.display.write().await.user_presence = value;
            }
            InboundMessage::RegisterApi(registration) => self.routes.register(registration),
            InboundMessage::RemoteClientConnected => {
                self.bus.send(names::REMOTE_CLIENT_CONNECTED, Value::Null);
            }
            InboundMessage::EchoIn(payload) => {
                self.bus.send(names::REMOTE_NOTIFICATION_ECHO_OUT, payload);
            }
            InboundMessage::Unknown(notification) => {
                debug!(notification = %notification.notification, "Ignoring notification");
            }
        }
    }

    async fn on_current_status(&self, snapshot: DisplaySnapshot) {
        let first = {
            let mut display = self.display.write().await;
            display.snapshot.replace(snapshot.clone()).is_none()
        };
        let waiters = self.snapshots.fulfill(&snapshot);
        debug!(waiters, "Display state updated");

        if first {
            info!(widgets = snapshot.module_data.len(), "Display initialized");
            discover_all(
                self.discovery.as_ref(),
                &self.routes,
                &snapshot,
                &self.config,
            )
            .await;
        }
    }
}

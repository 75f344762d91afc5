//! Route → action → descriptor registry for actions contributed by widgets.
//!
//! Routes come from two places: widgets registering their own API over the
//! bus, and capability discovery guessing an API from a widget's source.
//! Self-registered actions always win over guessed ones.

use std::collections::BTreeMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RouteOrigin {
    SelfRegistered,
    Guessed,
}

/// What to emit when an action is invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ActionSpec {
    pub notification: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default = "default_origin")]
    pub origin: RouteOrigin,
}

fn default_origin() -> RouteOrigin {
    RouteOrigin::SelfRegistered
}

impl ActionSpec {
    pub fn guessed(notification: impl Into<String>) -> Self {
        Self {
            notification: notification.into(),
            method: None,
            payload: None,
            origin: RouteOrigin::Guessed,
        }
    }

    /// `true` when the action accepts requests made with `method`.
    pub fn allows(&self, method: &str) -> bool {
        self.method
            .as_deref()
            .is_none_or(|m| m.eq_ignore_ascii_case(method))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityRoute {
    pub route_key: String,
    pub owner_module: String,
    pub actions: BTreeMap<String, ActionSpec>,
}

/// `REGISTER_API` payload sent by a widget.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Registration {
    pub module: String,
    pub path: String,
    #[serde(default)]
    pub actions: BTreeMap<String, RegisteredAction>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegisteredAction {
    pub notification: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

impl From<RegisteredAction> for ActionSpec {
    fn from(action: RegisteredAction) -> Self {
        Self {
            notification: action.notification,
            method: action.method,
            payload: action.payload,
            origin: RouteOrigin::SelfRegistered,
        }
    }
}

#[derive(Default)]
pub struct CapabilityRoutes {
    routes: DashMap<String, CapabilityRoute>,
}

impl CapabilityRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the registered actions under `registration.path`.
    pub fn register(&self, registration: Registration) {
        let Registration {
            module,
            path,
            actions,
        } = registration;
        info!(route = %path, module = %module, actions = actions.len(), "Registering widget API");

        let mut route = self
            .routes
            .entry(path.clone())
            .or_insert_with(|| CapabilityRoute {
                route_key: path,
                owner_module: module.clone(),
                actions: BTreeMap::new(),
            });
        route.owner_module = module;
        for (name, action) in actions {
            route.actions.insert(name, action.into());
        }
    }

    /// Adds guessed actions that are not yet known for `route_key`. Returns
    /// the number of actions added.
    pub fn merge_guessed(
        &self,
        route_key: &str,
        owner_module: &str,
        guessed: BTreeMap<String, ActionSpec>,
    ) -> usize {
        let mut route = self
            .routes
            .entry(route_key.to_string())
            .or_insert_with(|| CapabilityRoute {
                route_key: route_key.to_string(),
                owner_module: owner_module.to_string(),
                actions: BTreeMap::new(),
            });

        let mut added = 0;
        for (name, spec) in guessed {
            if route.actions.contains_key(&name) {
                debug!(route = route_key, action = %name, "Keeping known action");
                continue;
            }
            route.actions.insert(name, spec);
            added += 1;
        }
        added
    }

    pub fn get(&self, route_key: &str) -> Option<CapabilityRoute> {
        self.routes.get(route_key).map(|r| r.value().clone())
    }

    pub fn action(&self, route_key: &str, action: &str) -> Option<ActionSpec> {
        self.routes
            .get(route_key)
            .and_then(|r| r.actions.get(action).cloned())
    }

    /// All routes sorted by route key.
    pub fn list(&self) -> Vec<CapabilityRoute> {
        let mut routes: Vec<_> = self.routes.iter().map(|r| r.value().clone()).collect();
        routes.sort_by(|a, b| a.route_key.cmp(&b.route_key));
        routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

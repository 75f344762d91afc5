//! Guessing widget APIs from their source code.
//!
//! Widgets that never register an API still react to notifications. Their
//! source is scanned for the notification names they compare against, and
//! each name becomes a guessed action under a route derived from the widget
//! name.

use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::{Arc, LazyLock},
};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::capability::{ActionSpec, CapabilityRoutes};
use crate::config::RemoteConfig;
use crate::error::RemoteResult;
use crate::snapshot::{DisplaySnapshot, WidgetState};

static NOTIFICATION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"notification\s*===?\s*["']([A-Z_]+)["']|case\s+["']([A-Z_]+)["']\s*:"#)
        .expect("valid notification regex")
});

/// Lifecycle notifications every widget handles; never exposed as actions.
const LIFECYCLE_NOTIFICATIONS: [&str; 2] = ["ALL_MODULES_STARTED", "DOM_OBJECTS_CREATED"];

/// Notification names a widget source reacts to, deduplicated in order of
/// first appearance.
pub fn scan_notifications(source: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in NOTIFICATION_NAME.captures_iter(source) {
        let Some(name) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        let name = name.as_str();
        if LIFECYCLE_NOTIFICATIONS.contains(&name) || names.iter().any(|n| n == name) {
            continue;
        }
        names.push(name.to_string());
    }
    names
}

/// `CAROUSEL_NEXT` → `carouselnext`.
pub fn action_key(notification: &str) -> String {
    notification.replace(['-', '_'], "").to_lowercase()
}

/// `MMM-Carousel` → `carousel`.
pub fn route_key(module: &str) -> String {
    module.replace("MMM-", "").replace('-', "").to_lowercase()
}

/// Strategy producing guessed actions for one widget.
#[async_trait]
pub trait CapabilityDiscovery: Send + Sync {
    async fn discover(&self, widget: &WidgetState) -> RemoteResult<BTreeMap<String, ActionSpec>>;
}

/// Reads the widget's primary source file and scans it for notification names.
pub struct SourceScan {
    config: Arc<RemoteConfig>,
}

impl SourceScan {
    pub fn new(config: Arc<RemoteConfig>) -> Self {
        Self { config }
    }

    fn source_path(&self, widget: &WidgetState) -> PathBuf {
        match (&widget.path, &widget.file) {
            (Some(path), Some(file)) => self.config.host_root.join(format!("{}{}", path, file)),
            _ => self
                .config
                .modules_path()
                .join(&widget.name)
                .join(format!("{}.js", widget.name)),
        }
    }
}

#[async_trait]
impl CapabilityDiscovery for SourceScan {
    async fn discover(&self, widget: &WidgetState) -> RemoteResult<BTreeMap<String, ActionSpec>> {
        let path = self.source_path(widget);
        let source = tokio::fs::read_to_string(&path).await?;
        Ok(scan_notifications(&source)
            .into_iter()
            .map(|name| (action_key(&name), ActionSpec::guessed(name)))
            .collect())
    }
}

/// Runs `discovery` over every widget in `snapshot` and merges the results
/// into `routes`. Returns the number of guessed actions added.
pub async fn discover_all(
    discovery: &dyn CapabilityDiscovery,
    routes: &CapabilityRoutes,
    snapshot: &DisplaySnapshot,
    config: &RemoteConfig,
) -> usize {
    let mut added = 0;
    let mut seen: Vec<&str> = Vec::new();
    for widget in &snapshot.module_data {
        let name = widget.name.as_str();
        if name == config.own_module
            || config.discovery_excluded.iter().any(|m| m == name)
            || seen.contains(&name)
        {
            continue;
        }
        seen.push(name);

        match discovery.discover(widget).await {
            Ok(actions) if actions.is_empty() => {
                debug!(module = name, "No notifications found");
            }
            Ok(actions) => {
                added += routes.merge_guessed(&route_key(name), name, actions);
            }
            Err(e) => warn!(module = name, "Capability discovery failed: {}", e),
        }
    }
    info!(added, routes = routes.len(), "Capability discovery finished");
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Registration, RouteOrigin};
    use crate::error::RemoteError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const CAROUSEL: &str = r#"
        notificationReceived: function (notification, payload, sender) {
            if (notification === "ALL_MODULES_STARTED") { this.setup(); }
            if (notification == 'CAROUSEL_NEXT') { this.next(); }
            switch (notification) {
                case "CAROUSEL_PREVIOUS": this.previous(); break;
                case 'CAROUSEL_GOTO': this.goto(payload); break;
                case "CAROUSEL_NEXT": break;
                case "lowercase": break;
            }
        }
    "#;

    #[test]
    fn test_scan_notifications() {
        assert_eq!(
            scan_notifications(CAROUSEL),
            vec!["CAROUSEL_NEXT", "CAROUSEL_PREVIOUS", "CAROUSEL_GOTO"]
        );
    }

    #[test]
    fn test_keys() {
        assert_eq!(action_key("CAROUSEL_NEXT"), "carouselnext");
        assert_eq!(route_key("MMM-Carousel"), "carousel");
        assert_eq!(route_key("MMM-Page-Indicator"), "pageindicator");
    }

    struct StaticDiscovery;

    #[async_trait]
    impl CapabilityDiscovery for StaticDiscovery {
        async fn discover(
            &self,
            widget: &WidgetState,
        ) -> RemoteResult<BTreeMap<String, ActionSpec>> {
            match widget.name.as_str() {
                "MMM-Broken" => Err(RemoteError::execution("unreadable")),
                _ => Ok(scan_notifications(CAROUSEL)
                    .into_iter()
                    .map(|n| (action_key(&n), ActionSpec::guessed(n)))
                    .collect()),
            }
        }
    }

    fn snapshot() -> DisplaySnapshot {
        serde_json::from_value(json!({
            "moduleData": [
                {"identifier": "m0", "name": "clock"},
                {"identifier": "m1", "name": "MMM-Remote-Control"},
                {"identifier": "m2", "name": "MMM-Broken"},
                {"identifier": "m3", "name": "MMM-Carousel"},
                {"identifier": "m4", "name": "MMM-Carousel"}
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_discovery_isolates_failures_and_keeps_registered_actions() {
        let routes = CapabilityRoutes::new();
        routes.register(
            serde_json::from_value::<Registration>(json!({
                "module": "MMM-Carousel",
                "path": "carousel",
                "actions": {"carouselnext": {"notification": "CUSTOM_NEXT"}}
            }))
            .unwrap(),
        );

        let added = discover_all(
            &StaticDiscovery,
            &routes,
            &snapshot(),
            &RemoteConfig::default(),
        )
        .await;

        assert_eq!(added, 2);
        assert_eq!(routes.len(), 1);
        let next = routes.action("carousel", "carouselnext").unwrap();
        assert_eq!(next.notification, "CUSTOM_NEXT");
        assert_eq!(next.origin, RouteOrigin::SelfRegistered);
        assert_eq!(
            routes.action("carousel", "carouselgoto").unwrap().origin,
            RouteOrigin::Guessed
        );
    }

    #[tokio::test]
    async fn test_source_scan_reads_widget_file() {
        let dir = tempfile::tempdir().unwrap();
        let widget_dir = dir.path().join("modules/MMM-Carousel");
        std::fs::create_dir_all(&widget_dir).unwrap();
        std::fs::write(widget_dir.join("MMM-Carousel.js"), CAROUSEL).unwrap();

        let scan = SourceScan::new(Arc::new(RemoteConfig::with_root(dir.path())));
        let with_path = WidgetState {
            name: "MMM-Carousel".to_string(),
            path: Some("modules/MMM-Carousel/".to_string()),
            file: Some("MMM-Carousel.js".to_string()),
            ..Default::default()
        };
        let actions = scan.discover(&with_path).await.unwrap();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions["carouselprevious"].notification, "CAROUSEL_PREVIOUS");

        let by_name = WidgetState {
            name: "MMM-Carousel".to_string(),
            ..Default::default()
        };
        assert_eq!(scan.discover(&by_name).await.unwrap(), actions);

        let missing = WidgetState {
            name: "MMM-Missing".to_string(),
            ..Default::default()
        };
        assert!(scan.discover(&missing).await.is_err());
    }
}

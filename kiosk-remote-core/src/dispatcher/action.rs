//! The fixed vocabularies: built-in actions and data queries.

use serde_json::{Map, Value, json};

use super::request::RemoteRequest;
use crate::bus::names;
use crate::error::{RemoteError, RemoteResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorAction {
    On,
    Off,
    Toggle,
    Status,
}

/// Window-manager controls relayed to the display process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowControl {
    Minimize,
    ToggleFullscreen,
    DevTools,
    Horizontal,
    Vertical,
}

impl WindowControl {
    pub fn notification(&self) -> &'static str {
        match self {
            WindowControl::Minimize => "MINIMIZE",
            WindowControl::ToggleFullscreen => "TOGGLEFULLSCREEN",
            WindowControl::DevTools => "DEVTOOLS",
            WindowControl::Horizontal => "HORIZONTAL",
            WindowControl::Vertical => "VERTICAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub kind: String,
    pub title: String,
    pub message: String,
    /// Seconds.
    pub timer: f64,
}

impl Alert {
    fn from_request(request: &RemoteRequest) -> Self {
        let timer = match request.param("timer") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|t| *t > 0.0)
        .unwrap_or(4.0);

        Self {
            kind: request.text("type").unwrap_or_else(|| "alert".to_string()),
            title: request.text("title").unwrap_or_else(|| "Note".to_string()),
            message: request
                .text("message")
                .unwrap_or_else(|| "Attention!".to_string()),
            timer,
        }
    }

    pub fn payload(&self) -> Value {
        let millis = self.timer * 1000.0;
        let timer = if millis.fract() == 0.0 && millis.abs() < i64::MAX as f64 {
            json!(millis as i64)
        } else {
            json!(millis)
        };
        json!({
            "type": self.kind,
            "title": self.title,
            "message": self.message,
            "timer": timer,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinAction {
    Show(Map<String, Value>),
    Hide(Map<String, Value>),
    Toggle(Map<String, Value>),
    Brightness(Value),
    Monitor(MonitorAction),
    Shutdown,
    Reboot,
    Restart,
    UserPresence(Value),
    Save,
    ModuleData,
    Install { url: String },
    Update { module: Option<String> },
    Delete { module: String },
    Refresh,
    ShowAlert(Alert),
    HideAlert,
    Notification { name: String, payload: Value },
    Window(WindowControl),
}

impl BuiltinAction {
    /// Resolves the request's `action` against the built-in vocabulary.
    /// `None` when the name is not a built-in action; `Some(Err)` when it is
    /// but the parameters are invalid.
    pub fn parse(request: &RemoteRequest) -> Option<RemoteResult<Self>> {
        let name = request.action.as_deref()?;
        let params = || request.params.clone();
        let action = match name {
            names::SHOW => Ok(BuiltinAction::Show(params())),
            names::HIDE => Ok(BuiltinAction::Hide(params())),
            names::TOGGLE => Ok(BuiltinAction::Toggle(params())),
            names::BRIGHTNESS => Ok(BuiltinAction::Brightness(
                request.param("value").cloned().unwrap_or(Value::Null),
            )),
            "MONITORON" => Ok(BuiltinAction::Monitor(MonitorAction::On)),
            "MONITOROFF" => Ok(BuiltinAction::Monitor(MonitorAction::Off)),
            "MONITORTOGGLE" => Ok(BuiltinAction::Monitor(MonitorAction::Toggle)),
            "MONITORSTATUS" => Ok(BuiltinAction::Monitor(MonitorAction::Status)),
            "SHUTDOWN" => Ok(BuiltinAction::Shutdown),
            "REBOOT" => Ok(BuiltinAction::Reboot),
            names::RESTART => Ok(BuiltinAction::Restart),
            names::USER_PRESENCE => Ok(BuiltinAction::UserPresence(
                request.param("value").cloned().unwrap_or(Value::Null),
            )),
            "SAVE" => Ok(BuiltinAction::Save),
            "MODULE_DATA" => Ok(BuiltinAction::ModuleData),
            "INSTALL" => request
                .text("url")
                .map(|url| BuiltinAction::Install { url })
                .ok_or_else(|| RemoteError::validation("Invalid URL provided in request")),
            names::UPDATE => Ok(BuiltinAction::Update {
                module: request.text("module").filter(|m| m != "undefined"),
            }),
            "DELETE" => request
                .text("module")
                .map(|module| BuiltinAction::Delete { module })
                .ok_or_else(|| RemoteError::validation("No module name provided")),
            names::REFRESH => Ok(BuiltinAction::Refresh),
            names::SHOW_ALERT => Ok(BuiltinAction::ShowAlert(Alert::from_request(request))),
            names::HIDE_ALERT => Ok(BuiltinAction::HideAlert),
            names::NOTIFICATION => parse_notification(request),
            "MINIMIZE" => Ok(BuiltinAction::Window(WindowControl::Minimize)),
            "TOGGLEFULLSCREEN" => Ok(BuiltinAction::Window(WindowControl::ToggleFullscreen)),
            "DEVTOOLS" => Ok(BuiltinAction::Window(WindowControl::DevTools)),
            "HORIZONTAL" => Ok(BuiltinAction::Window(WindowControl::Horizontal)),
            "VERTICAL" => Ok(BuiltinAction::Window(WindowControl::Vertical)),
            _ => return None,
        };
        Some(action)
    }
}

fn parse_notification(request: &RemoteRequest) -> RemoteResult<BuiltinAction> {
    let name = request
        .text("notification")
        .ok_or_else(|| RemoteError::validation("No notification name provided"))?;
    let payload = match request.param("payload") {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(Value::String(raw)) => serde_json::from_str(raw).map_err(|e| {
            RemoteError::validation(format!("Invalid notification payload: {}", e))
        })?,
        Some(structured) => structured.clone(),
    };
    Ok(BuiltinAction::Notification { name, payload })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataQuery {
    ModulesAvailable,
    ModulesInstalled,
    Translations,
    MmUpdateAvailable,
    Config,
    DefaultConfig { module: Option<String> },
    Modules,
    Brightness,
    UserPresence,
    Categories,
}

impl DataQuery {
    pub fn parse(request: &RemoteRequest) -> Option<Self> {
        let query = match request.data.as_deref()? {
            "modulesAvailable" => DataQuery::ModulesAvailable,
            "modulesInstalled" => DataQuery::ModulesInstalled,
            "translations" => DataQuery::Translations,
            "mmUpdateAvailable" => DataQuery::MmUpdateAvailable,
            "config" => DataQuery::Config,
            "defaultConfig" => DataQuery::DefaultConfig {
                module: request.text("module"),
            },
            "modules" => DataQuery::Modules,
            "brightness" => DataQuery::Brightness,
            "userPresence" => DataQuery::UserPresence,
            "categories" => DataQuery::Categories,
            _ => return None,
        };
        Some(query)
    }

    /// Whether answering needs the live display snapshot.
    pub fn needs_snapshot(&self) -> bool {
        matches!(self, DataQuery::Modules | DataQuery::Brightness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(value: Value) -> RemoteRequest {
        RemoteRequest::from_value(value).unwrap()
    }

    #[test]
    fn test_unknown_action_is_not_builtin() {
        assert!(BuiltinAction::parse(&RemoteRequest::action("DANCE")).is_none());
        assert!(BuiltinAction::parse(&RemoteRequest::action("show")).is_none());
        assert!(BuiltinAction::parse(&RemoteRequest::data("modules")).is_none());
    }

    #[test]
    fn test_alert_defaults() {
        let action = BuiltinAction::parse(&request(json!({"action": "SHOW_ALERT", "title": "Note"})))
            .unwrap()
            .unwrap();
        let BuiltinAction::ShowAlert(alert) = action else {
            panic!("expected alert");
        };
        assert_eq!(
            alert.payload(),
            json!({"type": "alert", "title": "Note", "message": "Attention!", "timer": 4000})
        );

        let custom = Alert::from_request(&request(json!({
            "action": "SHOW_ALERT", "type": "notification", "message": "Hi", "timer": "2.5"
        })));
        assert_eq!(custom.payload()["timer"], json!(2500));
        assert_eq!(custom.payload()["type"], json!("notification"));
    }

    #[test]
    fn test_notification_payload_forms() {
        let parse = |v: Value| BuiltinAction::parse(&request(v)).unwrap();

        assert_eq!(
            parse(json!({"action": "NOTIFICATION", "notification": "PAGE_CHANGED"})).unwrap(),
            BuiltinAction::Notification {
                name: "PAGE_CHANGED".to_string(),
                payload: json!({})
            }
        );
        assert_eq!(
            parse(json!({"action": "NOTIFICATION", "notification": "N", "payload": "{\"page\": 2}"}))
                .unwrap(),
            BuiltinAction::Notification {
                name: "N".to_string(),
                payload: json!({"page": 2})
            }
        );
        assert_eq!(
            parse(json!({"action": "NOTIFICATION", "notification": "N", "payload": [1, 2]})).unwrap(),
            BuiltinAction::Notification {
                name: "N".to_string(),
                payload: json!([1, 2])
            }
        );
        assert!(
            parse(json!({"action": "NOTIFICATION", "notification": "N", "payload": "{oops"}))
                .unwrap_err()
                .is_validation()
        );
        assert!(parse(json!({"action": "NOTIFICATION"})).unwrap_err().is_validation());
    }

    #[test]
    fn test_lifecycle_parameters() {
        assert!(
            BuiltinAction::parse(&RemoteRequest::action("INSTALL"))
                .unwrap()
                .unwrap_err()
                .is_validation()
        );
        assert_eq!(
            BuiltinAction::parse(&request(json!({"action": "UPDATE", "module": "undefined"})))
                .unwrap()
                .unwrap(),
            BuiltinAction::Update { module: None }
        );
    }

    #[test]
    fn test_data_queries() {
        assert_eq!(
            DataQuery::parse(&RemoteRequest::data("brightness")),
            Some(DataQuery::Brightness)
        );
        assert!(DataQuery::parse(&RemoteRequest::data("brightness")).unwrap().needs_snapshot());
        assert_eq!(DataQuery::parse(&RemoteRequest::data("weather")), None);
    }
}

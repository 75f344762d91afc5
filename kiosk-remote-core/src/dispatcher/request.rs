use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::{RemoteError, RemoteResult};

/// Where a request came from, and so where its response goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Channel {
    /// Returned to the caller.
    #[default]
    Direct,
    /// Re-emitted as `REMOTE_ACTION_RESULT` on the bus.
    Socket,
}

impl Channel {
    pub fn is_socket(&self) -> bool {
        matches!(self, Channel::Socket)
    }
}

/// An inbound action, data query or external-module request.
///
/// `params` holds the full request object, selectors included, so built-in
/// actions that relay their parameters send exactly what was received.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteRequest {
    pub action: Option<String>,
    pub data: Option<String>,
    pub route: Option<String>,
    pub method: Option<String>,
    pub params: Map<String, Value>,
    pub channel: Channel,
}

impl RemoteRequest {
    pub fn action(action: impl Into<String>) -> Self {
        let action = action.into();
        Self::default().with_param("action", Value::String(action))
    }

    pub fn data(data: impl Into<String>) -> Self {
        let data = data.into();
        Self::default().with_param("data", Value::String(data))
    }

    /// Request for `action` on the widget-contributed `route`.
    pub fn external(route: impl Into<String>, action: Option<String>, method: &str) -> Self {
        let mut request = Self {
            route: Some(route.into()),
            method: Some(method.to_uppercase()),
            ..Default::default()
        };
        if let Some(action) = action {
            request = request.with_param("action", Value::String(action));
        }
        request
    }

    /// Sets a parameter, keeping the selector fields in sync.
    pub fn with_param(mut self, key: &str, value: Value) -> Self {
        let as_string = value.as_str().map(str::to_string);
        match key {
            "action" => self.action = as_string,
            "data" => self.data = as_string,
            "route" => self.route = as_string,
            _ => {}
        }
        self.params.insert(key.to_string(), value);
        self
    }

    /// Builds a request from a JSON object such as a `REMOTE_ACTION` payload.
    pub fn from_value(value: Value) -> RemoteResult<Self> {
        let Value::Object(params) = value else {
            return Err(RemoteError::validation("request must be an object"));
        };
        let mut request = Self::default();
        for (key, value) in params {
            if key == "isSocket" {
                continue;
            }
            request = request.with_param(&key, value);
        }
        Ok(request)
    }

    /// Builds a request from URL query parameters.
    pub fn from_query(query: HashMap<String, String>) -> Self {
        let mut keys: Vec<_> = query.into_iter().collect();
        keys.sort();
        keys.into_iter()
            .filter(|(key, _)| key != "apiKey")
            .fold(Self::default(), |request, (key, value)| {
                request.with_param(&key, Value::String(value))
            })
    }

    pub fn on_socket(mut self) -> Self {
        self.channel = Channel::Socket;
        self
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// A parameter as text. Numbers and booleans are rendered; empty strings
    /// and `null` count as absent.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.params.get(key)? {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Human readable description for error messages.
    pub fn describe(&self) -> String {
        Value::Object(self.params.clone()).to_string()
    }
}

/// Normalized result of a dispatched request.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub success: bool,
    pub body: Map<String, Value>,
}

impl RemoteResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            body: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.body.insert(key.to_string(), value.into());
        self
    }

    pub fn with_data(self, data: impl Into<Value>) -> Self {
        self.with("data", data)
    }

    pub fn with_result(self, result: impl Into<Value>) -> Self {
        self.with("result", result)
    }

    /// Merges the fields of `object` into the body.
    pub fn extend(mut self, object: Map<String, Value>) -> Self {
        self.body.extend(object);
        self
    }

    pub fn from_error(error: &RemoteError) -> Self {
        let mut response = Self {
            success: false,
            body: Map::new(),
        }
        .with("status", "error")
        .with("reason", error.reason())
        .with("info", error.to_string());
        if let RemoteError::Execution { stdout, stderr, .. } = error {
            if let Some(stdout) = stdout {
                response = response.with("stdout", stdout.as_str());
            }
            if let Some(stderr) = stderr {
                response = response.with("stderr", stderr.as_str());
            }
        }
        response
    }

    /// `{success, ...body}`.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("success".to_string(), Value::Bool(self.success));
        for (key, value) in &self.body {
            if key != "success" {
                object.insert(key.clone(), value.clone());
            }
        }
        Value::Object(object)
    }
}

impl From<RemoteResult<RemoteResponse>> for RemoteResponse {
    fn from(result: RemoteResult<RemoteResponse>) -> Self {
        result.unwrap_or_else(|e| RemoteResponse::from_error(&e))
    }
}

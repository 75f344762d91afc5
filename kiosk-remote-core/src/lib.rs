pub mod bus;
pub mod capability;
pub mod command;
pub mod config;
pub mod config_store;
pub mod defaults;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod index;
pub mod lifecycle;
pub mod literal;
pub mod net;
pub mod pending;
pub mod registry;
pub mod snapshot;
pub mod translation;
pub mod vcs;

// Re-exports
pub use bus::{InboundMessage, Notification, NotificationBus, NotificationReceiver, names};
pub use capability::{ActionSpec, CapabilityRoute, CapabilityRoutes, Registration};
pub use config::RemoteConfig;
pub use dispatcher::{Dispatcher, RemoteRequest, RemoteResponse};
pub use error::{RemoteError, RemoteResult};
pub use registry::ModuleDescriptor;
pub use snapshot::{DisplaySnapshot, WidgetState};

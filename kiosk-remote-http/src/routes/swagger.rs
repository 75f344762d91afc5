use utoipa::OpenApi;

use crate::handlers::{actions, notify, system};
use crate::models::{ApiResponse, InstallRequest, IpAddressesResponse, UpdateConfigRequest};
use kiosk_remote_core::capability::{ActionSpec, CapabilityRoute, RouteOrigin};
use kiosk_remote_core::registry::ModuleDescriptor;

#[derive(OpenApi)]
#[openapi(
    paths(
        system::api_test,
        system::get_ip,
        actions::get_user_presence,
        actions::set_user_presence,
        actions::update_host,
        actions::update_module,
        actions::install_module,
        actions::delete_module,
        actions::get_module_config,
        actions::update_config,
        actions::monitor,
        actions::set_brightness,
        notify::relay_notification,
        notify::module_command,
        notify::list_routes,
        notify::external_action
    ),
    components(schemas(
        ApiResponse,
        InstallRequest,
        UpdateConfigRequest,
        IpAddressesResponse,
        ModuleDescriptor,
        CapabilityRoute,
        ActionSpec,
        RouteOrigin
    )),
    tags((name = "kiosk-remote", description = "Remote control of the kiosk display"))
)]
pub struct ApiDoc;

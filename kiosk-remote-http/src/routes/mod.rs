pub mod swagger;

use axum::{
    Router,
    extract::State,
    middleware,
    routing::{MethodRouter, get, post},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::auth_middleware;
use crate::handlers::{self, builtin_action, data_query};
use crate::server::AppState;
use swagger::ApiDoc;

/// Create the main router. The `/api` routes are guarded by the API key
/// middleware.
pub fn create_api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(handlers::health_check))
        .route("/socket", get(handlers::socket))
        .route("/remote", get(handlers::legacy_remote))
        .route("/get", get(handlers::legacy_get))
        .route("/post", post(handlers::legacy_post))
        .nest(
            "/api",
            api_routes().route_layer(middleware::from_fn_with_state(state, auth_middleware)),
        )
}

fn query(data: &'static str) -> MethodRouter<AppState> {
    get(move |State(state): State<AppState>| async move { data_query(&state, data).await })
}

fn action(name: &'static str) -> MethodRouter<AppState> {
    get(move |State(state): State<AppState>| async move { builtin_action(&state, name).await })
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/test", get(handlers::api_test))
        // data queries
        .route("/modules", query("modules"))
        .route("/modules/installed", query("modulesInstalled"))
        .route("/modules/available", query("modulesAvailable"))
        .route("/brightness", query("brightness"))
        .route("/translations", query("translations"))
        .route("/mmUpdateAvailable", query("mmUpdateAvailable"))
        .route("/config", query("config"))
        .route("/categories", query("categories"))
        // built-in actions
        .route("/refresh", action("REFRESH"))
        .route("/save", action("SAVE"))
        .route("/shutdown", action("SHUTDOWN"))
        .route("/reboot", action("REBOOT"))
        .route("/restart", action("RESTART"))
        .route("/minimize", action("MINIMIZE"))
        .route("/togglefullscreen", action("TOGGLEFULLSCREEN"))
        .route("/devtools", action("DEVTOOLS"))
        .route("/horizontal", action("HORIZONTAL"))
        .route("/vertical", action("VERTICAL"))
        .route("/userpresence", get(handlers::get_user_presence))
        .route("/userpresence/{value}", get(handlers::set_user_presence))
        .route("/getIP", get(handlers::get_ip))
        .route("/update", get(handlers::update_host))
        .route("/update/{module}", get(handlers::update_module))
        .route(
            "/install",
            post(handlers::install_module).get(handlers::install_wrong_method),
        )
        .route("/delete/{module}", post(handlers::delete_module))
        .route("/getModuleConfig/{module}", get(handlers::get_module_config))
        .route("/updateConfig", post(handlers::update_config))
        .route(
            "/notification/{notification}",
            get(handlers::relay_notification).post(handlers::relay_notification),
        )
        .route(
            "/notification/{notification}/{p}",
            get(handlers::relay_notification).post(handlers::relay_notification),
        )
        .route("/modules/{name}", get(handlers::module_command))
        .route("/modules/{name}/{action}", get(handlers::module_command))
        .route("/module", get(handlers::list_routes).post(handlers::list_routes))
        .route(
            "/module/{route}",
            get(handlers::external_action).post(handlers::external_action),
        )
        .route(
            "/module/{route}/{action}",
            get(handlers::external_action).post(handlers::external_action),
        )
        .route(
            "/module/{route}/{action}/{p}",
            get(handlers::external_action).post(handlers::external_action),
        )
        .route("/monitor", get(handlers::monitor_status))
        .route("/monitor/{action}", get(handlers::monitor))
        .route("/brightness/{value}", get(handlers::set_brightness))
}

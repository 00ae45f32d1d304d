use std::{collections::BTreeMap, sync::Arc, time::Instant};

use axum::{
    Form, Json, Router,
    body::Body,
    extract::{Query, Request, State},
    http::{
        HeaderMap, Response, StatusCode,
        header::{LOCATION, SET_COOKIE},
    },
    middleware::{self, Next},
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use backend_api::SwitchId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    actions::{
        OperatorCommand, SceneAction, datetime_from_form, dsp_used_from_form, parse_form_bool,
        power_schedule_from_form, run_operator_command, run_scene,
    },
    auth::{OperatorSessions, expired_session_cookie, session_cookie, token_from_cookie},
    config::PanelConfig,
    dispatch::{Dispatcher, HttpTransport},
    endpoints::{EndpointResolver, request_origin},
    logging::{category_access, category_action, method_label, status_label},
    preferences::{DeviceConfig, UiPreferences},
    rtc::read_rtc_vbat,
    status::{PanelStatus, StatusBoard},
};

mod handlers;

use handlers::*;

#[derive(Clone)]
pub struct PanelState {
    pub dispatcher: Arc<Dispatcher<HttpTransport>>,
    pub status: StatusBoard,
    pub sessions: OperatorSessions,
    pub preferences: UiPreferences,
    pub devices: DeviceConfig,
}

impl PanelState {
    pub fn new(
        config: &PanelConfig,
        transport: HttpTransport,
        preferences: UiPreferences,
    ) -> Self {
        let resolver =
            EndpointResolver::new(config.backend_base.as_deref(), &config.fallback_origin);
        Self {
            dispatcher: Arc::new(Dispatcher::new(resolver, transport)),
            status: StatusBoard::new(),
            sessions: OperatorSessions::new(config.operator_pin.clone()),
            preferences,
            devices: DeviceConfig::new(config.devices_path.clone()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HomeView {
    pub state: PanelStatus,
    pub show_combined: bool,
    pub pin_error: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperatorView {
    pub state: PanelStatus,
    pub show_combined: bool,
    pub dsp_levels: Option<Value>,
    pub dsp_used: Option<BTreeMap<String, bool>>,
    pub power_schedule: Option<Value>,
    pub rtc_vbat: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StatusResponse {
    status: &'static str,
}

pub fn build_panel_app(state: PanelState) -> Router {
    let operator_routes = Router::new()
        .route("/operator", get(operator_page_handler))
        .route("/operator/toggle_combined", post(toggle_combined_handler))
        .route("/operator/projector/power", post(projector_power_handler))
        .route("/operator/projector/input", post(projector_input_handler))
        .route("/operator/dsp/mute_all", post(dsp_mute_all_handler))
        .route("/operator/dsp/used", post(dsp_used_handler))
        .route("/operator/dsp/gain", post(dsp_gain_handler))
        .route("/operator/dsp/volume", post(dsp_volume_handler))
        .route("/operator/dsp/recall", post(dsp_recall_handler))
        .route("/operator/shelly/set", post(switch_set_handler))
        .route("/operator/shelly/pulse", post(switch_pulse_handler))
        .route("/operator/power_schedule", post(power_schedule_handler))
        .route("/ui/special/set_datetime", post(set_datetime_handler))
        .route("/ui/special/reboot_terminal", post(reboot_terminal_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_operator_middleware,
        ));

    Router::new()
        .route("/", get(home_handler))
        .route("/healthz", get(healthz_handler))
        .route("/ui/scene/avvio_semplice", post(simple_lesson_handler))
        .route("/ui/scene/avvio_video", post(video_lesson_handler))
        .route(
            "/ui/scene/avvio_video_combinata",
            post(combined_lesson_handler),
        )
        .route("/ui/scene/spegni_aula", post(room_shutdown_handler))
        .route("/auth/pin", post(pin_login_handler))
        .route("/auth/logout", post(logout_handler))
        .merge(operator_routes)
        .layer(middleware::from_fn(access_log_middleware))
        .with_state(state)
}

fn see_other_with_cookie(location: &'static str, cookie: String) -> Response<Body> {
    (
        StatusCode::SEE_OTHER,
        [(LOCATION, location.to_string()), (SET_COOKIE, cookie)],
    )
        .into_response()
}

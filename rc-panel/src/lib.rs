mod actions;
mod auth;
mod config;
mod dispatch;
mod endpoints;
mod logging;
mod preferences;
mod rtc;
mod server;
mod status;

pub use actions::{
    DatetimeFormError, OperatorCommand, SceneAction, datetime_from_form, failure_text,
    parse_form_bool, run_operator_command, run_scene,
};
pub use auth::{OperatorSessions, SESSION_COOKIE, token_from_cookie};
pub use config::PanelConfig;
pub use dispatch::{
    AttemptOutcome, AttemptRequest, BackendBody, BackendResponse, CallMethod, CallState,
    DispatchError, Dispatcher, HttpTransport, TimeoutBudget, Transport,
};
pub use endpoints::{
    DEFAULT_FALLBACK_ORIGIN, EndpointResolver, is_absolute_url, join_url, request_origin,
};
pub use logging::init as init_logging;
pub use preferences::{DeviceConfig, UiPreferences};
pub use rtc::{parse_vbat, read_rtc_vbat};
pub use server::{HomeView, OperatorView, PanelState, build_panel_app};
pub use status::{IDLE_STATUS_TEXT, PanelStatus, StatusBoard, StatusUpdate};

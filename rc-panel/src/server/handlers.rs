use super::*;

const HOME: &str = "/";
const OPERATOR_HOME: &str = "/operator";
const INVALID_SWITCH_TEXT: &str = "Invalid switch id";

pub(super) async fn access_log_middleware(request: Request, next: Next) -> Response<Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();
    let response = next.run(request).await;
    let elapsed_ms = started.elapsed().as_millis();
    let status = response.status();

    info!(
        "{} {} {} {} {}ms",
        category_access(),
        method_label(method.as_str()),
        status_label(status.as_u16()),
        uri,
        elapsed_ms
    );

    response
}

pub(super) async fn require_operator_middleware(
    State(state): State<PanelState>,
    request: Request,
    next: Next,
) -> Response<Body> {
    if state.sessions.is_operator(request.headers()) {
        return next.run(request).await;
    }
    warn!(
        "{} operator session required for {}",
        category_action(),
        request.uri().path()
    );
    Redirect::to(HOME).into_response()
}

pub(super) async fn healthz_handler() -> Json<StatusResponse> {
    Json(StatusResponse { status: "ok" })
}

#[derive(Debug, Deserialize)]
pub(super) struct HomeQuery {
    #[serde(default)]
    pin_error: Option<String>,
}

pub(super) async fn home_handler(
    State(state): State<PanelState>,
    Query(query): Query<HomeQuery>,
) -> Json<HomeView> {
    Json(HomeView {
        state: state.status.read(),
        show_combined: state.preferences.show_combined(),
        pin_error: query.pin_error.as_deref().is_some_and(parse_form_bool),
    })
}

pub(super) async fn operator_page_handler(
    State(state): State<PanelState>,
    headers: HeaderMap,
) -> Json<OperatorView> {
    let origin = request_origin(&headers);
    let origin = origin.as_deref();

    // the page renders without backend data; gaps show as null
    let dsp_levels = state
        .dispatcher
        .get_json(backend_api::DSP_STATE, origin)
        .await
        .ok();
    let power_schedule = state
        .dispatcher
        .get_json(backend_api::POWER_SCHEDULE, origin)
        .await
        .ok();

    Json(OperatorView {
        state: state.status.read(),
        show_combined: state.preferences.show_combined(),
        dsp_levels,
        dsp_used: Some(state.devices.dsp_used().await),
        power_schedule,
        rtc_vbat: read_rtc_vbat().await,
    })
}

async fn scene(state: &PanelState, headers: &HeaderMap, action: SceneAction) -> Redirect {
    let origin = request_origin(headers);
    run_scene(state, action, origin.as_deref()).await;
    Redirect::to(HOME)
}

pub(super) async fn simple_lesson_handler(
    State(state): State<PanelState>,
    headers: HeaderMap,
) -> Redirect {
    scene(&state, &headers, SceneAction::SimpleLesson).await
}

pub(super) async fn video_lesson_handler(
    State(state): State<PanelState>,
    headers: HeaderMap,
) -> Redirect {
    scene(&state, &headers, SceneAction::VideoLesson).await
}

pub(super) async fn combined_lesson_handler(
    State(state): State<PanelState>,
    headers: HeaderMap,
) -> Redirect {
    scene(&state, &headers, SceneAction::CombinedLesson).await
}

pub(super) async fn room_shutdown_handler(
    State(state): State<PanelState>,
    headers: HeaderMap,
) -> Redirect {
    scene(&state, &headers, SceneAction::RoomShutdown).await
}

#[derive(Debug, Deserialize)]
pub(super) struct PinForm {
    pin: String,
}

pub(super) async fn pin_login_handler(
    State(state): State<PanelState>,
    Form(form): Form<PinForm>,
) -> Response<Body> {
    match state.sessions.login_with_pin(&form.pin) {
        Some(token) => see_other_with_cookie(OPERATOR_HOME, session_cookie(&token)),
        None => Redirect::to("/?pin_error=1").into_response(),
    }
}

pub(super) async fn logout_handler(
    State(state): State<PanelState>,
    headers: HeaderMap,
) -> Response<Body> {
    if let Some(token) = token_from_cookie(&headers) {
        state.sessions.logout(&token);
    }
    see_other_with_cookie(HOME, expired_session_cookie())
}

/// The operator lands back on the page whatever the outcome.
async fn operator_command(
    state: &PanelState,
    headers: &HeaderMap,
    command: OperatorCommand,
    redirect_to: &'static str,
) -> Redirect {
    let origin = request_origin(headers);
    if let Err(err) = run_operator_command(state, command, origin.as_deref()).await {
        // already logged and written to the status record
        debug!("operator command answered with redirect after: {err}");
    }
    Redirect::to(redirect_to)
}

fn parse_switch_id(state: &PanelState, raw: &str) -> Option<SwitchId> {
    let switch_id = SwitchId::parse(raw);
    if switch_id.is_none() {
        warn!("{} rejected switch id {raw:?}", category_action());
        state.status.set_text(INVALID_SWITCH_TEXT);
    }
    switch_id
}

#[derive(Debug, Deserialize)]
pub(super) struct ValueForm {
    value: String,
}

pub(super) async fn toggle_combined_handler(
    State(state): State<PanelState>,
    Form(form): Form<ValueForm>,
) -> Redirect {
    let value = parse_form_bool(&form.value);
    state.preferences.set_show_combined(value);
    info!("{} show_combined set to {value}", category_action());
    Redirect::to(OPERATOR_HOME)
}

#[derive(Debug, Deserialize)]
pub(super) struct OnForm {
    on: String,
}

pub(super) async fn projector_power_handler(
    State(state): State<PanelState>,
    headers: HeaderMap,
    Form(form): Form<OnForm>,
) -> Redirect {
    let command = OperatorCommand::ProjectorPower {
        on: parse_form_bool(&form.on),
    };
    operator_command(&state, &headers, command, OPERATOR_HOME).await
}

#[derive(Debug, Deserialize)]
pub(super) struct SourceForm {
    source: String,
}

pub(super) async fn projector_input_handler(
    State(state): State<PanelState>,
    headers: HeaderMap,
    Form(form): Form<SourceForm>,
) -> Redirect {
    let command = OperatorCommand::ProjectorInput {
        source: form.source,
    };
    operator_command(&state, &headers, command, OPERATOR_HOME).await
}

pub(super) async fn dsp_mute_all_handler(
    State(state): State<PanelState>,
    headers: HeaderMap,
    Form(form): Form<OnForm>,
) -> Redirect {
    let command = OperatorCommand::DspMuteAll {
        mute: parse_form_bool(&form.on),
    };
    operator_command(&state, &headers, command, OPERATOR_HOME).await
}

pub(super) async fn dsp_used_handler(
    State(state): State<PanelState>,
    headers: HeaderMap,
    Form(fields): Form<Vec<(String, String)>>,
) -> Redirect {
    match dsp_used_from_form(&fields) {
        Some(command) => operator_command(&state, &headers, command, OPERATOR_HOME).await,
        None => Redirect::to(OPERATOR_HOME),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct StepForm {
    bus: String,
    delta: i32,
}

pub(super) async fn dsp_gain_handler(
    State(state): State<PanelState>,
    headers: HeaderMap,
    Form(form): Form<StepForm>,
) -> Redirect {
    let command = OperatorCommand::DspGain {
        bus: form.bus,
        delta: form.delta,
    };
    operator_command(&state, &headers, command, OPERATOR_HOME).await
}

pub(super) async fn dsp_volume_handler(
    State(state): State<PanelState>,
    headers: HeaderMap,
    Form(form): Form<StepForm>,
) -> Redirect {
    let command = OperatorCommand::DspVolume {
        bus: form.bus,
        delta: form.delta,
    };
    operator_command(&state, &headers, command, OPERATOR_HOME).await
}

#[derive(Debug, Deserialize)]
pub(super) struct PresetForm {
    preset: String,
}

pub(super) async fn dsp_recall_handler(
    State(state): State<PanelState>,
    headers: HeaderMap,
    Form(form): Form<PresetForm>,
) -> Redirect {
    let command = OperatorCommand::DspRecall {
        preset: form.preset,
    };
    operator_command(&state, &headers, command, OPERATOR_HOME).await
}

#[derive(Debug, Deserialize)]
pub(super) struct SwitchSetForm {
    sid: String,
    on: String,
}

pub(super) async fn switch_set_handler(
    State(state): State<PanelState>,
    headers: HeaderMap,
    Form(form): Form<SwitchSetForm>,
) -> Redirect {
    let Some(switch_id) = parse_switch_id(&state, &form.sid) else {
        return Redirect::to(OPERATOR_HOME);
    };
    let command = OperatorCommand::SwitchSet {
        switch_id,
        on: parse_form_bool(&form.on),
    };
    operator_command(&state, &headers, command, OPERATOR_HOME).await
}

#[derive(Debug, Deserialize)]
pub(super) struct SwitchPulseForm {
    sid: String,
}

pub(super) async fn switch_pulse_handler(
    State(state): State<PanelState>,
    headers: HeaderMap,
    Form(form): Form<SwitchPulseForm>,
) -> Redirect {
    let Some(switch_id) = parse_switch_id(&state, &form.sid) else {
        return Redirect::to(OPERATOR_HOME);
    };
    let command = OperatorCommand::SwitchPulse { switch_id };
    operator_command(&state, &headers, command, OPERATOR_HOME).await
}

pub(super) async fn power_schedule_handler(
    State(state): State<PanelState>,
    headers: HeaderMap,
    Form(fields): Form<Vec<(String, String)>>,
) -> Redirect {
    let command = OperatorCommand::PowerSchedule(power_schedule_from_form(&fields));
    operator_command(&state, &headers, command, OPERATOR_HOME).await
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct DatetimeForm {
    #[serde(default)]
    date: String,
    #[serde(default)]
    time: String,
}

pub(super) async fn set_datetime_handler(
    State(state): State<PanelState>,
    headers: HeaderMap,
    Form(form): Form<DatetimeForm>,
) -> Redirect {
    match datetime_from_form(&form.date, &form.time) {
        Ok(datetime) => {
            let command = OperatorCommand::SetDatetime { datetime };
            operator_command(&state, &headers, command, OPERATOR_HOME).await
        }
        Err(err) => {
            state.status.set_text(err.status_text());
            Redirect::to(OPERATOR_HOME)
        }
    }
}

pub(super) async fn reboot_terminal_handler(
    State(state): State<PanelState>,
    headers: HeaderMap,
) -> Redirect {
    operator_command(&state, &headers, OperatorCommand::RebootTerminal, HOME).await
}

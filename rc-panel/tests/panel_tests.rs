use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Json, Router,
    body::{Body, to_bytes},
    extract::State,
    http::{Request, StatusCode},
    routing::any,
};
use backend_api::Lesson;
use panel::{
    HttpTransport, IDLE_STATUS_TEXT, PanelConfig, PanelState, SceneAction, UiPreferences,
    build_panel_app, run_scene,
};
use serde_json::{Value, json};
use tokio::{sync::Notify, task::JoinHandle, time::timeout};

const PIN: &str = "2468";

type Recorded = Arc<Mutex<Vec<(String, Value)>>>;

async fn spawn_server(app: Router) -> (SocketAddr, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("listener should have addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server should run");
    });
    (addr, handle)
}

fn reserve_tcp_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let addr = listener.local_addr().expect("local addr should exist");
    drop(listener);
    addr
}

/// Records every call as (path, JSON body) and answers with `status`.
async fn spawn_recording_backend(status: StatusCode) -> (SocketAddr, Recorded, JoinHandle<()>) {
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .fallback(any(
            move |State(recorded): State<Recorded>, request: Request<Body>| async move {
                let path = request.uri().path().to_string();
                let body = to_bytes(request.into_body(), usize::MAX)
                    .await
                    .expect("body should read");
                let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
                recorded.lock().expect("record lock").push((path, body));
                (status, Json(json!({"ok": true})))
            },
        ))
        .with_state(recorded.clone());
    let (addr, handle) = spawn_server(app).await;
    (addr, recorded, handle)
}

fn panel_config(backend_base: Option<String>) -> PanelConfig {
    PanelConfig {
        backend_base,
        fallback_origin: format!("http://{}", reserve_tcp_addr()),
        devices_path: PathBuf::from("/nonexistent/rc-panel/devices.yaml"),
        operator_pin: Some(PIN.to_string()),
        ..PanelConfig::default()
    }
}

fn panel_state(config: &PanelConfig) -> PanelState {
    let transport = HttpTransport::new().expect("http client should build");
    PanelState::new(config, transport, UiPreferences::default())
}

async fn spawn_panel(state: PanelState) -> (SocketAddr, JoinHandle<()>) {
    spawn_server(build_panel_app(state)).await
}

fn browser() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("client should build")
}

fn location(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get("location")
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned)
}

async fn login(client: &reqwest::Client, panel: SocketAddr) -> String {
    let response = client
        .post(format!("http://{panel}/auth/pin"))
        .form(&[("pin", PIN)])
        .send()
        .await
        .expect("login should complete");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/operator"));
    let cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|value| value.to_str().ok())
        .expect("login should set a cookie");
    assert!(cookie.contains("HttpOnly"));
    cookie
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string()
}

#[tokio::test]
async fn simple_lesson_updates_status_after_backend_success() {
    let (backend, recorded, backend_handle) = spawn_recording_backend(StatusCode::OK).await;
    let state = panel_state(&panel_config(Some(format!("http://{backend}"))));
    let (panel, panel_handle) = spawn_panel(state.clone()).await;

    let response = browser()
        .post(format!("http://{panel}/ui/scene/avvio_semplice"))
        .send()
        .await
        .expect("scene request should complete");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/"));

    let status = state.status.read();
    assert_eq!(status.text, SceneAction::SimpleLesson.success_text());
    assert_eq!(status.current_lesson, Some(Lesson::Semplice));
    assert_eq!(
        recorded.lock().expect("record lock").clone(),
        vec![("/api/scene/avvio_semplice".to_string(), json!({}))]
    );

    let home = browser()
        .get(format!("http://{panel}/"))
        .send()
        .await
        .expect("home should load")
        .json::<Value>()
        .await
        .expect("home should be json");
    assert_eq!(home["state"]["current_lesson"], "semplice");
    assert_eq!(home["pin_error"], false);

    backend_handle.abort();
    panel_handle.abort();
}

#[tokio::test]
async fn combined_lesson_sends_hdmi2_source() {
    let (backend, recorded, backend_handle) = spawn_recording_backend(StatusCode::OK).await;
    let state = panel_state(&panel_config(Some(format!("http://{backend}"))));

    run_scene(&state, SceneAction::CombinedLesson, None).await;

    assert_eq!(
        recorded.lock().expect("record lock").clone(),
        vec![(
            "/api/scene/avvio_proiettore".to_string(),
            json!({"source": "HDMI2"})
        )]
    );
    assert_eq!(state.status.read().current_lesson, Some(Lesson::Combinata));

    run_scene(&state, SceneAction::RoomShutdown, None).await;
    assert_eq!(state.status.read().current_lesson, None);

    backend_handle.abort();
}

#[tokio::test]
async fn unreachable_backend_leaves_error_and_no_lesson() {
    let state = panel_state(&panel_config(Some(format!(
        "http://{}",
        reserve_tcp_addr()
    ))));

    let status = run_scene(&state, SceneAction::SimpleLesson, None).await;

    assert!(
        status.text.starts_with("Error starting simple lesson"),
        "{}",
        status.text
    );
    assert!(status.text.contains("/api/scene/avvio_semplice"));
    assert_eq!(status.current_lesson, None);
    assert_eq!(state.status.read(), status);
}

#[tokio::test]
async fn progress_message_is_visible_while_backend_is_busy() {
    let release = Arc::new(Notify::new());
    let app = Router::new()
        .fallback(any(|State(release): State<Arc<Notify>>| async move {
            release.notified().await;
            Json(json!({"ok": true}))
        }))
        .with_state(release.clone());
    let (backend, backend_handle) = spawn_server(app).await;
    let state = panel_state(&panel_config(Some(format!("http://{backend}"))));
    assert_eq!(state.status.read().text, IDLE_STATUS_TEXT);

    let task_state = state.clone();
    let scene = tokio::spawn(async move {
        run_scene(&task_state, SceneAction::VideoLesson, None).await
    });

    timeout(Duration::from_secs(5), async {
        while state.status.read().text != SceneAction::VideoLesson.progress_text() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("progress message should appear");
    assert_eq!(state.status.read().current_lesson, None);

    release.notify_one();
    let status = timeout(Duration::from_secs(5), scene)
        .await
        .expect("scene should finish")
        .expect("scene task should not panic");
    assert_eq!(status.text, SceneAction::VideoLesson.success_text());
    assert_eq!(status.current_lesson, Some(Lesson::Video));

    backend_handle.abort();
}

#[tokio::test]
async fn operator_routes_require_a_session() {
    let state = panel_state(&panel_config(None));
    let (panel, panel_handle) = spawn_panel(state).await;
    let client = browser();

    let response = client
        .get(format!("http://{panel}/operator"))
        .send()
        .await
        .expect("operator page request should complete");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/"));

    let response = client
        .post(format!("http://{panel}/auth/pin"))
        .form(&[("pin", "0000")])
        .send()
        .await
        .expect("login should complete");
    assert_eq!(location(&response).as_deref(), Some("/?pin_error=1"));

    let home = client
        .get(format!("http://{panel}/?pin_error=1"))
        .send()
        .await
        .expect("home should load")
        .json::<Value>()
        .await
        .expect("home should be json");
    assert_eq!(home["pin_error"], true);

    panel_handle.abort();
}

#[tokio::test]
async fn operator_page_collects_backend_state() {
    let (backend, _recorded, backend_handle) = spawn_recording_backend(StatusCode::OK).await;
    let state = panel_state(&panel_config(Some(format!("http://{backend}"))));
    let (panel, panel_handle) = spawn_panel(state).await;
    let client = browser();
    let cookie = login(&client, panel).await;

    let response = client
        .get(format!("http://{panel}/operator"))
        .header("cookie", &cookie)
        .send()
        .await
        .expect("operator page should load");
    assert_eq!(response.status(), StatusCode::OK);
    let view = response.json::<Value>().await.expect("view should be json");
    assert_eq!(view["dsp_levels"], json!({"ok": true}));
    assert_eq!(view["power_schedule"], json!({"ok": true}));
    assert_eq!(view["dsp_used"]["out7"], true);
    assert_eq!(view["show_combined"], true);

    let response = client
        .post(format!("http://{panel}/auth/logout"))
        .header("cookie", &cookie)
        .send()
        .await
        .expect("logout should complete");
    assert_eq!(location(&response).as_deref(), Some("/"));

    let response = client
        .get(format!("http://{panel}/operator"))
        .header("cookie", &cookie)
        .send()
        .await
        .expect("operator page request should complete");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    backend_handle.abort();
    panel_handle.abort();
}

#[tokio::test]
async fn operator_page_renders_when_backend_is_down() {
    let state = panel_state(&panel_config(Some(format!(
        "http://{}",
        reserve_tcp_addr()
    ))));
    let (panel, panel_handle) = spawn_panel(state).await;
    let client = browser();
    let cookie = login(&client, panel).await;

    let view = client
        .get(format!("http://{panel}/operator"))
        .header("cookie", &cookie)
        .send()
        .await
        .expect("operator page should load")
        .json::<Value>()
        .await
        .expect("view should be json");
    assert_eq!(view["power_schedule"], Value::Null);

    panel_handle.abort();
}

#[tokio::test]
async fn operator_command_failure_is_reported_in_status() {
    let (backend, recorded, backend_handle) =
        spawn_recording_backend(StatusCode::INTERNAL_SERVER_ERROR).await;
    let state = panel_state(&panel_config(Some(format!("http://{backend}"))));
    let (panel, panel_handle) = spawn_panel(state.clone()).await;
    let client = browser();
    let cookie = login(&client, panel).await;

    let response = client
        .post(format!("http://{panel}/operator/shelly/set"))
        .header("cookie", &cookie)
        .form(&[("sid", "luci"), ("on", "true")])
        .send()
        .await
        .expect("switch request should complete");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/operator"));

    assert_eq!(
        recorded.lock().expect("record lock").clone(),
        vec![("/api/shelly/luci/set".to_string(), json!({"on": true}))]
    );
    let text = state.status.read().text;
    assert!(text.starts_with("Error setting switch"), "{text}");
    assert!(text.contains("500"), "{text}");

    backend_handle.abort();
    panel_handle.abort();
}

#[tokio::test]
async fn operator_forms_are_translated_to_backend_payloads() {
    let (backend, recorded, backend_handle) = spawn_recording_backend(StatusCode::OK).await;
    let state = panel_state(&panel_config(Some(format!("http://{backend}"))));
    let (panel, panel_handle) = spawn_panel(state.clone()).await;
    let client = browser();
    let cookie = login(&client, panel).await;

    for (route, form) in [
        ("/operator/dsp/mute_all", vec![("on", "on")]),
        ("/operator/dsp/used", vec![("in2", "false")]),
        ("/operator/dsp/volume", vec![("bus", "in_a"), ("delta", "-3")]),
        (
            "/operator/power_schedule",
            vec![
                ("on_time", "07:30"),
                ("off_time", "18:00"),
                ("days", "mon"),
                ("days", "fri"),
                ("enabled", "yes"),
            ],
        ),
        (
            "/ui/special/set_datetime",
            vec![("date", "2025-09-01"), ("time", "08:15")],
        ),
    ] {
        let response = client
            .post(format!("http://{panel}{route}"))
            .header("cookie", &cookie)
            .form(&form)
            .send()
            .await
            .expect("operator request should complete");
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{route}");
    }

    assert_eq!(
        recorded.lock().expect("record lock").clone(),
        vec![
            ("/api/dsp/mute".to_string(), json!({"mute": true})),
            (
                "/api/dsp/used".to_string(),
                json!({"channel": "in2", "used": false})
            ),
            (
                "/api/dsp/volume".to_string(),
                json!({"bus": "in_a", "delta": -3})
            ),
            (
                "/api/power/schedule".to_string(),
                json!({
                    "on_time": "07:30",
                    "off_time": "18:00",
                    "days": ["mon", "fri"],
                    "enabled": true
                })
            ),
            (
                "/api/special/set_datetime".to_string(),
                json!({"datetime": "2025-09-01T08:15:00"})
            ),
        ]
    );
    assert_eq!(state.status.read().text, "Date and time updated");

    backend_handle.abort();
    panel_handle.abort();
}

#[tokio::test]
async fn invalid_datetime_never_reaches_backend() {
    let (backend, recorded, backend_handle) = spawn_recording_backend(StatusCode::OK).await;
    let state = panel_state(&panel_config(Some(format!("http://{backend}"))));
    let (panel, panel_handle) = spawn_panel(state.clone()).await;
    let client = browser();
    let cookie = login(&client, panel).await;

    let response = client
        .post(format!("http://{panel}/ui/special/set_datetime"))
        .header("cookie", &cookie)
        .form(&[("date", "01/09/2025"), ("time", "08:15")])
        .send()
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(state.status.read().text, "Invalid date/time format");
    assert!(recorded.lock().expect("record lock").is_empty());

    backend_handle.abort();
    panel_handle.abort();
}

#[tokio::test]
async fn combined_toggle_changes_preference() {
    let state = panel_state(&panel_config(None));
    let (panel, panel_handle) = spawn_panel(state.clone()).await;
    let client = browser();
    let cookie = login(&client, panel).await;

    let response = client
        .post(format!("http://{panel}/operator/toggle_combined"))
        .header("cookie", &cookie)
        .form(&[("value", "false")])
        .send()
        .await
        .expect("toggle should complete");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(!state.preferences.show_combined());

    panel_handle.abort();
}

#[tokio::test]
async fn switch_id_outside_one_segment_is_refused() {
    let (backend, recorded, backend_handle) = spawn_recording_backend(StatusCode::OK).await;
    let state = panel_state(&panel_config(Some(format!("http://{backend}"))));
    let (panel, panel_handle) = spawn_panel(state.clone()).await;
    let client = browser();
    let cookie = login(&client, panel).await;

    for route in ["/operator/shelly/set", "/operator/shelly/pulse"] {
        let response = client
            .post(format!("http://{panel}{route}"))
            .header("cookie", &cookie)
            .form(&[("sid", "x/../../special/reboot_terminal?"), ("on", "true")])
            .send()
            .await
            .expect("switch request should complete");
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{route}");
        assert_eq!(location(&response).as_deref(), Some("/operator"));
    }

    assert_eq!(state.status.read().text, "Invalid switch id");
    assert!(recorded.lock().expect("record lock").is_empty());

    backend_handle.abort();
    panel_handle.abort();
}

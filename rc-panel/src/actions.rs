use backend_api::{
    COMBINED_LESSON_SOURCE, DSP_GAIN, DSP_MUTE, DSP_RECALL, DSP_USED, DSP_VOLUME, DspMuteRequest,
    DspRecallRequest, DspStepRequest, DspUsedRequest, Lesson, POWER_SCHEDULE, PROJECTOR_INPUT,
    PROJECTOR_POWER, PowerScheduleRequest, ProjectorInputRequest, ProjectorPowerRequest,
    SCENE_PROJECTOR_START, SCENE_ROOM_SHUTDOWN, SCENE_SIMPLE_START, SPECIAL_REBOOT_TERMINAL,
    SPECIAL_SET_DATETIME, SceneStartRequest, SetDatetimeRequest, SwitchId, SwitchSetRequest,
    shelly_set_path,
};
use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    dispatch::{BackendBody, DispatchError},
    logging::category_action,
    server::PanelState,
    status::{PanelStatus, StatusUpdate},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneAction {
    SimpleLesson,
    VideoLesson,
    CombinedLesson,
    RoomShutdown,
}

impl SceneAction {
    pub fn path(&self) -> &'static str {
        match self {
            SceneAction::SimpleLesson => SCENE_SIMPLE_START,
            SceneAction::VideoLesson | SceneAction::CombinedLesson => SCENE_PROJECTOR_START,
            SceneAction::RoomShutdown => SCENE_ROOM_SHUTDOWN,
        }
    }

    pub fn payload(&self) -> SceneStartRequest {
        match self {
            SceneAction::CombinedLesson => SceneStartRequest {
                source: Some(COMBINED_LESSON_SOURCE.to_string()),
            },
            _ => SceneStartRequest::default(),
        }
    }

    pub fn progress_text(&self) -> &'static str {
        match self {
            SceneAction::SimpleLesson => "Starting simple lesson…",
            SceneAction::VideoLesson => "Starting video lesson…",
            SceneAction::CombinedLesson => "Starting combined video lesson…",
            SceneAction::RoomShutdown => "Stopping lesson and powering down the room…",
        }
    }

    pub fn success_text(&self) -> &'static str {
        match self {
            SceneAction::SimpleLesson => "Audio-only lesson started",
            SceneAction::VideoLesson => "Video lesson started",
            SceneAction::CombinedLesson => "Combined video lesson started",
            SceneAction::RoomShutdown => "Room powered down: system ready",
        }
    }

    fn failure_label(&self) -> &'static str {
        match self {
            SceneAction::SimpleLesson => "starting simple lesson",
            SceneAction::VideoLesson => "starting video lesson",
            SceneAction::CombinedLesson => "starting combined lesson",
            SceneAction::RoomShutdown => "powering down the room",
        }
    }

    /// Lesson tag left in place once the scene has been applied.
    pub fn lesson_after(&self) -> Option<Lesson> {
        match self {
            SceneAction::SimpleLesson => Some(Lesson::Semplice),
            SceneAction::VideoLesson => Some(Lesson::Video),
            SceneAction::CombinedLesson => Some(Lesson::Combinata),
            SceneAction::RoomShutdown => None,
        }
    }
}

/// Runs a scene change: progress message, backend call, outcome message.
/// Failures only ever reach the status record.
pub async fn run_scene(
    state: &PanelState,
    scene: SceneAction,
    request_origin: Option<&str>,
) -> PanelStatus {
    state.status.set_text(scene.progress_text());
    info!("{} scene {:?} requested", category_action(), scene);

    match state
        .dispatcher
        .post_json(scene.path(), &scene.payload(), request_origin)
        .await
    {
        Ok(_) => state.status.write(
            StatusUpdate::text(scene.success_text()).with_lesson(scene.lesson_after()),
        ),
        Err(err) => {
            warn!("{} scene {:?} failed: {err}", category_action(), scene);
            state
                .status
                .set_text(failure_text(scene.failure_label(), &err))
        }
    }
}

/// Operator-only backend commands.
#[derive(Clone, Debug, PartialEq)]
pub enum OperatorCommand {
    ProjectorPower { on: bool },
    ProjectorInput { source: String },
    DspMuteAll { mute: bool },
    DspUsed { channel: String, used: bool },
    DspGain { bus: String, delta: i32 },
    DspVolume { bus: String, delta: i32 },
    DspRecall { preset: String },
    SwitchSet { switch_id: SwitchId, on: bool },
    SwitchPulse { switch_id: SwitchId },
    PowerSchedule(PowerScheduleRequest),
    SetDatetime { datetime: String },
    RebootTerminal,
}

impl OperatorCommand {
    pub fn path(&self) -> String {
        match self {
            OperatorCommand::ProjectorPower { .. } => PROJECTOR_POWER.to_string(),
            OperatorCommand::ProjectorInput { .. } => PROJECTOR_INPUT.to_string(),
            OperatorCommand::DspMuteAll { .. } => DSP_MUTE.to_string(),
            OperatorCommand::DspUsed { .. } => DSP_USED.to_string(),
            OperatorCommand::DspGain { .. } => DSP_GAIN.to_string(),
            OperatorCommand::DspVolume { .. } => DSP_VOLUME.to_string(),
            OperatorCommand::DspRecall { .. } => DSP_RECALL.to_string(),
            OperatorCommand::SwitchSet { switch_id, .. }
            | OperatorCommand::SwitchPulse { switch_id } => shelly_set_path(switch_id),
            OperatorCommand::PowerSchedule(_) => POWER_SCHEDULE.to_string(),
            OperatorCommand::SetDatetime { .. } => SPECIAL_SET_DATETIME.to_string(),
            OperatorCommand::RebootTerminal => SPECIAL_REBOOT_TERMINAL.to_string(),
        }
    }

    pub fn payload(&self) -> Value {
        let encoded = match self {
            OperatorCommand::ProjectorPower { on } => {
                serde_json::to_value(ProjectorPowerRequest { on: *on })
            }
            OperatorCommand::ProjectorInput { source } => {
                serde_json::to_value(ProjectorInputRequest {
                    source: source.clone(),
                })
            }
            OperatorCommand::DspMuteAll { mute } => {
                serde_json::to_value(DspMuteRequest { mute: *mute })
            }
            OperatorCommand::DspUsed { channel, used } => serde_json::to_value(DspUsedRequest {
                channel: channel.clone(),
                used: *used,
            }),
            OperatorCommand::DspGain { bus, delta } | OperatorCommand::DspVolume { bus, delta } => {
                serde_json::to_value(DspStepRequest {
                    bus: bus.clone(),
                    delta: *delta,
                })
            }
            OperatorCommand::DspRecall { preset } => serde_json::to_value(DspRecallRequest {
                preset: preset.clone(),
            }),
            OperatorCommand::SwitchSet { on, .. } => {
                serde_json::to_value(SwitchSetRequest { on: *on })
            }
            OperatorCommand::SwitchPulse { .. } => {
                serde_json::to_value(SwitchSetRequest { on: true })
            }
            OperatorCommand::PowerSchedule(request) => serde_json::to_value(request),
            OperatorCommand::SetDatetime { datetime } => {
                serde_json::to_value(SetDatetimeRequest {
                    datetime: datetime.clone(),
                })
            }
            OperatorCommand::RebootTerminal => Ok(Value::Object(serde_json::Map::new())),
        };
        encoded.unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
    }

    fn label(&self) -> &'static str {
        match self {
            OperatorCommand::ProjectorPower { .. } => "switching projector power",
            OperatorCommand::ProjectorInput { .. } => "selecting projector input",
            OperatorCommand::DspMuteAll { .. } => "muting DSP outputs",
            OperatorCommand::DspUsed { .. } => "updating DSP channel usage",
            OperatorCommand::DspGain { .. } => "changing DSP gain",
            OperatorCommand::DspVolume { .. } => "changing DSP volume",
            OperatorCommand::DspRecall { .. } => "recalling DSP preset",
            OperatorCommand::SwitchSet { .. } => "setting switch",
            OperatorCommand::SwitchPulse { .. } => "pulsing switch",
            OperatorCommand::PowerSchedule(_) => "saving power schedule",
            OperatorCommand::SetDatetime { .. } => "setting date/time",
            OperatorCommand::RebootTerminal => "rebooting terminal",
        }
    }

    fn success_text(&self) -> Option<&'static str> {
        match self {
            OperatorCommand::PowerSchedule(_) => Some("Power schedule updated"),
            OperatorCommand::SetDatetime { .. } => Some("Date and time updated"),
            OperatorCommand::RebootTerminal => Some("Terminal reboot requested..."),
            _ => None,
        }
    }
}

/// Sends one operator command. Failures are written to the status record
/// and also returned so callers can log or inspect them.
pub async fn run_operator_command(
    state: &PanelState,
    command: OperatorCommand,
    request_origin: Option<&str>,
) -> Result<BackendBody, DispatchError> {
    let path = command.path();
    info!("{} operator command {path}", category_action());

    match state
        .dispatcher
        .post_json(&path, &command.payload(), request_origin)
        .await
    {
        Ok(body) => {
            if let Some(text) = command.success_text() {
                state.status.set_text(text);
            }
            Ok(body)
        }
        Err(err) => {
            warn!("{} operator command {path} failed: {err}", category_action());
            state.status.set_text(failure_text(command.label(), &err));
            Err(err)
        }
    }
}

pub fn failure_text(label: &str, err: &DispatchError) -> String {
    format!("Error {label}: {err}")
}

/// Accepts the checkbox/select spellings browsers send.
pub fn parse_form_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

/// First `inN`/`outN` field of a DSP usage form.
pub fn dsp_used_from_form(fields: &[(String, String)]) -> Option<OperatorCommand> {
    fields
        .iter()
        .find(|(name, _)| is_dsp_channel(name))
        .map(|(name, value)| OperatorCommand::DspUsed {
            channel: name.clone(),
            used: parse_form_bool(value),
        })
}

fn is_dsp_channel(name: &str) -> bool {
    let digits = name
        .strip_prefix("in")
        .or_else(|| name.strip_prefix("out"));
    digits.is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
}

pub fn power_schedule_from_form(fields: &[(String, String)]) -> PowerScheduleRequest {
    let field = |key: &str| {
        fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.trim().to_string())
            .unwrap_or_default()
    };
    PowerScheduleRequest {
        on_time: field("on_time"),
        off_time: field("off_time"),
        days: fields
            .iter()
            .filter(|(name, _)| name == "days")
            .map(|(_, value)| value.clone())
            .collect(),
        enabled: parse_form_bool(&field("enabled")),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatetimeFormError {
    Missing,
    Invalid,
}

impl DatetimeFormError {
    pub fn status_text(&self) -> &'static str {
        match self {
            DatetimeFormError::Missing => "Enter a valid date and time",
            DatetimeFormError::Invalid => "Invalid date/time format",
        }
    }
}

/// Combines `YYYY-MM-DD` and `HH:MM` form fields into an ISO-8601 timestamp.
pub fn datetime_from_form(date: &str, time: &str) -> Result<String, DatetimeFormError> {
    let (date, time) = (date.trim(), time.trim());
    if date.is_empty() || time.is_empty() {
        return Err(DatetimeFormError::Missing);
    }
    NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M")
        .map(|parsed| parsed.format("%Y-%m-%dT%H:%M:%S").to_string())
        .map_err(|_| DatetimeFormError::Invalid)
}

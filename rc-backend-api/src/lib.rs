use serde::{Deserialize, Serialize};

pub const SCENE_SIMPLE_START: &str = "/api/scene/avvio_semplice";
pub const SCENE_PROJECTOR_START: &str = "/api/scene/avvio_proiettore";
pub const SCENE_ROOM_SHUTDOWN: &str = "/api/scene/spegni_aula";

pub const PROJECTOR_POWER: &str = "/api/projector/power";
pub const PROJECTOR_INPUT: &str = "/api/projector/input";

pub const DSP_STATE: &str = "/api/dsp/state";
pub const DSP_MUTE: &str = "/api/dsp/mute";
pub const DSP_USED: &str = "/api/dsp/used";
pub const DSP_GAIN: &str = "/api/dsp/gain";
pub const DSP_VOLUME: &str = "/api/dsp/volume";
pub const DSP_RECALL: &str = "/api/dsp/recall";

pub const POWER_SCHEDULE: &str = "/api/power/schedule";

pub const SPECIAL_SET_DATETIME: &str = "/api/special/set_datetime";
pub const SPECIAL_REBOOT_TERMINAL: &str = "/api/special/reboot_terminal";

/// Video source selected by the combined lesson scene.
pub const COMBINED_LESSON_SOURCE: &str = "HDMI2";

/// Identifier of a relay switch, restricted to `[A-Za-z0-9_-]` so it is
/// always a single path segment.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SwitchId(String);

impl SwitchId {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let valid = !raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SwitchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn shelly_set_path(switch_id: &SwitchId) -> String {
    format!("/api/shelly/{switch_id}/set")
}

/// Scene tag shown while a lesson is running.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Lesson {
    Semplice,
    Video,
    Combinata,
}

impl Lesson {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lesson::Semplice => "semplice",
            Lesson::Video => "video",
            Lesson::Combinata => "combinata",
        }
    }
}

impl std::fmt::Display for Lesson {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SceneStartRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectorPowerRequest {
    pub on: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectorInputRequest {
    pub source: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DspMuteRequest {
    pub mute: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DspUsedRequest {
    pub channel: String,
    pub used: bool,
}

/// Relative gain or volume step on one bus (`in_a`, `out0`..`out3`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DspStepRequest {
    pub bus: String,
    pub delta: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DspRecallRequest {
    pub preset: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SwitchSetRequest {
    pub on: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PowerScheduleRequest {
    pub on_time: String,
    pub off_time: String,
    pub days: Vec<String>,
    pub enabled: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetDatetimeRequest {
    pub datetime: String,
}

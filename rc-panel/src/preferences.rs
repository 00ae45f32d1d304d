use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

pub const DSP_INPUT_CHANNELS: usize = 4;
pub const DSP_OUTPUT_CHANNELS: usize = 8;

/// Panel display preferences. Seeded from the UI config file, changed in
/// memory afterwards.
#[derive(Clone, Debug)]
pub struct UiPreferences {
    show_combined: Arc<AtomicBool>,
}

impl Default for UiPreferences {
    fn default() -> Self {
        Self::new(true)
    }
}

impl UiPreferences {
    pub fn new(show_combined: bool) -> Self {
        Self {
            show_combined: Arc::new(AtomicBool::new(show_combined)),
        }
    }

    pub async fn load(path: &Path) -> Self {
        let show_combined = read_yaml(path)
            .await
            .and_then(|document| document.get("show_combined").and_then(yaml_truthy))
            .unwrap_or(true);
        Self::new(show_combined)
    }

    pub fn show_combined(&self) -> bool {
        self.show_combined.load(Ordering::Relaxed)
    }

    pub fn set_show_combined(&self, value: bool) {
        self.show_combined.store(value, Ordering::Relaxed);
    }
}

/// Reads which DSP channels are in use from the devices file.
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    path: PathBuf,
}

impl DeviceConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `in0..in3` and `out0..out7`; anything missing counts as used.
    pub async fn dsp_used(&self) -> BTreeMap<String, bool> {
        let document = read_yaml(&self.path).await;
        dsp_used_from(document.as_ref())
    }
}

fn dsp_used_from(document: Option<&Value>) -> BTreeMap<String, bool> {
    let dsp = document.and_then(|document| document.get("dsp"));
    let inputs = dsp.and_then(|dsp| dsp.get("input")).and_then(Value::as_mapping);
    let outputs = dsp.and_then(|dsp| dsp.get("output")).and_then(Value::as_mapping);

    let mut used = BTreeMap::new();
    for channel in 0..DSP_INPUT_CHANNELS {
        used.insert(format!("in{channel}"), channel_used(inputs, channel));
    }
    for channel in 0..DSP_OUTPUT_CHANNELS {
        used.insert(format!("out{channel}"), channel_used(outputs, channel));
    }
    used
}

fn channel_used(map: Option<&Mapping>, channel: usize) -> bool {
    let Some(map) = map else {
        return true;
    };
    map.get(Value::String(channel.to_string()))
        .or_else(|| map.get(Value::Number((channel as u64).into())))
        .and_then(yaml_truthy)
        .unwrap_or(true)
}

fn yaml_truthy(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_f64().map(|n| n != 0.0),
        Value::String(text) => Some(!text.is_empty()),
        Value::Null => Some(false),
        _ => None,
    }
}

async fn read_yaml(path: &Path) -> Option<Value> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) => {
            debug!("config file {} not readable: {err}", path.display());
            return None;
        }
    };
    match serde_yaml::from_str::<Value>(&raw) {
        Ok(Value::Null) => None,
        Ok(document) => Some(document),
        Err(err) => {
            warn!("config file {} is not valid YAML: {err}", path.display());
            None
        }
    }
}

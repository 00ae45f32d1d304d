use owo_colors::OwoColorize;
use std::sync::OnceLock;
use supports_color::Stream;
use tracing_subscriber::EnvFilter;

static ANSI_ENABLED: OnceLock<bool> = OnceLock::new();

pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let ansi = detect_ansi();
    let _ = ANSI_ENABLED.set(ansi);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    Ok(())
}

pub fn category_access() -> String {
    label("ACCESS", |text| format!("{}", text.bright_cyan().bold()))
}

pub fn category_backend() -> String {
    label("BACKEND", |text| format!("{}", text.bright_green().bold()))
}

pub fn category_action() -> String {
    label("ACTION", |text| format!("{}", text.bright_magenta().bold()))
}

pub fn category_auth() -> String {
    label("AUTH", |text| format!("{}", text.bright_yellow().bold()))
}

pub fn method_label(method: &str) -> String {
    if !ansi_enabled() {
        return method.to_string();
    }

    match method {
        "GET" => format!("{}", method.bright_blue()),
        "POST" => format!("{}", method.bright_green()),
        _ => format!("{}", method.bright_white()),
    }
}

pub fn status_label(status: u16) -> String {
    let text = status.to_string();
    if !ansi_enabled() {
        return text;
    }

    match status {
        100..=199 => format!("{}", text.bright_blue()),
        200..=299 => format!("{}", text.bright_green()),
        300..=399 => format!("{}", text.bright_cyan()),
        400..=499 => format!("{}", text.bright_yellow()),
        _ => format!("{}", text.bright_red()),
    }
}

fn label(text: &'static str, paint: impl Fn(&str) -> String) -> String {
    if ansi_enabled() {
        paint(text)
    } else {
        text.to_string()
    }
}

fn ansi_enabled() -> bool {
    *ANSI_ENABLED.get_or_init(detect_ansi)
}

fn detect_ansi() -> bool {
    let choice = ColorChoice::from_env(
        std::env::var_os("NO_COLOR").is_some(),
        std::env::var_os("FORCE_COLOR").is_some(),
    );
    match choice {
        ColorChoice::Never => false,
        ColorChoice::Always => {
            let _ = enable_ansi_support();
            true
        }
        ColorChoice::Auto => {
            enable_ansi_support().is_ok() || supports_color::on_cached(Stream::Stdout).is_some()
        }
    }
}

/// `NO_COLOR` beats `FORCE_COLOR`; otherwise the terminal decides.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ColorChoice {
    Never,
    Always,
    Auto,
}

impl ColorChoice {
    fn from_env(no_color: bool, force_color: bool) -> Self {
        match (no_color, force_color) {
            (true, _) => ColorChoice::Never,
            (false, true) => ColorChoice::Always,
            (false, false) => ColorChoice::Auto,
        }
    }
}

#[cfg(windows)]
fn enable_ansi_support() -> windows::core::Result<()> {
    use windows::Win32::Foundation::HANDLE;
    use windows::Win32::System::Console::{
        ENABLE_VIRTUAL_TERMINAL_PROCESSING, GetConsoleMode, GetStdHandle, STD_OUTPUT_HANDLE,
        SetConsoleMode,
    };

    unsafe {
        let stdout = GetStdHandle(STD_OUTPUT_HANDLE)?;
        // no console attached (service or redirected output)
        if stdout == HANDLE::default() {
            return Ok(());
        }

        let mut console_mode = std::mem::zeroed();
        GetConsoleMode(stdout, &mut console_mode)?;
        SetConsoleMode(stdout, console_mode | ENABLE_VIRTUAL_TERMINAL_PROCESSING)
    }
}

#[cfg(not(windows))]
fn enable_ansi_support() -> Result<(), ()> {
    Err(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_color_wins_over_force_color() {
        assert_eq!(ColorChoice::from_env(true, true), ColorChoice::Never);
        assert_eq!(ColorChoice::from_env(false, true), ColorChoice::Always);
        assert_eq!(ColorChoice::from_env(false, false), ColorChoice::Auto);
    }
}

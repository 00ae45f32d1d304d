use std::{env, net::SocketAddr, path::PathBuf};

use panel::{HttpTransport, PanelConfig, PanelState, UiPreferences, build_panel_app, init_logging};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = match parse_cli_args() {
        Ok(CliAction::Run(cli)) => *cli,
        Ok(CliAction::Help) => {
            print_cli_help();
            return Ok(());
        }
        Ok(CliAction::Version) => {
            println!("{}", binary_version_text());
            return Ok(());
        }
        Err(err) => {
            eprintln!("error: {err}\n");
            print_cli_help();
            return Err(err.into());
        }
    };

    init_logging()?;
    info!("{}", binary_version_text());

    let mut config = PanelConfig::from_env()?;
    if let Some(addr) = cli.listen_addr {
        config.listen_addr = addr;
    }
    if let Some(base) = cli.backend_base {
        config.backend_base = Some(base);
    }
    if let Some(origin) = cli.fallback_origin {
        config.fallback_origin = origin;
    }
    if let Some(path) = cli.ui_config_path {
        config.ui_config_path = path;
    }
    if let Some(path) = cli.devices_path {
        config.devices_path = path;
    }

    let preferences = UiPreferences::load(&config.ui_config_path).await;
    let transport = HttpTransport::new()?;
    let state = PanelState::new(&config, transport, preferences);
    info!(
        "backend origins: override={} fallback={}",
        state
            .dispatcher
            .resolver()
            .override_origin()
            .unwrap_or("-"),
        state.dispatcher.resolver().fallback_origin()
    );

    let app = build_panel_app(state);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!("control panel listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Clone, Debug, Default)]
struct CliArgs {
    listen_addr: Option<SocketAddr>,
    backend_base: Option<String>,
    fallback_origin: Option<String>,
    ui_config_path: Option<PathBuf>,
    devices_path: Option<PathBuf>,
}

enum CliAction {
    Run(Box<CliArgs>),
    Help,
    Version,
}

fn parse_cli_args() -> Result<CliAction, String> {
    let mut args = env::args().skip(1).peekable();
    let mut cli = CliArgs::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(CliAction::Help),
            "-V" | "--version" => return Ok(CliAction::Version),
            "--listen-addr" => {
                let value = next_arg_value("--listen-addr", &mut args)?;
                cli.listen_addr = Some(
                    value
                        .parse::<SocketAddr>()
                        .map_err(|_| format!("invalid --listen-addr: {value}"))?,
                );
            }
            "--backend-base" => {
                cli.backend_base = Some(next_arg_value("--backend-base", &mut args)?);
            }
            "--fallback-origin" => {
                cli.fallback_origin = Some(next_arg_value("--fallback-origin", &mut args)?);
            }
            "--ui-config" => {
                cli.ui_config_path = Some(PathBuf::from(next_arg_value("--ui-config", &mut args)?));
            }
            "--devices-config" => {
                cli.devices_path =
                    Some(PathBuf::from(next_arg_value("--devices-config", &mut args)?));
            }
            _ => {
                return Err(format!("unknown argument: {arg}"));
            }
        }
    }
    Ok(CliAction::Run(Box::new(cli)))
}

fn next_arg_value(
    flag: &str,
    args: &mut std::iter::Peekable<impl Iterator<Item = String>>,
) -> Result<String, String> {
    let value = args
        .next()
        .ok_or_else(|| format!("missing value for {flag}"))?;
    if value.trim().is_empty() {
        return Err(format!("value for {flag} cannot be empty"));
    }
    Ok(value)
}

fn print_cli_help() {
    eprintln!(concat!(
        "Usage: rc-panel [options]\n\n",
        "Options:\n",
        "  --listen-addr <ADDR>        Panel listen address (env PANEL_ADDR, default: 0.0.0.0:8000)\n",
        "  --backend-base <URL>        Backend origin tried first (env ROOMCTL_BASE)\n",
        "  --fallback-origin <URL>     Backend origin tried last (env ROOMCTL_FALLBACK, default: http://127.0.0.1:8080)\n",
        "  --ui-config <PATH>          UI preferences YAML (env ROOMCTL_UI_CONFIG)\n",
        "  --devices-config <PATH>     Devices YAML (env ROOMCTL_DEVICES)\n",
        "  -V, --version               Show version with git metadata\n",
        "  -h, --help                  Show this help\n",
        "\n",
        "The operator PIN is read from ROOMCTL_OPERATOR_PIN.\n"
    ));
}

fn binary_version_text() -> String {
    let binary = env!("CARGO_PKG_NAME");
    let git_tag = option_env!("RC_BUILD_GIT_TAG").unwrap_or("untagged");
    let git_commit = option_env!("RC_BUILD_GIT_COMMIT").unwrap_or("unknown");
    let git_dirty = option_env!("RC_BUILD_GIT_DIRTY").unwrap_or("false");
    let dirty = matches!(git_dirty, "true" | "1" | "yes" | "dirty");

    if dirty {
        format!("{binary} {git_tag} (dirty commit: {git_commit})")
    } else {
        format!("{binary} {git_tag}")
    }
}

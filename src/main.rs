pub mod agent;
pub mod app;
pub mod event;
pub mod logging;
pub mod tui;
pub mod ui;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::EventStream;
use futures_util::StreamExt;
use log::{error, info};

use agent::config::{AgentSettings, default_workspace_root};
use agent::providers::bedrock::BedrockAgentRuntime;
use agent::AgentClient;
use app::App;
use event::Event;
use tui::Tui;
use ui::render;

/// Terminal chat front-end for a hosted Amazon Bedrock agent.
#[derive(Parser, Debug)]
#[command(name = "resource-assistant", version, about)]
struct Cli {
    /// Path to the agent configuration file (default: config/agent.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Send one question, print the reply and exit without starting the UI.
    #[arg(long, value_name = "QUERY")]
    ask: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let workspace_root = default_workspace_root();

    if let Some(query) = cli.ask.as_deref() {
        logging::init_stderr_logging();
        let settings = load_settings(&cli, &workspace_root)?;
        let runtime = Arc::new(BedrockAgentRuntime::new(&settings));
        let client = AgentClient::new(runtime, settings.enable_trace);
        println!("{}", client.invoke_text(query).await);
        return Ok(());
    }

    logging::init_file_logging(&workspace_root)?;
    let settings = load_settings(&cli, &workspace_root).inspect_err(|err| error!("{err:#}"))?;
    info!("Starting chat UI for agent {}", settings.agent_id);

    tui::install_panic_hook();
    let mut tui = tui::init()?;
    let outcome = run(&mut tui, App::new(&settings)).await;
    tui::restore().context("failed to restore the terminal")?;
    outcome
}

fn load_settings(cli: &Cli, workspace_root: &std::path::Path) -> Result<AgentSettings> {
    match cli.config.as_deref() {
        Some(path) => AgentSettings::load_from(path),
        None => AgentSettings::load(workspace_root),
    }
}

async fn run(tui: &mut Tui, mut app: App) -> Result<()> {
    let mut stream = EventStream::new();
    let mut interval = tokio::time::interval(app.tick_rate());

    while !app.should_quit {
        tui.draw(|frame| render(frame, &app))?;

        let event = tokio::select! {
            _ = interval.tick() => Event::Tick,
            maybe_event = stream.next() => match maybe_event {
                Some(Ok(terminal_event)) => match Event::from_terminal(terminal_event) {
                    Some(event) => event,
                    None => continue,
                },
                Some(Err(err)) => {
                    error!("Terminal event stream failed: {err}");
                    break;
                }
                None => break,
            },
        };

        match event {
            Event::Tick => app.on_tick(),
            Event::Key(key) => app.handle_key(key),
            Event::Mouse(mouse) => app.handle_mouse(mouse),
            Event::Resize => {}
        }
    }

    info!("Chat UI closed after {} turn(s)", app.session.turns().len());
    Ok(())
}

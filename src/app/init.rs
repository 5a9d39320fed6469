use std::time::Duration;

use log::debug;

use super::{App, InputComposer};
use crate::agent::config::AgentSettings;
use crate::agent::{AgentManager, Session};

const DEFAULT_STATUS: &str = "Enter to send, Shift+Enter for a new line, Ctrl+Q to quit";

impl App {
    /// Creates the application state for the agent described by `settings`.
    pub fn new(settings: &AgentSettings) -> Self {
        debug!(
            "Initializing App for agent {} (alias {}) in {}",
            settings.agent_id, settings.agent_alias_id, settings.region
        );
        Self::with_manager(settings.title(), AgentManager::from_settings(settings))
    }

    /// Creates the application state around an existing manager.
    pub fn with_manager(title: impl Into<String>, agent_manager: AgentManager) -> Self {
        Self {
            should_quit: false,
            session: Session::new(),
            composer: InputComposer::new(),
            status_message: String::from(DEFAULT_STATUS),
            title: title.into(),
            tick_rate: Duration::from_millis(250),
            agent_manager,
        }
    }

    /// The interval at which the main loop should call `on_tick`.
    pub fn tick_rate(&self) -> Duration {
        self.tick_rate
    }

    /// Name of the backend the manager talks to.
    pub fn backend_name(&self) -> &str {
        self.agent_manager.backend_name()
    }
}

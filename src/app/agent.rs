use log::{error, info, warn};

use super::App;
use crate::agent::{AgentEvent, SessionError};

pub(crate) const WAITING_STATUS: &str = "Waiting for the agent…";

impl App {
    /// Submits the text from the composer as the next user message.
    ///
    /// While a reply is still pending the composer keeps its text.
    pub(crate) fn submit_prompt(&mut self) {
        if self.session.is_sending() {
            self.status_message = String::from("Still waiting for the previous reply");
            return;
        }
        if self.composer.buffer().trim().is_empty() {
            self.status_message = String::from("Message is empty, not sending.");
            return;
        }

        let prompt = self.composer.take();
        if let Err(err) = self.session.begin_exchange(&prompt) {
            warn!("Message refused: {err}");
            self.status_message = format!("Message refused: {err}");
            return;
        }
        info!(
            "Submitting message: {}",
            prompt.lines().next().unwrap_or_default()
        );

        match self.agent_manager.send(prompt) {
            Ok(()) => self.status_message = String::from(WAITING_STATUS),
            // The session and the manager agree on in-flight state, so the
            // outstanding task will still complete this exchange.
            Err(SessionError::Busy) => {
                error!("Agent manager busy while the session was idle");
            }
            Err(err) => error!("Agent manager refused message: {err}"),
        }
    }

    /// Applies an event from the background task to the session.
    pub(crate) fn handle_agent_event(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::Completed(result) => {
                self.status_message = match &result {
                    Ok(_) => String::from("Agent replied"),
                    Err(err) => format!("Agent error: {err}"),
                };
                self.session.complete_exchange(result);
            }
        }
    }
}

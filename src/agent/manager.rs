use std::sync::Arc;

use log::{debug, info};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::agent::client::AgentClient;
use crate::agent::config::AgentSettings;
use crate::agent::providers::bedrock::BedrockAgentRuntime;
use crate::agent::{InvocationError, SessionError};

/// Events emitted by the background invocation task.
/// The UI loop drains them on every tick.
#[derive(Debug)]
pub enum AgentEvent {
    /// The invocation finished, with the final answer or the error that ended it.
    Completed(Result<String, InvocationError>),
}

/// Runs agent invocations off the UI loop, one at a time.
///
/// `send` spawns a tokio task that awaits the client and reports back through an
/// unbounded channel; `poll_event` never blocks.
pub struct AgentManager {
    client: AgentClient,
    events_tx: UnboundedSender<AgentEvent>,
    events_rx: UnboundedReceiver<AgentEvent>,
    in_flight: bool,
}

impl AgentManager {
    pub fn new(client: AgentClient) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            client,
            events_tx: tx,
            events_rx: rx,
            in_flight: false,
        }
    }

    /// Builds a manager backed by the Bedrock runtime described by `settings`.
    pub fn from_settings(settings: &AgentSettings) -> Self {
        let runtime = Arc::new(BedrockAgentRuntime::new(settings));
        Self::new(AgentClient::new(runtime, settings.enable_trace))
    }

    /// Name of the backend the client talks to.
    pub fn backend_name(&self) -> &str {
        self.client.runtime_name()
    }

    /// True while an invocation is outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Starts one invocation in the background.
    ///
    /// Must be called from within a tokio runtime. Refused while another
    /// invocation is still outstanding.
    pub fn send(&mut self, query: String) -> Result<(), SessionError> {
        if self.in_flight {
            return Err(SessionError::Busy);
        }
        self.in_flight = true;
        let tx = self.events_tx.clone();
        let client = self.client.clone();
        tokio::spawn(async move {
            let result = client.invoke(&query).await;
            match &result {
                Ok(answer) => info!("Agent replied ({} bytes)", answer.len()),
                Err(err) => info!("Agent invocation failed: {err}"),
            }
            // The receiver only disappears when the app is shutting down.
            if tx.send(AgentEvent::Completed(result)).is_err() {
                debug!("Agent reply dropped: UI loop has exited");
            }
        });
        Ok(())
    }

    /// Polls for an event from the background task without blocking.
    pub fn poll_event(&mut self) -> Option<AgentEvent> {
        let event = self.events_rx.try_recv().ok()?;
        match &event {
            AgentEvent::Completed(_) => self.in_flight = false,
        }
        Some(event)
    }
}

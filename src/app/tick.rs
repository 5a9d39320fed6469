use super::App;

impl App {
    /// Called on every tick of the main loop.
    ///
    /// Drains the events the background invocation task has sent since the
    /// last tick.
    pub fn on_tick(&mut self) {
        while let Some(event) = self.agent_manager.poll_event() {
            self.handle_agent_event(event);
        }
    }
}

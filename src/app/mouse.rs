use crossterm::event::{MouseEvent, MouseEventKind};

use super::App;

impl App {
    /// The wheel scrolls the chat history selection; other mouse input is ignored.
    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.session.move_selection(-1),
            MouseEventKind::ScrollDown => self.session.move_selection(1),
            _ => {}
        }
    }
}

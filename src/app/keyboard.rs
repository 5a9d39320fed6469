use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::App;

/// Rows moved by PageUp/PageDown in the chat history.
const PAGE_STEP: isize = 5;

impl App {
    /// The main entry point for handling keyboard events.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        let modifiers = key.modifiers;

        if modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('q') | KeyCode::Char('c'))
        {
            self.should_quit = true;
            return;
        }

        match key.code {
            KeyCode::Enter => {
                if modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) {
                    self.composer.insert_newline();
                } else {
                    self.submit_prompt();
                }
            }
            KeyCode::Backspace => self.composer.backspace(),
            KeyCode::Delete => self.composer.delete(),
            KeyCode::Left => self.composer.move_left(),
            KeyCode::Right => self.composer.move_right(),
            KeyCode::Home => self.composer.move_to_line_start(),
            KeyCode::End => self.composer.move_to_line_end(),
            KeyCode::Esc => {
                self.composer.clear();
                self.status_message = String::from("Input cleared");
            }
            KeyCode::Up => self.handle_history_navigation(key, -1),
            KeyCode::Down => self.handle_history_navigation(key, 1),
            KeyCode::PageUp => self.session.move_selection(-PAGE_STEP),
            KeyCode::PageDown => self.session.move_selection(PAGE_STEP),
            KeyCode::Tab => self.composer.insert_char('\t'),
            KeyCode::Char(ch) => {
                if !modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
                    self.composer.insert_char(ch);
                }
            }
            _ => {}
        }
    }

    /// Up/Down recall sent messages while the composer is empty or showing
    /// history; otherwise, and with Ctrl held, they move the history selection.
    fn handle_history_navigation(&mut self, key: KeyEvent, delta: isize) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            self.session.move_selection(delta);
            return;
        }

        if !self.composer.is_empty() && !self.composer.is_recalled() {
            return;
        }

        let navigated = if delta < 0 {
            self.composer.history_previous()
        } else {
            self.composer.history_next()
        };

        if navigated {
            self.status_message = if delta < 0 {
                "Previous message loaded".into()
            } else {
                "Next message loaded".into()
            };
        } else {
            self.session.move_selection(delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::providers::scripted::ScriptedRuntime;
    use crate::agent::{AgentClient, AgentManager};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn app() -> App {
        let runtime = Arc::new(ScriptedRuntime::events(Vec::new()));
        App::with_manager("Test", AgentManager::new(AgentClient::new(runtime, true)))
    }

    fn press(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
        app.handle_key(KeyEvent::new(code, modifiers));
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch), KeyModifiers::NONE);
        }
    }

    #[test]
    fn ctrl_q_and_ctrl_c_quit() {
        for ch in ['q', 'c'] {
            let mut app = app();
            press(&mut app, KeyCode::Char(ch), KeyModifiers::CONTROL);
            assert!(app.should_quit);
        }
    }

    #[test]
    fn modified_enter_inserts_newline() {
        let mut app = app();
        type_text(&mut app, "a");
        press(&mut app, KeyCode::Enter, KeyModifiers::SHIFT);
        type_text(&mut app, "b");
        press(&mut app, KeyCode::Enter, KeyModifiers::ALT);
        assert_eq!(app.composer.buffer(), "a\nb\n");
        assert!(app.session.turns().is_empty());
    }

    #[test]
    fn blank_enter_is_refused() {
        let mut app = app();
        type_text(&mut app, "   ");
        press(&mut app, KeyCode::Enter, KeyModifiers::NONE);
        assert!(app.session.turns().is_empty());
        assert_eq!(app.status_message, "Message is empty, not sending.");
    }

    #[test]
    fn release_events_are_ignored() {
        let mut app = app();
        let mut key = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE);
        key.kind = KeyEventKind::Release;
        app.handle_key(key);
        assert!(app.composer.is_empty());
    }
}

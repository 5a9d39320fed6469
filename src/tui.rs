use std::io::{self, Stdout, stdout};
use std::panic::{self, PanicHookInfo};

use anyhow::{Context, Result};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::warn;
use ratatui::{Terminal, backend::CrosstermBackend};

pub type Tui = Terminal<CrosstermBackend<Stdout>>;

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static>;

/// Switches the terminal to the alternate screen in raw mode.
///
/// If any step fails, whatever was already switched on is undone.
pub fn init() -> Result<Tui> {
    undo_on_error(
        || {
            execute!(stdout(), EnterAlternateScreen, EnableMouseCapture)
                .context("failed to enter the alternate screen")?;
            enable_raw_mode().context("failed to enable raw mode")?;
            let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))
                .context("failed to create terminal")?;
            terminal.clear()?;
            Ok(terminal)
        },
        restore,
    )
}

/// Puts the terminal back the way `init` found it.
pub fn restore() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(stdout(), LeaveAlternateScreen, DisableMouseCapture)?;
    Ok(())
}

/// Restores the terminal before the panic message is printed, so it is
/// readable and the shell is usable afterwards.
pub fn install_panic_hook() {
    panic::set_hook(restoring_hook(restore, panic::take_hook()));
}

fn restoring_hook(undo: fn() -> io::Result<()>, previous: PanicHook) -> PanicHook {
    Box::new(move |info| {
        let _ = undo();
        previous(info);
    })
}

fn undo_on_error<T>(
    setup: impl FnOnce() -> Result<T>,
    undo: impl FnOnce() -> io::Result<()>,
) -> Result<T> {
    setup().inspect_err(|_| {
        if let Err(err) = undo() {
            warn!("Failed to restore the terminal: {err}");
        }
    })
}

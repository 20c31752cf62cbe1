use std::io::{self, Stdout};

use crossterm::event::{Event as CrosstermEvent, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;

use openkanban_ui::Event;

/// Owns the raw-mode terminal; restores the screen on drop so a panic does
/// not leave the shell unusable.
pub struct TerminalGuard {
    pub terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalGuard {
    pub fn init() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = io::stdout().execute(LeaveAlternateScreen);
    }
}

/// Reads terminal input on a dedicated thread and posts it into the event
/// queue. Input events are never dropped; a full queue blocks this thread,
/// not the update loop.
pub fn spawn_input_thread(event_tx: mpsc::Sender<Event>) {
    std::thread::spawn(move || loop {
        let Ok(raw) = crossterm::event::read() else {
            break;
        };
        let event = match raw {
            CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Event::Key(key),
            CrosstermEvent::Resize(cols, rows) => Event::Resize(cols, rows),
            _ => continue,
        };
        if event_tx.blocking_send(event).is_err() {
            break;
        }
    });
}

//! TUI event loop runner.
//!
//! This module provides the main event loop that:
//! - Applies tasks queued by background work (forward runners, fetches)
//! - Processes terminal events (keyboard, resize)
//! - Renders the UI

use std::io::{self, Stdout};
use std::panic;
use std::time::Duration;

use chrono::Local;
use crossterm::{
    event, execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use podfwd_core::{KubernetesDiscovery, UiQueue, UiReceiver};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{debug, error, info};

use super::app::App;
use super::input::{handle_event, InputResult};
use super::ui;

/// Reloads the pod table in the background.
pub struct PodLoader {
    discovery: KubernetesDiscovery,
    queue: UiQueue<App>,
    namespace: String,
}

impl PodLoader {
    pub fn new(discovery: KubernetesDiscovery, queue: UiQueue<App>, namespace: String) -> Self {
        Self {
            discovery,
            queue,
            namespace,
        }
    }

    pub fn reload(&self) {
        let discovery = self.discovery.clone();
        let queue = self.queue.clone();
        let namespace = self.namespace.clone();

        tokio::spawn(async move {
            debug!(namespace = %namespace, "Loading pods");
            let result = discovery.fetch_pod_summaries(&namespace).await;
            queue.run_on_ui(move |app: &mut App| app.set_pods(result));
        });
    }
}

/// TUI runner that manages the terminal and event loop.
pub struct TuiRunner {
    /// The terminal backend.
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TuiRunner {
    /// Initialize the terminal for TUI mode.
    ///
    /// This enables raw mode and enters an alternate screen.
    pub fn new() -> io::Result<Self> {
        // Setup panic hook to restore terminal on panic
        let original_hook = panic::take_hook();
        panic::set_hook(Box::new(move |panic_info| {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
            original_hook(panic_info);
        }));

        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        info!("TUI initialized");

        Ok(Self { terminal })
    }

    /// Restore the terminal to normal mode.
    pub fn restore(&mut self) -> io::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;

        info!("TUI restored");

        Ok(())
    }

    /// Run the TUI event loop.
    ///
    /// Terminal polling never blocks: between frames the loop waits on the
    /// UI queue, so spawned tasks keep running on the single-threaded
    /// runtime.
    pub async fn run(
        &mut self,
        app: &mut App,
        rx: &mut UiReceiver<App>,
        pods: &PodLoader,
    ) -> io::Result<()> {
        let tick_rate = Duration::from_millis(50);

        loop {
            rx.drain(app);

            if app.take_refresh_request() {
                pods.reload();
            }
            app.expire_flash(Local::now());

            self.terminal.draw(|frame| ui::draw(frame, app))?;

            if app.should_quit() {
                break;
            }

            if event::poll(Duration::ZERO)? {
                let event = event::read()?;
                if handle_event(app, event) == InputResult::Quit {
                    break;
                }
                continue;
            }

            tokio::select! {
                task = rx.recv() => {
                    if let Some(task) = task {
                        task(&mut *app);
                    }
                }
                _ = tokio::time::sleep(tick_rate) => {}
            }
        }

        Ok(())
    }
}

impl Drop for TuiRunner {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            error!("Failed to restore terminal: {}", e);
        }
    }
}

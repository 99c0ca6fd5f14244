//! Keyboard input handling for TUI.
//!
//! # Keybindings
//!
//! | Key | Action |
//! |-----|--------|
//! | `F` | Port-forward the selected pod, or tear its forwards down |
//! | `r` | Refresh pods |
//! | `j` / Down | Move selection down |
//! | `k` / Up | Move selection up |
//! | Tab | Switch between pods and active forwards |
//! | `q` / Esc | Exit TUI |
//!
//! While the start dialog is open: Space toggles a port, Tab moves between
//! fields, Enter confirms and Esc cancels. The delete dialog takes `y`/Enter
//! or `n`/Esc.

use std::sync::Arc;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use podfwd_core::ForwardUi;

use super::app::{App, FormField, Modal};

/// Result of handling an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputResult {
    /// Event was handled, continue running.
    Handled,
    /// Event was not handled (unknown key).
    NotHandled,
    /// User requested quit.
    Quit,
}

/// Handle a crossterm event.
pub fn handle_event(app: &mut App, event: Event) -> InputResult {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => handle_key(app, key),
        Event::Resize(_, _) => InputResult::Handled,
        _ => InputResult::NotHandled,
    }
}

fn handle_key(app: &mut App, key: KeyEvent) -> InputResult {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.quit();
        return InputResult::Quit;
    }

    match app.modal.take() {
        Some(Modal::Selection(form)) => return handle_selection_key(app, form, key),
        Some(Modal::Confirm(dialog)) => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Enter => dialog.confirm(app),
                KeyCode::Char('n') | KeyCode::Esc => dialog.cancel(app),
                _ => app.modal = Some(Modal::Confirm(dialog)),
            }
            return InputResult::Handled;
        }
        None => {}
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            app.quit();
            return InputResult::Quit;
        }
        KeyCode::Tab => {
            app.toggle_view();
            return InputResult::Handled;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.select_down();
            return InputResult::Handled;
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.select_up();
            return InputResult::Handled;
        }
        _ => {}
    }

    // Bound actions (refresh, port-forward)
    if let KeyCode::Char(c) = key.code {
        let handler = app.keys.get(c).map(|a| Arc::clone(&a.handler));
        if let Some(handler) = handler {
            return if handler(app) {
                InputResult::Handled
            } else {
                InputResult::NotHandled
            };
        }
    }

    InputResult::NotHandled
}

fn handle_selection_key(
    app: &mut App,
    mut form: super::app::SelectionForm,
    key: KeyEvent,
) -> InputResult {
    match key.code {
        KeyCode::Esc => {
            form.dialog.cancel(app);
            return InputResult::Handled;
        }
        KeyCode::Enter => match form.selection() {
            Ok(selection) => {
                form.dialog.confirm(app, selection);
                return InputResult::Handled;
            }
            Err(e) => form.error = Some(e.to_string()),
        },
        KeyCode::Tab => form.next_field(),
        KeyCode::Up if form.field == FormField::Ports => {
            form.cursor = form.cursor.saturating_sub(1);
        }
        KeyCode::Down if form.field == FormField::Ports => {
            if form.cursor + 1 < form.checked.len() {
                form.cursor += 1;
            }
        }
        KeyCode::Char(' ') if form.field == FormField::Ports => form.toggle(),
        KeyCode::Backspace => {
            if let Some(input) = form.input_mut() {
                input.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Some(input) = form.input_mut() {
                input.push(c);
            }
        }
        _ => {}
    }

    app.modal = Some(Modal::Selection(form));
    InputResult::Handled
}

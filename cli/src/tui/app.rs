//! TUI application state.

use std::sync::Arc;

use chrono::{DateTime, Local};
use podfwd_core::kubernetes::{KubectlError, PodSummary};
use podfwd_core::ports::{ConfirmDialog, KeyActions, PortSelectionDialog};
use podfwd_core::{
    Error, ForwardSnapshot, ForwardUi, ForwarderRegistry, PortSelection, ResourcePath, Target,
};

/// Seconds a flash message stays visible.
const FLASH_SECS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Pods,
    Forwards,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashLevel {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct Flash {
    pub text: String,
    pub level: FlashLevel,
    pub at: DateTime<Local>,
}

/// Field with keyboard focus in the start dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Ports,
    LocalPorts,
    Address,
}

/// Editable state around an open start dialog.
pub struct SelectionForm {
    pub dialog: PortSelectionDialog<App>,
    pub checked: Vec<bool>,
    pub cursor: usize,
    pub field: FormField,
    pub local_ports: String,
    pub address: String,
    pub error: Option<String>,
}

impl SelectionForm {
    pub fn new(dialog: PortSelectionDialog<App>) -> Self {
        let address = dialog.address.clone();
        Self {
            checked: vec![false; dialog.candidates.len()],
            dialog,
            cursor: 0,
            field: FormField::Ports,
            local_ports: String::new(),
            address,
            error: None,
        }
    }

    pub fn toggle(&mut self) {
        if let Some(c) = self.checked.get_mut(self.cursor) {
            *c = !*c;
        }
    }

    pub fn next_field(&mut self) {
        self.field = match self.field {
            FormField::Ports => FormField::LocalPorts,
            FormField::LocalPorts => FormField::Address,
            FormField::Address => FormField::Ports,
        };
    }

    /// Text field under focus, if any.
    pub fn input_mut(&mut self) -> Option<&mut String> {
        match self.field {
            FormField::Ports => None,
            FormField::LocalPorts => Some(&mut self.local_ports),
            FormField::Address => Some(&mut self.address),
        }
    }

    /// Builds the selection; the highlighted port is used when none is checked.
    pub fn selection(&self) -> podfwd_core::Result<PortSelection> {
        let mut chosen: Vec<_> = self
            .dialog
            .candidates
            .iter()
            .zip(&self.checked)
            .filter(|(_, checked)| **checked)
            .map(|(c, _)| c.clone())
            .collect();

        if chosen.is_empty() {
            chosen.extend(self.dialog.candidates.get(self.cursor).cloned());
        }

        PortSelection::from_candidates(&chosen, &self.local_ports, &self.address)
    }
}

pub enum Modal {
    Selection(SelectionForm),
    Confirm(ConfirmDialog<App>),
}

/// Main application state.
pub struct App {
    pub namespace: String,
    pub pods: Vec<PodSummary>,
    pub selected: usize,
    pub forward_selected: usize,
    pub view: View,
    pub modal: Option<Modal>,
    pub keys: KeyActions<App>,
    flash: Option<Flash>,
    registry: Arc<ForwarderRegistry>,
    loading: bool,
    refresh_requested: bool,
    should_quit: bool,
}

impl App {
    pub fn new(namespace: String, registry: Arc<ForwarderRegistry>) -> Self {
        Self {
            namespace,
            pods: Vec::new(),
            selected: 0,
            forward_selected: 0,
            view: View::Pods,
            modal: None,
            keys: KeyActions::new(),
            flash: None,
            registry,
            loading: false,
            refresh_requested: true,
            should_quit: false,
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Consumes a pending refresh request.
    pub fn take_refresh_request(&mut self) -> bool {
        let requested = std::mem::take(&mut self.refresh_requested);
        if requested {
            self.loading = true;
        }
        requested
    }

    pub fn set_pods(&mut self, result: Result<Vec<PodSummary>, KubectlError>) {
        self.loading = false;
        match result {
            Ok(pods) => {
                self.pods = pods;
                if self.selected >= self.pods.len() {
                    self.selected = self.pods.len().saturating_sub(1);
                }
            }
            Err(e) => self.flash_error(&Error::from(e)),
        }
    }

    /// Live view of the forwarder registry.
    pub fn forwards(&self) -> Vec<ForwardSnapshot> {
        self.registry.snapshot()
    }

    /// Returns true if `pod` has a live forward.
    pub fn is_forwarded(&self, pod: &ResourcePath) -> bool {
        !self.registry.all_for_pod(pod).is_empty()
    }

    pub fn toggle_view(&mut self) {
        self.view = match self.view {
            View::Pods => View::Forwards,
            View::Forwards => View::Pods,
        };
    }

    pub fn select_down(&mut self) {
        let (cursor, len) = self.cursor_mut();
        if len > 0 && *cursor < len - 1 {
            *cursor += 1;
        }
    }

    pub fn select_up(&mut self) {
        let (cursor, _) = self.cursor_mut();
        *cursor = cursor.saturating_sub(1);
    }

    fn cursor_mut(&mut self) -> (&mut usize, usize) {
        match self.view {
            View::Pods => (&mut self.selected, self.pods.len()),
            View::Forwards => {
                let len = self.registry.len();
                (&mut self.forward_selected, len)
            }
        }
    }

    pub fn flash(&self) -> Option<&Flash> {
        self.flash.as_ref()
    }

    pub fn expire_flash(&mut self, now: DateTime<Local>) {
        if let Some(flash) = &self.flash {
            if (now - flash.at).num_seconds() >= FLASH_SECS {
                self.flash = None;
            }
        }
    }

    fn set_flash(&mut self, text: String, level: FlashLevel) {
        self.flash = Some(Flash {
            text,
            level,
            at: Local::now(),
        });
    }
}

impl ForwardUi for App {
    fn selected_target(&self) -> Option<Target> {
        match self.view {
            View::Pods => self
                .pods
                .get(self.selected)
                .map(|p| Target::pod(p.path.clone())),
            View::Forwards => self
                .registry
                .sessions()
                .get(self.forward_selected)
                .map(|s| Target::pod(s.pod().clone())),
        }
    }

    fn show_selection(&mut self, dialog: PortSelectionDialog<Self>) {
        self.modal = Some(Modal::Selection(SelectionForm::new(dialog)));
    }

    fn show_confirmation(&mut self, dialog: ConfirmDialog<Self>) {
        self.modal = Some(Modal::Confirm(dialog));
    }

    fn dismiss(&mut self) {
        self.modal = None;
    }

    fn flash_info(&mut self, msg: String) {
        self.set_flash(msg, FlashLevel::Info);
    }

    fn flash_error(&mut self, err: &Error) {
        self.set_flash(err.to_string(), FlashLevel::Error);
    }

    fn refresh(&mut self) {
        self.refresh_requested = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podfwd_core::domain::{ContainerPort, PortCandidate, PortTunnel};

    fn app_with_pods(names: &[&str]) -> App {
        let mut app = App::new("ns".to_string(), Arc::new(ForwarderRegistry::new()));
        app.set_pods(Ok(names
            .iter()
            .map(|n| PodSummary {
                path: ResourcePath::new("ns", *n),
                phase: "Running".to_string(),
                ports: Default::default(),
            })
            .collect()));
        app
    }

    fn form() -> SelectionForm {
        let candidates = vec![
            PortCandidate::new("app", &ContainerPort::tcp(Some("http"), 8080)),
            PortCandidate::new("app", &ContainerPort::tcp(Some("admin"), 9000)),
        ];
        SelectionForm::new(PortSelectionDialog::new(
            ResourcePath::new("ns", "web-0"),
            candidates,
            "localhost".to_string(),
            |_: &mut App, _| {},
            |_: &mut App| {},
        ))
    }

    #[test]
    fn test_navigation_and_target() {
        let mut app = app_with_pods(&["web-0", "web-1"]);
        assert_eq!(
            app.selected_target(),
            Some(Target::pod(ResourcePath::new("ns", "web-0")))
        );

        app.select_down();
        app.select_down();
        assert_eq!(app.selected, 1);
        app.select_up();
        app.select_up();
        assert_eq!(app.selected, 0);

        app.toggle_view();
        assert_eq!(app.selected_target(), None);
    }

    #[test]
    fn test_form_uses_highlighted_port_by_default() {
        let mut form = form();
        form.cursor = 1;
        let selection = form.selection().unwrap();
        assert_eq!(selection.tunnels, vec![PortTunnel::new("localhost", 9000, 9000)]);
    }

    #[test]
    fn test_form_with_checked_ports_and_locals() {
        let mut form = form();
        form.toggle();
        form.cursor = 1;
        form.toggle();
        form.local_ports = "18080, 19000".to_string();
        form.address = "127.0.0.1".to_string();

        let selection = form.selection().unwrap();
        assert_eq!(
            selection.tunnels,
            vec![
                PortTunnel::new("127.0.0.1", 18080, 8080),
                PortTunnel::new("127.0.0.1", 19000, 9000),
            ]
        );
    }

    #[test]
    fn test_flash_expires() {
        let mut app = app_with_pods(&[]);
        app.flash_info("PortForward activated ns/web-0:9090".to_string());
        let shown_at = app.flash().unwrap().at;

        app.expire_flash(shown_at + chrono::Duration::seconds(1));
        assert!(app.flash().is_some());
        app.expire_flash(shown_at + chrono::Duration::seconds(FLASH_SECS));
        assert!(app.flash().is_none());
    }

    #[test]
    fn test_refresh_request_is_consumed_once() {
        let mut app = app_with_pods(&[]);
        app.refresh();
        assert!(app.take_refresh_request());
        assert!(app.is_loading());
        assert!(!app.take_refresh_request());
    }
}

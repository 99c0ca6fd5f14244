//! UI port (interface) and the run-on-UI-thread primitive.
//!
//! The console UI is not thread-safe. Background tasks never touch it
//! directly; they enqueue tasks on a [`UiQueue`] and the UI loop applies
//! them one at a time between renders.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::{PortCandidate, PortSelection, ResourcePath, Target};
use crate::error::Error;

/// A unit of work executed on the UI loop with exclusive access to the app.
pub type UiTask<A> = Box<dyn FnOnce(&mut A) + Send>;

/// Sending half of the UI task queue. Cheap to clone.
pub struct UiQueue<A> {
    tx: mpsc::UnboundedSender<UiTask<A>>,
}

impl<A> Clone for UiQueue<A> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<A: 'static> UiQueue<A> {
    /// Creates a queue and the receiver the UI loop drains.
    pub fn channel() -> (Self, UiReceiver<A>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, UiReceiver { rx })
    }

    /// Schedules `f` onto the UI loop.
    ///
    /// Returns false if the UI loop has shut down; `f` is dropped unexecuted.
    pub fn run_on_ui<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut A) + Send + 'static,
    {
        self.tx.send(Box::new(f)).is_ok()
    }

    /// Returns true once the receiving UI loop is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of the UI task queue, owned by the UI loop.
pub struct UiReceiver<A> {
    rx: mpsc::UnboundedReceiver<UiTask<A>>,
}

impl<A> UiReceiver<A> {
    /// Waits for the next task.
    pub async fn recv(&mut self) -> Option<UiTask<A>> {
        self.rx.recv().await
    }

    /// Applies every task queued so far, in submission order.
    pub fn drain(&mut self, app: &mut A) -> usize {
        let mut applied = 0;
        while let Ok(task) = self.rx.try_recv() {
            task(app);
            applied += 1;
        }
        applied
    }
}

type ConfirmFn<A, T> = Box<dyn FnOnce(&mut A, T) + Send>;
type CancelFn<A> = Box<dyn FnOnce(&mut A) + Send>;

/// Start dialog: choose remote ports and map them to local ports.
pub struct PortSelectionDialog<A> {
    pub pod: ResourcePath,
    pub candidates: Vec<PortCandidate>,
    pub address: String,
    on_confirm: ConfirmFn<A, PortSelection>,
    on_cancel: CancelFn<A>,
}

impl<A> PortSelectionDialog<A> {
    pub fn new(
        pod: ResourcePath,
        candidates: Vec<PortCandidate>,
        address: String,
        on_confirm: impl FnOnce(&mut A, PortSelection) + Send + 'static,
        on_cancel: impl FnOnce(&mut A) + Send + 'static,
    ) -> Self {
        Self {
            pod,
            candidates,
            address,
            on_confirm: Box::new(on_confirm),
            on_cancel: Box::new(on_cancel),
        }
    }

    pub fn confirm(self, app: &mut A, selection: PortSelection) {
        (self.on_confirm)(app, selection)
    }

    pub fn cancel(self, app: &mut A) {
        (self.on_cancel)(app)
    }
}

impl<A> fmt::Debug for PortSelectionDialog<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortSelectionDialog")
            .field("pod", &self.pod)
            .field("candidates", &self.candidates)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Yes/no confirmation dialog.
pub struct ConfirmDialog<A> {
    pub title: String,
    pub message: String,
    on_confirm: CancelFn<A>,
    on_cancel: CancelFn<A>,
}

impl<A> ConfirmDialog<A> {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        on_confirm: impl FnOnce(&mut A) + Send + 'static,
        on_cancel: impl FnOnce(&mut A) + Send + 'static,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            on_confirm: Box::new(on_confirm),
            on_cancel: Box::new(on_cancel),
        }
    }

    pub fn confirm(self, app: &mut A) {
        (self.on_confirm)(app)
    }

    pub fn cancel(self, app: &mut A) {
        (self.on_cancel)(app)
    }
}

impl<A> fmt::Debug for ConfirmDialog<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmDialog")
            .field("title", &self.title)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// Port for the console surface the forward flow drives.
///
/// Every method is called on the UI loop only.
pub trait ForwardUi: Sized + 'static {
    /// Currently selected resource, if any.
    fn selected_target(&self) -> Option<Target>;

    /// Opens the start dialog.
    fn show_selection(&mut self, dialog: PortSelectionDialog<Self>);

    /// Opens a confirmation dialog.
    fn show_confirmation(&mut self, dialog: ConfirmDialog<Self>);

    /// Closes any open modal.
    fn dismiss(&mut self);

    /// Shows an informational status message.
    fn flash_info(&mut self, msg: String);

    /// Shows an error status message.
    fn flash_error(&mut self, err: &Error);

    /// Refreshes resource listings.
    fn refresh(&mut self);
}

/// Shift-F in the console key map.
pub const KEY_SHIFT_F: char = 'F';

/// Key handler. Returns false to let the key fall through.
pub type KeyHandler<A> = Arc<dyn Fn(&mut A) -> bool + Send + Sync>;

/// A bound key: hint label, handler and whether the hint is shown.
pub struct KeyAction<A> {
    pub label: String,
    pub visible: bool,
    pub handler: KeyHandler<A>,
}

impl<A> KeyAction<A> {
    pub fn new(
        label: impl Into<String>,
        handler: impl Fn(&mut A) -> bool + Send + Sync + 'static,
        visible: bool,
    ) -> Self {
        Self {
            label: label.into(),
            visible,
            handler: Arc::new(handler),
        }
    }
}

impl<A> Clone for KeyAction<A> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            visible: self.visible,
            handler: Arc::clone(&self.handler),
        }
    }
}

/// Key dispatch table owned by the hosting view.
pub struct KeyActions<A> {
    actions: BTreeMap<char, KeyAction<A>>,
}

impl<A> Default for KeyActions<A> {
    fn default() -> Self {
        Self {
            actions: BTreeMap::new(),
        }
    }
}

impl<A> KeyActions<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `key`, replacing any previous binding.
    pub fn add(&mut self, key: char, action: KeyAction<A>) {
        self.actions.insert(key, action);
    }

    /// Merges another table into this one; later bindings win.
    pub fn merge(&mut self, other: KeyActions<A>) {
        self.actions.extend(other.actions);
    }

    pub fn get(&self, key: char) -> Option<&KeyAction<A>> {
        self.actions.get(&key)
    }

    /// Visible bindings, ordered by key.
    pub fn hints(&self) -> Vec<(char, &str)> {
        self.actions
            .iter()
            .filter(|(_, a)| a.visible)
            .map(|(k, a)| (*k, a.label.as_str()))
            .collect()
    }
}

use once_cell::sync::Lazy;
use tokio::sync::watch;

/// Process-wide dark-mode flag
///
/// Writers go through [`DisplayMode::set_dark`] or [`DisplayMode::toggle`];
/// everyone else holds a receiver, which can only read.
pub struct DisplayMode {
    dark: watch::Sender<bool>,
}

static GLOBAL: Lazy<DisplayMode> = Lazy::new(|| DisplayMode::new(false));

impl DisplayMode {
    pub fn new(dark: bool) -> Self {
        let (tx, _rx) = watch::channel(dark);
        Self { dark: tx }
    }

    /// The flag shared by the whole process
    pub fn global() -> &'static DisplayMode {
        &GLOBAL
    }

    pub fn is_dark(&self) -> bool {
        *self.dark.borrow()
    }

    /// Set the flag; subscribers are only woken when it actually changes
    pub fn set_dark(&self, dark: bool) {
        self.dark.send_if_modified(|current| {
            let changed = *current != dark;
            *current = dark;
            changed
        });
    }

    /// Flip the flag and return the new value
    pub fn toggle(&self) -> bool {
        let mut now = false;
        self.dark.send_modify(|current| {
            *current = !*current;
            now = *current;
        });
        now
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.dark.subscribe()
    }
}

//! Alerts that ask the user to intervene.

use rfd::{MessageButtons, MessageDialog, MessageLevel};

/// Sink for conditions only a human can resolve.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

/// Native message box.
///
/// The dialog runs on its own thread so the dispatcher keeps polling while
/// it is open.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, message: &str) {
        tracing::warn!("{}: {}", title, message);

        let title = title.to_string();
        let message = message.to_string();
        let spawned = std::thread::Builder::new()
            .name("mmo-pilot-notify".to_string())
            .spawn(move || {
                let _ = MessageDialog::new()
                    .set_level(MessageLevel::Warning)
                    .set_title(&title)
                    .set_description(&message)
                    .set_buttons(MessageButtons::Ok)
                    .show();
            });

        if let Err(e) = spawned {
            tracing::error!("Failed to open notification dialog: {}", e);
        }
    }
}

/// Headless notifier that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) {
        tracing::warn!("{}: {}", title, message);
    }
}

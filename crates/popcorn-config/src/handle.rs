use tokio::sync::watch;
use tracing::info;

use crate::error::ConfigResult;
use crate::model::Settings;
use crate::validate::validate;

/// Shared, observable settings.
#[derive(Debug, Clone)]
pub struct SettingsHandle {
    sender: watch::Sender<Settings>,
}

impl SettingsHandle {
    /// Wrap an already validated settings document.
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        let (sender, _) = watch::channel(settings);
        Self { sender }
    }

    /// Snapshot of the current settings.
    #[must_use]
    pub fn current(&self) -> Settings {
        self.sender.borrow().clone()
    }

    /// Validate and publish new settings; subscribers are only woken on change.
    ///
    /// # Errors
    ///
    /// Returns the validation error and keeps the previous settings.
    pub fn update(&self, settings: Settings) -> ConfigResult<()> {
        validate(&settings)?;
        let changed = self.sender.send_if_modified(|current| {
            if *current == settings {
                return false;
            }
            *current = settings;
            true
        });
        if changed {
            info!("settings updated");
        }
        Ok(())
    }

    /// Receive every future settings change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.sender.subscribe()
    }
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

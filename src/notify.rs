//! Best-effort side-effect collaborators. Callers log and swallow failures.

use anyhow::Result;
use log::info;

pub trait Notifier: Send + Sync {
    fn request_permission(&self) -> Result<bool>;
    fn notify(&self, title: &str, body: &str) -> Result<()>;
}

pub trait AlertPlayer: Send + Sync {
    fn play(&self) -> Result<()>;
    fn stop(&self) -> Result<()>;
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn request_permission(&self) -> Result<bool> {
        Ok(true)
    }

    fn notify(&self, title: &str, body: &str) -> Result<()> {
        info!("{title}: {body}");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SilentAlert;

impl AlertPlayer for SilentAlert {
    fn play(&self) -> Result<()> {
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        Ok(())
    }
}

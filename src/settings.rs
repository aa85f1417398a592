use anyhow::{Context, Result};
use chrono::Duration;
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    clock::DayBoundary,
    reminder::{responder::DEFAULT_SNOOZE_MINUTES, scheduler::DEFAULT_FIRE_WINDOW_SECS},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackerSettings {
    /// Break reminder offset applied at check-in when none is given.
    pub default_break_after_minutes: Option<u32>,
    pub break_duration_minutes: u32,
    pub snooze_minutes: u32,
    pub reminder_window_secs: u32,
    pub tick_interval_secs: u64,
    pub refresh_interval_secs: u64,
    pub heartbeat_every_ticks: u32,
    pub alert_enabled: bool,
    pub notifications_enabled: bool,
    /// Offset used to decide the work day; `None` means local time.
    pub utc_offset_minutes: Option<i32>,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        let debug_mode = std::env::var("PUNCHCARD_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            default_break_after_minutes: None,
            break_duration_minutes: 15,
            snooze_minutes: DEFAULT_SNOOZE_MINUTES,
            reminder_window_secs: DEFAULT_FIRE_WINDOW_SECS as u32,
            tick_interval_secs: 1,
            refresh_interval_secs: 60,
            heartbeat_every_ticks: if debug_mode { 1 } else { 10 },
            alert_enabled: true,
            notifications_enabled: true,
            utc_offset_minutes: None,
        }
    }
}

impl TrackerSettings {
    pub fn snooze(&self) -> Duration {
        Duration::minutes(i64::from(self.snooze_minutes))
    }

    pub fn reminder_window(&self) -> Duration {
        Duration::seconds(i64::from(self.reminder_window_secs.max(1)))
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tick_interval_secs.max(1))
    }

    /// Number of ticks between store re-fetches.
    pub fn refresh_every_ticks(&self) -> u32 {
        let ticks = self.refresh_interval_secs / self.tick_interval_secs.max(1);
        u32::try_from(ticks.max(1)).unwrap_or(u32::MAX)
    }

    pub fn day_boundary(&self) -> DayBoundary {
        DayBoundary::from_offset_minutes(self.utc_offset_minutes)
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<TrackerSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings at {}: {err}", path.display());
                TrackerSettings::default()
            })
        } else {
            TrackerSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, TrackerSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, TrackerSettings> {
        self.data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn current(&self) -> TrackerSettings {
        self.read().clone()
    }

    pub fn update(&self, settings: TrackerSettings) -> Result<()> {
        let mut guard = self.write();
        *guard = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &TrackerSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

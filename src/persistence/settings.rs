use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    // If None, use OS default state directory (autosave + snapshot buffer)
    #[serde(default)]
    pub autosave_override: Option<PathBuf>,
    // If None, use OS temporary directory for exports
    #[serde(default)]
    pub export_override: Option<PathBuf>,
    // Canvas layout
    #[serde(default = "AppSettings::default_grid_unit")]
    pub grid_unit: f32,
    #[serde(default = "AppSettings::default_alignment_threshold")]
    pub alignment_threshold: f32,
    #[serde(default = "AppSettings::default_collision_extent")]
    pub collision_extent: f32,
    #[serde(default = "AppSettings::default_placement_radius")]
    pub placement_radius: f32,
    #[serde(default = "AppSettings::default_placement_radius_step")]
    pub placement_radius_step: f32,
    #[serde(default = "AppSettings::default_placement_attempts")]
    pub placement_attempts: usize,
    // History / time machine
    #[serde(default = "AppSettings::default_history_cap")]
    pub history_cap: usize,
    #[serde(default = "AppSettings::default_snapshot_capacity")]
    pub snapshot_capacity: usize,
    #[serde(default = "AppSettings::default_snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,
    #[serde(default = "AppSettings::default_snapshot_debounce_ms")]
    pub snapshot_debounce_ms: u64,
    // Background indexing pacing
    #[serde(default = "AppSettings::default_indexing_delay_ms")]
    pub indexing_delay_ms: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            autosave_override: None,
            export_override: None,
            grid_unit: Self::default_grid_unit(),
            alignment_threshold: Self::default_alignment_threshold(),
            collision_extent: Self::default_collision_extent(),
            placement_radius: Self::default_placement_radius(),
            placement_radius_step: Self::default_placement_radius_step(),
            placement_attempts: Self::default_placement_attempts(),
            history_cap: Self::default_history_cap(),
            snapshot_capacity: Self::default_snapshot_capacity(),
            snapshot_interval_secs: Self::default_snapshot_interval_secs(),
            snapshot_debounce_ms: Self::default_snapshot_debounce_ms(),
            indexing_delay_ms: Self::default_indexing_delay_ms(),
        }
    }
}

impl AppSettings {
    fn config_dir() -> PathBuf {
        // Cross-platform user config dir
        #[cfg(target_os = "macos")]
        {
            // ~/Library/Application Support/Thinkspace
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join("Library").join("Application Support").join("Thinkspace");
        }
        #[cfg(target_os = "windows")]
        {
            // %APPDATA%\Thinkspace
            if let Ok(appdata) = std::env::var("APPDATA") {
                return PathBuf::from(appdata).join("Thinkspace");
            }
            return PathBuf::from("Thinkspace");
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            // $XDG_CONFIG_HOME/Thinkspace or ~/.config/Thinkspace
            if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
                return PathBuf::from(xdg).join("Thinkspace");
            }
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join(".config").join("Thinkspace");
        }
    }

    fn autosave_default_dir() -> PathBuf {
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/tmp"));
            return home.join("Library").join("Application Support").join("Thinkspace").join("State");
        }
        #[cfg(target_os = "windows")]
        {
            // %LOCALAPPDATA%\Thinkspace\State else TEMP
            if let Ok(local) = std::env::var("LOCALAPPDATA") {
                return PathBuf::from(local).join("Thinkspace").join("State");
            }
            if let Ok(temp) = std::env::var("TEMP") {
                return PathBuf::from(temp).join("Thinkspace");
            }
            return PathBuf::from("Thinkspace");
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            // $XDG_STATE_HOME/thinkspace or ~/.local/state/thinkspace, else /tmp/Thinkspace
            if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
                return PathBuf::from(xdg).join("thinkspace");
            }
            if let Ok(home) = std::env::var("HOME") {
                return PathBuf::from(home).join(".local").join("state").join("thinkspace");
            }
            return PathBuf::from("/tmp").join("Thinkspace");
        }
    }

    /// Load `settings.json` from the user config dir, or defaults if absent.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_dir().join("settings.json");
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let mut f = fs::File::open(path)?;
        let mut s = String::new();
        f.read_to_string(&mut s)?;
        let v: Self = serde_json::from_str(&s)?;
        Ok(v)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let s = serde_json::to_string_pretty(self)?;
        let mut f = fs::File::create(path)?;
        f.write_all(s.as_bytes())?;
        Ok(())
    }

    pub fn autosave_dir(&self) -> PathBuf {
        if let Some(p) = &self.autosave_override { return p.clone(); }
        Self::autosave_default_dir()
    }

    /// Default export directory when no override is set: {temp_dir}/Thinkspace/exports
    pub fn export_default_dir() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push("Thinkspace");
        p.push("exports");
        p
    }

    pub fn export_dir(&self) -> PathBuf {
        if let Some(p) = &self.export_override { return p.clone(); }
        Self::export_default_dir()
    }

    pub fn snapshot_interval(&self) -> Duration { Duration::from_secs(self.snapshot_interval_secs) }
    pub fn snapshot_debounce(&self) -> Duration { Duration::from_millis(self.snapshot_debounce_ms) }
    pub fn indexing_delay(&self) -> Duration { Duration::from_millis(self.indexing_delay_ms) }

    pub(crate) fn default_grid_unit() -> f32 { 20.0 }
    pub(crate) fn default_alignment_threshold() -> f32 { 5.0 }
    pub(crate) fn default_collision_extent() -> f32 { 250.0 }
    pub(crate) fn default_placement_radius() -> f32 { 400.0 }
    pub(crate) fn default_placement_radius_step() -> f32 { 120.0 }
    pub(crate) fn default_placement_attempts() -> usize { 8 }
    pub(crate) fn default_history_cap() -> usize { 20 }
    pub(crate) fn default_snapshot_capacity() -> usize { 100 }
    pub(crate) fn default_snapshot_interval_secs() -> u64 { 300 }
    pub(crate) fn default_snapshot_debounce_ms() -> u64 { 2000 }
    pub(crate) fn default_indexing_delay_ms() -> u64 { 500 }
}

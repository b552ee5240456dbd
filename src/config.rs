//! Input settings loaded from TOML.
//!
//! Settings are applied to a device when the [`DeviceManager`](crate::manager::DeviceManager)
//! creates it. The per-device setters stay live afterwards, so a host can still flip
//! `exclusive` or change the double-click window at runtime.
//!
//! ```toml
//! auto_reacquire = true
//!
//! [keyboard]
//! exclusive = false
//! reset_mode = "reset-all"
//!
//! [pointer]
//! double_click_delay_ms = 500
//! double_click_range = [4, 4]
//! wheel_range = { min = -1200, max = 1200 }
//!
//! [joystick.dead_zone]
//! X = 512
//! Y = 512
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.

use crate::error::Result;
use crate::event::JoystickAxis;
use crate::geometry::{Point, Range, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// What happens to the keyboard's key table when the bound window loses focus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyStateResetMode {
    /// Every key is released.
    #[default]
    ResetAll,
    /// Only Ctrl/Alt/Shift (and their left/right variants) are released.
    ResetModifiers,
    /// The table is left as-is.
    None,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardSettings {
    pub exclusive: bool,
    pub allow_background: bool,
    pub reset_mode: KeyStateResetMode,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerSettings {
    pub exclusive: bool,
    pub allow_background: bool,
    pub double_click_delay_ms: u64,
    /// Maximum `[x, y]` drift between the clicks of a double click.
    pub double_click_range: [i32; 2],
    pub position_range: Option<Rect>,
    pub wheel_range: Option<Range>,
}

impl Default for PointerSettings {
    fn default() -> Self {
        Self {
            exclusive: false,
            allow_background: false,
            double_click_delay_ms: 500,
            double_click_range: [4, 4],
            position_range: None,
            wheel_range: None,
        }
    }
}

impl PointerSettings {
    pub fn double_click_delay(&self) -> Duration {
        Duration::from_millis(self.double_click_delay_ms)
    }

    pub fn double_click_range(&self) -> Point {
        Point::new(self.double_click_range[0].abs(), self.double_click_range[1].abs())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoystickSettings {
    /// Per-axis dead zone radius around center, in re-centered units.
    pub dead_zone: BTreeMap<JoystickAxis, i32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HidSettings {
    pub allow_background: bool,
}

/// Root configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    /// Re-acquire exclusive devices when the bound window regains focus.
    pub auto_reacquire: bool,
    pub keyboard: KeyboardSettings,
    pub pointer: PointerSettings,
    pub joystick: JoystickSettings,
    pub hid: HidSettings,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            auto_reacquire: true,
            keyboard: KeyboardSettings::default(),
            pointer: PointerSettings::default(),
            joystick: JoystickSettings::default(),
            hid: HidSettings::default(),
        }
    }
}

impl InputSettings {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Load `path`, or fall back to defaults when the file does not exist.
    ///
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("no input settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }
}

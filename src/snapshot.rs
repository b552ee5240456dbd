//! Point-in-time view of device states.
//!
//! [`Snapshot`] is an **owned**, read-only copy of every cached device's state, produced by
//! [`DeviceManager::snapshot`](crate::manager::DeviceManager::snapshot). It does not poll
//! anything: joysticks show what the last poll saw, pushed devices what the last sample left.
//!
//! Keys are the devices' composite keys. The whole thing serializes with `serde`, which makes
//! it handy for debug overlays and bug reports:
//!
//! ```no_run
//! # fn dump(manager: &hookup::DeviceManager) -> hookup::Result<()> {
//! let json = manager.snapshot().to_json()?;
//! std::fs::write("input-state.json", json)?;
//! # Ok(())
//! # }
//! ```

use crate::device::{Device, DeviceClass, DeviceIdentity};
use crate::devices::joystick::JoystickState;
use crate::devices::{Key, Modifiers, MouseButtons};
use crate::error::{InputError, Result};
use crate::geometry::Point;
use crate::registry::RegisteredDevice;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum DeviceState {
    Keyboard {
        pressed: Vec<Key>,
        modifiers: Modifiers,
    },
    Pointer {
        position: Point,
        wheel: i32,
        buttons: MouseButtons,
        click_count: u32,
        outside_window: bool,
    },
    Joystick(JoystickState),
    Hid {
        /// Raw bytes of the last accepted report block.
        last_report: Option<Vec<u8>>,
        properties: BTreeMap<String, i64>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub name: String,
    pub class: DeviceClass,
    pub identity: DeviceIdentity,
    pub bound: bool,
    pub exclusive: bool,
    pub acquired: bool,
    pub state: DeviceState,
}

impl DeviceSnapshot {
    fn of(device: &RegisteredDevice) -> Self {
        let dev = device.as_device();
        let state = match device {
            RegisteredDevice::Keyboard(k) => DeviceState::Keyboard {
                pressed: k.pressed(),
                modifiers: k.modifiers(),
            },
            RegisteredDevice::Pointer(p) => DeviceState::Pointer {
                position: p.position(),
                wheel: p.wheel(),
                buttons: p.buttons(),
                click_count: p.click_count(),
                outside_window: p.is_outside_window(),
            },
            RegisteredDevice::Joystick(j) => DeviceState::Joystick(j.state()),
            RegisteredDevice::Hid(h) => DeviceState::Hid {
                last_report: h.last_sample().map(|s| s.data),
                properties: h.properties(),
            },
        };
        Self {
            name: dev.name().to_string(),
            class: dev.info().class,
            identity: dev.identity(),
            bound: dev.is_bound(),
            exclusive: dev.is_exclusive(),
            acquired: dev.is_acquired(),
            state,
        }
    }
}

/// Owned snapshot (`composite key → DeviceSnapshot`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub devices: BTreeMap<String, DeviceSnapshot>,
}

impl Snapshot {
    pub(crate) fn capture(devices: impl IntoIterator<Item = RegisteredDevice>) -> Self {
        let devices = devices
            .into_iter()
            .map(|d| (d.as_device().key().to_string(), DeviceSnapshot::of(&d)))
            .collect();
        Self { devices }
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&DeviceSnapshot> {
        self.devices.get(key)
    }

    /// First device named `name`.
    pub fn by_name(&self, name: &str) -> Option<&DeviceSnapshot> {
        self.devices.values().find(|d| d.name == name)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&String, &DeviceSnapshot)> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, DeviceSnapshot> {
        self.devices
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| InputError::Config(e.to_string()))
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| InputError::Config(e.to_string()))
    }
}

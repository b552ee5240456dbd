//! Joystick poller.
//!
//! Joysticks do not go through the window hook. A host calls [`Joystick::poll`] (typically
//! once per frame); each poll reads the device through the multimedia joystick API and
//! returns what changed as [`InputKind`] deltas.
//!
//! ## Conventions
//! - Axis values are re-centered: `raw - range.span() / 2`, then a per-axis dead zone maps
//!   readings within `radius` of center to 0.
//! - Buttons are indexed from 0 and sized from the capability query.
//! - The POV hat is reported as `-1` (centered) or `0..7` (Up = 0, clockwise).
//!   Hundredths-of-degrees readings above 35999 count as centered.
//! - "Unplugged" is not an error: it clears `is_connected` and leaves the last values alone.

use super::DeviceCore;
use crate::backends::InputBackend;
use crate::config::JoystickSettings;
use crate::device::Device;
use crate::error::{InputError, Result};
use crate::event::{InputKind, JoystickAxis};
use crate::geometry::Range;
use crate::lock;
use crate::metadata::DeviceRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// `JOYERR_UNPLUGGED`: the id is valid but nothing is attached.
pub const JOYERR_UNPLUGGED: u32 = 167;

/// POV reading meaning "centered".
pub const JOY_POVCENTERED: u32 = 0xFFFF;

/// Point-of-view hat support.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PovSupport {
    pub present: bool,
    /// Only the four cardinal directions are reported.
    pub four_directions: bool,
    /// Continuous (hundredths of a degree) readings.
    pub continuous: bool,
}

/// Result of the one-time capability query.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoystickCapabilities {
    pub product_name: String,
    pub manufacturer_id: u16,
    pub product_id: u16,
    /// Native range of every axis the device has.
    pub axes: BTreeMap<JoystickAxis, Range>,
    pub button_count: u32,
    pub pov: PovSupport,
}

/// One unprocessed reading, axes indexed by [`JoystickAxis::index`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawJoystickState {
    pub axes: [u32; 6],
    /// Bit `n` set = button `n` down.
    pub buttons: u32,
    /// Hundredths of a degree, or [`JOY_POVCENTERED`].
    pub pov: u32,
}

/// Last processed values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoystickState {
    pub connected: bool,
    pub axes: BTreeMap<JoystickAxis, i32>,
    pub buttons: Vec<bool>,
    pub pov: i16,
    /// Raw hundredths of a degree while the hat is deflected.
    pub pov_degrees: Option<u32>,
}

/// Map a hundredths-of-degree POV reading to `-1` or an 8-way slot.
pub fn pov_direction(raw: u32) -> i16 {
    if raw == JOY_POVCENTERED || raw > 35999 {
        return -1;
    }
    (((raw + 2250) / 4500) % 8) as i16
}

fn apply_dead_zone(value: i32, radius: i32) -> i32 {
    if value.abs() <= radius {
        0
    } else {
        value
    }
}

/// A joystick read through the multimedia API.
pub struct Joystick {
    core: DeviceCore,
    id: i32,
    caps: JoystickCapabilities,
    dead_zones: Mutex<BTreeMap<JoystickAxis, i32>>,
    state: Mutex<JoystickState>,
}

impl Joystick {
    /// Query capabilities once. A negative id yields empty capabilities.
    pub(crate) fn new(record: DeviceRecord, key: String, backend: Arc<dyn InputBackend>, settings: &JoystickSettings) -> Result<Self> {
        let id = record.joystick_id.unwrap_or(-1);
        let caps = if id < 0 {
            JoystickCapabilities::default()
        } else {
            backend.joystick_capabilities(id)?
        };

        let state = JoystickState {
            connected: id >= 0,
            axes: caps.axes.keys().map(|a| (*a, 0)).collect(),
            buttons: vec![false; caps.button_count as usize],
            pov: -1,
            pov_degrees: None,
        };

        Ok(Self {
            core: DeviceCore::new(record, key, backend),
            id,
            caps,
            dead_zones: Mutex::new(settings.dead_zone.clone()),
            state: Mutex::new(state),
        })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn capabilities(&self) -> &JoystickCapabilities {
        &self.caps
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    pub fn axis(&self, axis: JoystickAxis) -> i32 {
        lock(&self.state).axes.get(&axis).copied().unwrap_or(0)
    }

    pub fn button(&self, index: usize) -> bool {
        lock(&self.state).buttons.get(index).copied().unwrap_or(false)
    }

    pub fn pov(&self) -> i16 {
        lock(&self.state).pov
    }

    pub fn state(&self) -> JoystickState {
        lock(&self.state).clone()
    }

    pub fn dead_zone(&self, axis: JoystickAxis) -> i32 {
        lock(&self.dead_zones).get(&axis).copied().unwrap_or(0)
    }

    pub fn set_dead_zone(&self, axis: JoystickAxis, radius: i32) {
        lock(&self.dead_zones).insert(axis, radius.abs());
    }

    /// Read the device and return what changed since the last poll.
    ///
    /// Returns nothing while the device is unbound, or exclusive and not acquired without focus.
    pub fn poll(&self) -> Result<Vec<InputKind>> {
        if self.id < 0 {
            lock(&self.state).connected = false;
            return Ok(Vec::new());
        }
        let Some(status) = self.core.window_status() else {
            return Ok(Vec::new());
        };
        if !self.core.access().admit(status.focused) {
            return Ok(Vec::new());
        }

        let raw = match self.core.backend().joystick_read(self.id) {
            Ok(raw) => raw,
            Err(JOYERR_UNPLUGGED) => {
                let mut st = lock(&self.state);
                if st.connected {
                    log::debug!("joystick {} ({}) unplugged", self.id, self.core.record().name);
                }
                st.connected = false;
                return Ok(Vec::new());
            }
            Err(code) => return Err(InputError::JoystickRead { id: self.id, code }),
        };

        let dead_zones = lock(&self.dead_zones).clone();
        let mut out = Vec::new();
        let mut st = lock(&self.state);
        st.connected = true;

        for (axis, range) in &self.caps.axes {
            let centered = raw.axes[axis.index()] as i32 - range.span() / 2;
            let value = apply_dead_zone(centered, dead_zones.get(axis).copied().unwrap_or(0));
            let slot = st.axes.entry(*axis).or_insert(0);
            if *slot != value {
                *slot = value;
                out.push(InputKind::AxisMoved { axis: *axis, value });
            }
        }

        for (i, held) in st.buttons.iter_mut().enumerate().take(32) {
            let pressed = raw.buttons & (1u32 << i) != 0;
            if pressed != *held {
                *held = pressed;
                out.push(if pressed {
                    InputKind::ButtonPressed { button: i as u16 }
                } else {
                    InputKind::ButtonReleased { button: i as u16 }
                });
            }
        }

        if self.caps.pov.present {
            let dir = pov_direction(raw.pov);
            st.pov_degrees = if dir < 0 { None } else { Some(raw.pov) };
            if dir != st.pov {
                st.pov = dir;
                out.push(InputKind::HatChanged { hat: 0, value: dir });
            }
        }

        Ok(out)
    }
}

impl Device for Joystick {
    fn core(&self) -> &DeviceCore {
        &self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pov_maps_to_eight_way_slots() {
        assert_eq!(pov_direction(JOY_POVCENTERED), -1);
        assert_eq!(pov_direction(36000), -1);
        assert_eq!(pov_direction(0), 0);
        assert_eq!(pov_direction(2249), 0);
        assert_eq!(pov_direction(2250), 1);
        assert_eq!(pov_direction(9000), 2);
        assert_eq!(pov_direction(18000), 4);
        assert_eq!(pov_direction(27000), 6);
        assert_eq!(pov_direction(35000), 0);
    }

    #[test]
    fn dead_zone_snaps_small_values_to_center() {
        assert_eq!(apply_dead_zone(40, 50), 0);
        assert_eq!(apply_dead_zone(-50, 50), 0);
        assert_eq!(apply_dead_zone(51, 50), 51);
        assert_eq!(apply_dead_zone(-3, 0), -3);
    }
}

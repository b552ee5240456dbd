//! Events raised by device objects.
//!
//! Push-model devices (keyboard, pointer, custom HID) raise semantic events from inside the
//! hooked window procedure; each is wrapped in an [`InputEvent`] carrying a monotonic
//! timestamp and the identity of the device that produced it.
//!
//! Joysticks are pulled, not pushed: [`Joystick::poll`](crate::devices::Joystick::poll)
//! returns the per-poll deltas as [`InputKind`] values.
//!
//! ## Value conventions
//! - **Pointer positions** are window-client pixels after clamping; `relative` is the motion
//!   of the last sample (zeroed on an axis when clamping ate it).
//! - **Wheel deltas** are raw `WHEEL_DELTA` units (typically ±120 per notch).
//! - **Joystick axes** are re-centered signed values (`raw - range / 2`), not normalized.
//! - **Hats (POV):** `-1` = centered, `0..7` = directions (Up = 0, clockwise).

use crate::decoder::HidSample;
use crate::device::DeviceIdentity;
use crate::devices::keyboard::{Key, Modifiers};
use crate::devices::pointer::MouseButtons;
use crate::geometry::Point;
use std::time::Instant;

/// Timestamped event delivered to listeners.
#[derive(Clone, Debug)]
pub struct InputEvent<K> {
    /// Capture time (monotonic).
    pub at: Instant,
    /// Device that raised the event.
    pub device: DeviceIdentity,
    pub kind: K,
}

impl<K> InputEvent<K> {
    pub fn new(at: Instant, device: DeviceIdentity, kind: K) -> Self {
        Self { at, device, kind }
    }
}

/// Keyboard transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyboardEvent {
    KeyDown(KeyEventArgs),
    KeyUp(KeyEventArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyEventArgs {
    /// Resolved logical key (Shift/Ctrl/Alt already split into left/right variants).
    pub key: Key,
    /// Modifiers held after this transition was applied.
    pub modifiers: Modifiers,
    pub scan_code: u16,
    /// Character mapped to the key, shifted when Shift is held. `None` for unmapped keys.
    pub character: Option<char>,
}

/// Pointing device event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PointerEvent {
    Moved(PointerEventArgs),
    ButtonDown(PointerEventArgs),
    /// `click_count`: 1 = single, 2 = double, ...
    ButtonUp(PointerEventArgs),
    /// Raised after a `ButtonUp` whose click count is even.
    DoubleClicked(PointerEventArgs),
    WheelMoved(PointerEventArgs),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PointerEventArgs {
    /// Button that changed (empty for moves and wheel).
    pub button: MouseButtons,
    /// Buttons held after this sample.
    pub buttons: MouseButtons,
    pub position: Point,
    pub relative: Point,
    pub wheel: i32,
    pub wheel_delta: i32,
    pub click_count: u32,
    /// `true` when the sample carried absolute coordinates (tablets, remote sessions).
    pub absolute: bool,
}

/// Custom HID event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HidEvent {
    DataChanged(HidSample),
}

/// Per-poll joystick delta.
#[derive(Clone, Debug, PartialEq)]
pub enum InputKind {
    /// An axis changed; `value` is the re-centered, dead-zoned reading.
    AxisMoved { axis: JoystickAxis, value: i32 },

    /// A button transitioned to pressed.
    ButtonPressed { button: u16 },

    /// A button transitioned to released.
    ButtonReleased { button: u16 },

    /// The POV hat changed.
    ///
    /// `value`: `-1` = centered, `0..7` = directions (Up = 0, clockwise).
    HatChanged { hat: u16, value: i16 },
}

/// Joystick axis names, matching the multimedia API's X/Y/U/V/Z/R channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum JoystickAxis {
    X,
    Y,
    SecondaryX,
    SecondaryY,
    Throttle,
    Rudder,
}

impl JoystickAxis {
    pub const ALL: [JoystickAxis; 6] = [
        JoystickAxis::X,
        JoystickAxis::Y,
        JoystickAxis::SecondaryX,
        JoystickAxis::SecondaryY,
        JoystickAxis::Throttle,
        JoystickAxis::Rudder,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

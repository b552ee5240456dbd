//! Platform backends.
//!
//! [`InputBackend`] is the only seam between the input layer and the OS: enumeration,
//! raw-input registration, payload reads, window queries, cursor visibility, the multimedia
//! joystick API and window-procedure substitution. Everything above it is portable.
//!
//! - [`windows`]: the real thing (`windows-sys`, plus `hidapi` names with the `hid` feature).
//! - [`virtual_input`]: scriptable in-memory backend used by tests and non-Windows hosts.

use crate::device::{DeviceClass, WindowHandle};
use crate::devices::{JoystickCapabilities, RawJoystickState};
use crate::error::Result;
use crate::geometry::{Point, Size};
use crate::hook::WindowProcHost;
use crate::metadata::DeviceRecord;
use std::sync::Arc;

pub mod virtual_input;

#[cfg(target_os = "windows")]
#[cfg_attr(docsrs, doc(cfg(target_os = "windows")))]
pub mod windows;

/// What a device needs to know about its bound window when a sample arrives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowStatus {
    pub focused: bool,
    pub client_size: Size,
    /// OS cursor in client coordinates; `None` when unknown.
    pub cursor: Option<Point>,
}

impl WindowStatus {
    /// Focused window with unknown geometry.
    pub fn focused() -> Self {
        Self {
            focused: true,
            ..Self::default()
        }
    }
}

/// HID usage page/usage pair used to register a class with the raw-input layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawUsage {
    pub page: u16,
    pub usage: u16,
}

impl RawUsage {
    pub const POINTER: RawUsage = RawUsage { page: 0x01, usage: 0x02 };
    pub const KEYBOARD: RawUsage = RawUsage { page: 0x01, usage: 0x06 };

    /// Usage a device record registers under; `None` for joysticks.
    pub fn for_record(record: &DeviceRecord) -> Option<RawUsage> {
        match record.class {
            DeviceClass::Keyboard => Some(RawUsage::KEYBOARD),
            DeviceClass::Pointer => Some(RawUsage::POINTER),
            DeviceClass::Hid => Some(RawUsage {
                page: record.usage_page.unwrap_or(0x01),
                usage: record.usage.unwrap_or(0x00),
            }),
            DeviceClass::Joystick => None,
        }
    }
}

/// One `RegisterRawInputDevices` request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawInputRegistration {
    pub usage: RawUsage,
    pub target: WindowHandle,
    /// Deliver input while the target is not in the foreground (`RIDEV_INPUTSINK`).
    pub background: bool,
}

pub trait InputBackend: Send + Sync {
    /// Short label for log lines.
    fn name(&self) -> &'static str;

    /// Devices of `class` currently attached. Names need not be unique.
    fn enumerate(&self, class: DeviceClass) -> Result<Vec<DeviceRecord>>;

    /// Concrete wrapper type this backend creates for `class`; part of the composite key.
    fn wrapper_type(&self, class: DeviceClass) -> &'static str;

    fn register_raw_input(&self, registration: &RawInputRegistration) -> Result<()>;

    fn unregister_raw_input(&self, usage: RawUsage) -> Result<()>;

    /// Copy out the `RAWINPUT` record behind a `WM_INPUT` lparam.
    fn read_raw_input(&self, lparam: isize) -> Option<Vec<u8>>;

    fn window_status(&self, window: WindowHandle) -> WindowStatus;

    fn set_cursor_visible(&self, visible: bool);

    fn joystick_capabilities(&self, id: i32) -> Result<JoystickCapabilities>;

    /// One reading, or the raw `JOYERR_*` code.
    fn joystick_read(&self, id: i32) -> std::result::Result<RawJoystickState, u32>;

    fn procedure_host(&self) -> Arc<dyn WindowProcHost>;
}

/// Backend for the current platform.
#[cfg(target_os = "windows")]
pub fn platform_backend() -> Arc<dyn InputBackend> {
    Arc::new(windows::WindowsBackend::new())
}

/// Backend for the current platform.
#[cfg(not(target_os = "windows"))]
pub fn platform_backend() -> Arc<dyn InputBackend> {
    Arc::new(virtual_input::VirtualBackend::new())
}

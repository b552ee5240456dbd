#![cfg(target_os = "windows")]

//! Windows backend.
//!
//! - **Raw Input** enumeration, registration and `WM_INPUT` reads ([`raw_input`])
//! - **Window procedure** subclassing for the message hook ([`window_proc`])
//! - **Multimedia joystick** capability queries and reads ([`joystick`])
//! - **hidapi** product names for raw-input devices ([`hid_discovery`], feature `hid`)
//!
//! Most users should not touch these modules directly; build a
//! [`DeviceManager`](crate::manager::DeviceManager) with
//! [`DeviceManager::for_platform`](crate::manager::DeviceManager::for_platform).

pub mod hid_discovery;
pub mod joystick;
pub mod raw_input;
pub mod window_proc;

pub use window_proc::WindowsProcHost;

use super::{InputBackend, RawInputRegistration, RawUsage, WindowStatus};
use crate::device::{DeviceClass, WindowHandle};
use crate::devices::{JoystickCapabilities, RawJoystickState};
use crate::error::Result;
use crate::geometry::{Point, Size};
use crate::hook::WindowProcHost;
use crate::metadata::DeviceRecord;
use std::sync::Arc;
use windows_sys::Win32::Foundation::{HWND, POINT, RECT};
use windows_sys::Win32::Graphics::Gdi::ScreenToClient;
use windows_sys::Win32::UI::Input::KeyboardAndMouse::GetFocus;
use windows_sys::Win32::UI::WindowsAndMessaging::{GetClientRect, GetCursorPos, ShowCursor};

pub struct WindowsBackend {
    host: Arc<WindowsProcHost>,
}

impl Default for WindowsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowsBackend {
    pub fn new() -> Self {
        Self {
            host: Arc::new(WindowsProcHost),
        }
    }
}

impl InputBackend for WindowsBackend {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn enumerate(&self, class: DeviceClass) -> Result<Vec<DeviceRecord>> {
        if class == DeviceClass::Joystick {
            return Ok(joystick::enumerate());
        }
        let mut records = raw_input::enumerate(class)?;
        hid_discovery::apply_names(&mut records, &hid_discovery::product_names());
        Ok(records)
    }

    fn wrapper_type(&self, class: DeviceClass) -> &'static str {
        match class {
            DeviceClass::Keyboard => "RawKeyboard",
            DeviceClass::Pointer => "RawPointingDevice",
            DeviceClass::Joystick => "WinMMJoystick",
            DeviceClass::Hid => "RawHid",
        }
    }

    fn register_raw_input(&self, registration: &RawInputRegistration) -> Result<()> {
        raw_input::register_usage(registration)
    }

    fn unregister_raw_input(&self, usage: RawUsage) -> Result<()> {
        raw_input::unregister_usage(usage)
    }

    fn read_raw_input(&self, lparam: isize) -> Option<Vec<u8>> {
        raw_input::read_wm_input(lparam)
    }

    fn window_status(&self, window: WindowHandle) -> WindowStatus {
        let hwnd = window.0 as HWND;
        unsafe {
            let focused = GetFocus() == hwnd;

            let mut rect: RECT = core::mem::zeroed();
            let client_size = if GetClientRect(hwnd, &mut rect) != 0 {
                Size::new(rect.right - rect.left, rect.bottom - rect.top)
            } else {
                Size::default()
            };

            let mut pt = POINT { x: 0, y: 0 };
            let cursor = if GetCursorPos(&mut pt) != 0 && ScreenToClient(hwnd, &mut pt) != 0 {
                Some(Point::new(pt.x, pt.y))
            } else {
                None
            };

            WindowStatus {
                focused,
                client_size,
                cursor,
            }
        }
    }

    fn set_cursor_visible(&self, visible: bool) {
        // ShowCursor keeps a display counter; drive it across the visibility threshold.
        unsafe {
            if visible {
                while ShowCursor(1) < 0 {}
            } else {
                while ShowCursor(0) >= 0 {}
            }
        }
    }

    fn joystick_capabilities(&self, id: i32) -> Result<JoystickCapabilities> {
        joystick::capabilities(id)
    }

    fn joystick_read(&self, id: i32) -> std::result::Result<RawJoystickState, u32> {
        joystick::read(id)
    }

    fn procedure_host(&self) -> Arc<dyn WindowProcHost> {
        self.host.clone()
    }
}

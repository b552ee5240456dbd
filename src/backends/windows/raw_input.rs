//! Windows Raw Input plumbing: enumeration, registration and `WM_INPUT` reads.
//!
//! Decoding is not done here. [`read_wm_input`] only copies the `RAWINPUT` record out of the
//! OS buffer; [`crate::decoder`] turns the bytes into samples on every platform.
//!
//! ## Conventions
//! - Device paths come from `RIDI_DEVICENAME`; remote-desktop endpoints (`RDP_` in the path)
//!   are skipped.
//! - Names are left empty here; the backend fills them from `hidapi` when it can and the
//!   catalog labels the rest.

#![cfg(target_os = "windows")]

use crate::backends::{RawInputRegistration, RawUsage};
use crate::device::{DeviceClass, DeviceHandle};
use crate::error::{InputError, Result};
use crate::metadata::DeviceRecord;
use core::ffi::c_void;
use windows_sys::Win32::Foundation::{GetLastError, HANDLE, HWND};
use windows_sys::Win32::UI::Input::*;

// Local constants (avoid relying on module exports that vary by windows-sys version)
const RIM_MOUSE: u32 = 0;
const RIM_KEYBOARD: u32 = 1;
const RIM_HID: u32 = 2;
const FLAG_INPUTSINK: u32 = 0x0000_0100;
const FLAG_REMOVE: u32 = 0x0000_0001;
const CMD_DEVICENAME: u32 = 0x2000_0007;
const CMD_DEVICEINFO: u32 = 0x2000_000b;
const CMD_INPUT: u32 = 0x1000_0003;

fn rim_type(class: DeviceClass) -> Option<u32> {
    match class {
        DeviceClass::Pointer => Some(RIM_MOUSE),
        DeviceClass::Keyboard => Some(RIM_KEYBOARD),
        DeviceClass::Hid => Some(RIM_HID),
        DeviceClass::Joystick => None,
    }
}

/// Raw Input devices of `class`, names left empty.
pub(crate) fn enumerate(class: DeviceClass) -> Result<Vec<DeviceRecord>> {
    let Some(wanted) = rim_type(class) else {
        return Ok(Vec::new());
    };

    let entries = device_list()?;
    let mut out = Vec::new();
    for entry in entries {
        if entry.dwType != wanted {
            continue;
        }
        let Some(path) = device_name(entry.hDevice) else {
            log::warn!("skipping raw input device {:p}: no interface path", entry.hDevice);
            continue;
        };
        if path.to_ascii_uppercase().contains("RDP_") {
            log::debug!("skipping remote desktop device {}", path);
            continue;
        }

        let mut rec = DeviceRecord::new(class, "", DeviceHandle(entry.hDevice as isize), Some(path));
        rec.class_name = Some(
            match class {
                DeviceClass::Keyboard => "Keyboard",
                DeviceClass::Pointer => "Mouse",
                _ => "HIDClass",
            }
            .to_string(),
        );
        if class == DeviceClass::Hid {
            if let Some(info) = device_info(entry.hDevice) {
                // SAFETY: dwType was RIM_TYPEHID, so the hid arm is the live one.
                let hid = unsafe { info.Anonymous.hid };
                rec.vid = Some(hid.dwVendorId as u16);
                rec.pid = Some(hid.dwProductId as u16);
                rec.usage_page = Some(hid.usUsagePage);
                rec.usage = Some(hid.usUsage);
            }
        }
        out.push(rec);
    }
    Ok(out)
}

fn device_list() -> Result<Vec<RAWINPUTDEVICELIST>> {
    let entry_size = core::mem::size_of::<RAWINPUTDEVICELIST>() as u32;
    unsafe {
        let mut count: u32 = 0;
        if GetRawInputDeviceList(core::ptr::null_mut(), &mut count, entry_size) == u32::MAX {
            return Err(InputError::Driver {
                operation: "GetRawInputDeviceList",
                code: GetLastError(),
            });
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut list: Vec<RAWINPUTDEVICELIST> = vec![core::mem::zeroed(); count as usize];
        let got = GetRawInputDeviceList(list.as_mut_ptr(), &mut count, entry_size);
        if got == u32::MAX {
            return Err(InputError::Driver {
                operation: "GetRawInputDeviceList",
                code: GetLastError(),
            });
        }
        list.truncate(got as usize);
        Ok(list)
    }
}

/// RawInput device interface path for a given `hDevice` (RIDI_DEVICENAME).
pub(crate) fn device_name(hdev: HANDLE) -> Option<String> {
    unsafe {
        // Query required size (in WCHARs, including NUL).
        let mut size: u32 = 0;
        let r0 = GetRawInputDeviceInfoW(hdev, CMD_DEVICENAME, core::ptr::null_mut(), &mut size);
        if r0 == u32::MAX || size == 0 {
            return None;
        }

        let mut wide: Vec<u16> = vec![0u16; size as usize];
        let r1 = GetRawInputDeviceInfoW(hdev, CMD_DEVICENAME, wide.as_mut_ptr() as *mut c_void, &mut size);
        if r1 == u32::MAX {
            return None;
        }

        while wide.last() == Some(&0) {
            wide.pop();
        }
        Some(String::from_utf16_lossy(&wide))
    }
}

fn device_info(hdev: HANDLE) -> Option<RID_DEVICE_INFO> {
    unsafe {
        let mut info: RID_DEVICE_INFO = core::mem::zeroed();
        info.cbSize = core::mem::size_of::<RID_DEVICE_INFO>() as u32;
        let mut size = info.cbSize;
        let r = GetRawInputDeviceInfoW(hdev, CMD_DEVICEINFO, &mut info as *mut _ as *mut c_void, &mut size);
        if r == u32::MAX || r == 0 {
            return None;
        }
        Some(info)
    }
}

fn register(usage: RawUsage, flags: u32, target: HWND, operation: &'static str) -> Result<()> {
    let device = RAWINPUTDEVICE {
        usUsagePage: usage.page,
        usUsage: usage.usage,
        dwFlags: flags,
        hwndTarget: target,
    };
    let ok = unsafe { RegisterRawInputDevices(&device, 1, core::mem::size_of::<RAWINPUTDEVICE>() as u32) };
    if ok == 0 {
        return Err(InputError::Driver {
            operation,
            code: unsafe { GetLastError() },
        });
    }
    Ok(())
}

pub(crate) fn register_usage(registration: &RawInputRegistration) -> Result<()> {
    let flags = if registration.background { FLAG_INPUTSINK } else { 0 };
    register(
        registration.usage,
        flags,
        registration.target.0 as HWND,
        "RegisterRawInputDevices",
    )
}

pub(crate) fn unregister_usage(usage: RawUsage) -> Result<()> {
    // RIDEV_REMOVE requires a null target.
    register(usage, FLAG_REMOVE, core::ptr::null_mut(), "RegisterRawInputDevices(RIDEV_REMOVE)")
}

/// Copy the `RAWINPUT` record behind a `WM_INPUT` lparam.
pub(crate) fn read_wm_input(lparam: isize) -> Option<Vec<u8>> {
    let header_size = core::mem::size_of::<RAWINPUTHEADER>() as u32;
    unsafe {
        // Query size
        let mut size: u32 = 0;
        let r0 = GetRawInputData(lparam as HRAWINPUT, CMD_INPUT, core::ptr::null_mut(), &mut size, header_size);
        if r0 == u32::MAX || size == 0 {
            return None;
        }

        // Read buffer
        let mut buf = vec![0u8; size as usize];
        let r1 = GetRawInputData(
            lparam as HRAWINPUT,
            CMD_INPUT,
            buf.as_mut_ptr() as *mut c_void,
            &mut size,
            header_size,
        );
        if r1 == u32::MAX {
            return None;
        }
        buf.truncate(r1 as usize);
        Some(buf)
    }
}

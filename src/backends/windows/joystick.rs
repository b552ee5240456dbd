//! Multimedia joystick API (`winmm`).
//!
//! Axis slots follow [`JoystickAxis::index`]: X, Y, U (secondary X), V (secondary Y),
//! Z (throttle), R (rudder).

#![cfg(target_os = "windows")]

use crate::devices::{JoystickCapabilities, RawJoystickState};
use crate::devices::joystick::PovSupport;
use crate::error::{InputError, Result};
use crate::event::JoystickAxis;
use crate::geometry::Range;
use crate::metadata::DeviceRecord;
use std::collections::BTreeMap;
use windows_sys::Win32::Media::Multimedia::{joyGetDevCapsW, joyGetNumDevs, joyGetPosEx, JOYCAPSW, JOYINFOEX};

// Local constants (avoid relying on module exports that vary by windows-sys version)
const JOYCAPS_HASZ: u32 = 0x0001;
const JOYCAPS_HASR: u32 = 0x0002;
const JOYCAPS_HASU: u32 = 0x0004;
const JOYCAPS_HASV: u32 = 0x0008;
const JOYCAPS_HASPOV: u32 = 0x0010;
const JOYCAPS_POV4DIR: u32 = 0x0020;
const JOYCAPS_POVCTS: u32 = 0x0040;
const JOY_RETURNALL: u32 = 0x0000_00FF;
const JOY_RETURNPOVCTS: u32 = 0x0000_0200;

fn wide_to_string(wide: &[u16]) -> String {
    let end = wide.iter().position(|c| *c == 0).unwrap_or(wide.len());
    String::from_utf16_lossy(&wide[..end])
}

fn raw_caps(id: i32) -> std::result::Result<JOYCAPSW, u32> {
    unsafe {
        let mut caps: JOYCAPSW = core::mem::zeroed();
        let code = joyGetDevCapsW(id as usize, &mut caps, core::mem::size_of::<JOYCAPSW>() as u32);
        if code != 0 {
            return Err(code);
        }
        Ok(caps)
    }
}

/// Joysticks that answer a capability query and a read.
pub(crate) fn enumerate() -> Vec<DeviceRecord> {
    let count = unsafe { joyGetNumDevs() } as i32;
    let mut out = Vec::new();
    for id in 0..count {
        let Ok(caps) = raw_caps(id) else {
            continue;
        };
        if read(id).is_err() {
            continue;
        }
        let mut rec = DeviceRecord::joystick(wide_to_string(&caps.szPname), id);
        rec.vid = Some(caps.wMid);
        rec.pid = Some(caps.wPid);
        out.push(rec);
    }
    out
}

pub(crate) fn capabilities(id: i32) -> Result<JoystickCapabilities> {
    let caps = raw_caps(id).map_err(|code| InputError::Driver {
        operation: "joyGetDevCapsW",
        code,
    })?;

    let range = |min: u32, max: u32| Range::new(min as i32, max as i32);
    let mut axes = BTreeMap::new();
    axes.insert(JoystickAxis::X, range(caps.wXmin, caps.wXmax));
    axes.insert(JoystickAxis::Y, range(caps.wYmin, caps.wYmax));
    if caps.wCaps & JOYCAPS_HASU != 0 {
        axes.insert(JoystickAxis::SecondaryX, range(caps.wUmin, caps.wUmax));
    }
    if caps.wCaps & JOYCAPS_HASV != 0 {
        axes.insert(JoystickAxis::SecondaryY, range(caps.wVmin, caps.wVmax));
    }
    if caps.wCaps & JOYCAPS_HASZ != 0 {
        axes.insert(JoystickAxis::Throttle, range(caps.wZmin, caps.wZmax));
    }
    if caps.wCaps & JOYCAPS_HASR != 0 {
        axes.insert(JoystickAxis::Rudder, range(caps.wRmin, caps.wRmax));
    }

    Ok(JoystickCapabilities {
        product_name: wide_to_string(&caps.szPname),
        manufacturer_id: caps.wMid,
        product_id: caps.wPid,
        axes,
        button_count: caps.wNumButtons,
        pov: PovSupport {
            present: caps.wCaps & JOYCAPS_HASPOV != 0,
            four_directions: caps.wCaps & JOYCAPS_POV4DIR != 0,
            continuous: caps.wCaps & JOYCAPS_POVCTS != 0,
        },
    })
}

pub(crate) fn read(id: i32) -> std::result::Result<RawJoystickState, u32> {
    unsafe {
        let mut info: JOYINFOEX = core::mem::zeroed();
        info.dwSize = core::mem::size_of::<JOYINFOEX>() as u32;
        info.dwFlags = JOY_RETURNALL | JOY_RETURNPOVCTS;
        let code = joyGetPosEx(id as u32, &mut info);
        if code != 0 {
            return Err(code);
        }
        Ok(RawJoystickState {
            axes: [info.dwXpos, info.dwYpos, info.dwUpos, info.dwVpos, info.dwZpos, info.dwRpos],
            buttons: info.dwButtons,
            pov: info.dwPOV,
        })
    }
}

//! Raw input payload decoding.
//!
//! Turns the byte image of one `RAWINPUT` record (what `GetRawInputData(RID_INPUT)` copies out
//! during `WM_INPUT`) into a typed [`RawPacket`]. Decoding is pure and works on any host, so
//! captured packets can be replayed in tests.
//!
//! ## Layout
//! - Header: `dwType u32`, `dwSize u32`, `hDevice` and `wParam` (pointer width each).
//! - Keyboard body: `MakeCode u16, Flags u16, Reserved u16, VKey u16, Message u32, Extra u32`.
//! - Mouse body: `usFlags u16, pad u16, usButtonFlags u16, usButtonData u16, ulRawButtons u32,
//!   lLastX i32, lLastY i32, ulExtraInformation u32`.
//! - HID body: `dwSizeHid u32, dwCount u32`, then `dwSizeHid * dwCount` bytes.
//!
//! ## Conventions
//! - Truncated buffers decode to `None`; so do unknown `dwType` values.
//! - Keyboard left/right comes from the E0/E1 flags, except for Shift: the OS does not set
//!   the extended bit reliably for it, so the make code decides (`0x36` is right Shift).
//! - A zero `MakeCode` is kept as 0 (no layout lookup here).
//! - Wheel deltas are the signed 16-bit `usButtonData`, only when the wheel flag is set.

use crate::device::{DeviceClass, DeviceHandle};
use crate::devices::keyboard::Key;
use crate::devices::pointer::MouseButtons;
use crate::geometry::Point;

// Local constants (avoid relying on module exports that vary by windows-sys version)
pub const RIM_TYPEMOUSE: u32 = 0;
pub const RIM_TYPEKEYBOARD: u32 = 1;
pub const RIM_TYPEHID: u32 = 2;

pub const RI_KEY_BREAK: u16 = 0x0001;
pub const RI_KEY_E0: u16 = 0x0002;
pub const RI_KEY_E1: u16 = 0x0004;

pub const MOUSE_MOVE_ABSOLUTE: u16 = 0x0001;

pub const RI_MOUSE_LEFT_BUTTON_DOWN: u16 = 0x0001;
pub const RI_MOUSE_LEFT_BUTTON_UP: u16 = 0x0002;
pub const RI_MOUSE_RIGHT_BUTTON_DOWN: u16 = 0x0004;
pub const RI_MOUSE_RIGHT_BUTTON_UP: u16 = 0x0008;
pub const RI_MOUSE_MIDDLE_BUTTON_DOWN: u16 = 0x0010;
pub const RI_MOUSE_MIDDLE_BUTTON_UP: u16 = 0x0020;
pub const RI_MOUSE_BUTTON_4_DOWN: u16 = 0x0040;
pub const RI_MOUSE_BUTTON_4_UP: u16 = 0x0080;
pub const RI_MOUSE_BUTTON_5_DOWN: u16 = 0x0100;
pub const RI_MOUSE_BUTTON_5_UP: u16 = 0x0200;
pub const RI_MOUSE_WHEEL: u16 = 0x0400;

/// Make code of the right Shift key.
const SCAN_RIGHT_SHIFT: u16 = 0x36;

const PTR: usize = core::mem::size_of::<usize>();

/// Size of `RAWINPUTHEADER` on this target.
pub const HEADER_SIZE: usize = 8 + 2 * PTR;
pub const KEYBOARD_BODY_SIZE: usize = 16;
pub const MOUSE_BODY_SIZE: usize = 24;
pub const HID_BODY_HEADER_SIZE: usize = 8;

/// Make (down) or break (up).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyState {
    Down,
    Up,
}

/// Which physical copy of a doubled key produced the sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeySide {
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyboardSample {
    /// Virtual key as reported (generic: `SHIFT`, not `LSHIFT`).
    pub key: Key,
    pub scan_code: u16,
    pub state: KeyState,
    pub side: KeySide,
    /// Raw `RI_KEY_*` flags.
    pub flags: u16,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PointerSample {
    /// Buttons that went down in this sample.
    pub down: MouseButtons,
    /// Buttons that went up in this sample.
    pub up: MouseButtons,
    /// `lLastX/lLastY`: a delta when `relative`, a coordinate otherwise.
    pub motion: Point,
    pub relative: bool,
    pub wheel_delta: i16,
}

/// Opaque HID report block. `data.len() == item_size * item_count`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HidSample {
    pub item_size: u32,
    pub item_count: u32,
    pub data: Vec<u8>,
}

impl HidSample {
    /// Iterate the individual reports in the block.
    pub fn reports(&self) -> impl Iterator<Item = &[u8]> {
        let size = (self.item_size as usize).max(1);
        self.data.chunks(size)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sample {
    Keyboard(KeyboardSample),
    Pointer(PointerSample),
    Hid(HidSample),
}

/// One decoded `WM_INPUT` record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawPacket {
    pub handle: DeviceHandle,
    pub sample: Sample,
}

impl RawPacket {
    pub fn class(&self) -> DeviceClass {
        match self.sample {
            Sample::Keyboard(_) => DeviceClass::Keyboard,
            Sample::Pointer(_) => DeviceClass::Pointer,
            Sample::Hid(_) => DeviceClass::Hid,
        }
    }
}

#[inline]
fn u16_at(buf: &[u8], at: usize) -> Option<u16> {
    buf.get(at..at + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

#[inline]
fn u32_at(buf: &[u8], at: usize) -> Option<u32> {
    buf.get(at..at + 4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

#[inline]
fn i32_at(buf: &[u8], at: usize) -> Option<i32> {
    u32_at(buf, at).map(|v| v as i32)
}

#[inline]
fn isize_at(buf: &[u8], at: usize) -> Option<isize> {
    let b = buf.get(at..at + PTR)?;
    let mut raw = [0u8; PTR];
    raw.copy_from_slice(b);
    Some(isize::from_le_bytes(raw))
}

/// Decode one `RAWINPUT` byte image.
pub fn decode(buf: &[u8]) -> Option<RawPacket> {
    if buf.len() < HEADER_SIZE {
        return None;
    }
    let kind = u32_at(buf, 0)?;
    let handle = DeviceHandle(isize_at(buf, 8)?);
    let body = &buf[HEADER_SIZE..];

    let sample = match kind {
        RIM_TYPEKEYBOARD => Sample::Keyboard(decode_keyboard(body)?),
        RIM_TYPEMOUSE => Sample::Pointer(decode_pointer(body)?),
        RIM_TYPEHID => Sample::Hid(decode_hid(body)?),
        _ => return None,
    };

    Some(RawPacket { handle, sample })
}

pub fn decode_keyboard(body: &[u8]) -> Option<KeyboardSample> {
    if body.len() < KEYBOARD_BODY_SIZE {
        return None;
    }
    let make = u16_at(body, 0)?;
    let flags = u16_at(body, 2)?;
    let vkey = u16_at(body, 6)?;

    let state = if flags & RI_KEY_BREAK != 0 {
        KeyState::Up
    } else {
        KeyState::Down
    };

    let key = Key(vkey);
    let side = if key == Key::SHIFT {
        if make == SCAN_RIGHT_SHIFT {
            KeySide::Right
        } else {
            KeySide::Left
        }
    } else if flags & (RI_KEY_E0 | RI_KEY_E1) != 0 {
        KeySide::Right
    } else {
        KeySide::Left
    };

    Some(KeyboardSample {
        key,
        scan_code: make,
        state,
        side,
        flags,
    })
}

pub fn decode_pointer(body: &[u8]) -> Option<PointerSample> {
    if body.len() < MOUSE_BODY_SIZE {
        return None;
    }
    let mouse_flags = u16_at(body, 0)?;
    let button_flags = u16_at(body, 4)?;
    let button_data = u16_at(body, 6)?;
    let x = i32_at(body, 12)?;
    let y = i32_at(body, 16)?;

    let mut down = MouseButtons::NONE;
    let mut up = MouseButtons::NONE;

    if button_flags & RI_MOUSE_LEFT_BUTTON_DOWN != 0 {
        down |= MouseButtons::LEFT;
    }
    if button_flags & RI_MOUSE_LEFT_BUTTON_UP != 0 {
        up |= MouseButtons::LEFT;
    }
    if button_flags & RI_MOUSE_RIGHT_BUTTON_DOWN != 0 {
        down |= MouseButtons::RIGHT;
    }
    if button_flags & RI_MOUSE_RIGHT_BUTTON_UP != 0 {
        up |= MouseButtons::RIGHT;
    }
    if button_flags & RI_MOUSE_MIDDLE_BUTTON_DOWN != 0 {
        down |= MouseButtons::MIDDLE;
    }
    if button_flags & RI_MOUSE_MIDDLE_BUTTON_UP != 0 {
        up |= MouseButtons::MIDDLE;
    }
    if button_flags & RI_MOUSE_BUTTON_4_DOWN != 0 {
        down |= MouseButtons::BUTTON4;
    }
    if button_flags & RI_MOUSE_BUTTON_4_UP != 0 {
        up |= MouseButtons::BUTTON4;
    }
    if button_flags & RI_MOUSE_BUTTON_5_DOWN != 0 {
        down |= MouseButtons::BUTTON5;
    }
    if button_flags & RI_MOUSE_BUTTON_5_UP != 0 {
        up |= MouseButtons::BUTTON5;
    }

    let wheel_delta = if button_flags & RI_MOUSE_WHEEL != 0 {
        button_data as i16
    } else {
        0
    };

    Some(PointerSample {
        down,
        up,
        motion: Point::new(x, y),
        relative: mouse_flags & MOUSE_MOVE_ABSOLUTE == 0,
        wheel_delta,
    })
}

pub fn decode_hid(body: &[u8]) -> Option<HidSample> {
    let item_size = u32_at(body, 0)?;
    let item_count = u32_at(body, 4)?;
    let len = (item_size as usize).checked_mul(item_count as usize)?;
    let data = body.get(HID_BODY_HEADER_SIZE..HID_BODY_HEADER_SIZE.checked_add(len)?)?;

    Some(HidSample {
        item_size,
        item_count,
        data: data.to_vec(),
    })
}

/// Byte-image builders matching the layout above.
///
/// Used by the virtual backend to script `WM_INPUT` traffic, and handy in tests.
pub mod encode {
    use super::*;

    fn header(kind: u32, body_len: usize, handle: DeviceHandle) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + body_len);
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&((HEADER_SIZE + body_len) as u32).to_le_bytes());
        out.extend_from_slice(&handle.0.to_le_bytes());
        out.extend_from_slice(&0isize.to_le_bytes());
        out
    }

    /// `RAWKEYBOARD` record. `flags` are raw `RI_KEY_*` bits.
    pub fn keyboard(handle: DeviceHandle, vkey: Key, make_code: u16, flags: u16) -> Vec<u8> {
        let mut out = header(RIM_TYPEKEYBOARD, KEYBOARD_BODY_SIZE, handle);
        out.extend_from_slice(&make_code.to_le_bytes());
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&vkey.0.to_le_bytes());
        let message: u32 = if flags & RI_KEY_BREAK != 0 { 0x0101 } else { 0x0100 };
        out.extend_from_slice(&message.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out
    }

    /// `RAWMOUSE` record. `button_flags` are raw `RI_MOUSE_*` bits.
    pub fn mouse(handle: DeviceHandle, mouse_flags: u16, button_flags: u16, button_data: u16, x: i32, y: i32) -> Vec<u8> {
        let mut out = header(RIM_TYPEMOUSE, MOUSE_BODY_SIZE, handle);
        out.extend_from_slice(&mouse_flags.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&button_flags.to_le_bytes());
        out.extend_from_slice(&button_data.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&x.to_le_bytes());
        out.extend_from_slice(&y.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out
    }

    /// Relative motion only.
    pub fn mouse_move(handle: DeviceHandle, dx: i32, dy: i32) -> Vec<u8> {
        mouse(handle, 0, 0, 0, dx, dy)
    }

    /// Button flags only, no motion.
    pub fn mouse_buttons(handle: DeviceHandle, button_flags: u16) -> Vec<u8> {
        mouse(handle, 0, button_flags, 0, 0, 0)
    }

    pub fn mouse_wheel(handle: DeviceHandle, delta: i16) -> Vec<u8> {
        mouse(handle, 0, RI_MOUSE_WHEEL, delta as u16, 0, 0)
    }

    /// `RAWHID` record carrying `reports`, each `item_size` bytes long.
    pub fn hid(handle: DeviceHandle, item_size: u32, reports: &[u8]) -> Vec<u8> {
        let count = if item_size == 0 { 0 } else { reports.len() as u32 / item_size };
        let mut out = header(RIM_TYPEHID, HID_BODY_HEADER_SIZE + reports.len(), handle);
        out.extend_from_slice(&item_size.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(reports);
        out
    }
}

//! Window procedure substitution (`GWLP_WNDPROC` subclassing).
//!
//! The hook entry for a window is stashed in a window property as a leaked `Arc`, so the
//! `extern "system"` substitute procedure can find it from the `HWND` alone. Restoring puts the
//! original procedure back only while ours is still on top: if something subclassed the window
//! after us, the property stays, the entry keeps forwarding, and the hook re-arms that same
//! entry on the next filter instead of installing again.

#![cfg(target_os = "windows")]

use crate::device::WindowHandle;
use crate::error::{InputError, Result};
use crate::hook::{HookEntry, ProcAddress, WindowMessage, WindowProcHost};
use std::sync::Arc;
use windows_sys::Win32::Foundation::{GetLastError, SetLastError, HANDLE, HWND, LPARAM, LRESULT, WPARAM};
use windows_sys::Win32::UI::WindowsAndMessaging::*;

type RawProc = unsafe extern "system" fn(HWND, u32, WPARAM, LPARAM) -> LRESULT;

// Local constants (avoid relying on module exports that vary by windows-sys version)
const WNDPROC_INDEX: i32 = -4;

fn prop_name() -> Vec<u16> {
    "hookup.MessageFilterHook".encode_utf16().chain(std::iter::once(0)).collect()
}

#[cfg(target_pointer_width = "64")]
unsafe fn get_proc(hwnd: HWND) -> isize {
    GetWindowLongPtrW(hwnd, WNDPROC_INDEX)
}

#[cfg(target_pointer_width = "64")]
unsafe fn set_proc(hwnd: HWND, value: isize) -> isize {
    SetWindowLongPtrW(hwnd, WNDPROC_INDEX, value)
}

#[cfg(target_pointer_width = "32")]
unsafe fn get_proc(hwnd: HWND) -> isize {
    GetWindowLongW(hwnd, WNDPROC_INDEX) as isize
}

#[cfg(target_pointer_width = "32")]
unsafe fn set_proc(hwnd: HWND, value: isize) -> isize {
    SetWindowLongW(hwnd, WNDPROC_INDEX, value as i32) as isize
}

unsafe extern "system" fn substitute_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    let name = prop_name();
    let raw = GetPropW(hwnd, name.as_ptr()) as *const HookEntry;
    if raw.is_null() {
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    }

    // Hold our own reference: dispatch may restore the window and release the stashed one.
    Arc::increment_strong_count(raw);
    let entry = Arc::from_raw(raw);
    entry.dispatch(&WindowMessage::new(WindowHandle(hwnd as isize), msg, wparam, lparam))
}

/// [`WindowProcHost`] over the real window manager.
#[derive(Debug, Default)]
pub struct WindowsProcHost;

impl WindowProcHost for WindowsProcHost {
    fn current(&self, window: WindowHandle) -> ProcAddress {
        ProcAddress(unsafe { get_proc(window.0 as HWND) } as usize)
    }

    fn substitute(&self) -> ProcAddress {
        ProcAddress(substitute_proc as RawProc as usize)
    }

    fn install(&self, entry: &Arc<HookEntry>) -> Result<()> {
        let window = entry.window();
        let hwnd = window.0 as HWND;
        let name = prop_name();

        unsafe {
            let raw = Arc::into_raw(entry.clone());
            if SetPropW(hwnd, name.as_ptr(), raw as HANDLE) == 0 {
                drop(Arc::from_raw(raw));
                return Err(InputError::HookInstall {
                    window,
                    code: GetLastError(),
                });
            }

            SetLastError(0);
            let previous = set_proc(hwnd, entry.installed().0 as isize);
            let code = GetLastError();
            if previous == 0 && code != 0 {
                RemovePropW(hwnd, name.as_ptr());
                drop(Arc::from_raw(raw));
                return Err(InputError::HookInstall { window, code });
            }
        }
        Ok(())
    }

    fn restore(&self, entry: &HookEntry) -> bool {
        let hwnd = entry.window().0 as HWND;
        unsafe {
            if self.current(entry.window()) != entry.installed() {
                log::warn!(
                    "window procedure on {} was subclassed after the hook; leaving the chain in place",
                    entry.window()
                );
                return false;
            }
            SetLastError(0);
            if set_proc(hwnd, entry.original().0 as isize) == 0 && GetLastError() != 0 {
                log::warn!("could not restore window procedure on {} (code {})", entry.window(), GetLastError());
                return false;
            }
            let name = prop_name();
            let raw = RemovePropW(hwnd, name.as_ptr()) as *const HookEntry;
            if !raw.is_null() {
                drop(Arc::from_raw(raw));
            }
        }
        true
    }

    fn forward(&self, original: ProcAddress, msg: &WindowMessage) -> isize {
        let hwnd = msg.window.0 as HWND;
        unsafe {
            if original.0 == 0 {
                return DefWindowProcW(hwnd, msg.id, msg.wparam, msg.lparam);
            }
            let proc: RawProc = std::mem::transmute::<usize, RawProc>(original.0);
            CallWindowProcW(Some(proc), hwnd, msg.id, msg.wparam, msg.lparam)
        }
    }
}

//! Scriptable in-memory backend.
//!
//! Stands in for the OS in tests and on platforms without raw input. Devices, window focus,
//! joystick readings and failures are all set up by the caller; raw input records are queued
//! and delivered through [`VirtualBackend::send_raw_input`], which runs the same hook chain a
//! real `WM_INPUT` would.

use super::{InputBackend, RawInputRegistration, RawUsage, WindowStatus};
use crate::device::{DeviceClass, WindowHandle};
use crate::devices::{JoystickCapabilities, RawJoystickState};
use crate::error::{InputError, Result};
use crate::geometry::Size;
use crate::hook::{wm, HookEntry, ProcAddress, WindowMessage, WindowProcHost};
use crate::lock;
use crate::metadata::DeviceRecord;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, Weak};

const SUBSTITUTE: ProcAddress = ProcAddress(0x5AB5_7171);

#[derive(Default)]
struct VirtualWindow {
    current: ProcAddress,
    // Foreign procedure -> the one it calls next.
    chained: HashMap<ProcAddress, ProcAddress>,
    entry: Option<Weak<HookEntry>>,
    installs: usize,
    restores: usize,
    forwarded: Vec<WindowMessage>,
}

/// Window procedures without windows.
///
/// Every window starts with its own fake procedure address. Installing a hook swaps in a shared
/// substitute address; [`send`](Self::send) follows any [`subclass`](Self::subclass)ed
/// procedures down the chain, dispatches through the attached [`HookEntry`] when it reaches the
/// substitute and otherwise records the message as reaching the original.
#[derive(Default)]
pub struct VirtualProcHost {
    windows: Mutex<HashMap<WindowHandle, VirtualWindow>>,
    fail_install: Mutex<Option<u32>>,
}

impl VirtualProcHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_window(&self, window: WindowHandle) {
        lock(&self.windows).entry(window).or_insert_with(|| VirtualWindow {
            current: ProcAddress(0x1000 + window.0 as usize),
            ..VirtualWindow::default()
        });
    }

    /// Make the next [`install`](WindowProcHost::install) fail with `code`.
    pub fn fail_next_install(&self, code: u32) {
        *lock(&self.fail_install) = Some(code);
    }

    /// Put a foreign procedure on top of `window`'s chain; it passes everything down.
    pub fn subclass(&self, window: WindowHandle, procedure: ProcAddress) {
        let mut windows = lock(&self.windows);
        let w = windows.entry(window).or_default();
        let previous = std::mem::replace(&mut w.current, procedure);
        w.chained.insert(procedure, previous);
    }

    pub fn install_count(&self, window: WindowHandle) -> usize {
        lock(&self.windows).get(&window).map_or(0, |w| w.installs)
    }

    pub fn restore_count(&self, window: WindowHandle) -> usize {
        lock(&self.windows).get(&window).map_or(0, |w| w.restores)
    }

    /// Messages that reached the original procedure, oldest first.
    pub fn forwarded(&self, window: WindowHandle) -> Vec<WindowMessage> {
        lock(&self.windows).get(&window).map(|w| w.forwarded.clone()).unwrap_or_default()
    }

    /// Deliver `msg` the way the OS would: through whatever procedure is current.
    pub fn send(&self, msg: WindowMessage) -> isize {
        let (current, entry) = {
            let windows = lock(&self.windows);
            let Some(w) = windows.get(&msg.window) else {
                return 0;
            };
            let mut current = w.current;
            while let Some(next) = w.chained.get(&current) {
                current = *next;
            }
            (current, w.entry.as_ref().and_then(Weak::upgrade))
        };
        match entry {
            Some(entry) if current == SUBSTITUTE => entry.dispatch(&msg),
            _ => self.forward(current, &msg),
        }
    }
}

impl WindowProcHost for VirtualProcHost {
    fn current(&self, window: WindowHandle) -> ProcAddress {
        lock(&self.windows).get(&window).map_or(ProcAddress(0), |w| w.current)
    }

    fn substitute(&self) -> ProcAddress {
        SUBSTITUTE
    }

    fn install(&self, entry: &Arc<HookEntry>) -> Result<()> {
        let window = entry.window();
        if let Some(code) = lock(&self.fail_install).take() {
            return Err(InputError::HookInstall { window, code });
        }
        let mut windows = lock(&self.windows);
        let w = windows.entry(window).or_default();
        w.current = entry.installed();
        w.entry = Some(Arc::downgrade(entry));
        w.installs += 1;
        Ok(())
    }

    fn restore(&self, entry: &HookEntry) -> bool {
        let mut windows = lock(&self.windows);
        let Some(w) = windows.get_mut(&entry.window()) else {
            return true;
        };
        w.restores += 1;
        if w.current != entry.installed() {
            log::warn!("procedure on {} was replaced by someone else; leaving it", entry.window());
            return false;
        }
        w.current = entry.original();
        w.entry = None;
        true
    }

    fn forward(&self, _original: ProcAddress, msg: &WindowMessage) -> isize {
        if let Some(w) = lock(&self.windows).get_mut(&msg.window) {
            w.forwarded.push(*msg);
        }
        0
    }
}

#[derive(Clone)]
struct VirtualJoystick {
    caps: JoystickCapabilities,
    reading: std::result::Result<RawJoystickState, u32>,
}

struct VirtualState {
    records: BTreeMap<DeviceClass, Vec<DeviceRecord>>,
    wrapper_types: HashMap<DeviceClass, &'static str>,
    windows: HashMap<WindowHandle, WindowStatus>,
    packets: HashMap<isize, Vec<u8>>,
    next_lparam: isize,
    joysticks: BTreeMap<i32, VirtualJoystick>,
    registrations: Vec<RawInputRegistration>,
    active: BTreeMap<RawUsage, RawInputRegistration>,
    unregistrations: Vec<RawUsage>,
    cursor_calls: Vec<bool>,
    enumerate_error: Option<u32>,
    register_error: Option<u32>,
    enumerations: usize,
}

impl Default for VirtualState {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            wrapper_types: HashMap::new(),
            windows: HashMap::new(),
            packets: HashMap::new(),
            next_lparam: 1,
            joysticks: BTreeMap::new(),
            registrations: Vec::new(),
            active: BTreeMap::new(),
            unregistrations: Vec::new(),
            cursor_calls: Vec::new(),
            enumerate_error: None,
            register_error: None,
            enumerations: 0,
        }
    }
}

/// In-memory [`InputBackend`].
pub struct VirtualBackend {
    state: Mutex<VirtualState>,
    host: Arc<VirtualProcHost>,
}

impl Default for VirtualBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(VirtualState::default()),
            host: Arc::new(VirtualProcHost::new()),
        }
    }

    pub fn proc_host(&self) -> &Arc<VirtualProcHost> {
        &self.host
    }

    // Devices

    pub fn add_device(&self, record: DeviceRecord) {
        lock(&self.state).records.entry(record.class).or_default().push(record);
    }

    /// Remove every device of `class` named `name`. Returns how many went away.
    pub fn remove_device(&self, class: DeviceClass, name: &str) -> usize {
        let mut st = lock(&self.state);
        let Some(list) = st.records.get_mut(&class) else {
            return 0;
        };
        let before = list.len();
        list.retain(|r| r.name != name);
        before - list.len()
    }

    /// Override the wrapper type reported for `class`.
    pub fn set_wrapper_type(&self, class: DeviceClass, wrapper: &'static str) {
        lock(&self.state).wrapper_types.insert(class, wrapper);
    }

    /// Make every enumeration fail with `code` until cleared with `None`.
    pub fn set_enumerate_error(&self, code: Option<u32>) {
        lock(&self.state).enumerate_error = code;
    }

    /// Number of [`enumerate`](InputBackend::enumerate) calls so far.
    pub fn enumerations(&self) -> usize {
        lock(&self.state).enumerations
    }

    // Windows

    /// Create a focused window with an 800x600 client area.
    pub fn create_window(&self, window: WindowHandle) {
        self.host.create_window(window);
        lock(&self.state).windows.entry(window).or_insert(WindowStatus {
            focused: true,
            client_size: Size::new(800, 600),
            cursor: None,
        });
    }

    pub fn set_window_status(&self, window: WindowHandle, status: WindowStatus) {
        lock(&self.state).windows.insert(window, status);
    }

    /// Change focus and deliver the matching `WM_SETFOCUS`/`WM_KILLFOCUS`.
    pub fn set_focus(&self, window: WindowHandle, focused: bool) {
        lock(&self.state).windows.entry(window).or_default().focused = focused;
        let id = if focused { wm::SETFOCUS } else { wm::KILLFOCUS };
        self.host.send(WindowMessage::new(window, id, 0, 0));
    }

    pub fn send(&self, msg: WindowMessage) -> isize {
        self.host.send(msg)
    }

    pub fn forwarded(&self, window: WindowHandle) -> Vec<WindowMessage> {
        self.host.forwarded(window)
    }

    // Raw input

    /// Queue a `RAWINPUT` record and return the lparam that reads it back.
    pub fn push_raw_input(&self, bytes: Vec<u8>) -> isize {
        let mut st = lock(&self.state);
        let lparam = st.next_lparam;
        st.next_lparam += 1;
        st.packets.insert(lparam, bytes);
        lparam
    }

    /// Queue `bytes` and deliver `WM_INPUT` to `window`.
    pub fn send_raw_input(&self, window: WindowHandle, bytes: Vec<u8>) -> isize {
        let lparam = self.push_raw_input(bytes);
        self.host.send(WindowMessage::new(window, wm::INPUT, 0, lparam))
    }

    /// Every registration request, oldest first.
    pub fn registrations(&self) -> Vec<RawInputRegistration> {
        lock(&self.state).registrations.clone()
    }

    pub fn active_registration(&self, usage: RawUsage) -> Option<RawInputRegistration> {
        lock(&self.state).active.get(&usage).copied()
    }

    pub fn is_registered(&self, usage: RawUsage) -> bool {
        lock(&self.state).active.contains_key(&usage)
    }

    pub fn unregistrations(&self) -> Vec<RawUsage> {
        lock(&self.state).unregistrations.clone()
    }

    /// Make the next registration request fail with `code`.
    pub fn fail_next_registration(&self, code: u32) {
        lock(&self.state).register_error = Some(code);
    }

    /// Visibility requests in call order (`false` = hide).
    pub fn cursor_calls(&self) -> Vec<bool> {
        lock(&self.state).cursor_calls.clone()
    }

    // Joysticks

    pub fn add_joystick(&self, id: i32, caps: JoystickCapabilities) {
        lock(&self.state).joysticks.insert(
            id,
            VirtualJoystick {
                caps,
                reading: Ok(RawJoystickState::default()),
            },
        );
    }

    pub fn set_joystick_state(&self, id: i32, state: RawJoystickState) {
        if let Some(js) = lock(&self.state).joysticks.get_mut(&id) {
            js.reading = Ok(state);
        }
    }

    /// Make reads of `id` fail with the raw `JOYERR_*` code.
    pub fn set_joystick_error(&self, id: i32, code: u32) {
        if let Some(js) = lock(&self.state).joysticks.get_mut(&id) {
            js.reading = Err(code);
        }
    }
}

impl InputBackend for VirtualBackend {
    fn name(&self) -> &'static str {
        "virtual"
    }

    fn enumerate(&self, class: DeviceClass) -> Result<Vec<DeviceRecord>> {
        let mut st = lock(&self.state);
        st.enumerations += 1;
        if let Some(code) = st.enumerate_error {
            return Err(InputError::Driver {
                operation: "enumerate devices",
                code,
            });
        }
        Ok(st.records.get(&class).cloned().unwrap_or_default())
    }

    fn wrapper_type(&self, class: DeviceClass) -> &'static str {
        if let Some(w) = lock(&self.state).wrapper_types.get(&class) {
            return w;
        }
        match class {
            DeviceClass::Keyboard => "RawKeyboard",
            DeviceClass::Pointer => "RawPointingDevice",
            DeviceClass::Joystick => "WinMMJoystick",
            DeviceClass::Hid => "RawHid",
        }
    }

    fn register_raw_input(&self, registration: &RawInputRegistration) -> Result<()> {
        let mut st = lock(&self.state);
        if let Some(code) = st.register_error.take() {
            return Err(InputError::Driver {
                operation: "RegisterRawInputDevices",
                code,
            });
        }
        st.registrations.push(*registration);
        st.active.insert(registration.usage, *registration);
        Ok(())
    }

    fn unregister_raw_input(&self, usage: RawUsage) -> Result<()> {
        let mut st = lock(&self.state);
        st.active.remove(&usage);
        st.unregistrations.push(usage);
        Ok(())
    }

    fn read_raw_input(&self, lparam: isize) -> Option<Vec<u8>> {
        lock(&self.state).packets.remove(&lparam)
    }

    fn window_status(&self, window: WindowHandle) -> WindowStatus {
        lock(&self.state).windows.get(&window).copied().unwrap_or_default()
    }

    fn set_cursor_visible(&self, visible: bool) {
        lock(&self.state).cursor_calls.push(visible);
    }

    fn joystick_capabilities(&self, id: i32) -> Result<JoystickCapabilities> {
        lock(&self.state)
            .joysticks
            .get(&id)
            .map(|js| js.caps.clone())
            .ok_or(InputError::JoystickRead { id, code: 165 })
    }

    fn joystick_read(&self, id: i32) -> std::result::Result<RawJoystickState, u32> {
        match lock(&self.state).joysticks.get(&id) {
            Some(js) => js.reading,
            None => Err(crate::devices::joystick::JOYERR_UNPLUGGED),
        }
    }

    fn procedure_host(&self) -> Arc<dyn WindowProcHost> {
        self.host.clone()
    }
}

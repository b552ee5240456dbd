//! Pointing device state machine.
//!
//! Tracks position, wheel and buttons from raw mouse samples and raises move, button, wheel
//! and double-click events.
//!
//! ## Conventions
//! - Relative samples accumulate into `position`; absolute samples replace it and `relative`
//!   becomes the difference to the previous absolute sample.
//! - `position_range` / `wheel_range` clamp after every mutation; `None` disables clamping.
//!   Clamping an axis zeroes that axis of `relative`.
//! - Move and wheel events are raised only when the clamped value changed.
//! - Non-exclusive devices ignore motion while the OS cursor is outside the bound window's
//!   client area. On re-entry the position jumps to the cursor point.
//! - Click counting: a button-up counts as a repeat click when it is the button that started
//!   the sequence, it arrives within `double_click_delay` of the first press, and the pointer is
//!   within `double_click_range` of where that press happened. Otherwise the sequence restarts
//!   at the current position with a count of 1. The count is reset to 0 once the delay
//!   elapses with no button activity.

use super::{DeviceCore, SampleContext};
use crate::backends::{InputBackend, WindowStatus};
use crate::config::PointerSettings;
use crate::decoder::PointerSample;
use crate::device::Device;
use crate::event::{InputEvent, PointerEvent, PointerEventArgs};
use crate::eventbus::{EventBus, InputListener, ListenerId};
use crate::geometry::{Point, Range, Rect};
use crate::lock;
use crate::metadata::DeviceRecord;
use serde::{Deserialize, Serialize};
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Button bitmask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MouseButtons(pub u8);

impl MouseButtons {
    pub const NONE: MouseButtons = MouseButtons(0);
    pub const LEFT: MouseButtons = MouseButtons(0x01);
    pub const RIGHT: MouseButtons = MouseButtons(0x02);
    pub const MIDDLE: MouseButtons = MouseButtons(0x04);
    pub const BUTTON4: MouseButtons = MouseButtons(0x08);
    pub const BUTTON5: MouseButtons = MouseButtons(0x10);

    pub const ALL: [MouseButtons; 5] = [
        MouseButtons::LEFT,
        MouseButtons::RIGHT,
        MouseButtons::MIDDLE,
        MouseButtons::BUTTON4,
        MouseButtons::BUTTON5,
    ];

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: MouseButtons) -> bool {
        self.0 & other.0 == other.0
    }

    /// Single-button masks set in `self`, in `ALL` order.
    pub fn iter(self) -> impl Iterator<Item = MouseButtons> {
        Self::ALL.into_iter().filter(move |b| self.contains(*b))
    }
}

impl BitOr for MouseButtons {
    type Output = MouseButtons;
    fn bitor(self, rhs: MouseButtons) -> MouseButtons {
        MouseButtons(self.0 | rhs.0)
    }
}

impl BitOrAssign for MouseButtons {
    fn bitor_assign(&mut self, rhs: MouseButtons) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for MouseButtons {
    type Output = MouseButtons;
    fn bitand(self, rhs: MouseButtons) -> MouseButtons {
        MouseButtons(self.0 & rhs.0)
    }
}

impl Not for MouseButtons {
    type Output = MouseButtons;
    fn not(self) -> MouseButtons {
        MouseButtons(!self.0)
    }
}

struct PointerState {
    position: Point,
    relative: Point,
    last_absolute: Option<Point>,
    wheel: i32,
    wheel_delta: i32,
    buttons: MouseButtons,
    position_range: Option<Rect>,
    wheel_range: Option<Range>,
    double_click_delay: Duration,
    double_click_range: Point,
    click_count: u32,
    click_button: MouseButtons,
    click_position: Point,
    click_started: Option<Instant>,
    outside: bool,
}

impl PointerState {
    fn constrain(&mut self, mut p: Point) -> Point {
        let Some(r) = self.position_range else {
            return p;
        };
        if p.x < r.x {
            self.relative.x = 0;
            p.x = r.x;
        }
        if p.y < r.y {
            self.relative.y = 0;
            p.y = r.y;
        }
        if p.x > r.right() {
            self.relative.x = 0;
            p.x = r.right();
        }
        if p.y > r.bottom() {
            self.relative.y = 0;
            p.y = r.bottom();
        }
        p
    }

    fn constrain_wheel(&self, w: i32) -> i32 {
        match self.wheel_range {
            Some(range) => range.clamp(w),
            None => w,
        }
    }

    fn expire_click(&mut self, now: Instant) {
        if let Some(start) = self.click_started {
            if now.saturating_duration_since(start) > self.double_click_delay {
                self.click_count = 0;
                self.click_started = None;
                self.click_button = MouseButtons::NONE;
            }
        }
    }

    fn anchor_click(&mut self, button: MouseButtons, now: Instant) {
        self.click_started = Some(now);
        self.click_position = self.position;
        self.click_button = button;
    }

    /// Returns `true` when the position changed.
    fn handle_motion(&mut self, sample: &PointerSample, status: &WindowStatus, exclusive: bool) -> bool {
        if !exclusive {
            if let Some(cursor) = status.cursor {
                if !status.client_size.contains(cursor) {
                    self.outside = true;
                    return false;
                }
                if self.outside {
                    self.outside = false;
                    self.relative = Point::ZERO;
                    self.last_absolute = None;
                    let p = self.constrain(cursor);
                    let changed = p != self.position;
                    self.position = p;
                    return changed;
                }
            }
        }

        let target = if sample.relative {
            self.relative = sample.motion;
            Point::new(self.position.x + sample.motion.x, self.position.y + sample.motion.y)
        } else {
            if let Some(last) = self.last_absolute {
                self.relative = Point::new(sample.motion.x - last.x, sample.motion.y - last.y);
            }
            sample.motion
        };

        let p = self.constrain(target);
        if !sample.relative {
            self.last_absolute = Some(p);
        }
        if p == self.position {
            return false;
        }
        self.position = p;
        true
    }

    /// Returns `true` when the wheel position changed.
    fn handle_wheel(&mut self, delta: i16) -> bool {
        self.wheel_delta = delta as i32;
        if delta == 0 {
            return false;
        }
        let w = self.constrain_wheel(self.wheel.saturating_add(delta as i32));
        let changed = w != self.wheel;
        self.wheel = w;
        changed
    }

    fn handle_down(&mut self, down: MouseButtons, now: Instant) {
        for button in down.iter() {
            if !self.click_button.is_empty() && button != self.click_button {
                self.click_count = 0;
            }
            if self.click_count == 0 {
                self.anchor_click(button, now);
            }
        }
        self.buttons |= down;
    }

    fn handle_up(&mut self, up: MouseButtons, now: Instant) {
        for button in up.iter() {
            let within_time = self
                .click_started
                .is_some_and(|start| now.saturating_duration_since(start) <= self.double_click_delay);
            let within_area = (self.position.x - self.click_position.x).abs() <= self.double_click_range.x
                && (self.position.y - self.click_position.y).abs() <= self.double_click_range.y;

            if self.click_button == button && within_time && within_area {
                self.click_count += 1;
            } else {
                self.anchor_click(button, now);
                self.click_count = 1;
            }
        }
        self.buttons = self.buttons & !up;
    }

    fn args(&self, button: MouseButtons, click_count: u32, absolute: bool) -> PointerEventArgs {
        PointerEventArgs {
            button,
            buttons: self.buttons,
            position: self.position,
            relative: self.relative,
            wheel: self.wheel,
            wheel_delta: self.wheel_delta,
            click_count,
            absolute,
        }
    }
}

/// A mouse (or other pointing device) bound to a window.
pub struct PointingDevice {
    core: DeviceCore,
    state: Mutex<PointerState>,
    cursor_hidden: AtomicBool,
    events: Mutex<EventBus<PointerEvent>>,
}

impl PointingDevice {
    pub(crate) fn new(record: DeviceRecord, key: String, backend: Arc<dyn InputBackend>, settings: &PointerSettings) -> Self {
        let core = DeviceCore::new(record, key, backend);
        core.access().set_exclusive(settings.exclusive);
        core.access().set_allow_background(settings.allow_background);
        Self {
            core,
            state: Mutex::new(PointerState {
                position: Point::ZERO,
                relative: Point::ZERO,
                last_absolute: None,
                wheel: 0,
                wheel_delta: 0,
                buttons: MouseButtons::NONE,
                position_range: settings.position_range,
                wheel_range: settings.wheel_range,
                double_click_delay: settings.double_click_delay(),
                double_click_range: settings.double_click_range(),
                click_count: 0,
                click_button: MouseButtons::NONE,
                click_position: Point::ZERO,
                click_started: None,
                outside: false,
            }),
            cursor_hidden: AtomicBool::new(false),
            events: Mutex::new(EventBus::new()),
        }
    }

    pub fn position(&self) -> Point {
        lock(&self.state).position
    }

    /// Move the tracked position (clamped). No event is raised.
    pub fn set_position(&self, p: Point) {
        let mut st = lock(&self.state);
        st.position = st.constrain(p);
    }

    pub fn relative(&self) -> Point {
        lock(&self.state).relative
    }

    pub fn wheel(&self) -> i32 {
        lock(&self.state).wheel
    }

    pub fn set_wheel(&self, w: i32) {
        let mut st = lock(&self.state);
        st.wheel = st.constrain_wheel(w);
    }

    pub fn buttons(&self) -> MouseButtons {
        lock(&self.state).buttons
    }

    /// Release every button without raising events.
    pub fn reset_buttons(&self) {
        lock(&self.state).buttons = MouseButtons::NONE;
    }

    /// Clicks in the current sequence; 0 once the double-click delay has run out.
    pub fn click_count(&self) -> u32 {
        let mut st = lock(&self.state);
        st.expire_click(Instant::now());
        st.click_count
    }

    pub fn is_outside_window(&self) -> bool {
        lock(&self.state).outside
    }

    pub fn position_range(&self) -> Option<Rect> {
        lock(&self.state).position_range
    }

    pub fn set_position_range(&self, range: Option<Rect>) {
        let mut st = lock(&self.state);
        st.position_range = range;
        let p = st.position;
        st.position = st.constrain(p);
    }

    pub fn wheel_range(&self) -> Option<Range> {
        lock(&self.state).wheel_range
    }

    pub fn set_wheel_range(&self, range: Option<Range>) {
        let mut st = lock(&self.state);
        st.wheel_range = range;
        st.wheel = st.constrain_wheel(st.wheel);
    }

    pub fn double_click_delay(&self) -> Duration {
        lock(&self.state).double_click_delay
    }

    pub fn set_double_click_delay(&self, delay: Duration) {
        lock(&self.state).double_click_delay = delay;
    }

    pub fn double_click_range(&self) -> Point {
        lock(&self.state).double_click_range
    }

    pub fn set_double_click_range(&self, range: Point) {
        lock(&self.state).double_click_range = Point::new(range.x.abs(), range.y.abs());
    }

    pub fn is_cursor_hidden(&self) -> bool {
        self.cursor_hidden.load(Ordering::Acquire)
    }

    /// Hide the OS cursor. Repeated calls have no further effect.
    pub fn hide_cursor(&self) {
        if !self.cursor_hidden.swap(true, Ordering::AcqRel) {
            self.core.backend().set_cursor_visible(false);
        }
    }

    /// Show the OS cursor if this device hid it.
    pub fn show_cursor(&self) {
        if self.cursor_hidden.swap(false, Ordering::AcqRel) {
            self.core.backend().set_cursor_visible(true);
        }
    }

    pub(crate) fn on_mouse_leave(&self) {
        self.reset_buttons();
    }

    /// Apply one decoded sample.
    pub fn process(&self, sample: &PointerSample, ctx: &SampleContext) {
        if !self.core.access().admit(ctx.status.focused) {
            return;
        }
        let exclusive = self.core.access().is_exclusive();
        let absolute = !sample.relative;

        let mut kinds = Vec::with_capacity(2);
        {
            let mut st = lock(&self.state);
            st.expire_click(ctx.now);

            let moved = st.handle_motion(sample, &ctx.status, exclusive);
            let wheeled = st.handle_wheel(sample.wheel_delta);

            if !sample.down.is_empty() {
                st.handle_down(sample.down, ctx.now);
                kinds.push(PointerEvent::ButtonDown(st.args(sample.down, st.click_count, absolute)));
            }
            if !sample.up.is_empty() {
                st.handle_up(sample.up, ctx.now);
                let args = st.args(sample.up, st.click_count, absolute);
                kinds.push(PointerEvent::ButtonUp(args));
                if st.click_count > 0 && st.click_count % 2 == 0 {
                    kinds.push(PointerEvent::DoubleClicked(args));
                }
            }
            if wheeled {
                kinds.push(PointerEvent::WheelMoved(st.args(MouseButtons::NONE, 0, absolute)));
            }
            if moved {
                kinds.push(PointerEvent::Moved(st.args(MouseButtons::NONE, 0, absolute)));
            }
        }

        if kinds.is_empty() {
            return;
        }
        let identity = self.core.identity();
        let mut bus = lock(&self.events);
        for kind in kinds {
            bus.emit(&InputEvent::new(ctx.now, identity, kind));
        }
    }

    pub fn add_listener(&self, listener: impl InputListener<PointerEvent> + 'static) -> ListenerId {
        lock(&self.events).add_listener(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        lock(&self.events).remove_listener(id)
    }

    pub fn enable_listener(&self, id: ListenerId) {
        lock(&self.events).enable(id);
    }

    pub fn disable_listener(&self, id: ListenerId) {
        lock(&self.events).disable(id);
    }
}

impl Device for PointingDevice {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    /// Exclusive mode hides the cursor; leaving it shows the cursor again.
    fn set_exclusive(&self, on: bool) {
        self.core.access().set_exclusive(on);
        if on {
            self.hide_cursor();
        } else {
            self.show_cursor();
        }
    }

    fn unbind(&self) {
        self.core.unbind();
        self.show_cursor();
    }
}

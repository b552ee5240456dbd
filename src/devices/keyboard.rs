//! Keyboard state machine.
//!
//! Keeps a 256-entry up/down table indexed by virtual key. Samples arrive with the generic
//! modifier code (`SHIFT`, `CONTROL`, `MENU`) plus a [`KeySide`]; the keyboard resolves them to
//! the left/right variant, updates both the variant and the generic entry, and raises
//! `KeyDown`/`KeyUp` with the resolved key. Repeated downs (auto-repeat) are delivered as-is.
//!
//! Each keyboard also carries an editable key → character table (US layout by default). Events
//! report the mapped character, picking the shifted one while either Shift is down.

use super::{DeviceCore, SampleContext};
use crate::backends::InputBackend;
use crate::config::{KeyStateResetMode, KeyboardSettings};
use crate::decoder::{KeySide, KeyState, KeyboardSample};
use crate::device::Device;
use crate::event::{InputEvent, KeyEventArgs, KeyboardEvent};
use crate::eventbus::{EventBus, InputListener, ListenerId};
use crate::lock;
use crate::metadata::DeviceRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::{Arc, Mutex};

/// Windows virtual-key code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key(pub u16);

impl Key {
    pub const NONE: Key = Key(0x00);
    pub const BACK: Key = Key(0x08);
    pub const TAB: Key = Key(0x09);
    pub const RETURN: Key = Key(0x0D);
    pub const SHIFT: Key = Key(0x10);
    pub const CONTROL: Key = Key(0x11);
    pub const MENU: Key = Key(0x12);
    pub const PAUSE: Key = Key(0x13);
    pub const CAPITAL: Key = Key(0x14);
    pub const ESCAPE: Key = Key(0x1B);
    pub const SPACE: Key = Key(0x20);
    pub const PRIOR: Key = Key(0x21);
    pub const NEXT: Key = Key(0x22);
    pub const END: Key = Key(0x23);
    pub const HOME: Key = Key(0x24);
    pub const LEFT: Key = Key(0x25);
    pub const UP: Key = Key(0x26);
    pub const RIGHT: Key = Key(0x27);
    pub const DOWN: Key = Key(0x28);
    pub const INSERT: Key = Key(0x2D);
    pub const DELETE: Key = Key(0x2E);
    pub const A: Key = Key(0x41);
    pub const D: Key = Key(0x44);
    pub const E: Key = Key(0x45);
    pub const Q: Key = Key(0x51);
    pub const S: Key = Key(0x53);
    pub const W: Key = Key(0x57);
    pub const LWIN: Key = Key(0x5B);
    pub const RWIN: Key = Key(0x5C);
    pub const APPS: Key = Key(0x5D);
    pub const NUMPAD0: Key = Key(0x60);
    pub const MULTIPLY: Key = Key(0x6A);
    pub const ADD: Key = Key(0x6B);
    pub const SUBTRACT: Key = Key(0x6D);
    pub const DIVIDE: Key = Key(0x6F);
    pub const F1: Key = Key(0x70);
    pub const F4: Key = Key(0x73);
    pub const F12: Key = Key(0x7B);
    pub const NUMLOCK: Key = Key(0x90);
    pub const SCROLL: Key = Key(0x91);
    pub const LSHIFT: Key = Key(0xA0);
    pub const RSHIFT: Key = Key(0xA1);
    pub const LCONTROL: Key = Key(0xA2);
    pub const RCONTROL: Key = Key(0xA3);
    pub const LMENU: Key = Key(0xA4);
    pub const RMENU: Key = Key(0xA5);
    pub const OEM_1: Key = Key(0xBA);
    pub const OEM_PLUS: Key = Key(0xBB);
    pub const OEM_COMMA: Key = Key(0xBC);
    pub const OEM_MINUS: Key = Key(0xBD);
    pub const OEM_PERIOD: Key = Key(0xBE);
    pub const OEM_2: Key = Key(0xBF);
    pub const OEM_3: Key = Key(0xC0);
    pub const OEM_4: Key = Key(0xDB);
    pub const OEM_5: Key = Key(0xDC);
    pub const OEM_6: Key = Key(0xDD);
    pub const OEM_7: Key = Key(0xDE);
    pub const OEM_102: Key = Key(0xE2);

    /// Letter or digit key for an ASCII character.
    pub fn from_char(c: char) -> Option<Key> {
        match c.to_ascii_uppercase() {
            c @ ('A'..='Z' | '0'..='9') => Some(Key(c as u16)),
            _ => None,
        }
    }

    /// Left/right variant of a generic modifier; other keys are returned unchanged.
    pub fn resolve(self, side: KeySide) -> Key {
        match (self, side) {
            (Key::SHIFT, KeySide::Left) => Key::LSHIFT,
            (Key::SHIFT, KeySide::Right) => Key::RSHIFT,
            (Key::CONTROL, KeySide::Left) => Key::LCONTROL,
            (Key::CONTROL, KeySide::Right) => Key::RCONTROL,
            (Key::MENU, KeySide::Left) => Key::LMENU,
            (Key::MENU, KeySide::Right) => Key::RMENU,
            (key, _) => key,
        }
    }

    /// Generic code of a left/right modifier variant.
    pub fn generic(self) -> Key {
        match self {
            Key::LSHIFT | Key::RSHIFT => Key::SHIFT,
            Key::LCONTROL | Key::RCONTROL => Key::CONTROL,
            Key::LMENU | Key::RMENU => Key::MENU,
            key => key,
        }
    }

    pub fn is_modifier(self) -> bool {
        matches!(self.generic(), Key::SHIFT | Key::CONTROL | Key::MENU)
    }

    #[inline]
    fn slot(self) -> usize {
        (self.0 & 0xFF) as usize
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vk_{:02X}", self.0)
    }
}

/// Modifier keys held, with left/right versions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers(pub u8);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const LEFT_SHIFT: Modifiers = Modifiers(0x01);
    pub const RIGHT_SHIFT: Modifiers = Modifiers(0x02);
    pub const LEFT_CONTROL: Modifiers = Modifiers(0x04);
    pub const RIGHT_CONTROL: Modifiers = Modifiers(0x08);
    pub const LEFT_ALT: Modifiers = Modifiers(0x10);
    pub const RIGHT_ALT: Modifiers = Modifiers(0x20);

    pub fn contains(self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn shift(self) -> bool {
        self.0 & (Self::LEFT_SHIFT.0 | Self::RIGHT_SHIFT.0) != 0
    }

    pub fn control(self) -> bool {
        self.0 & (Self::LEFT_CONTROL.0 | Self::RIGHT_CONTROL.0) != 0
    }

    pub fn alt(self) -> bool {
        self.0 & (Self::LEFT_ALT.0 | Self::RIGHT_ALT.0) != 0
    }
}

impl BitOr for Modifiers {
    type Output = Modifiers;
    fn bitor(self, rhs: Modifiers) -> Modifiers {
        Modifiers(self.0 | rhs.0)
    }
}

impl BitOrAssign for Modifiers {
    fn bitor_assign(&mut self, rhs: Modifiers) {
        self.0 |= rhs.0;
    }
}

/// Characters produced by one key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCharMap {
    pub character: char,
    pub shifted: char,
}

impl KeyCharMap {
    pub const fn new(character: char, shifted: char) -> Self {
        Self { character, shifted }
    }

    pub fn pick(self, shift: bool) -> char {
        if shift {
            self.shifted
        } else {
            self.character
        }
    }
}

const PUNCTUATION: [(Key, char, char); 19] = [
    (Key::TAB, '\t', '\t'),
    (Key::RETURN, '\n', '\n'),
    (Key::SPACE, ' ', ' '),
    (Key::MULTIPLY, '*', '*'),
    (Key::ADD, '+', '+'),
    (Key::SUBTRACT, '-', '-'),
    (Key::DIVIDE, '/', '/'),
    (Key::OEM_1, ';', ':'),
    (Key::OEM_PLUS, '=', '+'),
    (Key::OEM_COMMA, ',', '<'),
    (Key::OEM_MINUS, '-', '_'),
    (Key::OEM_PERIOD, '.', '>'),
    (Key::OEM_2, '/', '?'),
    (Key::OEM_3, '`', '~'),
    (Key::OEM_4, '[', '{'),
    (Key::OEM_5, '\\', '|'),
    (Key::OEM_6, ']', '}'),
    (Key::OEM_7, '\'', '"'),
    (Key::OEM_102, '\\', '|'),
];

/// US-layout character table: letters, top-row digits and their shifted symbols, numpad
/// digits and operators, whitespace and the OEM punctuation keys.
pub fn default_key_mappings() -> BTreeMap<Key, KeyCharMap> {
    let mut map = BTreeMap::new();
    for c in 'a'..='z' {
        map.insert(Key(c.to_ascii_uppercase() as u16), KeyCharMap::new(c, c.to_ascii_uppercase()));
    }
    for (c, shifted) in ('0'..='9').zip([')', '!', '@', '#', '$', '%', '^', '&', '*', '(']) {
        map.insert(Key(c as u16), KeyCharMap::new(c, shifted));
    }
    for (i, c) in ('0'..='9').enumerate() {
        map.insert(Key(Key::NUMPAD0.0 + i as u16), KeyCharMap::new(c, c));
    }
    for (key, c, shifted) in PUNCTUATION {
        map.insert(key, KeyCharMap::new(c, shifted));
    }
    map
}

const MODIFIER_KEYS: [(Key, Modifiers); 6] = [
    (Key::LSHIFT, Modifiers::LEFT_SHIFT),
    (Key::RSHIFT, Modifiers::RIGHT_SHIFT),
    (Key::LCONTROL, Modifiers::LEFT_CONTROL),
    (Key::RCONTROL, Modifiers::RIGHT_CONTROL),
    (Key::LMENU, Modifiers::LEFT_ALT),
    (Key::RMENU, Modifiers::RIGHT_ALT),
];

struct KeyboardState {
    keys: [KeyState; 256],
    reset_mode: KeyStateResetMode,
    mappings: BTreeMap<Key, KeyCharMap>,
}

impl KeyboardState {
    fn get(&self, key: Key) -> KeyState {
        self.keys[key.slot()]
    }

    fn apply(&mut self, key: Key, state: KeyState) {
        self.keys[key.slot()] = state;

        let generic = key.generic();
        if generic != key {
            let (left, right) = match generic {
                Key::SHIFT => (Key::LSHIFT, Key::RSHIFT),
                Key::CONTROL => (Key::LCONTROL, Key::RCONTROL),
                _ => (Key::LMENU, Key::RMENU),
            };
            let held = self.get(left) == KeyState::Down || self.get(right) == KeyState::Down;
            self.keys[generic.slot()] = if held { KeyState::Down } else { KeyState::Up };
        }
    }

    fn modifiers(&self) -> Modifiers {
        MODIFIER_KEYS
            .iter()
            .filter(|(k, _)| self.get(*k) == KeyState::Down)
            .fold(Modifiers::NONE, |acc, (_, m)| acc | *m)
    }

    fn reset(&mut self, mode: KeyStateResetMode) {
        match mode {
            KeyStateResetMode::None => {}
            KeyStateResetMode::ResetAll => self.keys = [KeyState::Up; 256],
            KeyStateResetMode::ResetModifiers => {
                for key in [
                    Key::SHIFT,
                    Key::CONTROL,
                    Key::MENU,
                    Key::LSHIFT,
                    Key::RSHIFT,
                    Key::LCONTROL,
                    Key::RCONTROL,
                    Key::LMENU,
                    Key::RMENU,
                ] {
                    self.keys[key.slot()] = KeyState::Up;
                }
            }
        }
    }
}

/// A keyboard bound to a window.
pub struct Keyboard {
    core: DeviceCore,
    state: Mutex<KeyboardState>,
    events: Mutex<EventBus<KeyboardEvent>>,
}

impl Keyboard {
    pub(crate) fn new(record: DeviceRecord, key: String, backend: Arc<dyn InputBackend>, settings: &KeyboardSettings) -> Self {
        let core = DeviceCore::new(record, key, backend);
        core.access().set_exclusive(settings.exclusive);
        core.access().set_allow_background(settings.allow_background);
        Self {
            core,
            state: Mutex::new(KeyboardState {
                keys: [KeyState::Up; 256],
                reset_mode: settings.reset_mode,
                mappings: default_key_mappings(),
            }),
            events: Mutex::new(EventBus::new()),
        }
    }

    pub fn key_state(&self, key: Key) -> KeyState {
        lock(&self.state).get(key)
    }

    pub fn is_down(&self, key: Key) -> bool {
        self.key_state(key) == KeyState::Down
    }

    /// Every key currently down, in key-code order.
    pub fn pressed(&self) -> Vec<Key> {
        let st = lock(&self.state);
        (0u16..256)
            .map(Key)
            .filter(|k| st.get(*k) == KeyState::Down)
            .collect()
    }

    pub fn modifiers(&self) -> Modifiers {
        lock(&self.state).modifiers()
    }

    pub fn reset_mode(&self) -> KeyStateResetMode {
        lock(&self.state).reset_mode
    }

    pub fn set_reset_mode(&self, mode: KeyStateResetMode) {
        lock(&self.state).reset_mode = mode;
    }

    /// Release keys according to `mode`. No events are raised.
    pub fn reset(&self, mode: KeyStateResetMode) {
        lock(&self.state).reset(mode);
    }

    /// Copy of the key → character table.
    pub fn key_mappings(&self) -> BTreeMap<Key, KeyCharMap> {
        lock(&self.state).mappings.clone()
    }

    pub fn key_mapping(&self, key: Key) -> Option<KeyCharMap> {
        lock(&self.state).mappings.get(&key).copied()
    }

    /// Map `key` to `character`, or `shifted` while Shift is down. Replaces any previous mapping.
    pub fn set_key_mapping(&self, key: Key, character: char, shifted: char) {
        lock(&self.state).mappings.insert(key, KeyCharMap::new(character, shifted));
    }

    pub fn remove_key_mapping(&self, key: Key) -> bool {
        lock(&self.state).mappings.remove(&key).is_some()
    }

    pub fn clear_key_mappings(&self) {
        lock(&self.state).mappings.clear();
    }

    /// Go back to [`default_key_mappings`].
    pub fn reset_key_mappings(&self) {
        lock(&self.state).mappings = default_key_mappings();
    }

    pub(crate) fn on_focus_lost(&self) {
        let mut st = lock(&self.state);
        let mode = st.reset_mode;
        st.reset(mode);
    }

    /// Apply one decoded sample.
    pub fn process(&self, sample: &KeyboardSample, ctx: &SampleContext) {
        if !self.core.access().admit(ctx.status.focused) {
            return;
        }

        let key = sample.key.resolve(sample.side);
        let kind = {
            let mut st = lock(&self.state);
            st.apply(key, sample.state);
            let modifiers = st.modifiers();
            let args = KeyEventArgs {
                key,
                modifiers,
                scan_code: sample.scan_code,
                character: st.mappings.get(&key).map(|m| m.pick(modifiers.shift())),
            };
            match sample.state {
                KeyState::Down => KeyboardEvent::KeyDown(args),
                KeyState::Up => KeyboardEvent::KeyUp(args),
            }
        };

        let event = InputEvent::new(ctx.now, self.core.identity(), kind);
        lock(&self.events).emit(&event);
    }

    pub fn add_listener(&self, listener: impl InputListener<KeyboardEvent> + 'static) -> ListenerId {
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

impl Device for Keyboard {
    fn core(&self) -> &DeviceCore {
        &self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_input::VirtualBackend;
    use crate::backends::WindowStatus;
    use crate::decoder::{RI_KEY_BREAK, RI_KEY_E0};
    use crate::device::{DeviceClass, DeviceHandle};
    use std::time::Instant;

    fn keyboard(settings: KeyboardSettings) -> Keyboard {
        let record = DeviceRecord::system(DeviceClass::Keyboard);
        let key = record.composite_key("RawKeyboard");
        let kb = Keyboard::new(record, key, Arc::new(VirtualBackend::new()), &settings);
        kb.core.access().set_acquired(true);
        kb
    }

    fn ctx() -> SampleContext {
        SampleContext::new(Instant::now(), WindowStatus::focused())
    }

    fn sample(key: Key, make: u16, flags: u16) -> KeyboardSample {
        let bytes = crate::decoder::encode::keyboard(DeviceHandle(1), key, make, flags);
        crate::decoder::decode_keyboard(&bytes[crate::decoder::HEADER_SIZE..]).unwrap()
    }

    fn recorded(kb: &Keyboard) -> Arc<Mutex<Vec<KeyboardEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        kb.add_listener(move |e: &InputEvent<KeyboardEvent>| s.lock().unwrap().push(e.kind.clone()));
        seen
    }

    #[test]
    fn right_shift_resolves_from_scan_code() {
        let kb = keyboard(KeyboardSettings::default());
        let seen = recorded(&kb);

        kb.process(&sample(Key::SHIFT, 0x36, 0), &ctx());
        assert!(kb.is_down(Key::RSHIFT));
        assert!(kb.is_down(Key::SHIFT));
        assert!(!kb.is_down(Key::LSHIFT));

        let events = seen.lock().unwrap().clone();
        match &events[0] {
            KeyboardEvent::KeyDown(args) => {
                assert_eq!(args.key, Key::RSHIFT);
                assert_eq!(args.scan_code, 0x36);
                assert_eq!(args.modifiers, Modifiers::RIGHT_SHIFT);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn key_events_carry_the_mapped_character() {
        let kb = keyboard(KeyboardSettings::default());
        let seen = recorded(&kb);

        kb.process(&sample(Key::A, 0x1E, 0), &ctx());
        kb.process(&sample(Key::SHIFT, 0x36, 0), &ctx());
        kb.process(&sample(Key(0x31), 0x02, 0), &ctx());
        kb.process(&sample(Key::SHIFT, 0x36, RI_KEY_BREAK), &ctx());
        kb.process(&sample(Key::OEM_2, 0x35, 0), &ctx());

        let chars: Vec<Option<char>> = seen
            .lock()
            .unwrap()
            .iter()
            .map(|e| match e {
                KeyboardEvent::KeyDown(a) | KeyboardEvent::KeyUp(a) => a.character,
            })
            .collect();
        assert_eq!(chars, vec![Some('a'), None, Some('!'), None, Some('/')]);
    }

    #[test]
    fn key_mappings_are_editable() {
        let kb = keyboard(KeyboardSettings::default());
        assert_eq!(kb.key_mapping(Key::Q), Some(KeyCharMap::new('q', 'Q')));
        assert_eq!(kb.key_mapping(Key::NUMPAD0), Some(KeyCharMap::new('0', '0')));
        assert_eq!(kb.key_mapping(Key::F4), None);

        kb.set_key_mapping(Key::Q, 'a', 'A');
        assert!(kb.remove_key_mapping(Key::SPACE));
        assert!(!kb.remove_key_mapping(Key::SPACE));
        let seen = recorded(&kb);
        kb.process(&sample(Key::Q, 0x10, 0), &ctx());
        kb.process(&sample(Key::SPACE, 0x39, 0), &ctx());
        let events = seen.lock().unwrap().clone();
        assert!(matches!(&events[0], KeyboardEvent::KeyDown(a) if a.character == Some('a')));
        assert!(matches!(&events[1], KeyboardEvent::KeyDown(a) if a.character.is_none()));

        kb.clear_key_mappings();
        assert!(kb.key_mappings().is_empty());
        kb.reset_key_mappings();
        assert_eq!(kb.key_mappings(), default_key_mappings());
        assert_eq!(kb.key_mapping(Key::SPACE), Some(KeyCharMap::new(' ', ' ')));
    }

    #[test]
    fn generic_modifier_stays_down_while_either_side_is_held() {
        let kb = keyboard(KeyboardSettings::default());
        kb.process(&sample(Key::CONTROL, 0x1D, 0), &ctx());
        kb.process(&sample(Key::CONTROL, 0x1D, RI_KEY_E0), &ctx());
        kb.process(&sample(Key::CONTROL, 0x1D, RI_KEY_BREAK), &ctx());

        assert!(!kb.is_down(Key::LCONTROL));
        assert!(kb.is_down(Key::RCONTROL));
        assert!(kb.is_down(Key::CONTROL));
        assert!(kb.modifiers().control());

        kb.process(&sample(Key::CONTROL, 0x1D, RI_KEY_E0 | RI_KEY_BREAK), &ctx());
        assert!(!kb.is_down(Key::CONTROL));
        assert!(kb.modifiers().is_empty());
    }

    #[test]
    fn auto_repeat_downs_are_all_delivered() {
        let kb = keyboard(KeyboardSettings::default());
        let seen = recorded(&kb);
        for _ in 0..3 {
            kb.process(&sample(Key::A, 0x1E, 0), &ctx());
        }
        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_eq!(kb.pressed(), vec![Key::A]);
    }

    #[test]
    fn focus_loss_applies_reset_mode() {
        let kb = keyboard(KeyboardSettings {
            reset_mode: KeyStateResetMode::ResetModifiers,
            ..Default::default()
        });
        kb.process(&sample(Key::A, 0x1E, 0), &ctx());
        kb.process(&sample(Key::MENU, 0x38, 0), &ctx());

        kb.on_focus_lost();
        assert!(kb.is_down(Key::A));
        assert!(!kb.is_down(Key::LMENU));
        assert!(!kb.is_down(Key::MENU));

        kb.set_reset_mode(KeyStateResetMode::ResetAll);
        kb.on_focus_lost();
        assert!(kb.pressed().is_empty());
    }

    #[test]
    fn unfocused_samples_without_background_access_are_dropped() {
        let kb = keyboard(KeyboardSettings::default());
        let unfocused = SampleContext::new(Instant::now(), WindowStatus::default());
        kb.process(&sample(Key::A, 0x1E, 0), &unfocused);
        assert!(!kb.is_down(Key::A));

        kb.set_allow_background(true);
        kb.process(&sample(Key::A, 0x1E, 0), &unfocused);
        assert!(kb.is_down(Key::A));
    }

    #[test]
    fn char_lookup() {
        assert_eq!(Key::from_char('w'), Some(Key::W));
        assert_eq!(Key::from_char('7'), Some(Key(0x37)));
        assert_eq!(Key::from_char('#'), None);
    }
}

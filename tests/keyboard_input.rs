mod common;

use common::{recorder, rig, take, W};
use hookup::config::KeyStateResetMode;
use hookup::decoder::{encode, KeyState, RI_KEY_BREAK, RI_KEY_E0};
use hookup::devices::{Key, Modifiers};
use hookup::hook::{wm, WindowMessage};
use hookup::{DeviceHandle, InputSettings, KeyboardEvent};
use std::sync::{Arc, Mutex};

const KB: DeviceHandle = DeviceHandle(0x31);

fn down(key: Key, make: u16, flags: u16) -> Vec<u8> {
    encode::keyboard(KB, key, make, flags)
}

fn up(key: Key, make: u16, flags: u16) -> Vec<u8> {
    encode::keyboard(KB, key, make, flags | RI_KEY_BREAK)
}

#[test]
fn p5_shift_side_comes_from_the_scan_code() {
    let (backend, m) = rig(InputSettings::default());
    let kb = m.create_keyboard(None, "").unwrap();
    let (log, listener) = recorder::<KeyboardEvent>();
    kb.add_listener(listener);

    backend.send_raw_input(W, down(Key::SHIFT, 0x36, 0));
    assert!(kb.is_down(Key::RSHIFT));
    assert!(!kb.is_down(Key::LSHIFT));
    assert!(kb.is_down(Key::SHIFT));

    // An E0 prefix does not make the left shift a right one.
    backend.send_raw_input(W, down(Key::SHIFT, 0x2A, RI_KEY_E0));
    assert!(kb.is_down(Key::LSHIFT));

    let keys: Vec<Key> = take(&log)
        .into_iter()
        .map(|e| match e {
            KeyboardEvent::KeyDown(a) | KeyboardEvent::KeyUp(a) => a.key,
        })
        .collect();
    assert_eq!(keys, vec![Key::RSHIFT, Key::LSHIFT]);
}

#[test]
fn control_and_alt_sides_come_from_the_e0_prefix() {
    let (backend, m) = rig(InputSettings::default());
    let kb = m.create_keyboard(None, "").unwrap();

    backend.send_raw_input(W, down(Key::CONTROL, 0x1D, RI_KEY_E0));
    backend.send_raw_input(W, down(Key::MENU, 0x38, 0));
    assert!(kb.is_down(Key::RCONTROL));
    assert!(kb.is_down(Key::LMENU));
    assert_eq!(kb.modifiers(), Modifiers::RIGHT_CONTROL | Modifiers::LEFT_ALT);

    backend.send_raw_input(W, up(Key::CONTROL, 0x1D, RI_KEY_E0));
    assert!(!kb.is_down(Key::CONTROL));
    assert_eq!(kb.key_state(Key::RCONTROL), KeyState::Up);
}

#[test]
fn events_carry_the_modifiers_after_the_transition() {
    let (backend, m) = rig(InputSettings::default());
    let kb = m.create_keyboard(None, "").unwrap();
    let (log, listener) = recorder::<KeyboardEvent>();
    kb.add_listener(listener);

    backend.send_raw_input(W, down(Key::SHIFT, 0x2A, 0));
    backend.send_raw_input(W, down(Key::A, 0x1E, 0));
    backend.send_raw_input(W, up(Key::SHIFT, 0x2A, 0));
    backend.send_raw_input(W, up(Key::A, 0x1E, 0));

    let events = take(&log);
    assert_eq!(events.len(), 4);
    match &events[1] {
        KeyboardEvent::KeyDown(a) => {
            assert_eq!(a.key, Key::A);
            assert_eq!(a.scan_code, 0x1E);
            assert!(a.modifiers.shift());
        }
        other => panic!("unexpected {:?}", other),
    }
    match &events[3] {
        KeyboardEvent::KeyUp(a) => assert!(a.modifiers.is_empty()),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn typed_characters_follow_shift_and_the_keyboards_own_table() {
    let (backend, m) = rig(InputSettings::default());
    let kb = m.create_keyboard(None, "").unwrap();
    let (log, listener) = recorder::<KeyboardEvent>();
    kb.add_listener(listener);
    let one = Key::from_char('1').unwrap();

    let typed = |log: &Arc<Mutex<Vec<KeyboardEvent>>>| -> String {
        take(log)
            .into_iter()
            .filter_map(|e| match e {
                KeyboardEvent::KeyDown(a) => a.character,
                KeyboardEvent::KeyUp(_) => None,
            })
            .collect()
    };

    backend.send_raw_input(W, down(Key::SHIFT, 0x2A, 0));
    backend.send_raw_input(W, down(Key::from_char('h').unwrap(), 0x23, 0));
    backend.send_raw_input(W, up(Key::SHIFT, 0x2A, 0));
    backend.send_raw_input(W, down(Key::from_char('i').unwrap(), 0x17, 0));
    backend.send_raw_input(W, down(Key::SPACE, 0x39, 0));
    backend.send_raw_input(W, down(Key::SHIFT, 0x36, 0));
    backend.send_raw_input(W, down(one, 0x02, 0));
    assert_eq!(typed(&log), "Hi !");

    kb.set_key_mapping(one, '\u{b9}', '\u{a1}');
    backend.send_raw_input(W, down(one, 0x02, 0));
    assert_eq!(typed(&log), "\u{a1}");
}

#[test]
fn disabled_listeners_are_skipped() {
    let (backend, m) = rig(InputSettings::default());
    let kb = m.create_keyboard(None, "").unwrap();
    let (log, listener) = recorder::<KeyboardEvent>();
    let id = kb.add_listener(listener);

    kb.disable_listener(id);
    backend.send_raw_input(W, down(Key::Q, 0x10, 0));
    assert!(take(&log).is_empty());

    kb.enable_listener(id);
    backend.send_raw_input(W, up(Key::Q, 0x10, 0));
    assert_eq!(take(&log).len(), 1);

    assert!(kb.remove_listener(id));
    assert!(!kb.remove_listener(id));
}

#[test]
fn exclusive_keyboard_swallows_legacy_messages_except_alt_f4() {
    let mut settings = InputSettings::default();
    settings.keyboard.exclusive = true;
    let (backend, m) = rig(settings);
    let _kb = m.create_keyboard(None, "").unwrap();

    assert_eq!(backend.send(WindowMessage::new(W, wm::KEYDOWN, 0x41, 0)), 0);
    backend.send(WindowMessage::new(W, wm::CHAR, 'a' as usize, 0));
    backend.send(WindowMessage::new(W, wm::SYSKEYDOWN, wm::VK_F4, 0));
    backend.send(WindowMessage::new(W, wm::SYSKEYUP, wm::VK_F4, 0));

    let seen: Vec<u32> = backend.forwarded(W).iter().map(|m| m.id).collect();
    assert_eq!(seen, vec![wm::SYSKEYDOWN, wm::SYSKEYUP]);
}

#[test]
fn shared_keyboard_lets_legacy_messages_through() {
    let (backend, m) = rig(InputSettings::default());
    let _kb = m.create_keyboard(None, "").unwrap();

    backend.send(WindowMessage::new(W, wm::KEYDOWN, 0x41, 0));
    backend.send(WindowMessage::new(W, wm::KEYUP, 0x41, 0));
    assert_eq!(backend.forwarded(W).len(), 2);
}

#[test]
fn focus_loss_follows_the_reset_mode() {
    let mut settings = InputSettings::default();
    settings.keyboard.reset_mode = KeyStateResetMode::ResetModifiers;
    let (backend, m) = rig(settings);
    let kb = m.create_keyboard(None, "").unwrap();

    backend.send_raw_input(W, down(Key::SHIFT, 0x2A, 0));
    backend.send_raw_input(W, down(Key::W, 0x11, 0));
    backend.set_focus(W, false);
    assert!(!kb.is_down(Key::LSHIFT));
    assert!(kb.is_down(Key::W));

    backend.set_focus(W, true);
    kb.set_reset_mode(KeyStateResetMode::None);
    backend.send_raw_input(W, down(Key::SHIFT, 0x2A, 0));
    backend.set_focus(W, false);
    assert!(kb.is_down(Key::LSHIFT));
    assert!(kb.is_down(Key::W));
}

#[test]
fn background_keyboard_keeps_reading_without_focus() {
    let mut settings = InputSettings::default();
    settings.keyboard.allow_background = true;
    let (backend, m) = rig(settings);
    let kb = m.create_keyboard(None, "").unwrap();

    backend.set_focus(W, false);
    backend.send_raw_input(W, down(Key::S, 0x1F, 0));
    assert!(kb.is_down(Key::S));
}

#[test]
fn unfocused_foreground_keyboard_drops_samples() {
    let (backend, m) = rig(InputSettings::default());
    let kb = m.create_keyboard(None, "").unwrap();

    backend.set_focus(W, false);
    backend.send_raw_input(W, down(Key::S, 0x1F, 0));
    assert!(!kb.is_down(Key::S));
}

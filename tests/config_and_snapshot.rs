mod common;

use common::{recorder, rig, rig_with, take, W};
use hookup::backends::virtual_input::VirtualBackend;
use hookup::backends::RawUsage;
use hookup::config::KeyStateResetMode;
use hookup::decoder::{encode, RI_MOUSE_LEFT_BUTTON_DOWN};
use hookup::devices::{Key, MouseButtons};
use hookup::geometry::{Point, Range};
use hookup::metadata::DeviceRecord;
use hookup::snapshot::DeviceState;
use hookup::{Device, DeviceClass, DeviceHandle, HidEvent, InputSettings, JoystickAxis, Snapshot};
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

const PAD: DeviceHandle = DeviceHandle(0x51);

fn gamepad_record() -> DeviceRecord {
    let mut record = DeviceRecord::new(DeviceClass::Hid, "Pad", PAD, Some(r"\\?\HID#VID_054C&PID_09CC#pad".into()));
    record.vid = Some(0x054C);
    record.pid = Some(0x09CC);
    record.usage_page = Some(0x01);
    record.usage = Some(0x05);
    record
}

#[test]
fn settings_file_drives_new_devices() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
auto_reacquire = false

[keyboard]
reset_mode = "none"

[pointer]
exclusive = true
double_click_delay_ms = 250
double_click_range = [8, -8]
wheel_range = {{ min = 0, max = 360 }}

[joystick.dead_zone]
Y = 64
"#
    )
    .unwrap();

    let settings = InputSettings::load(file.path()).unwrap();
    assert!(!settings.auto_reacquire);
    assert_eq!(settings.keyboard.reset_mode, KeyStateResetMode::None);
    assert_eq!(settings.joystick.dead_zone.get(&JoystickAxis::Y), Some(&64));

    let (backend, m) = rig(settings);
    let mouse = m.create_pointing_device(None, "").unwrap();
    assert!(mouse.is_exclusive());
    assert_eq!(mouse.double_click_delay().as_millis(), 250);
    assert_eq!(mouse.double_click_range(), Point::new(8, 8));
    assert_eq!(mouse.wheel_range(), Some(Range::new(0, 360)));
    assert_eq!(backend.cursor_calls(), vec![false]);

    let kb = m.create_keyboard(None, "").unwrap();
    assert_eq!(kb.reset_mode(), KeyStateResetMode::None);
}

#[test]
fn missing_settings_file_means_defaults_and_save_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.toml");
    assert_eq!(InputSettings::load_or_default(&path).unwrap(), InputSettings::default());

    let mut settings = InputSettings::default();
    settings.hid.allow_background = true;
    settings.pointer.wheel_range = Some(Range::new(-5, 5));
    settings.save(&path).unwrap();
    assert_eq!(InputSettings::load_or_default(&path).unwrap(), settings);

    std::fs::write(&path, "pointer = 3").unwrap();
    assert!(InputSettings::load_or_default(&path).is_err());
}

#[test]
fn custom_hid_registers_its_usage_and_parses_reports() {
    let backend = Arc::new(VirtualBackend::new());
    backend.add_device(gamepad_record());
    let (backend, m) = rig_with(backend, InputSettings::default());

    let pad = m.create_custom_hid(None, Some("Pad")).unwrap();
    let usage = RawUsage { page: 0x01, usage: 0x05 };
    assert_eq!(backend.active_registration(usage).unwrap().target, W);

    pad.set_parser(|report: &[u8], props: &mut BTreeMap<String, i64>| {
        props.insert("buttons".into(), report[0] as i64);
        *props.entry("reports".into()).or_insert(0) += 1;
    });
    let (log, listener) = recorder::<HidEvent>();
    pad.add_listener(listener);

    // Two 3-byte reports in one record.
    backend.send_raw_input(W, encode::hid(PAD, 3, &[0x01, 0x7F, 0x80, 0x03, 0x7F, 0x80]));
    assert_eq!(pad.property("buttons"), Some(3));
    assert_eq!(pad.property("reports"), Some(2));

    let events = take(&log);
    assert_eq!(events.len(), 1);
    let HidEvent::DataChanged(sample) = &events[0];
    assert_eq!(sample.item_count, 2);
    assert_eq!(pad.last_sample().as_ref(), Some(sample));

    // Another HID's reports never reach this one.
    backend.send_raw_input(W, encode::hid(DeviceHandle(0x52), 3, &[0xFF, 0, 0]));
    assert_eq!(pad.property("buttons"), Some(3));

    pad.clear_parser();
    backend.send_raw_input(W, encode::hid(PAD, 3, &[0x00, 0x7F, 0x80]));
    assert_eq!(pad.property("buttons"), Some(3));
    assert_eq!(take(&log).len(), 1);

    pad.unbind();
    assert!(!backend.is_registered(usage));
}

#[test]
fn snapshot_reflects_every_device_and_survives_json() {
    let backend = Arc::new(VirtualBackend::new());
    backend.add_device(gamepad_record());
    let (backend, m) = rig_with(backend, InputSettings::default());

    let kb = m.create_keyboard(None, "").unwrap();
    let mouse = m.create_pointing_device(None, "").unwrap();
    let pad = m.create_custom_hid(None, Some("Pad")).unwrap();

    backend.send_raw_input(W, encode::keyboard(DeviceHandle(1), Key::A, 0x1E, 0));
    backend.send_raw_input(W, encode::mouse_move(DeviceHandle(2), 12, -4));
    backend.send_raw_input(W, encode::mouse_buttons(DeviceHandle(2), RI_MOUSE_LEFT_BUTTON_DOWN));
    backend.send_raw_input(W, encode::hid(PAD, 2, &[0xAB, 0xCD]));

    let snap = m.snapshot();
    assert_eq!(snap.len(), 3);

    let k = snap.get(kb.key()).unwrap();
    assert!(k.bound);
    assert_eq!(
        k.state,
        DeviceState::Keyboard {
            pressed: vec![Key::A],
            modifiers: Default::default(),
        }
    );

    match &snap.get(mouse.key()).unwrap().state {
        DeviceState::Pointer { position, buttons, .. } => {
            assert_eq!(*position, Point::new(12, -4));
            assert_eq!(*buttons, MouseButtons::LEFT);
        }
        other => panic!("unexpected {:?}", other),
    }

    let p = snap.by_name("Pad").unwrap();
    assert_eq!(p.identity, pad.identity());
    assert!(matches!(&p.state, DeviceState::Hid { last_report: Some(bytes), .. } if bytes == &vec![0xAB, 0xCD]));

    let json = snap.to_json().unwrap();
    assert!(json.contains("\"class\": \"pointer\"") || json.contains("\"class\":\"pointer\""));
    assert_eq!(Snapshot::from_json(&json).unwrap(), snap);

    m.destroy_devices();
    assert!(m.snapshot().is_empty());
    // The snapshot is a copy; it does not follow the devices.
    assert!(snap.get(kb.key()).unwrap().bound);
}

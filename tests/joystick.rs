mod common;

use common::{rig_with, W};
use hookup::backends::virtual_input::VirtualBackend;
use hookup::devices::joystick::{PovSupport, JOYERR_UNPLUGGED, JOY_POVCENTERED};
use hookup::devices::{JoystickCapabilities, RawJoystickState};
use hookup::geometry::Range;
use hookup::metadata::DeviceRecord;
use hookup::{Device, DeviceHandle, InputError, InputKind, InputSettings, JoystickAxis};
use std::sync::Arc;

const CENTER: u32 = 32767;

fn stick_caps() -> JoystickCapabilities {
    JoystickCapabilities {
        product_name: "Flight Stick".into(),
        manufacturer_id: 0x044F,
        product_id: 0xB10A,
        axes: [(JoystickAxis::X, Range::new(0, 65535)), (JoystickAxis::Y, Range::new(0, 65535))].into_iter().collect(),
        button_count: 4,
        pov: PovSupport {
            present: true,
            four_directions: false,
            continuous: true,
        },
    }
}

fn reading(x: u32, y: u32, buttons: u32, pov: u32) -> RawJoystickState {
    let mut axes = [0; 6];
    axes[JoystickAxis::X.index()] = x;
    axes[JoystickAxis::Y.index()] = y;
    RawJoystickState { axes, buttons, pov }
}

fn backend_with_stick() -> Arc<VirtualBackend> {
    let backend = Arc::new(VirtualBackend::new());
    backend.add_device(DeviceRecord::joystick("Flight Stick", 0));
    backend.add_joystick(0, stick_caps());
    backend.set_joystick_state(0, reading(CENTER, CENTER, 0, JOY_POVCENTERED));
    backend
}

#[test]
fn p7_poll_reports_changes_and_survives_unplugging() {
    let (backend, m) = rig_with(backend_with_stick(), InputSettings::default());
    let js = m.create_joystick(None, Some("Flight Stick")).unwrap();
    assert_eq!(js.capabilities().button_count, 4);
    assert!(js.is_connected());

    // Centered and idle: nothing to report.
    assert!(js.poll().unwrap().is_empty());

    backend.set_joystick_state(0, reading(CENTER, 65535, 0b101, 9000));
    let changes = js.poll().unwrap();
    assert_eq!(
        changes,
        vec![
            InputKind::AxisMoved {
                axis: JoystickAxis::Y,
                value: 32768
            },
            InputKind::ButtonPressed { button: 0 },
            InputKind::ButtonPressed { button: 2 },
            InputKind::HatChanged { hat: 0, value: 2 },
        ]
    );
    assert_eq!(js.state().pov_degrees, Some(9000));

    backend.set_joystick_error(0, JOYERR_UNPLUGGED);
    assert!(js.poll().unwrap().is_empty());
    assert!(!js.is_connected());
    assert_eq!(js.axis(JoystickAxis::Y), 32768);
    assert!(js.button(2));

    backend.set_joystick_error(0, 5);
    assert!(matches!(js.poll(), Err(InputError::JoystickRead { id: 0, code: 5 })));
    assert!(!js.is_connected());

    backend.set_joystick_state(0, reading(CENTER, 65535, 0b001, 9000));
    assert_eq!(js.poll().unwrap(), vec![InputKind::ButtonReleased { button: 2 }]);
    assert!(js.is_connected());
}

#[test]
fn dead_zone_comes_from_settings_and_can_be_changed() {
    let mut settings = InputSettings::default();
    settings.joystick.dead_zone.insert(JoystickAxis::X, 1000);
    let (backend, m) = rig_with(backend_with_stick(), settings);
    let js = m.create_joystick(None, Some("Flight Stick")).unwrap();
    assert_eq!(js.dead_zone(JoystickAxis::X), 1000);

    backend.set_joystick_state(0, reading(CENTER + 500, CENTER + 500, 0, JOY_POVCENTERED));
    assert_eq!(
        js.poll().unwrap(),
        vec![InputKind::AxisMoved {
            axis: JoystickAxis::Y,
            value: 500
        }]
    );
    assert_eq!(js.axis(JoystickAxis::X), 0);

    js.set_dead_zone(JoystickAxis::X, -100);
    assert_eq!(js.dead_zone(JoystickAxis::X), 100);
    assert_eq!(
        js.poll().unwrap(),
        vec![InputKind::AxisMoved {
            axis: JoystickAxis::X,
            value: 500
        }]
    );
}

#[test]
fn manager_polls_every_joystick() {
    let backend = backend_with_stick();
    backend.add_device(DeviceRecord::joystick("Pedals", 1));
    backend.add_joystick(
        1,
        JoystickCapabilities {
            axes: [(JoystickAxis::Rudder, Range::new(0, 1023))].into_iter().collect(),
            ..JoystickCapabilities::default()
        },
    );
    let (backend, m) = rig_with(backend, InputSettings::default());
    let stick = m.create_joystick(None, Some("Flight Stick")).unwrap();
    let pedals = m.create_joystick(None, Some("Pedals")).unwrap();
    assert_ne!(stick.identity(), pedals.identity());
    assert_eq!(pedals.identity().handle, DeviceHandle(2));

    backend.set_joystick_state(0, reading(CENTER, CENTER, 0b1, JOY_POVCENTERED));
    let events = m.poll_joysticks().unwrap();
    // The pedals' rudder reads 0 against a 0..1023 range, so it reports too.
    assert_eq!(events.len(), 2);
    assert!(events.iter().any(|e| e.device == stick.identity() && e.kind == InputKind::ButtonPressed { button: 0 }));
    assert!(events.iter().any(|e| e.device == pedals.identity()));

    assert!(m.poll_joysticks().unwrap().is_empty());
}

#[test]
fn negative_id_is_a_disconnected_joystick() {
    let backend = Arc::new(VirtualBackend::new());
    backend.add_device(DeviceRecord::joystick("Ghost", -1));
    let (_backend, m) = rig_with(backend, InputSettings::default());

    let js = m.create_joystick(None, Some("Ghost")).unwrap();
    assert_eq!(js.capabilities(), &JoystickCapabilities::default());
    assert!(js.poll().unwrap().is_empty());
    assert!(!js.is_connected());
}

#[test]
fn unknown_joystick_id_fails_creation() {
    let backend = Arc::new(VirtualBackend::new());
    backend.add_device(DeviceRecord::joystick("Missing", 3));
    let (_backend, m) = rig_with(backend, InputSettings::default());

    assert!(matches!(
        m.create_joystick(None, Some("Missing")),
        Err(InputError::JoystickRead { id: 3, .. })
    ));
    assert_eq!(m.device_count(), 0);
    assert!(!m.hook().is_hooked(W));
}

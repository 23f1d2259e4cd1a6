//! IO contract tests against the simulation driver.
//!
//! Every test starts from the bundled Uno board description
//! (`config/uno.toml`) and drives the board either through the
//! `IoDriver` trait or through `invoke()` the way a runtime would.

use boardio_common::hal::consts::MAX_I2C_READ;
use boardio_common::prelude::*;
use boardio_hal::SimulationDriver;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

const UNO: &str = include_str!("../config/uno.toml");
const TICK: Duration = Duration::from_millis(19);
const RTC: u16 = 0x68;

fn uno() -> BoardConfig {
    BoardConfig::parse(UNO).expect("bundled board parses")
}

fn ready_driver() -> SimulationDriver {
    let mut driver = SimulationDriver::new();
    driver.init(&uno()).expect("init");
    driver
}

fn tick(driver: &mut SimulationDriver, cycles: usize) {
    for _ in 0..cycles {
        driver.cycle(TICK);
    }
}

fn record_events(driver: &SimulationDriver) -> Arc<Mutex<Vec<IoEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    driver
        .events()
        .subscribe(Box::new(move |e: &IoEvent| sink.lock().push(e.clone())));
    events
}

fn record_readings() -> (Arc<Mutex<Vec<Reading>>>, Arg) {
    let readings = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&readings);
    (readings, Arg::handler(move |r: Reading| sink.lock().push(r)))
}

// ─── Lifecycle ──────────────────────────────────────────────────────

#[test]
fn test_not_ready_before_init() {
    let mut driver = SimulationDriver::new();
    assert!(!driver.is_ready());
    assert!(driver.pins().is_empty());
    assert!(matches!(
        driver.pin_mode(&PinId::Index(13), Mode::Output),
        Err(IoError::NotReady(_))
    ));
    assert!(matches!(
        driver.serial_write(&PortId::Index(0), b"x"),
        Err(IoError::NotReady(_))
    ));
}

#[test]
fn test_ready_emitted_once() {
    let mut driver = SimulationDriver::new();
    let events = record_events(&driver);

    driver.init(&uno()).unwrap();
    tick(&mut driver, 3);
    driver.init(&uno()).unwrap();

    let ready = events
        .lock()
        .iter()
        .filter(|e| matches!(e, IoEvent::Ready { .. }))
        .count();
    assert_eq!(ready, 1);
    assert_eq!(
        events.lock()[0],
        IoEvent::Ready {
            driver: "simulation".to_string()
        }
    );
}

#[test]
fn test_shutdown_drops_subscriptions() {
    let mut driver = ready_driver();
    driver.pin_mode(&PinId::from("A0"), Mode::Analog).unwrap();
    driver
        .analog_read(&PinId::from("A0"), Box::new(|_: u32| {}))
        .unwrap();
    assert_eq!(driver.subscription_count(), 1);

    driver.shutdown().unwrap();
    assert!(!driver.is_ready());
    assert_eq!(driver.subscription_count(), 0);
    assert!(matches!(
        driver.normalize(&PinId::Index(0)),
        Err(IoError::NotReady(_))
    ));
}

// ─── Pin table ──────────────────────────────────────────────────────

#[test]
fn test_pin_table_matches_board() {
    let driver = ready_driver();
    assert_eq!(driver.pins().len(), 20);
    assert_eq!(driver.analog_pins(), &[14, 15, 16, 17, 18, 19]);
    assert!(driver.pins().iter().all(|p| p.mode == Mode::Unknown));

    assert_eq!(driver.normalize(&PinId::from("A0")).unwrap(), 14);
    assert_eq!(driver.normalize(&PinId::from("A5")).unwrap(), 19);
    assert_eq!(driver.normalize(&PinId::from("SDA")).unwrap(), 18);
    assert_eq!(driver.normalize(&PinId::from("7")).unwrap(), 7);
    assert!(matches!(
        driver.normalize(&PinId::Index(20)),
        Err(IoError::UnknownPin(_))
    ));
    assert!(matches!(
        driver.normalize(&PinId::from("A6")),
        Err(IoError::UnknownPin(_))
    ));
    assert_eq!(driver.normalize_port(&PortId::from("HW_SERIAL0")).unwrap(), 0);
    assert!(matches!(
        driver.normalize_port(&PortId::from("HW_SERIAL3")),
        Err(IoError::UnknownPort(_))
    ));
}

#[test]
fn test_led_blink() {
    let mut driver = ready_driver();
    let led = driver.default_led();
    assert_eq!(driver.normalize(&led).unwrap(), 13);

    driver.pin_mode(&led, Mode::Output).unwrap();
    driver.digital_write(&led, Value::High).unwrap();
    assert_eq!(driver.pins()[13].mode, Mode::Output);
    assert_eq!(driver.pins()[13].value, 1);

    driver.digital_write(&PinId::Index(13), Value::Low).unwrap();
    assert_eq!(driver.pins()[13].value, 0);

    assert_eq!(
        driver.pwm_write(&led, 128),
        Err(IoError::UnsupportedMode {
            pin: 13,
            mode: Mode::Pwm,
        })
    );
    assert_eq!(driver.pins()[13].mode, Mode::Output);
}

#[test]
fn test_digital_write_requires_output() {
    let mut driver = ready_driver();
    let pin = PinId::Index(2);

    assert_eq!(
        driver.digital_write(&pin, Value::High),
        Err(IoError::ModeMismatch {
            pin: 2,
            required: Mode::Output,
            current: Mode::Unknown,
        })
    );
    driver.pin_mode(&pin, Mode::Input).unwrap();
    assert!(matches!(
        driver.digital_write(&pin, Value::High),
        Err(IoError::ModeMismatch { current: Mode::Input, .. })
    ));
    assert!(matches!(
        driver.digital_write(&PinId::Index(42), Value::High),
        Err(IoError::UnknownPin(_))
    ));
}

#[test]
fn test_pwm_and_analog_write_are_equivalent() {
    let mut driver = ready_driver();
    let pin = PinId::Index(3);
    driver.pin_mode(&pin, Mode::Pwm).unwrap();

    driver.pwm_write(&pin, 128).unwrap();
    assert_eq!(driver.pins()[3].value, 128);
    driver.analog_write(&pin, 255).unwrap();
    assert_eq!(driver.pins()[3].value, 255);

    assert!(matches!(
        driver.analog_write(&pin, 256),
        Err(IoError::InvalidValue(_))
    ));
    assert_eq!(driver.pins()[3].value, 255);
    assert_eq!(
        driver.pin_mode(&PinId::Index(4), Mode::Pwm),
        Err(IoError::UnsupportedMode {
            pin: 4,
            mode: Mode::Pwm,
        })
    );
}

#[test]
fn test_servo_range_and_position() {
    let mut driver = ready_driver();
    let pin = PinId::Index(9);

    driver
        .servo_config(ServoConfig::new(9).with_range(1000, 2000))
        .unwrap();
    assert_eq!(driver.pins()[9].mode, Mode::Unknown);

    driver.pin_mode(&pin, Mode::Servo).unwrap();
    driver.servo_write(&pin, 90).unwrap();
    assert_eq!(driver.servo_pulse_width(&pin).unwrap(), 1500);

    assert!(matches!(
        driver.servo_write(&pin, 181),
        Err(IoError::InvalidValue(_))
    ));
    assert!(matches!(
        driver.servo_config(ServoConfig::new(9).with_range(2000, 1000)),
        Err(IoError::InvalidValue(_))
    ));
    assert!(matches!(
        driver.servo_config(ServoConfig::new(13)),
        Err(IoError::UnsupportedMode { pin: 13, mode: Mode::Servo })
    ));
}

// ─── Pin reads ──────────────────────────────────────────────────────

#[test]
fn test_analog_read_every_cycle() {
    let mut driver = ready_driver();
    let a0 = PinId::from("A0");
    let samples = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&samples);

    assert!(matches!(
        driver.analog_read(&a0, Box::new(|_: u32| {})),
        Err(IoError::ModeMismatch { .. })
    ));

    driver.pin_mode(&a0, Mode::Analog).unwrap();
    driver
        .analog_read(&a0, Box::new(move |v: u32| sink.lock().push(v)))
        .unwrap();
    assert!(driver.pins()[14].reporting);

    tick(&mut driver, 2);
    driver.set_input(&a0, 5000).unwrap();
    tick(&mut driver, 1);

    assert_eq!(*samples.lock(), vec![512, 512, 1023]);
}

#[test]
fn test_digital_read_on_change() {
    let mut driver = ready_driver();
    let pin = PinId::Index(7);
    let levels = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&levels);

    driver.pin_mode(&pin, Mode::Input).unwrap();
    driver
        .digital_read(&pin, Box::new(move |v: Value| sink.lock().push(v)))
        .unwrap();

    tick(&mut driver, 2);
    driver.set_input(&pin, 1).unwrap();
    tick(&mut driver, 2);

    assert_eq!(*levels.lock(), vec![Value::Low, Value::High]);
}

#[test]
fn test_mode_change_ends_pin_reads() {
    let mut driver = ready_driver();
    let pin = PinId::Index(7);
    let calls = Arc::new(Mutex::new(0u32));
    let sink = Arc::clone(&calls);

    driver.pin_mode(&pin, Mode::Input).unwrap();
    driver
        .digital_read(&pin, Box::new(move |_: Value| *sink.lock() += 1))
        .unwrap();
    driver.pin_mode(&pin, Mode::Output).unwrap();

    assert_eq!(driver.subscription_count(), 0);
    assert!(!driver.pins()[7].reporting);
    tick(&mut driver, 3);
    assert_eq!(*calls.lock(), 0);
}

#[test]
fn test_cancel_read_stops_handler() {
    let mut driver = ready_driver();
    let a1 = PinId::from("A1");
    let calls = Arc::new(Mutex::new(0u32));
    let sink = Arc::clone(&calls);

    driver.pin_mode(&a1, Mode::Analog).unwrap();
    let id = driver
        .analog_read(&a1, Box::new(move |_: u32| *sink.lock() += 1))
        .unwrap();
    tick(&mut driver, 1);
    driver.cancel_read(id).unwrap();
    tick(&mut driver, 3);

    assert_eq!(*calls.lock(), 1);
    assert!(driver.cancel_read(id).is_ok());
}

#[test]
fn test_ping_echo_and_timeout() {
    let mut driver = ready_driver();
    let echoes = Arc::new(Mutex::new(Vec::new()));
    let hit = Arc::clone(&echoes);
    let miss = Arc::clone(&echoes);

    driver
        .ping_read(
            PingSettings::new(2),
            Box::new(move |d: Duration| hit.lock().push(d)),
        )
        .unwrap();
    driver
        .ping_read(
            PingSettings::new(4),
            Box::new(move |d: Duration| miss.lock().push(d)),
        )
        .unwrap();
    tick(&mut driver, 3);

    assert_eq!(*echoes.lock(), vec![Duration::from_micros(1160)]);
    assert_eq!(driver.subscription_count(), 0);
}

// ─── I2C ────────────────────────────────────────────────────────────

#[test]
fn test_i2c_once_vs_continuous() {
    let mut driver = ready_driver();
    let continuous = Arc::new(Mutex::new(Vec::new()));
    let once = Arc::new(Mutex::new(Vec::new()));
    let c = Arc::clone(&continuous);
    let o = Arc::clone(&once);

    driver.i2c_config(I2cConfig::new(RTC).on_bus("i2c-0")).unwrap();
    driver
        .i2c_read(
            I2cRead::from_register(RTC, 1, 2),
            Box::new(move |data: &[u8]| c.lock().push(data.to_vec())),
        )
        .unwrap();
    driver
        .i2c_read_once(
            I2cRead::from_register(RTC, 0, 1),
            Box::new(move |data: &[u8]| o.lock().push(data.to_vec())),
        )
        .unwrap();

    tick(&mut driver, 3);

    assert_eq!(continuous.lock().len(), 3);
    assert!(continuous.lock().iter().all(|d| d == &[0x30, 0x12]));
    assert_eq!(*once.lock(), vec![vec![0x00]]);
    assert_eq!(driver.subscription_count(), 1);
}

#[test]
fn test_i2c_register_write_then_read() {
    let mut driver = ready_driver();
    let data = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&data);

    driver.i2c_write_reg(RTC, 0x10, 0xAB).unwrap();
    driver
        .i2c_write(I2cWrite::to_register(RTC, 0x20, [1, 2, 3]))
        .unwrap();
    driver
        .i2c_read_once(
            I2cRead::from_register(RTC, 0x10, 1),
            Box::new(move |d: &[u8]| sink.lock().extend_from_slice(d)),
        )
        .unwrap();
    tick(&mut driver, 1);

    assert_eq!(*data.lock(), vec![0xAB]);
    let device = driver.i2c_device(0, RTC).expect("rtc attached");
    assert_eq!(&device.memory()[0x20..0x23], &[1, 2, 3]);
    assert_eq!(
        device.writes(),
        &[vec![0x10, 0xAB], vec![0x20, 1, 2, 3]]
    );
}

#[test]
fn test_i2c_missing_device_reports_error_event() {
    let mut driver = ready_driver();
    let events = record_events(&driver);
    let calls = Arc::new(Mutex::new(0u32));
    let sink = Arc::clone(&calls);

    driver
        .i2c_read_once(
            I2cRead::new(0x50, 1),
            Box::new(move |_: &[u8]| *sink.lock() += 1),
        )
        .unwrap();
    driver.i2c_write(I2cWrite::raw(0x51, [0xFF])).unwrap();
    tick(&mut driver, 2);

    assert_eq!(*calls.lock(), 0);
    assert_eq!(driver.subscription_count(), 0);
    let errors: Vec<IoError> = events
        .lock()
        .iter()
        .filter_map(|e| match e {
            IoEvent::Error(err) => Some(err.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| matches!(
        e,
        IoError::Transport { driver, .. } if driver == "simulation"
    )));
}

#[test]
fn test_i2c_rejects_bad_requests() {
    let mut driver = ready_driver();
    assert!(matches!(
        driver.i2c_config(I2cConfig::new(0x400)),
        Err(IoError::InvalidValue(_))
    ));
    assert!(matches!(
        driver.i2c_config(I2cConfig::new(RTC).on_bus(3)),
        Err(IoError::UnknownPort(_))
    ));
    assert!(matches!(
        driver.i2c_read(I2cRead::new(RTC, 0), Box::new(|_: &[u8]| {})),
        Err(IoError::InvalidValue(_))
    ));
}

#[test]
fn test_i2c_oversized_read_rejected_synchronously() {
    let mut driver = ready_driver();
    let (readings, handler) = record_readings();

    let result = invoke(
        &mut driver,
        Operation::I2cReadOnce,
        vec![i64::from(RTC).into(), (1i64 << 45).into(), handler],
    );
    assert!(matches!(result, Err(IoError::InvalidValue(_))));
    assert!(matches!(
        driver.i2c_read(I2cRead::new(RTC, MAX_I2C_READ + 1), Box::new(|_: &[u8]| {})),
        Err(IoError::InvalidValue(_))
    ));
    assert_eq!(driver.subscription_count(), 0);

    tick(&mut driver, 1);
    assert!(readings.lock().is_empty());
}

#[test]
fn test_i2c_reconfigure_keeps_accepted_write_on_its_bus() {
    let mut config = uno();
    config.i2c_buses.push(Default::default());
    let mut driver = SimulationDriver::new();
    driver.init(&config).unwrap();
    driver.attach_i2c_device(1, RTC, &[]).unwrap();

    driver.i2c_write(I2cWrite::raw(RTC, [0x01, 0xAA])).unwrap();
    driver.i2c_config(I2cConfig::new(RTC).on_bus(1)).unwrap();
    tick(&mut driver, 1);

    assert_eq!(driver.i2c_device(0, RTC).unwrap().writes(), &[vec![0x01, 0xAA]]);
    assert!(driver.i2c_device(1, RTC).unwrap().writes().is_empty());
}

// ─── Serial ─────────────────────────────────────────────────────────

#[test]
fn test_serial_loopback_in_chunks() {
    let mut driver = ready_driver();
    let port = PortId::from("HW_SERIAL0");
    let chunks = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&chunks);

    driver
        .serial_config(SerialConfig::new("HW_SERIAL0").with_baud(115_200))
        .unwrap();
    driver
        .serial_read(
            &port,
            Some(4),
            Box::new(move |d: &[u8]| sink.lock().push(d.to_vec())),
        )
        .unwrap();
    driver.serial_write(&port, b"hello world").unwrap();
    tick(&mut driver, 1);

    assert_eq!(
        *chunks.lock(),
        vec![b"hell".to_vec(), b"o wo".to_vec(), b"rld".to_vec()]
    );
    assert_eq!(driver.serial_output(&port).unwrap(), b"hello world");
}

#[test]
fn test_serial_stop_and_close() {
    let mut driver = ready_driver();
    let port = PortId::Index(0);
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);

    driver
        .serial_read(
            &port,
            None,
            Box::new(move |d: &[u8]| sink.lock().extend_from_slice(d)),
        )
        .unwrap();
    driver.inject_serial(&port, b"abc").unwrap();
    tick(&mut driver, 1);
    driver.serial_stop(&port).unwrap();
    driver.inject_serial(&port, b"def").unwrap();
    tick(&mut driver, 2);
    assert_eq!(*received.lock(), b"abc".to_vec());

    driver.serial_close(&port).unwrap();
    driver.inject_serial(&port, b"ghi").unwrap();
    let after_close = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&after_close);
    driver
        .serial_read(
            &port,
            None,
            Box::new(move |d: &[u8]| sink.lock().extend_from_slice(d)),
        )
        .unwrap();
    tick(&mut driver, 1);
    assert!(after_close.lock().is_empty());
}

#[test]
fn test_serial_rejects_bad_arguments() {
    let mut driver = ready_driver();
    assert!(matches!(
        driver.serial_write(&PortId::from("HW_SERIAL3"), b"x"),
        Err(IoError::UnknownPort(_))
    ));
    assert!(matches!(
        driver.serial_read(&PortId::Index(0), Some(0), Box::new(|_: &[u8]| {})),
        Err(IoError::InvalidValue(_))
    ));
    assert!(matches!(
        driver.serial_config(SerialConfig::new(0).with_baud(0)),
        Err(IoError::InvalidValue(_))
    ));
    assert!(matches!(
        driver.serial_config(SerialConfig::new(0).with_pins(30, 1)),
        Err(IoError::UnknownPin(_))
    ));
}

// ─── Unsupported extensions ─────────────────────────────────────────

#[test]
fn test_unsupported_operations_name_driver() {
    let mut driver = ready_driver();
    let cases: Vec<(&str, Result<(), IoError>)> = vec![
        ("reset", driver.reset()),
        ("reportAnalogPin", driver.report_analog_pin(&PinId::from("A0"), true)),
        ("sendOneWireReset", driver.one_wire_reset(&PinId::Index(8))),
        (
            "sendOneWireDelay",
            driver.one_wire_delay(&PinId::Index(8), Duration::from_millis(1)),
        ),
    ];
    for (name, result) in cases {
        assert_eq!(
            result,
            Err(IoError::UnsupportedOperation {
                operation: name.to_string(),
                driver: "simulation".to_string(),
            })
        );
    }
}

// ─── Runtime dispatch ───────────────────────────────────────────────

#[test]
fn test_invoke_led_by_alias() {
    let mut driver = ready_driver();
    assert_eq!(
        invoke(&mut driver, Operation::PinMode, vec!["LED".into(), "output".into()]),
        Ok(Outcome::Done)
    );
    assert_eq!(
        invoke(&mut driver, Operation::DigitalWrite, vec![13.into(), 1.into()]),
        Ok(Outcome::Done)
    );
    assert_eq!(driver.pins()[13].value, 1);
    assert_eq!(
        invoke(&mut driver, Operation::Normalize, vec!["A3".into()]),
        Ok(Outcome::Normalized(17))
    );
}

#[test]
fn test_invoke_analog_write_matches_pwm_write() {
    let mut a = ready_driver();
    let mut b = ready_driver();
    for driver in [&mut a, &mut b] {
        invoke(driver, Operation::PinMode, vec![5.into(), Mode::Pwm.into()]).unwrap();
    }
    invoke(&mut a, Operation::AnalogWrite, vec![5.into(), 77.into()]).unwrap();
    invoke(&mut b, Operation::PwmWrite, vec![5.into(), 77.into()]).unwrap();
    assert_eq!(a.pins()[5], b.pins()[5]);
}

#[test]
fn test_invoke_send_i2c_read_request_is_one_shot() {
    let mut driver = ready_driver();
    let (readings, handler) = record_readings();
    let op: Operation = "sendI2CReadRequest".parse().unwrap();

    let outcome = invoke(&mut driver, op, vec![i64::from(RTC).into(), 2.into(), handler]).unwrap();
    assert!(matches!(outcome, Outcome::Subscribed(_)));
    tick(&mut driver, 3);

    assert_eq!(*readings.lock(), vec![Reading::Bytes(vec![0x00, 0x30])]);
    assert_eq!(driver.subscription_count(), 0);
}

#[test]
fn test_invoke_i2c_write_register_vs_raw() {
    let mut driver = ready_driver();
    invoke(
        &mut driver,
        Operation::I2cWrite,
        vec![i64::from(RTC).into(), vec![0x08u8, 1, 2, 3].into()],
    )
    .unwrap();
    invoke(
        &mut driver,
        Operation::SendI2cWriteRequest,
        vec![i64::from(RTC).into(), 0x05.into(), vec![1u8, 2, 3].into()],
    )
    .unwrap();
    tick(&mut driver, 1);

    let device = driver.i2c_device(0, RTC).unwrap();
    assert_eq!(device.writes(), &[vec![0x08, 1, 2, 3], vec![0x05, 1, 2, 3]]);
    assert_eq!(&device.memory()[0x05..0x0B], &[1, 2, 3, 1, 2, 3]);
}

#[test]
fn test_invoke_i2c_read_with_register() {
    let mut driver = ready_driver();
    let (readings, handler) = record_readings();

    invoke(
        &mut driver,
        Operation::I2cRead,
        vec![i64::from(RTC).into(), 4.into(), 3.into(), handler],
    )
    .unwrap();
    tick(&mut driver, 2);

    let expected = Reading::Bytes(vec![0x16, 0x10, 0x26]);
    assert_eq!(*readings.lock(), vec![expected.clone(), expected]);
}

#[test]
fn test_invoke_serial_read_optional_max() {
    let mut driver = ready_driver();
    let (bounded, with_max) = record_readings();

    invoke(&mut driver, Operation::SerialRead, vec![0.into(), 2.into(), with_max]).unwrap();
    invoke(&mut driver, Operation::SerialWrite, vec!["HW_SERIAL0".into(), b"abc".as_slice().into()])
        .unwrap();
    tick(&mut driver, 1);
    assert_eq!(
        *bounded.lock(),
        vec![Reading::Bytes(b"ab".to_vec()), Reading::Bytes(b"c".to_vec())]
    );

    let (unbounded, without_max) = record_readings();
    invoke(&mut driver, Operation::SerialRead, vec![0.into(), without_max]).unwrap();
    driver.inject_serial(&PortId::Index(0), b"xyz").unwrap();
    tick(&mut driver, 1);
    assert_eq!(*unbounded.lock(), vec![Reading::Bytes(b"xyz".to_vec())]);
}

#[test]
fn test_invoke_servo_config_shapes() {
    let mut driver = ready_driver();
    assert_eq!(
        invoke(&mut driver, Operation::ServoConfig, vec![9.into(), 600.into(), 2400.into()]),
        Ok(Outcome::Done)
    );
    assert_eq!(
        invoke(&mut driver, Operation::ServoConfig, vec![ServoConfig::new(10).into()]),
        Ok(Outcome::Done)
    );
    assert!(matches!(
        invoke(
            &mut driver,
            Operation::ServoConfig,
            vec![ServoConfig::new(10).into(), 600.into()]
        ),
        Err(IoError::InvalidArgumentShape { .. })
    ));
    assert!(matches!(
        invoke(&mut driver, Operation::ServoConfig, vec!["SDA".into()]),
        Err(IoError::UnsupportedMode { pin: 18, mode: Mode::Servo })
    ));
}

#[test]
fn test_invoke_rejects_bad_shapes() {
    let mut driver = ready_driver();
    let (_, handler) = record_readings();
    assert!(matches!(
        invoke(&mut driver, Operation::I2cRead, vec![i64::from(RTC).into(), "x".into(), handler]),
        Err(IoError::InvalidArgumentShape { .. })
    ));
    assert!(matches!(
        invoke(&mut driver, Operation::DigitalWrite, vec![13.into()]),
        Err(IoError::InvalidArgumentShape { .. })
    ));
    assert!(matches!(
        invoke(&mut driver, Operation::DigitalWrite, vec![(-1).into(), 1.into()]),
        Err(IoError::UnknownPin(_))
    ));
    assert!(matches!(
        "notAnOperation".parse::<Operation>(),
        Err(IoError::InvalidArgumentShape { .. })
    ));
}

#[test]
fn test_invoke_unsupported_names_driver() {
    let mut driver = ready_driver();
    assert_eq!(
        invoke(&mut driver, Operation::Reset, vec![]),
        Err(IoError::UnsupportedOperation {
            operation: "reset".to_string(),
            driver: "simulation".to_string(),
        })
    );
}

// ─── Properties ─────────────────────────────────────────────────────

const NAMES: [&str; 11] = [
    "LED", "RX0", "TX0", "SDA", "SCL", "A0", "A2", "A5", "0", "13", "19",
];

proptest! {
    #[test]
    fn prop_pin_mode_succeeds_iff_supported(
        pin in 0usize..20,
        mode in prop::sample::select(Mode::ALL.to_vec()),
    ) {
        let mut driver = ready_driver();
        let supported = driver.pins()[pin].supports(mode);
        let result = driver.pin_mode(&PinId::Index(pin), mode);

        prop_assert_eq!(result.is_ok(), supported);
        if supported {
            prop_assert_eq!(driver.pins()[pin].mode, mode);
        } else {
            prop_assert_eq!(result, Err(IoError::UnsupportedMode { pin, mode }));
            prop_assert_eq!(driver.pins()[pin].mode, Mode::Unknown);
        }
    }

    #[test]
    fn prop_normalize_is_idempotent(name in prop::sample::select(NAMES.to_vec())) {
        let driver = ready_driver();
        let index = driver.normalize(&PinId::from(name)).unwrap();
        prop_assert!(index < driver.pins().len());
        prop_assert_eq!(driver.normalize(&PinId::Index(index)).unwrap(), index);
        prop_assert_eq!(driver.normalize(&PinId::from(index.to_string())).unwrap(), index);
    }

    #[test]
    fn prop_digital_write_gated_by_mode(pin in 0usize..20) {
        let mut driver = ready_driver();
        let id = PinId::Index(pin);
        driver.pin_mode(&id, Mode::Input).unwrap();
        let in_input = matches!(
            driver.digital_write(&id, Value::High),
            Err(IoError::ModeMismatch { .. })
        );
        prop_assert!(in_input);

        driver.pin_mode(&id, Mode::Output).unwrap();
        prop_assert!(driver.digital_write(&id, Value::High).is_ok());
        prop_assert_eq!(driver.pins()[pin].value, 1);
    }

    #[test]
    fn prop_analog_write_matches_pwm_write(
        pin in 0usize..20,
        value in 0u32..300,
        enter_pwm in any::<bool>(),
    ) {
        let mut a = ready_driver();
        let mut b = ready_driver();
        let id = PinId::Index(pin);
        if enter_pwm {
            prop_assert_eq!(a.pin_mode(&id, Mode::Pwm), b.pin_mode(&id, Mode::Pwm));
        }
        prop_assert_eq!(a.analog_write(&id, value), b.pwm_write(&id, value));
        prop_assert_eq!(&a.pins()[pin], &b.pins()[pin]);
    }

    #[test]
    fn prop_out_of_range_index_is_unknown(pin in 20usize..1000) {
        let mut driver = ready_driver();
        let is_unknown = matches!(
            driver.pin_mode(&PinId::Index(pin), Mode::Output),
            Err(IoError::UnknownPin(_))
        );
        prop_assert!(is_unknown);
    }
}

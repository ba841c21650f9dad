//! Integration tests for the mock driver through the `DeviceDriver` trait object.

use nvme_core::{AerCallback, DeviceDriver, DriverErrorKind};
use nvme_driver_mock::{DriverEvent, ErrorConfig, ErrorScenario, HandleKind, MockDriver};
use std::sync::Arc;

#[test]
fn test_full_handle_lifecycle_through_trait_object() {
    let mock = MockDriver::new();
    let driver: Arc<dyn DeviceDriver> = Arc::new(mock.clone());

    let ctrl = driver.controller(b"02:00.0").unwrap();
    let subsystem = driver.subsystem(&ctrl).unwrap();
    let pcie = driver.pcie(&ctrl).unwrap();
    let buf = driver.buffer(4096, "default buffer").unwrap();
    let ns = driver.namespace(&ctrl, 1).unwrap();

    assert_eq!(buf.size(), 4096);
    assert_eq!(buf.label(), "default buffer");
    assert_eq!(pcie.controller().address(), "02:00.0");

    ns.close().unwrap();
    drop(ns);
    drop(subsystem);
    drop(pcie);
    drop(buf);
    drop(ctrl);

    let journal = mock.journal();
    for kind in [
        HandleKind::Controller,
        HandleKind::Subsystem,
        HandleKind::Pcie,
        HandleKind::Namespace,
        HandleKind::Buffer,
    ] {
        assert_eq!(journal.constructed(kind), 1, "{:?} constructed once", kind);
        assert_eq!(journal.released(kind), 1, "{:?} released once", kind);
    }

    let closed = journal
        .position(|e| matches!(e, DriverEvent::Closed { .. }))
        .unwrap();
    let ns_released = journal
        .position(|e| {
            matches!(
                e,
                DriverEvent::Released {
                    kind: HandleKind::Namespace,
                    ..
                }
            )
        })
        .unwrap();
    assert!(closed < ns_released, "close must precede release");
}

#[test]
fn test_instances_are_distinct() {
    let mock = MockDriver::new();
    let ctrl = mock.controller(b"02:00.0").unwrap();
    let a = mock.namespace(&ctrl, 1).unwrap();
    let b = mock.namespace(&ctrl, 1).unwrap();
    drop((a, b));

    let ids = mock.journal().instances(HandleKind::Namespace);
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

#[test]
fn test_aer_registration_failure_propagates() {
    let mock = MockDriver::with_errors(ErrorConfig::always("register_aer_cb"));
    let ctrl = mock.controller(b"02:00.0").unwrap();

    let err = ctrl
        .register_aer_cb(Some(AerCallback::new("cb", |_| {})))
        .unwrap_err();
    assert_eq!(err.kind, DriverErrorKind::Communication);
    assert!(mock.journal().aer_registrations().is_empty());
}

#[test]
fn test_config_timeout_propagates() {
    let mock = MockDriver::with_errors(ErrorConfig::scenario(ErrorScenario::Timeout {
        operation: "config",
    }));
    let err = mock.config(true).unwrap_err();
    assert_eq!(err.kind, DriverErrorKind::Timeout);
}

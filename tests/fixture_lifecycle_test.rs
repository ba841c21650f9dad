//! Integration tests for fixture lifecycles
//!
//! Runs tests through a full session on the mock driver and checks, through
//! the driver's event journal, when handles are constructed, closed and
//! released.

use nvme_core::{AerCallback, AerCompletion};
use nvme_driver_mock::{DriverEvent, ErrorConfig, HandleKind, MockDriver};
use nvme_harness::config::FixtureSettings;
use nvme_harness::fixture::{
    Acquired, FixtureEnv, FixtureFactory, FixtureKind, FixtureLookup, FixtureValue, Scope,
};
use nvme_harness::interceptor::{FixedClock, Instrumentation};
use nvme_harness::report::Outcome;
use nvme_harness::{HarnessConfig, HarnessResult, Session, TestCase};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_test::traced_test;

fn session_on(driver: &MockDriver) -> Session {
    Session::builder(Arc::new(driver.clone()))
        .address("02:00.0")
        .interceptor(Arc::new(Instrumentation::with_clock(Arc::new(FixedClock(
            1_000_000,
        )))))
        .build()
}

fn released_position(driver: &MockDriver, kind: HandleKind) -> usize {
    driver
        .journal()
        .position(|e| matches!(e, DriverEvent::Released { kind: k, .. } if *k == kind))
        .unwrap()
}

#[test]
#[traced_test]
fn test_namespace_end_to_end() {
    let driver = MockDriver::new();
    let mut session = session_on(&driver);
    let case = TestCase::new("test_namespace", |ctx| {
        let ns = ctx.namespace()?;
        anyhow::ensure!(ns.nsid() == 1, "nsid {}", ns.nsid());
        Ok(())
    })
    .with_fixtures(&[FixtureKind::Namespace]);

    let item = session.run(&case).clone();
    assert_eq!(item.outcome(), Outcome::Passed);

    let journal = driver.journal();
    assert_eq!(journal.constructed(HandleKind::Namespace), 1);
    assert_eq!(journal.closed(), 1);
    assert_eq!(journal.released(HandleKind::Namespace), 1);

    assert!(logs_contain("running tests on DUT 02:00.0"));
    assert!(logs_contain("test duration: "));

    let report = session.finish();
    assert!(report.summary.all_passed());
}

#[test]
fn test_sequential_tests_get_distinct_namespaces() {
    let driver = MockDriver::new();
    let mut session = session_on(&driver);
    let case = TestCase::new("test_ns", |ctx| {
        ctx.namespace()?;
        Ok(())
    })
    .with_fixtures(&[FixtureKind::Namespace]);

    session.run(&case);
    session.run(&case);

    let journal = driver.journal();
    let ids = journal.instances(HandleKind::Namespace);
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    assert_eq!(journal.closed(), 2);
    // Both namespaces share one controller
    assert_eq!(journal.constructed(HandleKind::Controller), 1);
}

#[test]
fn test_session_handles_once_and_released_after_last_test() {
    let driver = MockDriver::new();
    let mut session = session_on(&driver);
    let all = TestCase::new("test_all", |ctx| {
        ctx.controller()?;
        ctx.subsystem()?;
        ctx.pcie()?;
        ctx.buffer()?;
        Ok(())
    })
    .with_fixtures(&[
        FixtureKind::Subsystem,
        FixtureKind::Pcie,
        FixtureKind::Buffer,
        FixtureKind::Controller,
    ]);

    for _ in 0..3 {
        session.run(&all);
    }

    let journal = driver.journal().clone();
    for kind in [
        HandleKind::Controller,
        HandleKind::Subsystem,
        HandleKind::Pcie,
        HandleKind::Buffer,
    ] {
        assert_eq!(journal.constructed(kind), 1, "{:?} constructed once", kind);
        assert_eq!(journal.released(kind), 0, "{:?} alive until finish", kind);
    }

    let report = session.finish();
    assert_eq!(report.summary.passed, 3);
    for kind in [
        HandleKind::Controller,
        HandleKind::Subsystem,
        HandleKind::Pcie,
        HandleKind::Buffer,
    ] {
        assert_eq!(journal.released(kind), 1, "{:?} released once", kind);
    }

    let ctrl = released_position(&driver, HandleKind::Controller);
    assert!(released_position(&driver, HandleKind::Subsystem) < ctrl);
    assert!(released_position(&driver, HandleKind::Pcie) < ctrl);
}

#[test]
fn test_subsystem_constructed_after_controller() {
    let driver = MockDriver::new();
    let mut session = session_on(&driver);
    session.run(
        &TestCase::new("test_subsystem", |ctx| {
            ctx.subsystem()?;
            Ok(())
        })
        .with_fixtures(&[FixtureKind::Subsystem]),
    );

    let events = driver.journal().events();
    let kinds: Vec<HandleKind> = events
        .iter()
        .filter_map(|e| match e {
            DriverEvent::Constructed { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, vec![HandleKind::Controller, HandleKind::Subsystem]);
}

#[test]
#[traced_test]
fn test_aer_cleared_even_when_body_fails() {
    let driver = MockDriver::new();
    let mut session = session_on(&driver);
    let device = driver.clone();
    let case = TestCase::new("test_aer", move |ctx| {
        ctx.aer()?.register(AerCallback::new("on_event", |_| {}))?;
        anyhow::ensure!(device.raise_aer(AerCompletion::default()) == 1);
        anyhow::bail!("device reported an error")
    })
    .with_fixtures(&[FixtureKind::Aer]);

    let item = session.run(&case).clone();
    assert!(item.outcome_call().unwrap().failed());
    assert!(item.outcome_teardown().unwrap().passed());

    assert_eq!(
        driver.journal().aer_registrations(),
        vec![Some("on_event".to_string()), None]
    );
    assert_eq!(driver.raise_aer(AerCompletion::default()), 0);
    assert!(logs_contain("register aer callback function: on_event"));
    assert!(logs_contain("unregister aer callback function"));
}

#[test]
fn test_aer_cleared_when_nothing_registered() {
    let driver = MockDriver::new();
    let mut session = session_on(&driver);
    session.run(&TestCase::new("test_no_aer", |_| Ok(())).with_fixtures(&[FixtureKind::Aer]));
    assert_eq!(driver.journal().aer_registrations(), vec![None]);
}

#[test]
fn test_verify_left_disabled() {
    let driver = MockDriver::new();
    let mut session = session_on(&driver);
    let seen = Arc::new(Mutex::new(None));
    let slot = seen.clone();
    let case = TestCase::new("test_verify", move |ctx| {
        *slot.lock() = Some(ctx.verify()?);
        Ok(())
    })
    .with_fixtures(&[FixtureKind::Verify]);

    session.run(&case);
    assert_eq!(*seen.lock(), Some(true));
    assert!(!driver.config_word().verify());
}

#[test]
fn test_verify_unsupported_yields_false() {
    let driver = MockDriver::without_verify();
    let mut session = session_on(&driver);
    let seen = Arc::new(Mutex::new(None));
    let slot = seen.clone();
    let case = TestCase::new("test_verify", move |ctx| {
        *slot.lock() = Some(ctx.verify()?);
        Ok(())
    })
    .with_fixtures(&[FixtureKind::Verify]);

    session.run(&case);
    assert_eq!(*seen.lock(), Some(false));
    assert!(!driver.config_word().verify());
}

#[test]
fn test_setup_failure_has_only_setup_outcome() {
    let driver = MockDriver::with_errors(ErrorConfig::always("config"));
    let mut session = session_on(&driver);
    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    let case = TestCase::new("test_setup_error", move |_| {
        flag.store(true, Ordering::SeqCst);
        Ok(())
    })
    .with_fixtures(&[FixtureKind::Namespace, FixtureKind::Aer, FixtureKind::Verify]);

    let item = session.run(&case).clone();
    assert!(item.outcome_setup().unwrap().failed());
    assert!(item.outcome_call().is_none());
    assert!(item.outcome_teardown().is_none());
    assert!(!ran.load(Ordering::SeqCst));

    // Namespace and AER were acquired before verify failed
    let journal = driver.journal();
    assert_eq!(journal.closed(), 1);
    assert_eq!(journal.released(HandleKind::Namespace), 1);
    assert_eq!(journal.aer_registrations(), vec![None]);
}

#[test]
fn test_undeclared_fixture_fails_call() {
    let driver = MockDriver::new();
    let mut session = session_on(&driver);
    let item = session
        .run(&TestCase::new("test_undeclared", |ctx| {
            ctx.buffer()?;
            Ok(())
        }))
        .clone();

    let call = item.outcome_call().unwrap();
    assert!(call.failed());
    assert!(call
        .message
        .as_deref()
        .unwrap_or("")
        .contains("'buffer' was not requested"));
    assert_eq!(driver.journal().constructed(HandleKind::Buffer), 0);
}

#[test]
fn test_settings_from_config() {
    let driver = MockDriver::new();
    let config = HarnessConfig {
        pciaddr: "0000:03:00.0".to_string(),
        fixtures: FixtureSettings {
            namespace_id: 2,
            buffer_size: 512,
            buffer_label: "scratch".to_string(),
        },
        ..HarnessConfig::default()
    };
    let mut session = Session::from_config(&config, Arc::new(driver.clone()));
    let case = TestCase::new("test_cfg", |ctx| {
        anyhow::ensure!(ctx.namespace()?.nsid() == 2);
        anyhow::ensure!(ctx.buffer()?.size() == 512);
        anyhow::ensure!(ctx.buffer()?.label() == "scratch");
        anyhow::ensure!(ctx.controller()?.address() == "0000:03:00.0");
        Ok(())
    })
    .with_fixtures(&[
        FixtureKind::Namespace,
        FixtureKind::Buffer,
        FixtureKind::Controller,
    ]);

    assert_eq!(session.run(&case).outcome(), Outcome::Passed);
}

#[test]
fn test_empty_address_passes_through() {
    let driver = MockDriver::new();
    let mut session = Session::builder(Arc::new(driver.clone())).build();
    let case = TestCase::new("test_empty", |ctx| {
        anyhow::ensure!(ctx.controller()?.address().is_empty());
        Ok(())
    })
    .with_fixtures(&[FixtureKind::Controller]);
    assert_eq!(session.run(&case).outcome(), Outcome::Passed);
}

/// Verify fixture whose acquisition panics, as a broken driver binding would.
struct PanickingVerify;

impl FixtureFactory for PanickingVerify {
    fn kind(&self) -> FixtureKind {
        FixtureKind::Verify
    }

    fn scope(&self) -> Scope {
        Scope::Function
    }

    fn acquire(&self, _: &dyn FixtureLookup, _: &FixtureEnv) -> HarnessResult<Acquired> {
        panic!("config register unreadable")
    }
}

#[test]
#[traced_test]
fn test_setup_panic_releases_acquired_fixtures() {
    let driver = MockDriver::new();
    let mut session = Session::builder(Arc::new(driver.clone()))
        .address("02:00.0")
        .fixture(PanickingVerify)
        .build();
    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    let case = TestCase::new("test_setup_panic", move |_| {
        flag.store(true, Ordering::SeqCst);
        Ok(())
    })
    .with_fixtures(&[FixtureKind::Namespace, FixtureKind::Aer, FixtureKind::Verify]);

    let item = session.run(&case).clone();
    let setup = item.outcome_setup().unwrap();
    assert!(setup.failed());
    assert!(setup
        .message
        .as_deref()
        .unwrap_or("")
        .contains("fixture setup panicked: config register unreadable"));
    assert!(item.outcome_call().is_none());
    assert!(item.outcome_teardown().is_none());
    assert!(item.wall_time().is_some());
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(session.items().len(), 1);

    let journal = driver.journal();
    assert_eq!(journal.constructed(HandleKind::Namespace), 1);
    assert_eq!(journal.closed(), 1);
    assert_eq!(journal.released(HandleKind::Namespace), 1);
    assert_eq!(journal.aer_registrations(), vec![None]);
    assert!(logs_contain("test duration: "));

    // The session keeps running after the panic
    let next = TestCase::new("test_after_panic", |ctx| {
        ctx.namespace()?;
        Ok(())
    })
    .with_fixtures(&[FixtureKind::Namespace]);
    assert_eq!(session.run(&next).outcome(), Outcome::Passed);
    assert_eq!(driver.journal().closed(), 2);
}

#[test]
fn test_release_panic_fails_teardown_and_releases_rest() {
    struct PanickingRelease;

    impl FixtureFactory for PanickingRelease {
        fn kind(&self) -> FixtureKind {
            FixtureKind::Verify
        }

        fn scope(&self) -> Scope {
            Scope::Function
        }

        fn acquire(&self, _: &dyn FixtureLookup, _: &FixtureEnv) -> HarnessResult<Acquired> {
            Ok(Acquired::with_release(
                FixtureKind::Verify,
                FixtureValue::Verify(true),
                |_| panic!("restore wedged"),
            ))
        }
    }

    let driver = MockDriver::new();
    let mut session = Session::builder(Arc::new(driver.clone()))
        .fixture(PanickingRelease)
        .build();
    let case = TestCase::new("test_release_panic", |_| Ok(()))
        .with_fixtures(&[FixtureKind::Namespace, FixtureKind::Verify]);

    let item = session.run(&case).clone();
    assert!(item.outcome_call().unwrap().passed());
    let teardown = item.outcome_teardown().unwrap();
    assert!(teardown.failed());
    assert!(teardown
        .message
        .as_deref()
        .unwrap_or("")
        .contains("restore wedged"));
    assert_eq!(driver.journal().closed(), 1);
}

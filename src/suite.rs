//! Built-in smoke suite.
//!
//! Exercises every fixture once so a new driver or device can be checked
//! end to end before real test content runs.

use crate::fixture::{FixtureKind, FixtureLookup};
use crate::test_case::{TestCase, TestContext};
use anyhow::{ensure, Context};
use nvme_core::AerCallback;

/// The smoke suite, in run order.
pub fn smoke_suite() -> Vec<TestCase> {
    vec![
        TestCase::new("test_controller_address", |ctx| {
            let ctrl = ctx.controller()?;
            let address = ctx.address()?;
            ensure!(
                ctrl.address() == address,
                "controller at '{}', expected '{}'",
                ctrl.address(),
                address
            );
            Ok(())
        })
        .with_fixtures(&[FixtureKind::Address, FixtureKind::Controller]),
        TestCase::new("test_namespace_open", |ctx| {
            let ns = ctx.namespace()?;
            ensure!(ns.nsid() == 1, "opened namespace {}", ns.nsid());
            Ok(())
        })
        .with_fixtures(&[FixtureKind::Namespace]),
        TestCase::new("test_default_buffer", |ctx| {
            let buf = ctx.buffer()?;
            ensure!(buf.size() == 4096, "buffer size {}", buf.size());
            ensure!(buf.label() == "default buffer", "buffer label '{}'", buf.label());
            Ok(())
        })
        .with_fixtures(&[FixtureKind::Buffer]),
        TestCase::new("test_subsystem_and_pcie", |ctx| {
            let ctrl = ctx.controller()?;
            let subsystem = ctx.subsystem()?;
            let pcie = ctx.pcie()?;
            ensure!(subsystem.controller().address() == ctrl.address());
            ensure!(pcie.controller().address() == ctrl.address());
            Ok(())
        })
        .with_fixtures(&[
            FixtureKind::Controller,
            FixtureKind::Subsystem,
            FixtureKind::Pcie,
        ]),
        TestCase::new("test_aer_callback", |ctx| {
            ctx.aer()?
                .register(AerCallback::new("log_aer", |cpl| {
                    tracing::warn!(cdw0 = cpl.cdw0, status = cpl.status, "AER notification");
                }))
                .context("registering AER callback")?;
            Ok(())
        })
        .with_fixtures(&[FixtureKind::Aer]),
        TestCase::new("test_verify_toggle", |ctx| {
            if !ctx.verify()? {
                return Err(TestContext::skip("driver does not support read verification"));
            }
            Ok(())
        })
        .with_fixtures(&[FixtureKind::Verify]),
        TestCase::new("test_random_lba", |ctx| {
            let buf = ctx.buffer()?;
            let mut pattern = vec![0u8; buf.size()];
            ctx.rng().fill_bytes(&mut pattern);
            let lba = ctx.rng().gen_range(0..1024);
            ensure!(lba < 1024);
            tracing::debug!(lba, seed = ctx.seed(), "random write target");
            Ok(())
        })
        .with_fixtures(&[FixtureKind::Buffer]),
        TestCase::new("test_placeholder", |_| Ok(()))
            .with_source("def test_placeholder(nvme0):\n    pass\n"),
    ]
}

//! Error injection framework for the mock driver.
//!
//! Lets tests make specific driver calls fail so that propagation through the
//! fixture layer can be observed. Operation names match the driver entry
//! points: `"controller"`, `"subsystem"`, `"pcie"`, `"namespace"`,
//! `"buffer"`, `"close"`, `"config"`, `"register_aer_cb"`.

use super::rng::MockRng;
use nvme_core::error::{DriverError, DriverErrorKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Error injection configuration for the mock driver
#[derive(Clone, Debug)]
pub struct ErrorConfig {
    /// Per-operation failure rate (0.0 to 1.0)
    failure_rates: Arc<HashMap<&'static str, f64>>,
    /// Specific failure scenarios
    scenarios: Arc<Vec<ErrorScenario>>,
    /// State tracking for scenarios
    state: Arc<Mutex<ErrorState>>,
}

/// A deterministic failure rule.
#[derive(Debug, Clone)]
pub enum ErrorScenario {
    /// Fail every call to `operation` after `count` successful ones
    FailAfterN {
        /// Operation name
        operation: &'static str,
        /// Successful calls before failures start
        count: u32,
    },
    /// Every call to `operation` times out
    Timeout {
        /// Operation name
        operation: &'static str,
    },
    /// First call to any operation raises a hardware fault; all later calls fail too
    HardwareFault {
        /// Fault code reported in the message
        code: u32,
    },
}

#[derive(Default, Debug)]
struct ErrorState {
    /// Operation counters for FailAfterN scenarios
    operation_counts: HashMap<&'static str, u32>,
    /// Code of the hardware fault raised so far, if any
    hardware_fault: Option<u32>,
}

impl ErrorConfig {
    /// Create error config with no errors (default)
    pub fn none() -> Self {
        Self {
            failure_rates: Arc::new(HashMap::new()),
            scenarios: Arc::new(Vec::new()),
            state: Arc::new(Mutex::new(ErrorState::default())),
        }
    }

    /// Make every call to `operation` fail.
    pub fn always(operation: &'static str) -> Self {
        Self::scenario(ErrorScenario::FailAfterN {
            operation,
            count: 0,
        })
    }

    /// Create error config with a single scenario
    pub fn scenario(scenario: ErrorScenario) -> Self {
        Self::scenarios(vec![scenario])
    }

    /// Create error config with multiple scenarios
    pub fn scenarios(scenarios: Vec<ErrorScenario>) -> Self {
        Self {
            failure_rates: Arc::new(HashMap::new()),
            scenarios: Arc::new(scenarios),
            state: Arc::new(Mutex::new(ErrorState::default())),
        }
    }

    /// Create error config with custom failure rates per operation.
    ///
    /// The key `"*"` applies to every operation without its own rate.
    pub fn with_rates(rates: HashMap<&'static str, f64>) -> Self {
        Self {
            failure_rates: Arc::new(rates),
            scenarios: Arc::new(Vec::new()),
            state: Arc::new(Mutex::new(ErrorState::default())),
        }
    }

    /// Check if an operation should fail and return appropriate error.
    ///
    /// Random failure decisions draw from `rng`, so they follow the seed the
    /// driver was last given through `srand`.
    pub fn check_operation(
        &self,
        driver_type: &str,
        operation: &'static str,
        rng: &MockRng,
    ) -> Result<(), DriverError> {
        let mut state = self.state.lock();

        if let Some(code) = state.hardware_fault {
            return Err(DriverError::new(
                driver_type,
                DriverErrorKind::Hardware,
                format!("Hardware fault: {}", code),
            ));
        }

        for scenario in self.scenarios.iter() {
            match scenario {
                ErrorScenario::FailAfterN {
                    operation: op,
                    count,
                } if *op == operation => {
                    let current = state.operation_counts.entry(operation).or_insert(0);
                    *current += 1;
                    if *current > *count {
                        return Err(DriverError::new(
                            driver_type,
                            kind_for(operation),
                            format!("Injected '{}' failure after {} calls", operation, count),
                        ));
                    }
                }
                ErrorScenario::Timeout { operation: op } if *op == operation => {
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Timeout,
                        format!("Operation '{}' timed out", operation),
                    ));
                }
                ErrorScenario::HardwareFault { code } => {
                    state.hardware_fault = Some(*code);
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Hardware,
                        format!("Hardware fault: {}", code),
                    ));
                }
                _ => {}
            }
        }

        let rate = self
            .failure_rates
            .get(operation)
            .or_else(|| self.failure_rates.get("*"))
            .copied()
            .unwrap_or(0.0);

        if rng.should_fail(rate) {
            return Err(DriverError::new(
                driver_type,
                kind_for(operation),
                format!("Random failure on operation '{}'", operation),
            ));
        }

        Ok(())
    }

    /// Reset error state (clear counters, faults)
    pub fn reset(&self) {
        *self.state.lock() = ErrorState::default();
    }
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self::none()
    }
}

fn kind_for(operation: &str) -> DriverErrorKind {
    match operation {
        "controller" | "subsystem" | "pcie" | "namespace" | "buffer" => {
            DriverErrorKind::Initialization
        }
        "close" => DriverErrorKind::Shutdown,
        "config" => DriverErrorKind::Configuration,
        "register_aer_cb" => DriverErrorKind::Communication,
        _ => DriverErrorKind::Unknown,
    }
}

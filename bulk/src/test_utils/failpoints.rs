use fail::FailScenario;

/// Fail point configuration active until the scenario is dropped.
///
/// Fail points are process wide. A scenario holds the scenario lock of the `fail` crate, so
/// tests using scenarios run one at a time.
pub struct FailPointScenario<'a> {
    _scenario: FailScenario<'a>,
    failpoints: Vec<String>,
}

impl<'a> FailPointScenario<'a> {
    /// Configures each `(fail point, action)` pair, e.g.
    /// `("staging.after_create", "return(transfer)")`.
    pub fn setup(failpoints: &[(&str, &str)]) -> FailPointScenario<'a> {
        let scenario = FailScenario::setup();

        for (failpoint, action) in failpoints {
            fail::cfg(*failpoint, action).expect("fail point action is valid");
        }

        Self {
            _scenario: scenario,
            failpoints: failpoints
                .iter()
                .map(|(failpoint, _)| failpoint.to_string())
                .collect(),
        }
    }
}

impl Drop for FailPointScenario<'_> {
    fn drop(&mut self) {
        for failpoint in &self.failpoints {
            fail::remove(failpoint);
        }
    }
}

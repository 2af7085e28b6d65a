use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::logic::{ObserverRunner, SimulationPlan, SimulationSummary};
use crate::scenarios::TestScenario;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    /// Ending label per iteration, in order.
    pub endings: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
}

impl ScenarioResult {
    #[must_use]
    pub fn victories(&self) -> usize {
        self.endings
            .iter()
            .filter(|ending| ending.starts_with("victory"))
            .count()
    }
}

pub struct LogicTester {
    runner: ObserverRunner,
    verbose: bool,
}

impl LogicTester {
    pub const fn new(verbose: bool) -> Self {
        Self {
            runner: ObserverRunner::new(verbose),
            verbose,
        }
    }

    pub fn run_scenario(
        &self,
        scenario: &TestScenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::new();

        for &seed in seeds {
            if self.verbose {
                println!(
                    "🧪 Testing scenario: {} (policy: {} seed: {})",
                    scenario.name.bright_white(),
                    scenario.plan.policy,
                    seed
                );
            }

            let result = self.run_single_scenario(scenario, seed, iterations);
            results.push(result);
        }

        results
    }

    fn run_single_scenario(
        &self,
        scenario: &TestScenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut endings = Vec::new();
        let mut performance_data = Vec::new();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));

            match self.runner.run_plan(&scenario.plan, iteration_seed) {
                Ok(summary) => {
                    endings.push(summary.ending_label());
                    if let Some(err) = evaluate_expectations(&scenario.plan, &summary) {
                        failures.push(format!(
                            "Iteration {} (policy {}, seed {}, day {}, ending '{}', rng draws {:?}): {} | {}",
                            i + 1,
                            summary.policy,
                            summary.seed,
                            summary.final_state.day,
                            summary.ending_label(),
                            summary.rng_draws,
                            err,
                            summarize_noons(&summary)
                        ));
                        if self.verbose {
                            println!(
                                "  ❌ Iteration {}/{} failed: {}",
                                i + 1,
                                iterations,
                                err.red()
                            );
                        }
                    } else {
                        successes += 1;
                        let duration = start_time.elapsed();
                        performance_data.push(duration);
                        if self.verbose {
                            println!(
                                "  ✅ Iteration {}/{} passed ({duration:?}) days:{} commands:{}/{} deduced:{}/{} ending:{}",
                                i + 1,
                                iterations,
                                summary.final_state.day,
                                summary.commands_accepted(),
                                summary.commands_accepted() + summary.commands_rejected(),
                                summary.deduction.solved,
                                summary.deduction.hidden,
                                summary.ending_label()
                            );
                        }
                    }
                }
                Err(err) => {
                    failures.push(format!(
                        "Iteration {} (seed {iteration_seed}): {err:#}",
                        i + 1
                    ));
                }
            }
        }

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: scenario.name.clone(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            endings,
            average_duration,
            performance_data,
        }
    }
}

fn evaluate_expectations(plan: &SimulationPlan, summary: &SimulationSummary) -> Option<String> {
    for expectation in &plan.expectations {
        if let Err(err) = expectation.evaluate(summary) {
            return Some(err.to_string());
        }
    }
    None
}

fn summarize_noons(summary: &SimulationSummary) -> String {
    if summary.noons.is_empty() {
        return "no noons played".to_string();
    }
    summary
        .noons
        .iter()
        .map(|noon| {
            format!(
                "day {}: +{} / -{} ({} AP left)",
                noon.day, noon.accepted, noon.rejected, noon.points_left
            )
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations.iter().map(Duration::as_millis).collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis_vec = Vec::<u128>::deserialize(deserializer)?;
        Ok(millis_vec
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}

mod logic;
mod scenarios;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use logic::reports::{self, ReportOutput};
use logic::{LogicTester, PolicyKind, ScenarioResult, resolve_seed_inputs};
use scenarios::{all_scenario_keys, get_scenario, list_scenarios};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Console,
    Json,
    Markdown,
}

#[derive(Debug, Parser)]
#[command(name = "shadowloop-tester", version = "0.1.0")]
#[command(about = "Headless QA runs for the Shadowloop engine: seeded observers and rule checks")]
struct Args {
    /// Scenarios to run (comma-separated, `all` for every scenario)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated; integers, 0x hex, or a..b ranges)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Observer policy overriding each scenario's default
    #[arg(long, value_enum)]
    policy: Option<PolicyKind>,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut out = ReportOutput::open(args.output.as_deref())?;

    if args.list_scenarios {
        reports::generate_scenario_listing(&mut out, &list_scenarios())?;
        return out.finish();
    }

    announce_banner();

    let start_time = Instant::now();
    let scenarios = expand_scenarios(&args.scenarios);
    let seeds = resolve_seed_inputs(&split_csv(&args.seeds))?;

    let all_results = run_logic_scenarios(&args, &scenarios, &seeds);

    write_reports(&mut out, args.report, &all_results, start_time)?;
    out.finish()?;

    if all_results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn announce_banner() {
    println!("{}", "🌘 Shadowloop Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s == "all") {
        scenarios.retain(|s| s != "all");
        for key in all_scenario_keys() {
            if !scenarios.contains(&key) {
                scenarios.push(key);
            }
        }
    }
    scenarios
}

fn run_logic_scenarios(args: &Args, scenarios: &[String], seeds: &[u64]) -> Vec<ScenarioResult> {
    let mut results = Vec::new();

    println!("{}", "🧠 Running Logic Tests".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let logic_tester = LogicTester::new(args.verbose);

    for scenario_name in scenarios {
        let Some(scenario) = get_scenario(scenario_name) else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
            continue;
        };
        let scenario = match args.policy {
            Some(policy) => scenario.with_policy(policy),
            None => scenario,
        };
        results.extend(logic_tester.run_scenario(&scenario, seeds, args.iterations));
    }

    results
}

fn write_reports(
    out: &mut dyn Write,
    format: ReportFormat,
    results: &[ScenarioResult],
    start_time: Instant,
) -> Result<()> {
    match format {
        ReportFormat::Json => reports::generate_json_report(out, results)?,
        ReportFormat::Markdown if results.is_empty() => writeln!(
            out,
            "# Shadowloop Logic Test Results\n\n_No scenarios executed._"
        )?,
        ReportFormat::Markdown => reports::generate_markdown_report(out, results)?,
        ReportFormat::Console if results.is_empty() => {
            writeln!(out, "No logic scenarios executed.")?;
        }
        ReportFormat::Console => {
            reports::generate_console_report(out, results, start_time.elapsed())?;
        }
    }

    if format != ReportFormat::Json {
        writeln!(out)?;
        writeln!(out, "🏁 Total time: {:?}", start_time.elapsed())?;
    }
    Ok(())
}

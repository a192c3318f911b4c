#![deny(warnings)]

//! Headless cost-of-delay calculator: move sliders, print results and achievements.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use cod_core::Parameter;
use cod_econ::{format_currency, CurrencyStyle, ReportKind};
use cod_runtime::{Calculator, RuntimeConfig, Update};
use persistence::{FileStore, KeyValueStore};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: cod [--revenue|--margin|--growth|--delay <index>]... \
[--config <yaml>] [--store <dir>] [--export] [--report <board|roi|summary>] [--progress] \
[--reset] [--version]";

#[derive(Debug, Default)]
struct Args {
    moves: Vec<(Parameter, usize)>,
    config: Option<PathBuf>,
    store: Option<PathBuf>,
    export: bool,
    report: Option<ReportKind>,
    progress: bool,
    reset: bool,
    version: bool,
}

fn parse_args<I: Iterator<Item = String>>(mut it: I) -> Result<Args> {
    let mut args = Args::default();
    while let Some(arg) = it.next() {
        let parameter = match arg.as_str() {
            "--revenue" => Some(Parameter::Revenue),
            "--margin" => Some(Parameter::Margin),
            "--growth" => Some(Parameter::Growth),
            "--delay" => Some(Parameter::Delay),
            _ => None,
        };
        if let Some(p) = parameter {
            let raw = it.next().with_context(|| format!("{arg} needs an index"))?;
            let index = raw
                .parse()
                .with_context(|| format!("{arg}: {raw:?} is not a slider index"))?;
            args.moves.push((p, index));
            continue;
        }
        match arg.as_str() {
            "--config" => {
                let path = it.next().with_context(|| format!("{arg} needs a path"))?;
                args.config = Some(PathBuf::from(path));
            }
            "--store" => {
                let path = it.next().with_context(|| format!("{arg} needs a path"))?;
                args.store = Some(PathBuf::from(path));
            }
            "--export" => args.export = true,
            "--report" => {
                let kind = it.next().with_context(|| format!("{arg} needs a kind"))?;
                args.report = Some(kind.parse()?);
            }
            "--progress" => args.progress = true,
            "--reset" => args.reset = true,
            "--version" => args.version = true,
            other => bail!("unknown argument {other:?}\n{USAGE}"),
        }
    }
    Ok(args)
}

/// Apply slider moves in order. A rejected move still closes the session
/// so the summary of the moves already made is kept.
fn apply_moves<S: KeyValueStore>(
    calc: &mut Calculator<S>,
    moves: &[(Parameter, usize)],
) -> Result<Vec<Update>> {
    let mut updates = Vec::with_capacity(moves.len() + 1);
    if moves.is_empty() {
        updates.push(calc.recalculate(Utc::now()));
    }
    for (parameter, index) in moves {
        match calc.set_position(*parameter, *index, Utc::now()) {
            Ok(update) => updates.push(update),
            Err(e) => {
                calc.end_session(Utc::now());
                return Err(e).with_context(|| format!("--{parameter} {index}"));
            }
        }
    }
    Ok(updates)
}

fn print_update<S: KeyValueStore>(calc: &Calculator<S>, update: &Update, style: CurrencyStyle) {
    let labels: Vec<String> = Parameter::ALL
        .iter()
        .map(|p| {
            let label = p.ladder().label(update.positions.get(*p)).unwrap_or("?");
            format!("{p}: {label}")
        })
        .collect();
    println!("Inputs | {}", labels.join(" | "));
    let r = &update.result;
    println!(
        "Cost of delay: {} | monthly profit: {} | direct loss: {} | \
         opportunity cost: {} | impact: {:?}",
        format_currency(r.total_cost, style),
        format_currency(r.monthly_profit, style),
        format_currency(r.direct_loss, style),
        format_currency(r.opportunity_cost, style),
        calc.impact(),
    );
    for insight in calc.insights() {
        println!("  [{:?}] {}", insight.kind, insight.message);
    }
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    if args.version {
        println!(
            "cod {} ({} {})",
            env!("CARGO_PKG_VERSION"),
            env!("GIT_SHA"),
            env!("BUILD_DATE")
        );
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => RuntimeConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    let style = config.currency_style;
    let dir = args.store.clone().unwrap_or_else(|| config.store_dir.clone());
    info!(store = %dir.display(), moves = args.moves.len(), "starting calculator");

    let mut calc = Calculator::new(config, FileStore::new(&dir), Utc::now())?;
    if args.reset {
        calc.reset_achievements(Utc::now());
        println!("Achievement progress reset");
    }

    let updates = apply_moves(&mut calc, &args.moves)?;

    if let Some(kind) = args.report {
        print!("{}", calc.report(kind, Utc::now()));
    } else if args.export {
        let report = calc.export(Utc::now());
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if let Some(last) = updates.last() {
        print_update(&calc, last, style);
        if let Some(spread) = calc.scenario_spread() {
            println!(
                "Scenarios | conservative: {} | median: {} | aggressive: {}",
                format_currency(spread.conservative, style),
                format_currency(spread.median, style),
                format_currency(spread.aggressive, style),
            );
        }
    }

    for unlocked in updates.iter().flat_map(|u| &u.unlocked) {
        eprintln!(
            "Achievement unlocked: {} {} - {}",
            unlocked.icon, unlocked.title, unlocked.description
        );
    }

    if args.progress {
        let now = Utc::now();
        let summary = calc.progress(now);
        println!(
            "Achievements: {}/{} ({:.0}%) | calculations: {} | changes: {}",
            summary.unlocked,
            summary.total,
            summary.percentage,
            summary.user_stats.calculations_completed,
            summary.user_stats.total_changes(),
        );
        for pending in calc.pending() {
            println!(
                "  {} {:<24} {:>3.0}%",
                pending.icon,
                pending.title,
                pending.progress * 100.0
            );
        }
    }

    let summary = calc.end_session(Utc::now());
    info!(
        session_id = %summary.session_id,
        interactions = summary.interactions,
        "session closed"
    );
    Ok(())
}

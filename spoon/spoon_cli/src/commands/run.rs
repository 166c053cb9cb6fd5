//! The run command: configure, supervise and report one simulation

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use log::{info, warn};
use spoon_protocol::config::ActorSpec;
use spoon_protocol::{
    ActorState, Policy, ProtocolEvent, SimulationConfig, SimulationOutcome, SimulationReport,
    Supervisor,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use crate::narration::{InOrder, Narrator};

const DEFAULT_FAIR_THRESHOLD: u32 = 5;

/// Transfer policy selectable on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Always defer to a hungry opponent
    Polite,
    /// Defer at most --threshold times in a row
    Fair,
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// TOML config to start from; flags override its values
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Transfer policy
    #[clap(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Consecutive yields before a fair actor eats anyway [default: 5, or the
    /// config file's value]
    #[clap(long)]
    pub threshold: Option<u32>,

    /// Actor names in ring order (each defers to the next)
    #[clap(long, num_args = 2..)]
    pub actors: Vec<String>,

    /// Name of the actor holding the spoon at start
    #[clap(long)]
    pub owner: Option<String>,

    /// Maximum owner decisions across all actors
    #[clap(long)]
    pub max_steps: Option<u64>,

    /// Wall-clock budget in milliseconds
    #[clap(long)]
    pub max_duration_ms: Option<u64>,

    /// Back-off of a waiting actor in microseconds (0 yields the thread)
    #[clap(long)]
    pub backoff_us: Option<u64>,

    /// Transfers without a meal before a stalled run counts as livelocked
    #[clap(long)]
    pub livelock_threshold: Option<u64>,

    /// Print the diners' dialogue as it happens
    #[clap(long)]
    pub narrate: bool,

    /// Print the report as JSON
    #[clap(long)]
    pub json: bool,
}

impl RunArgs {
    /// Build the effective configuration: file (or defaults), then flags
    pub fn to_config(&self) -> Result<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                SimulationConfig::load(path)
                    .with_context(|| format!("loading {}", path.display()))?
            }
            None => SimulationConfig::default(),
        };

        let supervisor = &mut config.supervisor;
        match self.policy {
            Some(PolicyArg::Polite) => supervisor.policy = Policy::Polite,
            Some(PolicyArg::Fair) => {
                supervisor.policy = Policy::Fair {
                    threshold: supervisor
                        .policy
                        .threshold()
                        .unwrap_or(DEFAULT_FAIR_THRESHOLD),
                }
            }
            None => {}
        }
        match (self.threshold, &mut supervisor.policy) {
            (Some(k), Policy::Fair { threshold }) => *threshold = k,
            (Some(_), Policy::Polite) => {
                warn!("--threshold has no effect under the polite policy")
            }
            (None, _) => {}
        }
        if let Some(max_steps) = self.max_steps {
            supervisor.max_steps = max_steps;
        }
        if let Some(max_duration_ms) = self.max_duration_ms {
            supervisor.max_duration_ms = max_duration_ms;
        }
        if let Some(backoff_us) = self.backoff_us {
            supervisor.backoff_us = backoff_us;
        }
        if let Some(threshold) = self.livelock_threshold {
            supervisor.livelock_threshold = threshold;
        }
        if !self.actors.is_empty() {
            config.actors = self.actors.iter().map(ActorSpec::hungry).collect();
        }
        if self.owner.is_some() {
            config.initial_owner = self.owner.clone();
        }

        config.validate().context("invalid simulation setup")?;
        Ok(config)
    }
}

/// Process exit status for an outcome: 0 on progress, 2 on livelock, 3 on timeout
pub fn exit_status(outcome: SimulationOutcome) -> u8 {
    match outcome {
        SimulationOutcome::AllSatisfied => 0,
        SimulationOutcome::Livelocked(_) => 2,
        SimulationOutcome::TimedOut => 3,
    }
}

/// Implementation of the run command
pub fn execute(args: RunArgs) -> Result<ExitCode> {
    let config = args.to_config()?;
    let (resource, actors) = config.build()?;
    let supervisor = Supervisor::new(config.supervisor.clone());

    let narrator = args.narrate.then(|| {
        let stream = supervisor.subscribe();
        let mut narrator = Narrator::new(&actors);
        let mut order = InOrder::starting_at(resource.snapshot().version + 1);
        thread::spawn(move || {
            let mut say = |event: ProtocolEvent| {
                for line in narrator.lines(&event) {
                    println!("{}", line);
                }
            };
            for event in stream.iter() {
                order.push(event).into_iter().for_each(&mut say);
            }
            order.finish().into_iter().for_each(say);
        })
    });

    let report = supervisor.run(resource, actors)?;

    // Dropping the supervisor closes the stream and lets the narrator finish
    drop(supervisor);
    if let Some(narrator) = narrator {
        let _ = narrator.join();
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render(&report));
    }

    Ok(ExitCode::from(exit_status(report.outcome)))
}

fn render(report: &SimulationReport) -> String {
    let name_of = |id| {
        report
            .actor(id)
            .map(|actor| actor.name.clone())
            .unwrap_or_else(|| id.to_string())
    };

    let mut out = format!(
        "Outcome: {}\nPolicy: {}\nSteps: {}  Transfers: {}  Consumes: {}  Elapsed: {:.3}s\nFinal owner: {}\n",
        report.outcome,
        report.policy,
        report.steps,
        report.transfers,
        report.consumes,
        report.elapsed.as_secs_f64(),
        name_of(report.final_owner),
    );
    for actor in &report.actors {
        let state = match actor.state {
            ActorState::Hungry => "hungry",
            ActorState::Satisfied => "satisfied",
        };
        out.push_str(&format!(
            "  {} ({}): {}, yields {}, consumes {}, waits {}, stale {}\n",
            actor.name,
            actor.id,
            state,
            actor.yields,
            actor.consumes,
            actor.waits,
            actor.stale_recoveries
        ));
    }
    out
}

//! Kernel configuration
//!
//! Parsed from a boot string of whitespace separated `key=value` pairs:
//!
//! ```text
//! sched=priority scenario=collatz-escalation table=termination delay=off
//! ```

use core::fmt;
use core::str::FromStr;

pub use crate::sched::queue::SchedulerPolicy;

/// Which demonstration the init task runs. The two collatz scenarios also
/// change what the scheduling decision does on the fifth decision after
/// the collatz task is tagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Fork three collatz and three long running programs, wait for all.
    ForkWaitAll,
    /// Fork ten copies of one randomly chosen program.
    UniformBatch,
    /// Fork three copies each of two different random programs.
    MixedBatch,
    /// Block init until the low priority collatz task is done, or until the
    /// fifth scheduling decision releases it.
    CollatzRendezvous,
    /// Queue a whole batch under the schedule latch, then promote the
    /// collatz task to High on the fifth scheduling decision.
    CollatzEscalation,
}

/// When the process table is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TablePrint {
    EverySwitch,
    EveryTick,
    OnlyOnTermination,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    pub scheduler: SchedulerPolicy,
    pub scenario: Scenario,
    pub table_print: TablePrint,
    /// Pause the console after every process table.
    pub print_delay: bool,
}

impl KernelConfig {
    pub const DEFAULT: KernelConfig = KernelConfig {
        scheduler: SchedulerPolicy::RoundRobin,
        scenario: Scenario::ForkWaitAll,
        table_print: TablePrint::EverySwitch,
        print_delay: false,
    };

    /// Parse a boot string, starting from the defaults.
    pub fn parse(args: &str) -> Result<Self, ConfigError> {
        let mut config = Self::DEFAULT;
        for word in args.split_whitespace() {
            let (key, value) = word.split_once('=').ok_or(ConfigError::Malformed)?;
            match key {
                "sched" => config.scheduler = value.parse()?,
                "scenario" => config.scenario = value.parse()?,
                "table" => config.table_print = value.parse()?,
                "delay" => config.print_delay = parse_switch(value)?,
                _ => return Err(ConfigError::UnknownKey),
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// The collatz scenarios rely on priorities and cannot run round robin.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let needs_priority = matches!(
            self.scenario,
            Scenario::CollatzRendezvous | Scenario::CollatzEscalation
        );
        if needs_priority && self.scheduler != SchedulerPolicy::PreemptivePriority {
            return Err(ConfigError::ScenarioNeedsPriority);
        }
        Ok(())
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

fn parse_switch(value: &str) -> Result<bool, ConfigError> {
    match value {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => Err(ConfigError::BadValue),
    }
}

impl FromStr for SchedulerPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rr" | "round-robin" => Ok(SchedulerPolicy::RoundRobin),
            "priority" | "preemptive-priority" => Ok(SchedulerPolicy::PreemptivePriority),
            _ => Err(ConfigError::BadValue),
        }
    }
}

impl FromStr for Scenario {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fork-wait-all" => Ok(Scenario::ForkWaitAll),
            "uniform-batch" => Ok(Scenario::UniformBatch),
            "mixed-batch" => Ok(Scenario::MixedBatch),
            "collatz-rendezvous" => Ok(Scenario::CollatzRendezvous),
            "collatz-escalation" => Ok(Scenario::CollatzEscalation),
            _ => Err(ConfigError::BadValue),
        }
    }
}

impl FromStr for TablePrint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "switch" => Ok(TablePrint::EverySwitch),
            "tick" => Ok(TablePrint::EveryTick),
            "termination" => Ok(TablePrint::OnlyOnTermination),
            "never" => Ok(TablePrint::Never),
            _ => Err(ConfigError::BadValue),
        }
    }
}

/// Boot string errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    Malformed,
    UnknownKey,
    BadValue,
    ScenarioNeedsPriority,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            ConfigError::Malformed => "expected key=value",
            ConfigError::UnknownKey => "unknown option",
            ConfigError::BadValue => "unrecognized value",
            ConfigError::ScenarioNeedsPriority => "collatz scenarios need the priority scheduler",
        };
        f.write_str(msg)
    }
}

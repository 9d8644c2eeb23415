//! Core bench API.
//!
//! Builds a simulated target, optionally pushes a program image through the
//! serial bootloader, runs one firmware variant and reads the diagnostics
//! block back the way the hardware bench does.

use std::str::FromStr;
use std::time::Instant;

use corebench_hw::memory_map::result;
use tracing::info;

use crate::args::parse_hex_or_dec;
use crate::bootloader::Bootloader;
use crate::firmware::monitor::{self, MonitorSummary};
use crate::firmware::report::ResultBlock;
use crate::firmware::{Failure, FirmwareConfig, Kernel, suite};
use crate::loader::{Loader, LoaderError};
use crate::machine::{Machine, MachineConfig};
use crate::program::ProgramImage;

/// Firmware variant to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Variant {
    /// Priority and invariant suite
    #[default]
    Suite,
    /// Tick/button monitor
    Monitor,
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "suite" => Ok(Variant::Suite),
            "monitor" => Ok(Variant::Monitor),
            other => Err(format!("unknown variant '{other}' (expected suite or monitor)")),
        }
    }
}

/// Bench button press, in absolute clock ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Press {
    pub at: u64,
    pub hold: u64,
}

impl FromStr for Press {
    type Err = String;

    /// `AT:HOLD`, each hex (`0x`) or decimal
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (at, hold) = s
            .split_once(':')
            .ok_or_else(|| format!("press '{s}' is not AT:HOLD"))?;
        let at = parse_hex_or_dec(at.trim()).map_err(|e| format!("press time '{at}': {e}"))?;
        let hold = parse_hex_or_dec(hold.trim()).map_err(|e| format!("press hold '{hold}': {e}"))?;
        Ok(Self { at, hold })
    }
}

/// Presses used by the monitor when none are given: two held presses and
/// one glitch shorter than the settle window.
pub fn default_presses() -> Vec<Press> {
    vec![
        Press {
            at: 20_000,
            hold: 12_000,
        },
        Press {
            at: 60_000,
            hold: 8_000,
        },
        Press {
            at: 100_000,
            hold: 2_000,
        },
    ]
}

/// Configuration for a bench run
#[derive(Debug, Clone, Default)]
pub struct BenchConfig {
    pub variant: Variant,
    pub firmware: FirmwareConfig,
    pub machine: MachineConfig,
    pub presses: Vec<Press>,
    /// Image pushed through the bootloader before boot
    pub program: Option<ProgramImage>,
    /// IMEM word address of the image
    pub program_addr: u32,
}

/// Result of running the bench
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// Status word is the OK flag
    Passed,
    /// Status word carries this failure code
    Failed(u16),
}

pub struct BenchCore {
    kernel: Kernel<Machine>,
    variant: Variant,
    monitor: Option<MonitorSummary>,
    report: Option<ResultBlock>,
    start_time: Instant,
}

impl BenchCore {
    pub fn new(config: BenchConfig) -> Result<Self, LoaderError> {
        let mut machine = Machine::new(config.machine);
        for press in &config.presses {
            machine.schedule_press(press.at, press.hold);
        }

        if let Some(program) = &config.program {
            info!("=== Loading Program ===");
            Loader::new(Bootloader::new(machine.memory_mut()))
                .load(config.program_addr, program.words())?;
            info!(
                "Loaded {} words at IMEM word {:#X}",
                program.len(),
                config.program_addr
            );
        }

        Ok(Self {
            kernel: Kernel::new(machine, config.firmware),
            variant: config.variant,
            monitor: None,
            report: None,
            start_time: Instant::now(),
        })
    }

    /// Boots the firmware and runs the configured variant to completion.
    pub fn run(&mut self) -> StopReason {
        self.kernel.boot();
        let outcome = match self.variant {
            Variant::Suite => suite::run(&mut self.kernel),
            Variant::Monitor => match monitor::run(&mut self.kernel) {
                Ok(summary) => {
                    self.monitor = Some(summary);
                    Ok(())
                }
                Err(failure) => Err(failure),
            },
        };
        self.report = Some(self.kernel.report(&outcome));

        match outcome {
            Ok(()) => StopReason::Passed,
            Err(Failure(code)) => StopReason::Failed(code),
        }
    }

    /// Reads the diagnostics block over the bootloader protocol.
    pub fn read_results(&mut self) -> Result<ResultBlock, LoaderError> {
        let memory = self.kernel.platform_mut().memory_mut();
        let words = Loader::new(Bootloader::new(memory)).read(0, result::WORDS as u32)?;
        Ok(ResultBlock::from_words(&words).unwrap_or_default())
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Block written at the end of the last run
    pub fn report(&self) -> Option<&ResultBlock> {
        self.report.as_ref()
    }

    pub fn monitor_summary(&self) -> Option<&MonitorSummary> {
        self.monitor.as_ref()
    }

    pub fn kernel(&self) -> &Kernel<Machine> {
        &self.kernel
    }

    pub fn machine(&self) -> &Machine {
        self.kernel.platform()
    }

    pub fn total_cycles(&self) -> u64 {
        self.machine().scheduler().total_cycles()
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    pub fn print_final_state(&self) {
        let machine = self.machine();
        let scheduler = machine.scheduler();
        info!(
            "Clock: {} ticks ({:.3} ms at core speed), {} idle",
            scheduler.total_cycles(),
            scheduler.simulated_seconds() * 1000.0,
            scheduler.idle_cycles()
        );
        info!(
            "Traps: {}, sleeps: {} ({} empty), instructions retired: {}",
            scheduler.traps(),
            scheduler.sleeps(),
            scheduler.empty_sleeps(),
            machine.hart().retired()
        );
        info!(
            "GPIO: {} rising edges, LEDs {:#010b}",
            machine.peripherals().gpio.rising_edges(),
            machine.peripherals().gpio.leds()
        );
        if let Some(summary) = &self.monitor {
            info!(
                "Monitor: {} ticks, {} buttons, {} wakes",
                summary.ticks, summary.buttons, summary.wakes
            );
        }
        info!("Elapsed time: {:.2?}", self.elapsed());
    }
}

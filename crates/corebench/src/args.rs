use std::path::PathBuf;

use clap::{Parser, Subcommand};
use corebench_hw::memory_map::imem;
use corebench_hw::specs::{loader, timing};

use crate::core::{BenchConfig, Press, Variant, default_presses};
use crate::firmware::FirmwareConfig;
use crate::firmware::trap::ExternalMode;
use crate::hart::HartFaults;
use crate::machine::MachineConfig;
use crate::mmio::BounceConfig;
use crate::program::{ProgramError, ProgramImage};
use crate::scheduler::{self, SchedulerConfig};

/// Serial port of the FPGA board's USB-UART bridge
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

#[derive(Parser, Debug, Clone)]
#[command(name = "corebench", version, about = "Run the interrupt bench firmware on a simulated core")]
pub struct Args {
    /// Firmware variant: suite or monitor
    #[arg(long, default_value = "suite")]
    pub variant: Variant,

    /// Button interrupt handling: debounce or direct
    #[arg(long, default_value = "debounce")]
    pub external: ExternalMode,

    /// Tick period in clock ticks (hex: 0x1234 or decimal: 1234)
    #[arg(long, value_parser = parse_hex_or_dec_u32, default_value_t = timing::TIMER_PERIOD)]
    pub period: u32,

    /// Button settle window in clock ticks
    #[arg(long, value_parser = parse_hex_or_dec_u32, default_value_t = timing::DEBOUNCE_WINDOW)]
    pub debounce_window: u32,

    /// Spin budget of every bounded wait
    #[arg(long, value_parser = parse_hex_or_dec_u32, default_value_t = timing::IRQ_TIMEOUT)]
    pub irq_timeout: u32,

    /// Ticks the monitor runs for
    #[arg(long, default_value_t = 50)]
    pub monitor_ticks: u32,

    /// Bench button press as AT:HOLD in clock ticks (repeatable). The monitor
    /// uses a built-in pattern when none are given.
    #[arg(long = "press")]
    pub presses: Vec<Press>,

    /// Contact bounce flips per button transition
    #[arg(long, default_value_t = 6)]
    pub bounce_count: u32,

    /// Clock ticks between bounce flips
    #[arg(long, default_value_t = 150)]
    pub bounce_spacing: u64,

    /// Clock ticks per busy-loop instruction
    #[arg(long, default_value_t = scheduler::CYCLES_PER_INSTRUCTION)]
    pub cycles_per_instruction: u64,

    /// Clock ticks per bus access
    #[arg(long, default_value_t = scheduler::MMIO_ACCESS_CYCLES)]
    pub mmio_access_cycles: u64,

    /// Fault: trap entry leaves mstatus.MIE set
    #[arg(long)]
    pub fault_keep_mie: bool,

    /// Fault: value added to the reported mepc
    #[arg(long, value_parser = parse_hex_or_dec_u32, default_value_t = 0)]
    pub fault_mepc_skew: u32,

    /// Fault: timer wins arbitration over external
    #[arg(long)]
    pub fault_invert_priority: bool,

    /// Fault: raise an illegal-instruction trap after this many instructions
    #[arg(long)]
    pub fault_illegal_trap_at: Option<u64>,

    /// Fault: interrupts are taken with mstatus.MIE clear
    #[arg(long)]
    pub fault_ignore_mie: bool,

    /// Fault: timer interrupts are taken with mie.MTIE clear
    #[arg(long)]
    pub fault_ignore_mtie: bool,

    /// Fault: external interrupts are taken with mie.MEIE clear
    #[arg(long)]
    pub fault_ignore_meie: bool,

    /// Program image to push through the bootloader before the run
    #[arg(long)]
    pub program: Option<PathBuf>,

    /// IMEM word address for --program
    #[arg(long, value_parser = parse_hex_or_dec_u32, default_value_t = 0)]
    pub program_addr: u32,
}

impl Args {
    /// Validate that the arguments are consistent
    pub fn validate(&self) -> Result<(), String> {
        if self.period == 0 {
            return Err("--period must be non-zero".to_string());
        }
        if self.debounce_window == 0 {
            return Err("--debounce-window must be non-zero".to_string());
        }
        let bounce = u64::from(self.bounce_count) * self.bounce_spacing;
        if u64::from(self.debounce_window) <= bounce {
            return Err(format!(
                "--debounce-window must exceed the bounce duration ({bounce} ticks)"
            ));
        }
        if self.cycles_per_instruction == 0 {
            return Err("--cycles-per-instruction must be non-zero".to_string());
        }
        if self.program_addr >= loader::MAX_WORDS {
            return Err(format!(
                "--program-addr must be below {} words",
                loader::MAX_WORDS
            ));
        }
        Ok(())
    }

    /// Reads `--program`, if given, and checks it fits IMEM from `--program-addr` on.
    pub fn load_program(&self) -> Result<Option<ProgramImage>, ProgramError> {
        let Some(path) = &self.program else {
            return Ok(None);
        };
        let image = ProgramImage::read(path)?;
        image.check_fits(imem::WORDS.saturating_sub(self.program_addr as usize))?;
        Ok(Some(image))
    }

    /// Convert Args to BenchConfig
    pub fn to_bench_config(&self, program: Option<ProgramImage>) -> BenchConfig {
        let presses = if self.presses.is_empty() && self.variant == Variant::Monitor {
            default_presses()
        } else {
            self.presses.clone()
        };
        BenchConfig {
            variant: self.variant,
            firmware: FirmwareConfig {
                period: self.period,
                debounce_window: self.debounce_window,
                irq_timeout: self.irq_timeout,
                monitor_ticks: self.monitor_ticks,
                external: self.external,
                ..FirmwareConfig::default()
            },
            machine: MachineConfig {
                scheduler: SchedulerConfig {
                    cycles_per_instruction: self.cycles_per_instruction,
                    mmio_access_cycles: self.mmio_access_cycles,
                    ..SchedulerConfig::default()
                },
                bounce: BounceConfig {
                    count: self.bounce_count,
                    spacing: self.bounce_spacing,
                },
                faults: HartFaults {
                    keep_mie_on_trap: self.fault_keep_mie,
                    mepc_skew: self.fault_mepc_skew,
                    invert_priority: self.fault_invert_priority,
                    illegal_trap_at: self.fault_illegal_trap_at,
                    ignore_global_enable: self.fault_ignore_mie,
                    ignore_timer_enable: self.fault_ignore_mtie,
                    ignore_external_enable: self.fault_ignore_meie,
                },
            },
            presses,
            program,
            program_addr: self.program_addr,
        }
    }
}

/// Arguments of the serial loader client
#[derive(Parser, Debug, Clone)]
#[command(name = "corebench-loader", version, about = "Serial bootloader client for the bench target")]
pub struct LoaderArgs {
    /// Serial port
    #[arg(long, default_value = DEFAULT_PORT)]
    pub port: String,

    /// Baud rate
    #[arg(long, default_value_t = loader::BAUD_RATE)]
    pub baud: u32,

    #[command(subcommand)]
    pub command: LoaderCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum LoaderCommand {
    /// Load a program image into IMEM
    Load {
        /// Image in text format (hex words, # and // comments)
        file: PathBuf,
        /// Start word address
        #[arg(long, value_parser = parse_hex_or_dec_u32, default_value_t = 0)]
        addr: u32,
    },
    /// Read words back from DMEM
    Read {
        /// Start word address
        #[arg(long, value_parser = parse_hex_or_dec_u32, default_value_t = 0)]
        addr: u32,
        /// Number of words
        #[arg(long, value_parser = parse_hex_or_dec_u32)]
        count: u32,
        /// Also decode the words as the diagnostics block
        #[arg(long)]
        decode: bool,
    },
    /// Convert a raw little-endian binary into an image file
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// Keep at most this many words
        #[arg(long)]
        words: Option<usize>,
    },
}

pub fn parse_hex_or_dec(s: &str) -> Result<u64, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}

pub fn parse_hex_or_dec_u32(s: &str) -> Result<u32, String> {
    let value = parse_hex_or_dec(s).map_err(|e| e.to_string())?;
    u32::try_from(value).map_err(|_| format!("{s} does not fit in 32 bits"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_or_dec() {
        assert_eq!(parse_hex_or_dec("0x10"), Ok(16));
        assert_eq!(parse_hex_or_dec("10"), Ok(10));
        assert!(parse_hex_or_dec("0xZZ").is_err());
        assert!(parse_hex_or_dec_u32("0x1_0000_0000").is_err());
        assert!(parse_hex_or_dec_u32("4294967296").is_err());
    }

    #[test]
    fn test_defaults_match_firmware() {
        let args = Args::try_parse_from(["corebench"]).unwrap();
        args.validate().unwrap();
        let config = args.to_bench_config(None);
        assert_eq!(config.variant, Variant::Suite);
        assert_eq!(config.firmware.period, timing::TIMER_PERIOD);
        assert_eq!(config.firmware.external, ExternalMode::Debounce);
        assert!(config.presses.is_empty());
        assert!(config.machine.faults.is_healthy());
    }

    #[test]
    fn test_monitor_gets_default_presses() {
        let args = Args::try_parse_from(["corebench", "--variant", "monitor"]).unwrap();
        assert_eq!(args.to_bench_config(None).presses, default_presses());

        let args = Args::try_parse_from(["corebench", "--variant", "monitor", "--press", "0x10:5"])
            .unwrap();
        assert_eq!(
            args.to_bench_config(None).presses,
            vec![Press { at: 0x10, hold: 5 }]
        );
    }

    #[test]
    fn test_faults() {
        let args = Args::try_parse_from([
            "corebench",
            "--fault-keep-mie",
            "--fault-mepc-skew",
            "0x1000",
            "--fault-invert-priority",
            "--fault-ignore-meie",
        ])
        .unwrap();
        let faults = args.to_bench_config(None).machine.faults;
        assert!(faults.keep_mie_on_trap);
        assert_eq!(faults.mepc_skew, 0x1000);
        assert!(faults.invert_priority);
        assert!(faults.ignore_external_enable);
        assert!(!faults.ignore_global_enable);
        assert!(!faults.ignore_timer_enable);
    }

    #[test]
    fn test_program_must_fit_from_its_address() {
        let path = std::env::temp_dir().join(format!("corebench-args-{}.hex", std::process::id()));
        std::fs::write(&path, "00000013\n00000093\n0000006f\n").unwrap();
        let program = path.to_str().unwrap();

        let args = Args::try_parse_from(["corebench", "--program", program]).unwrap();
        assert_eq!(args.load_program().unwrap().map(|p| p.len()), Some(3));

        let args =
            Args::try_parse_from(["corebench", "--program", program, "--program-addr", "1022"])
                .unwrap();
        let err = args.load_program().unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, ProgramError::TooLarge { words: 3, limit: 2 }));
    }

    #[test]
    fn test_validate_window_must_outlast_bounce() {
        let args = Args::try_parse_from([
            "corebench",
            "--debounce-window",
            "4000",
            "--bounce-count",
            "4",
            "--bounce-spacing",
            "1000",
        ])
        .unwrap();
        assert!(args.validate().unwrap_err().contains("bounce"));

        let args = Args::try_parse_from([
            "corebench",
            "--debounce-window",
            "4001",
            "--bounce-count",
            "4",
            "--bounce-spacing",
            "1000",
        ])
        .unwrap();
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_period() {
        let args = Args::try_parse_from(["corebench", "--period", "0"]).unwrap();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_loader_read_command() {
        let args = LoaderArgs::try_parse_from([
            "corebench-loader",
            "--port",
            "/dev/ttyUSB1",
            "read",
            "--addr",
            "0x0",
            "--count",
            "16",
            "--decode",
        ])
        .unwrap();
        assert_eq!(args.port, "/dev/ttyUSB1");
        assert_eq!(args.baud, 115_200);
        assert!(matches!(
            args.command,
            LoaderCommand::Read { addr: 0, count: 16, decode: true }
        ));
    }
}

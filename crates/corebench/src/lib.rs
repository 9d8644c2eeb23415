pub mod args;
pub mod bootloader;
pub mod core;
pub mod firmware;
pub mod hart;
pub mod loader;
pub mod machine;
pub mod memory;
pub mod mmio;
pub mod program;
pub mod scheduler;

// Re-export commonly used types
pub use args::{Args, LoaderArgs, LoaderCommand};
pub use core::{BenchConfig, BenchCore, Press, StopReason, Variant};
pub use firmware::report::ResultBlock;
pub use firmware::{Failure, FirmwareConfig, Kernel};
pub use machine::{Machine, MachineConfig};
pub use scheduler::SchedulerConfig;

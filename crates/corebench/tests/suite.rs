use corebench::hart::HartFaults;
use corebench::mmio::BounceConfig;
use corebench::{BenchConfig, BenchCore, FirmwareConfig, MachineConfig, StopReason};
use corebench_hw::specs::{cause, codes, status};

fn run(faults: HartFaults) -> (BenchCore, StopReason) {
    let mut bench = BenchCore::new(BenchConfig {
        machine: MachineConfig {
            faults,
            ..MachineConfig::default()
        },
        ..BenchConfig::default()
    })
    .unwrap();
    let reason = bench.run();
    (bench, reason)
}

fn run_with(config: BenchConfig) -> StopReason {
    BenchCore::new(config).unwrap().run()
}

#[test]
fn test_healthy_core_passes() {
    let (mut bench, reason) = run(HartFaults::default());
    assert_eq!(reason, StopReason::Passed);

    let block = bench.read_results().unwrap();
    assert_eq!(block.status, status::OK_FLAG);
    assert_eq!(Some(&block), bench.report());
    assert_eq!(block.first_cause, cause::MACHINE_EXTERNAL);
    assert_eq!(block.bad_mcause, 0);
    assert_eq!(block.nested_irq, 0);
    assert!(block.delta_samples >= 4);
    assert!(block.delta_min <= block.delta_max);
    assert!(block.tick_total >= 18);
    assert!(block.button_total >= 1);
}

#[test]
fn test_mie_left_set_in_handler_nests() {
    let (bench, reason) = run(HartFaults {
        keep_mie_on_trap: true,
        ..HartFaults::default()
    });
    // The timer still pending behind the external dispatch re-enters the
    // handler before it returns.
    assert_eq!(reason, StopReason::Failed(codes::NESTED));
    let block = bench.report().unwrap();
    assert_eq!(block.status, status::ERR_FLAG | u32::from(codes::NESTED));
    assert!(block.nested_irq > 0);
    assert!(block.bad_mie_in_handler > 0);
    assert_eq!(block.first_cause, cause::MACHINE_EXTERNAL);
}

#[test]
fn test_misaligned_mepc() {
    let (_, reason) = run(HartFaults {
        mepc_skew: 1,
        ..HartFaults::default()
    });
    assert_eq!(reason, StopReason::Failed(codes::MEPC_ALIGN));
}

#[test]
fn test_mepc_outside_imem() {
    let (_, reason) = run(HartFaults {
        mepc_skew: 0x1000,
        ..HartFaults::default()
    });
    assert_eq!(reason, StopReason::Failed(codes::MEPC_RANGE));
}

#[test]
fn test_timer_wins_arbitration() {
    let (bench, reason) = run(HartFaults {
        invert_priority: true,
        ..HartFaults::default()
    });
    assert_eq!(reason, StopReason::Failed(codes::PRIORITY_ORDER));
    assert_eq!(bench.report().unwrap().first_cause, cause::MACHINE_TIMER);
}

#[test]
fn test_unexpected_exception_is_fatal() {
    let (mut bench, reason) = run(HartFaults {
        illegal_trap_at: Some(1000),
        ..HartFaults::default()
    });
    assert_eq!(reason, StopReason::Failed(codes::UNEXPECTED_TRAP));
    let block = bench.read_results().unwrap();
    assert_eq!(block.failure_code(), Some(codes::UNEXPECTED_TRAP));
    assert_eq!(block.last_mcause, 2);
}

#[test]
fn test_taken_with_everything_masked() {
    let (bench, reason) = run(HartFaults {
        ignore_global_enable: true,
        ignore_timer_enable: true,
        ..HartFaults::default()
    });
    assert_eq!(reason, StopReason::Failed(codes::BOTH_DISABLED));
    assert!(bench.report().unwrap().irq_count > 0);
}

#[test]
fn test_taken_without_global_enable() {
    let (_, reason) = run(HartFaults {
        ignore_global_enable: true,
        ..HartFaults::default()
    });
    assert_eq!(reason, StopReason::Failed(codes::LOCAL_ONLY));
}

#[test]
fn test_timer_ignores_local_mask() {
    let (bench, reason) = run(HartFaults {
        ignore_timer_enable: true,
        ..HartFaults::default()
    });
    assert_eq!(reason, StopReason::Failed(codes::LOCAL_FROZEN));
    assert!(bench.report().unwrap().bad_mcause > 0);
}

#[test]
fn test_external_ignores_local_mask() {
    let (bench, reason) = run(HartFaults {
        ignore_external_enable: true,
        ..HartFaults::default()
    });
    assert_eq!(reason, StopReason::Failed(codes::EXTERNAL_FROZEN));
    let block = bench.report().unwrap();
    assert!(block.bad_mcause > 0);
    assert_eq!(block.last_gpio_status, 1);
}

#[test]
fn test_slow_tick_times_out_global_enable() {
    let reason = run_with(BenchConfig {
        firmware: FirmwareConfig {
            period: 50_000,
            irq_timeout: 2_000,
            ..FirmwareConfig::default()
        },
        ..BenchConfig::default()
    });
    assert_eq!(reason, StopReason::Failed(codes::GLOBAL_ENABLE));
}

#[test]
fn test_window_shorter_than_bounce_double_counts() {
    // Settles mid-bounce; the edge after the window opens a second one.
    let reason = run_with(BenchConfig {
        firmware: FirmwareConfig {
            debounce_window: 2500,
            ..FirmwareConfig::default()
        },
        machine: MachineConfig {
            bounce: BounceConfig {
                count: 4,
                spacing: 1000,
            },
            ..MachineConfig::default()
        },
        ..BenchConfig::default()
    });
    assert_eq!(reason, StopReason::Failed(codes::DEBOUNCE_DOUBLE));
}

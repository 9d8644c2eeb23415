use clap::Parser;
use corebench::{Args, BenchCore, StopReason};
use tracing::info;

fn main() {
    // Parse command-line arguments
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let program = match args.load_program() {
        Ok(program) => program,
        Err(e) => {
            eprintln!("Failed to load program: {}", e);
            std::process::exit(2);
        }
    };

    let config = args.to_bench_config(program);

    info!("=== Creating Bench ===");
    let mut bench = match BenchCore::new(config) {
        Ok(bench) => bench,
        Err(e) => {
            eprintln!("Failed to create bench: {}", e);
            std::process::exit(2);
        }
    };

    info!("=== Running {:?} ===", bench.variant());
    let stop_reason = bench.run();

    info!("=== Run Complete ===");
    info!("Stop reason: {:?}", stop_reason);
    bench.print_final_state();

    // The status word read back from the target decides the exit code
    let block = match bench.read_results() {
        Ok(block) => block,
        Err(e) => {
            eprintln!("Failed to read results: {}", e);
            std::process::exit(2);
        }
    };
    println!("{}", block);

    let exit_code = if block.passed() {
        info!("PASS");
        0
    } else {
        if let StopReason::Failed(code) = stop_reason {
            eprintln!("FAIL: check {:#06X}", code);
        }
        1
    };

    std::process::exit(exit_code);
}

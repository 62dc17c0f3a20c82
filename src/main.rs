//! Grey-Scott CLI - Run simulations from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use grey_scott::{
    compute::{Simulation, SimulationStats},
    schema::SimulationConfig,
};

fn print_usage(program: &str) {
    eprintln!("Usage: {} <config.json> [steps] [--switch-at N] [--preset I]", program);
    eprintln!();
    eprintln!("Run Grey-Scott reaction-diffusion from JSON configuration.");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  config.json    Path to simulation configuration file");
    eprintln!("  steps          Number of simulation steps (default: 1000)");
    eprintln!("  --switch-at N  Toggle to the standby engine after step N");
    eprintln!("  --preset I     Load preset I (1-5) before running");
    eprintln!();
    eprintln!("Example configuration is generated with --example flag.");
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let mut steps: u64 = 1000;
    let mut switch_at: Option<u64> = None;
    let mut preset: Option<usize> = None;

    let mut rest = args[2..].iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--switch-at" => switch_at = Some(parse_flag(&args[0], arg, rest.next())),
            "--preset" => preset = Some(parse_flag(&args[0], arg, rest.next())),
            other => {
                steps = other.parse().unwrap_or_else(|_| {
                    eprintln!("Invalid step count: {}", other);
                    print_usage(&args[0]);
                    std::process::exit(1);
                })
            }
        }
    }

    // Load configuration
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: SimulationConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    let mut sim = Simulation::new(&config).unwrap_or_else(|e| {
        eprintln!("Error creating simulation: {}", e);
        std::process::exit(1);
    });

    if let Some(index) = preset {
        if sim.load_preset(index).is_none() {
            eprintln!("Unknown preset {}, keeping configured parameters", index);
        }
    }

    let params = sim.params();
    println!("Grey-Scott Simulation");
    println!("=====================");
    println!("Grid: {}x{}", sim.width(), sim.height());
    println!("Engine: {}", sim.mode());
    println!(
        "Du={} Dv={} F={} k={} dt={}",
        params.du, params.dv, params.feed, params.kill, params.dt
    );
    println!("Steps: {}", steps);
    println!();

    print_stats("Initial state", &sim.stats());

    // Run simulation
    println!("Running simulation...");
    let start = Instant::now();
    let mut failed = 0u64;

    for i in 0..steps {
        if switch_at == Some(i) {
            match sim.toggle_backend() {
                Ok(mode) => println!("  Switched to {} at step {}", mode, i),
                Err(e) => eprintln!("  Backend switch failed at step {}: {}", i, e),
            }
        }

        if !sim.step() {
            failed += 1;
        }

        // Print progress every 10%
        if (i + 1) % (steps / 10).max(1) == 0 {
            let elapsed = start.elapsed().as_secs_f32();
            let steps_per_sec = (i + 1) as f32 / elapsed;
            println!(
                "  Step {}/{}: {:.3} ms/step (device), {:.1} steps/s",
                i + 1,
                steps,
                sim.last_compute_time_ms(),
                steps_per_sec
            );
        }
    }

    let elapsed = start.elapsed();

    if let Err(e) = sim.read_back() {
        eprintln!("Error reading back final state: {}", e);
    }

    println!();
    print_stats("Final state", &sim.stats());
    if failed > 0 {
        println!("Abandoned steps: {}", failed);
    }
    println!("Engine: {}", sim.mode());
    println!("Last compute time: {:.3} ms", sim.last_compute_time_ms());
    println!(
        "Time: {:.2}s ({:.1} steps/s)",
        elapsed.as_secs_f32(),
        steps as f32 / elapsed.as_secs_f32()
    );
}

fn parse_flag<T: std::str::FromStr>(program: &str, flag: &str, value: Option<&String>) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or_else(|| {
        eprintln!("{} expects a numeric value", flag);
        print_usage(program);
        std::process::exit(1);
    })
}

fn print_stats(label: &str, stats: &SimulationStats) {
    println!("{}:", label);
    println!(
        "  U: min={:.4} max={:.4} mean={:.4}",
        stats.u.min, stats.u.max, stats.u.mean
    );
    println!(
        "  V: min={:.4} max={:.4} mean={:.4}",
        stats.v.min, stats.v.max, stats.v.mean
    );
    println!("  Active cells: {}/{}", stats.active_cells, stats.cells);
    println!();
}

fn print_example_config() {
    let config = SimulationConfig::default();

    let json = serde_json::to_string_pretty(&config).unwrap_or_else(|e| {
        eprintln!("Error serializing config: {}", e);
        std::process::exit(1);
    });
    println!("{}", json);
}

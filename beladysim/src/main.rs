use std::fs::File;
use std::io::BufReader;
use std::time::Instant;

use beladylib::config::SimulationConfig;
use beladylib::io::get_reader;
use beladylib::simulator::Simulator;
use beladylib::trace::TraceReader;
use beladylib::util::parse_instruction_count;
use clap::Parser;

#[cfg(debug_assertions)]
const DEBUG_DEFAULT: bool = true;

#[cfg(not(debug_assertions))]
const DEBUG_DEFAULT: bool = false;

#[derive(Parser, Debug)]
#[command(about = String::from("Trace-driven cache simulator running Belady's optimal replacement"))]
struct Args {
    config: String,
    trace: String,

    /// Overrides the configured warmup window; accepts K, M, and B suffixes
    #[arg(long, value_parser = parse_instruction_count)]
    warmup: Option<u64>,

    /// Overrides the configured simulation window; accepts K, M, and B suffixes
    #[arg(long, value_parser = parse_instruction_count)]
    simulate: Option<u64>,

    #[arg(short, long)]
    performance: bool,

    #[arg(short, long, default_value_t = DEBUG_DEFAULT)]
    debug: bool,
}

fn main() -> Result<(), String> {
    let start = Instant::now();
    let args = Args::parse();
    let config_file = File::open(&args.config).map_err(|e| format!("Couldn't open the config file at path {}: {e}", args.config))?;
    let mut config: SimulationConfig = serde_json::from_reader(BufReader::new(config_file)).map_err(|e| format!("Couldn't parse the config file: {e}"))?;
    if let Some(warmup) = args.warmup {
        config.warmup_instructions = warmup;
    }
    if let Some(simulate) = args.simulate {
        config.simulation_instructions = simulate;
    }
    let mut simulator = Simulator::new(&config);
    let trace_file = File::open(&args.trace).map_err(|e| format!("Couldn't open the trace file at path {}: {e}", args.trace))?;
    let mut trace = TraceReader::new(get_reader(trace_file)?);
    let result = simulator.simulate(&mut trace)?;
    println!("{}", serde_json::to_string_pretty(result).map_err(|e| format!("Couldn't serialise the output {e}"))?);
    if args.performance {
        let end = Instant::now();
        let simulation_time = simulator.get_execution_time();
        let total_time = end - start;
        println!("Replay time: {}s", simulation_time.as_nanos() as f64 / 1e9);
        println!("Total execution time (includes preload, configuration, and output): {}s", total_time.as_nanos() as f64 / 1e9)
    }
    if args.debug {
        #[cfg(debug_assertions)]
        println!("Running the debug binary, debug mode is enabled by default. If benchmarking, do not use this binary, re-compile with the --release argument when using cargo run");
        println!("Parsed input configuration: {config:?}");
        let (sets, ways) = simulator.geometry();
        println!("Cache geometry: {sets} sets x {ways} ways");
        println!("Uninitialised blocks after the run: {}", simulator.get_uninitialised_block_count())
    }
    Ok(())
}

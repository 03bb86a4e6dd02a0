use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use clap::Parser;
use indexmap::IndexMap;
use rand::prelude::*;
use threadpool::ThreadPool;

use dslab_consolidation::core::config::{ConsolidationConfig, VmConfig};
use dslab_consolidation::log_info;
use dslab_consolidation::simulation::{ConsolidationSimulation, RunSummary};

fn init_logger() {
    use env_logger::Builder;
    use std::io::Write;
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to simulation config
    #[clap(short, long)]
    config: String,

    /// Number of generated VMs (added to the VMs from config)
    #[clap(long, default_value_t = 100)]
    vm_count: u32,

    /// Seed used to generate VMs
    #[clap(long, default_value_t = 123)]
    seed: u64,

    /// Directory for results.json and history files
    #[clap(short, long, default_value = ".")]
    output_dir: String,

    /// Number of threads to use (default - use all available cores)
    #[clap(short, long, default_value_t = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))]
    threads: usize,
}

const OVERLOAD_DETECTION: [&str; 3] = [
    "StaticThreshold[threshold=0.8]",
    "MedianAbsoluteDeviation[safety=2.5,fallback=0.8]",
    "InterQuartileRange[safety=1.5,fallback=0.8]",
];

const VM_SELECTION: [&str; 3] = ["MinimumMigrationTime", "MinimumUtilization", "RandomSelection[seed=123]"];

/// Generates VMs with random sizes and random load traces, VMs are placed later with first fit.
fn generate_vms(count: u32, seed: u64, interval: f64) -> Vec<VmConfig> {
    let mut rng = StdRng::seed_from_u64(seed);
    let sizes = [(500., 613), (1000., 1740), (2000., 1740), (2500., 870)];
    (0..count)
        .map(|i| {
            let (cpu_usage, memory) = sizes[rng.gen_range(0..sizes.len())];
            let min = rng.gen_range(0.0..0.5);
            let max = rng.gen_range(min..1.0);
            VmConfig {
                cpu_usage,
                memory,
                load_model: format!(
                    "Random[min={:.3},max={:.3},interval={},seed={}]",
                    min,
                    max,
                    interval,
                    seed + i as u64
                ),
                host: None,
                count: None,
            }
        })
        .collect()
}

fn run_simulation(name: &str, config: ConsolidationConfig, output_dir: &str) -> RunSummary {
    let mut sim = ConsolidationSimulation::new(config);
    let dc = sim.datacenter_mut();
    let mut unplaced = 0;
    for vm_id in dc.vm_ids() {
        if dc.vm_host(vm_id).is_some() {
            continue;
        }
        let placed = dc.host_ids().into_iter().any(|host_id| dc.place_vm(vm_id, host_id).is_success());
        if !placed {
            unplaced += 1;
        }
    }
    if unplaced > 0 {
        log_info!(sim.context(), "[{}] {} VMs do not fit into datacenter", name, unplaced);
    }

    let summary = sim.run();
    let history_path = Path::new(output_dir).join(format!("history-{}.csv", name));
    if let Err(e) = sim.optimizer().history().save_to_csv(&history_path.to_string_lossy()) {
        log_info!(sim.context(), "[{}] can't save history: {}", name, e);
    }
    log_info!(
        sim.context(),
        "[{}] energy = {:.2} kWh, migrations = {}, active hosts = {}",
        name,
        summary.energy_consumed / 3.6e6,
        summary.migrations,
        summary.active_hosts
    );
    summary
}

fn main() {
    init_logger();

    let args = Args::parse();
    let start = Instant::now();

    let mut base_config = ConsolidationConfig::from_file(&args.config);
    base_config
        .vms
        .extend(generate_vms(args.vm_count, args.seed, base_config.scheduling_interval));
    std::fs::create_dir_all(&args.output_dir)
        .unwrap_or_else(|_| panic!("Can't create output directory {}", args.output_dir));

    let pool = ThreadPool::new(args.threads);
    let results = Arc::new(Mutex::new(Vec::new()));
    for (detection_idx, detection) in OVERLOAD_DETECTION.iter().enumerate() {
        for (selection_idx, selection) in VM_SELECTION.iter().enumerate() {
            let mut config = base_config.clone();
            config.overload_detection = detection.to_string();
            config.vm_selection = selection.to_string();
            let name = format!("{}-{}", detection_idx, selection_idx);
            let label = format!("{} + {}", detection, selection);
            let output_dir = args.output_dir.clone();
            let results = results.clone();
            pool.execute(move || {
                let summary = run_simulation(&name, config, &output_dir);
                results.lock().unwrap().push((label, summary));
            });
        }
    }
    pool.join();

    let mut results = std::mem::take(&mut *results.lock().unwrap());
    results.sort_by(|a, b| a.0.cmp(&b.0));
    let results: IndexMap<String, RunSummary> = results.into_iter().collect();
    for (label, summary) in &results {
        println!(
            "{:<70} energy = {:>10.2} kWh, migrations = {:>6}",
            label,
            summary.energy_consumed / 3.6e6,
            summary.migrations
        );
    }

    let results_path = Path::new(&args.output_dir).join("results.json");
    let file = File::create(&results_path)
        .unwrap_or_else(|_| panic!("Can't create file {}", results_path.to_string_lossy()));
    serde_json::to_writer_pretty(file, &results).expect("Can't write results");

    println!("Experiment process time {:.2?}", start.elapsed());
}

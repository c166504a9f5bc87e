//! chem-evolve CLI - Run an evolutionary search from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;

use chem_evolve::{
    compute::{
        LabeledGraph, MolGraph,
        evolution::{AcceptAll, CandidateFilter, EvolutionEngine, MaxAtoms, NoObjective},
    },
    schema::{EvolutionResult, RunConfig},
};
use log::warn;

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [generations]", args[0]);
        eprintln!();
        eprintln!("Evolve a molecular library from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to run configuration file");
        eprintln!("  generations  Override population.max_generations");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);

    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let mut config: RunConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    if let Some(generations) = args.get(2).and_then(|s| s.parse().ok()) {
        config.population.max_generations = generations;
    }

    if config.objective.optimize {
        warn!("No objective backend is built into the CLI; running in diversity mode");
        config.objective.optimize = false;
    }

    println!("chem-evolve");
    println!("===========");
    println!(
        "Library: {} (edge {}), crossovers: {}, mutations: {}",
        config.population.subset_size,
        config.population.edge_len,
        config.population.n_cross,
        config.population.n_mut
    );
    println!("Generations: {}", config.population.max_generations);
    println!();

    let result = match config.filters.max_atoms {
        Some(max_atoms) => run(config, MaxAtoms(max_atoms)),
        None => run(config, AcceptAll),
    };

    println!();
    println!("Stopped: {:?}", result.stop_reason);
    println!("Generations: {}", result.generations);
    println!("Pool size: {}", result.pool_size);
    println!("Library size: {}", result.library_size);

    let totals = result.history.operator_totals();
    println!(
        "Operators: bond flip {}/{}, atom flip {}/{}, ring add {}/{}, ring remove {}/{}, atom add {}/{}, atom remove {}/{}, no mutation {}",
        totals.bond_flip.successes(),
        totals.bond_flip.attempts,
        totals.atom_flip.successes(),
        totals.atom_flip.attempts,
        totals.ring_add.successes(),
        totals.ring_add.attempts,
        totals.ring_remove.successes(),
        totals.ring_remove.attempts,
        totals.atom_add.successes(),
        totals.atom_add.attempts,
        totals.atom_remove.successes(),
        totals.atom_remove.attempts,
        totals.no_mutation
    );
    println!("Time: {:.2}s", result.elapsed_seconds);
}

fn run<F: CandidateFilter<LabeledGraph>>(config: RunConfig, filter: F) -> EvolutionResult {
    let mut engine = EvolutionEngine::<LabeledGraph, _, _>::new(config, filter, NoObjective)
        .unwrap_or_else(|e| {
            eprintln!("Error starting run: {}", e);
            std::process::exit(1);
        });

    let result = engine.run_with_callback(|progress| {
        if let Some(stats) = &progress.last {
            println!(
                "  Gen {}/{}: {} new, {} dups, {} filtered, pool={}, library={}",
                progress.generation,
                progress.total_generations,
                stats.n_new,
                stats.n_dup,
                stats.n_filtered,
                progress.pool_size,
                progress.library_size
            );
        }
    });

    let result = result.unwrap_or_else(|e| {
        eprintln!("Error during run: {}", e);
        std::process::exit(1);
    });

    println!();
    println!("Final library:");
    for molecule in engine.library() {
        println!("  {}", molecule.graph.to_exchange());
    }
    result
}

fn print_example_config() {
    let config = RunConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}

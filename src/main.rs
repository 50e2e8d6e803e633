//! Shuffler GA CLI - Evolve a random travelling-salesman tour from JSON configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use shuffler_ga::{
    compute::{
        CpuBackend, GenerationPipeline, GenerationStreams, Population, StageBackend,
        gpu::GpuBackend,
    },
    schema::{ChromosomeDescriptor, Gene, PipelineConfig, SimpleGene},
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example_config();
        return;
    }

    let use_gpu = args.iter().any(|a| a == "--gpu");
    let positional = positional_args(&args);

    if positional.is_empty() {
        eprintln!("Usage: {} <config.json> [generations] [cities] [--gpu]", args[0]);
        eprintln!();
        eprintln!("Evolve a tour through random cities with the lock-step operator pipeline.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to pipeline configuration file");
        eprintln!("  generations  Number of generations (default: 200)");
        eprintln!("  cities       Number of cities in the tour (default: 16)");
        eprintln!("  --gpu        Run the stages on the GPU backend");
        eprintln!();
        eprintln!("Example configuration is printed with the --example flag.");
        std::process::exit(1);
    }

    let config_path = PathBuf::from(positional[0]);
    let generations: u64 = positional
        .get(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(200);
    let cities: usize = positional
        .get(2)
        .and_then(|s| s.parse().ok())
        .filter(|&c| c >= 2)
        .unwrap_or(16);

    let config = PipelineConfig::from_json_file(&config_path).unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    });

    let descriptor = Arc::new(tour_descriptor(cities));
    let mut rng = match config.random_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let points: Vec<(f32, f32)> = (0..cities).map(|_| (rng.r#gen(), rng.r#gen())).collect();

    println!("Shuffler GA");
    println!("===========");
    println!("Cities: {}", cities);
    println!("Population: {}", config.population_size);
    println!(
        "Crossover: {} ({:?}), mutation: {}",
        config.prob_crossover, config.mask_policy, config.prob_mutate
    );
    println!("Generations: {}", generations);
    println!("Backend: {}", if use_gpu { "gpu" } else { "cpu" });
    println!();

    let result = if use_gpu {
        let backend = pollster::block_on(GpuBackend::new(descriptor)).unwrap_or_else(|e| {
            eprintln!("Error creating GPU backend: {}", e);
            std::process::exit(1);
        });
        evolve(config, backend, &points, generations, &mut rng)
    } else {
        evolve(config, CpuBackend::new(descriptor), &points, generations, &mut rng)
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Arguments after the program name that are not `--` flags.
fn positional_args(args: &[String]) -> Vec<&str> {
    args.iter()
        .skip(1)
        .map(String::as_str)
        .filter(|a| !a.starts_with("--"))
        .collect()
}

/// One permutation gene per city, all sharing the city index domain.
fn tour_descriptor(cities: usize) -> ChromosomeDescriptor {
    let domain: Vec<i32> = (0..cities as i32).collect();
    let genes: Vec<Box<dyn Gene>> = (0..cities)
        .map(|_| Box::new(SimpleGene::permutation(domain.clone())) as Box<dyn Gene>)
        .collect();
    ChromosomeDescriptor::new(genes, "tour").unwrap_or_else(|e| {
        eprintln!("Error building chromosome: {}", e);
        std::process::exit(1);
    })
}

fn tour_length(points: &[(f32, f32)], tour: &[i32]) -> f32 {
    tour.iter()
        .zip(tour.iter().cycle().skip(1))
        .map(|(&a, &b)| {
            let (ax, ay) = points[a as usize];
            let (bx, by) = points[b as usize];
            ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
        })
        .sum()
}

fn evaluate(points: &[(f32, f32)], population: &Population) -> Vec<f32> {
    let gene_count = population.gene_count();
    population
        .dna()
        .par_chunks(gene_count)
        .map(|tour| 1.0 / tour_length(points, tour).max(f32::EPSILON))
        .collect()
}

fn evolve<B: StageBackend>(
    config: PipelineConfig,
    backend: B,
    points: &[(f32, f32)],
    generations: u64,
    rng: &mut StdRng,
) -> Result<(), shuffler_ga::PipelineError> {
    let cities = points.len();
    let population_size = config.population_size;
    let mut pipeline = GenerationPipeline::new(config, backend)?;

    let mut dna = Vec::with_capacity(population_size * cities);
    for _ in 0..population_size {
        let mut tour: Vec<i32> = (0..cities as i32).collect();
        tour.shuffle(rng);
        dna.extend(tour);
    }
    let mut population = Population::from_flat(dna, cities)?;

    let initial = evaluate(points, &population);
    let initial_best = initial.iter().copied().fold(f32::MIN, f32::max);
    println!("Initial best tour length: {:.4}", 1.0 / initial_best);
    println!();

    println!("Evolving...");
    let start = Instant::now();
    let mask_policy = pipeline.config().mask_policy;

    for i in 0..generations {
        let fitness = evaluate(points, &population);
        let streams = GenerationStreams::generate(rng, population_size, cities, mask_policy);
        let report = pipeline.run_generation(&mut population, &fitness, &streams)?;

        // Print progress every 10%
        if (i + 1) % (generations / 10).max(1) == 0 {
            let elapsed = start.elapsed().as_secs_f32();
            println!(
                "  Generation {}/{}: best length={:.4}, worst length={:.4}, {:.1} gen/s",
                report.generation + 1,
                generations,
                1.0 / report.summary.best.value,
                1.0 / report.summary.weakest.value,
                (i + 1) as f32 / elapsed
            );
        }
    }

    let elapsed = start.elapsed();
    let fitness = evaluate(points, &population);
    let (best_index, best) = fitness
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::MIN), |acc, (i, f)| if f > acc.1 { (i, f) } else { acc });

    println!();
    println!("Final best tour length: {:.4}", 1.0 / best);
    println!("Tour: {:?}", population.row(best_index));
    println!(
        "Time: {:.2}s ({:.1} gen/s)",
        elapsed.as_secs_f32(),
        generations as f32 / elapsed.as_secs_f32()
    );
    Ok(())
}

fn print_example_config() {
    let config = PipelineConfig {
        random_seed: Some(42),
        ..Default::default()
    };

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_flags_only_leave_no_positional() {
        assert!(positional_args(&args(&["shuffler-ga", "--gpu"])).is_empty());
        assert!(positional_args(&args(&["shuffler-ga"])).is_empty());
    }

    #[test]
    fn test_positional_skips_flags() {
        let list = args(&["shuffler-ga", "--gpu", "config.json", "50"]);
        assert_eq!(positional_args(&list), vec!["config.json", "50"]);
    }
}

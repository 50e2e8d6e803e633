//! Benchmarks for the generation pipeline.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use shuffler_ga::{
    compute::{CpuBackend, GenerationPipeline, GenerationStreams, Population},
    schema::{ChromosomeDescriptor, Gene, MaskPolicy, PipelineConfig, SimpleGene},
};

fn tour_descriptor(gene_count: usize) -> Arc<ChromosomeDescriptor> {
    let domain: Vec<i32> = (0..gene_count as i32).collect();
    let genes: Vec<Box<dyn Gene>> = (0..gene_count)
        .map(|_| Box::new(SimpleGene::permutation(domain.clone())) as Box<dyn Gene>)
        .collect();
    Arc::new(ChromosomeDescriptor::new(genes, "tour").unwrap())
}

fn random_population(rng: &mut StdRng, population_size: usize, gene_count: usize) -> Population {
    let mut dna = Vec::with_capacity(population_size * gene_count);
    for _ in 0..population_size {
        let mut row: Vec<i32> = (0..gene_count as i32).collect();
        row.shuffle(rng);
        dna.extend(row);
    }
    Population::from_flat(dna, gene_count).unwrap()
}

fn bench_run_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_generation");
    let gene_count = 32;

    for population_size in [64, 256, 1024, 4096] {
        for mask_policy in [MaskPolicy::CutPoints, MaskPolicy::Uniform] {
            let config = PipelineConfig {
                population_size,
                mask_policy,
                ..Default::default()
            };
            let mut pipeline =
                GenerationPipeline::new(config, CpuBackend::new(tour_descriptor(gene_count)))
                    .unwrap();

            let mut rng = StdRng::seed_from_u64(42);
            let mut population = random_population(&mut rng, population_size, gene_count);
            let fitness: Vec<f32> = (0..population_size).map(|i| (i % 97) as f32).collect();
            let streams =
                GenerationStreams::generate(&mut rng, population_size, gene_count, mask_policy);

            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", mask_policy), population_size),
                &population_size,
                |b, _| {
                    b.iter(|| {
                        pipeline
                            .run_generation(black_box(&mut population), &fitness, &streams)
                            .unwrap();
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_stream_generation(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    c.bench_function("generation_streams_1024x32", |b| {
        b.iter(|| {
            black_box(GenerationStreams::generate(
                &mut rng,
                1024,
                32,
                MaskPolicy::CutPoints,
            ))
        });
    });
}

criterion_group!(benches, bench_run_generation, bench_stream_generation);
criterion_main!(benches);

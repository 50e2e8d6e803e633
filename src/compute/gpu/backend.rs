//! GPU Backend - the four stage shaders over one shared bind group.

use std::sync::Arc;
use std::sync::mpsc;

use super::GpuError;
use crate::compute::selection::check_finite;
use crate::compute::{
    Extreme, PipelineError, Population, SelectionSummary, Stage, StageBackend, check_draws,
    check_len,
};
use crate::schema::{ChromosomeDescriptor, ConfigError, MaskPolicy, RatioPolicy};

// Stage bodies; each is compiled after the generated layout and the shared bindings.
const COMMON_SHADER: &str = include_str!("shaders/common.wgsl");
const CALC_RATIO_SHADER: &str = include_str!("shaders/calc_ratio.wgsl");
const PICK_MATES_SHADER: &str = include_str!("shaders/pick_mates.wgsl");
const DO_CROSSOVER_SHADER: &str = include_str!("shaders/do_crossover.wgsl");
const SINGLE_GENE_MUTATE_SHADER: &str = include_str!("shaders/single_gene_mutate.wgsl");

/// Must match `WORKGROUP_SIZE` in common.wgsl.
const WORKGROUP_SIZE: u32 = 64;

/// Params uniform plus eight storage buffers.
const BINDING_COUNT: u32 = 9;

/// Uniform buffer struct shared by every stage shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct StageParams {
    population_size: u32,
    gene_count: u32,
    draws_per_lane: u32,
    ratio_policy: u32,
    mask_policy: u32,
    ordered_fill: u32,
    protect_best: u32,
    _pad0: u32,
    probability: f32,
    _pad1: f32,
    _pad2: f32,
    _pad3: f32,
}

/// Device-side mirror of [`Extreme`].
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuExtreme {
    value: f32,
    index: u32,
}

impl From<GpuExtreme> for Extreme {
    fn from(extreme: GpuExtreme) -> Self {
        Extreme {
            value: extreme.value,
            index: extreme.index as usize,
        }
    }
}

fn ratio_code(policy: RatioPolicy) -> u32 {
    match policy {
        RatioPolicy::Linear => 0,
        RatioPolicy::Quadratic => 1,
    }
}

fn mask_code(policy: MaskPolicy) -> u32 {
    match policy {
        MaskPolicy::CutPoints => 0,
        MaskPolicy::Uniform => 1,
    }
}

/// Widest per-lane draw count any stage can ask for.
fn max_draws_per_lane(gene_count: usize) -> usize {
    [MaskPolicy::CutPoints, MaskPolicy::Uniform]
        .into_iter()
        .flat_map(|policy| {
            [Stage::Mating, Stage::Recombination, Stage::Mutation]
                .into_iter()
                .map(move |stage| stage.draws_per_lane(gene_count, policy))
        })
        .max()
        .unwrap_or(1)
}

/// Buffers bound to one population size.
struct GpuStateBuffers {
    population_size: usize,
    params: wgpu::Buffer,
    chromosomes: wgpu::Buffer,
    fitness: wgpu::Buffer,
    rnum: wgpu::Buffer,
    ratios: wgpu::Buffer,
    extremes: wgpu::Buffer,
    mates: wgpu::Buffer,
    mate_dna: wgpu::Buffer,
    cross_map: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// GPU backend running each stage as a WebGPU compute dispatch.
///
/// Every stage uploads its inputs, dispatches one invocation per lane and
/// waits for the queue before returning.
pub struct GpuBackend {
    descriptor: Arc<ChromosomeDescriptor>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    bind_group_layout: wgpu::BindGroupLayout,

    calc_ratio_pipeline: wgpu::ComputePipeline,
    pick_mates_pipeline: wgpu::ComputePipeline,
    do_crossover_pipeline: wgpu::ComputePipeline,
    single_gene_mutate_pipeline: wgpu::ComputePipeline,

    state: Option<GpuStateBuffers>,
}

impl GpuBackend {
    /// Create an unallocated GPU backend for `descriptor`.
    pub async fn new(descriptor: Arc<ChromosomeDescriptor>) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| GpuError::NoAdapter)?;

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Shuffler GA GPU"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await?;

        let bind_group_layout = create_stage_bind_group_layout(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Stage Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            ..Default::default()
        });

        let layout_source = descriptor.build_device_layout().source();
        let stage_pipeline = |label: &str, body: &str| {
            create_stage_pipeline(&device, &pipeline_layout, &layout_source, label, body)
        };
        let calc_ratio_pipeline = stage_pipeline("calc_ratio", CALC_RATIO_SHADER);
        let pick_mates_pipeline = stage_pipeline("pick_mates", PICK_MATES_SHADER);
        let do_crossover_pipeline = stage_pipeline("do_crossover", DO_CROSSOVER_SHADER);
        let single_gene_mutate_pipeline =
            stage_pipeline("single_gene_mutate", SINGLE_GENE_MUTATE_SHADER);

        log::info!(
            "gpu: compiled stage shaders for chromosome '{}' ({} genes) on {}",
            descriptor.name(),
            descriptor.gene_count(),
            adapter.get_info().name
        );

        Ok(Self {
            descriptor,
            device,
            queue,
            bind_group_layout,
            calc_ratio_pipeline,
            pick_mates_pipeline,
            do_crossover_pipeline,
            single_gene_mutate_pipeline,
            state: None,
        })
    }

    fn bound(&self) -> Result<&GpuStateBuffers, PipelineError> {
        self.state.as_ref().ok_or(PipelineError::BufferNotInitialized)
    }

    fn base_params(&self, population_size: usize, draws_per_lane: usize) -> StageParams {
        StageParams {
            population_size: population_size as u32,
            gene_count: self.descriptor.gene_count() as u32,
            draws_per_lane: draws_per_lane as u32,
            ordered_fill: u32::from(self.descriptor.is_permutation()),
            ..Default::default()
        }
    }

    fn create_storage_buffer(&self, label: &str, size: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        })
    }

    /// Write `params`, run `pipeline` and wait for the queue to drain.
    fn dispatch(
        &self,
        state: &GpuStateBuffers,
        pipeline: &wgpu::ComputePipeline,
        params: StageParams,
        workgroups: u32,
        label: &str,
    ) -> Result<(), GpuError> {
        self.queue
            .write_buffer(&state.params, 0, bytemuck::bytes_of(&params));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &state.bind_group, &[]);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.device.poll(wgpu::PollType::wait_indefinitely())?;
        Ok(())
    }

    /// Copy `count` elements out of `source` through a staging buffer.
    fn read_back<T: bytemuck::Pod>(
        &self,
        source: &wgpu::Buffer,
        count: usize,
    ) -> Result<Vec<T>, GpuError> {
        let size = (count * std::mem::size_of::<T>()) as u64;
        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(source, 0, &staging_buffer, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::PollType::wait_indefinitely())?;
        rx.recv().map_err(|_| GpuError::ReadbackChannel)??;

        let values = {
            let data = buffer_slice.get_mapped_range();
            let result: &[T] = bytemuck::cast_slice(&data);
            result.to_vec()
        };
        staging_buffer.unmap();
        Ok(values)
    }

    fn read_population(
        &self,
        state: &GpuStateBuffers,
        population: &mut Population,
    ) -> Result<(), GpuError> {
        let dna: Vec<i32> = self.read_back(&state.chromosomes, population.dna().len())?;
        population.dna_mut().copy_from_slice(&dna);
        Ok(())
    }
}

impl StageBackend for GpuBackend {
    fn descriptor(&self) -> &ChromosomeDescriptor {
        &self.descriptor
    }

    fn allocate(&mut self, population_size: usize) -> Result<(), PipelineError> {
        if population_size == 0 {
            return Err(ConfigError::InvalidPopulationSize.into());
        }
        let gene_count = self.descriptor.gene_count();
        log::info!(
            "gpu: allocating device state for {} individuals x {} genes",
            population_size,
            gene_count
        );

        let word = std::mem::size_of::<f32>() as u64;
        let lanes = population_size as u64;
        let dna_size = lanes * gene_count as u64 * word;
        let rnum_size = lanes * max_draws_per_lane(gene_count) as u64 * word;

        let params = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Stage Params"),
            size: std::mem::size_of::<StageParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let chromosomes = self.create_storage_buffer("Chromosome Buffer", dna_size);
        let fitness = self.create_storage_buffer("Fitness Buffer", lanes * word);
        let rnum = self.create_storage_buffer("Random Buffer", rnum_size);
        let ratios = self.create_storage_buffer("Ratio Buffer", lanes * word);
        let extremes = self.create_storage_buffer(
            "Extremes Buffer",
            2 * std::mem::size_of::<GpuExtreme>() as u64,
        );
        let mates = self.create_storage_buffer("Mate Buffer", lanes * word);
        let mate_dna = self.create_storage_buffer("Mate DNA Buffer", dna_size);
        let cross_map = self.create_storage_buffer("Cross Map Buffer", dna_size);

        let bind_group = {
            let buffers = [
                &params,
                &chromosomes,
                &fitness,
                &rnum,
                &ratios,
                &extremes,
                &mates,
                &mate_dna,
                &cross_map,
            ];
            let entries: Vec<wgpu::BindGroupEntry> = buffers
                .iter()
                .zip(0u32..)
                .map(|(buffer, binding)| wgpu::BindGroupEntry {
                    binding,
                    resource: buffer.as_entire_binding(),
                })
                .collect();
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Stage Bind Group"),
                layout: &self.bind_group_layout,
                entries: &entries,
            })
        };

        self.state = Some(GpuStateBuffers {
            population_size,
            params,
            chromosomes,
            fitness,
            rnum,
            ratios,
            extremes,
            mates,
            mate_dna,
            cross_map,
            bind_group,
        });
        Ok(())
    }

    fn population_size(&self) -> Option<usize> {
        self.state.as_ref().map(|state| state.population_size)
    }

    fn calc_ratio(
        &mut self,
        fitness: &[f32],
        policy: RatioPolicy,
    ) -> Result<SelectionSummary, PipelineError> {
        let state = self.bound()?;
        let n = state.population_size;
        check_len("fitness vector", n, fitness.len())?;
        check_finite(fitness)?;

        self.queue
            .write_buffer(&state.fitness, 0, bytemuck::cast_slice(fitness));
        let params = StageParams {
            ratio_policy: ratio_code(policy),
            ..self.base_params(n, 0)
        };
        self.dispatch(state, &self.calc_ratio_pipeline, params, 1, "calc_ratio")?;

        let extremes: Vec<GpuExtreme> = self.read_back(&state.extremes, 2)?;
        let summary = SelectionSummary {
            best: extremes[0].into(),
            weakest: extremes[1].into(),
        };
        if summary.is_degenerate() {
            log::debug!(
                "selection: all {} individuals share fitness {}, using uniform ratios",
                n,
                summary.best.value
            );
        }
        log::debug!(
            "calc_ratio: best {} at {}, weakest {} at {}",
            summary.best.value,
            summary.best.index,
            summary.weakest.value,
            summary.weakest.index
        );
        Ok(summary)
    }

    fn pick_mates(
        &mut self,
        population: &Population,
        fitness: &[f32],
        random: &[f32],
    ) -> Result<(), PipelineError> {
        let state = self.bound()?;
        let n = state.population_size;
        let g = self.descriptor.gene_count();
        population.check_dimensions(n, g)?;
        check_len("fitness vector", n, fitness.len())?;
        let stride = Stage::Mating.draws_per_lane(g, MaskPolicy::default());
        check_draws(Stage::Mating, n * stride, random.len())?;

        self.queue
            .write_buffer(&state.chromosomes, 0, bytemuck::cast_slice(population.dna()));
        self.queue
            .write_buffer(&state.rnum, 0, bytemuck::cast_slice(&random[..n * stride]));
        let params = self.base_params(n, stride);
        let workgroups = (n as u32).div_ceil(WORKGROUP_SIZE);
        self.dispatch(state, &self.pick_mates_pipeline, params, workgroups, "pick_mates")?;

        log::debug!("pick_mates: {} lanes", n);
        Ok(())
    }

    fn do_crossover(
        &mut self,
        population: &mut Population,
        fitness: &[f32],
        prob_crossover: f32,
        policy: MaskPolicy,
        random: &[f32],
    ) -> Result<(), PipelineError> {
        let state = self.bound()?;
        let n = state.population_size;
        let g = self.descriptor.gene_count();
        population.check_dimensions(n, g)?;
        check_len("fitness vector", n, fitness.len())?;
        let stride = Stage::Recombination.draws_per_lane(g, policy);
        check_draws(Stage::Recombination, n * stride, random.len())?;

        self.queue
            .write_buffer(&state.chromosomes, 0, bytemuck::cast_slice(population.dna()));
        self.queue
            .write_buffer(&state.fitness, 0, bytemuck::cast_slice(fitness));
        self.queue
            .write_buffer(&state.rnum, 0, bytemuck::cast_slice(&random[..n * stride]));
        let params = StageParams {
            mask_policy: mask_code(policy),
            probability: prob_crossover,
            ..self.base_params(n, stride)
        };
        let workgroups = (n as u32).div_ceil(WORKGROUP_SIZE);
        self.dispatch(
            state,
            &self.do_crossover_pipeline,
            params,
            workgroups,
            "do_crossover",
        )?;
        self.read_population(state, population)?;

        log::debug!("do_crossover: {} lanes", n);
        Ok(())
    }

    fn single_gene_mutate(
        &mut self,
        population: &mut Population,
        prob_mutate: f32,
        protect_best: Option<&[f32]>,
        random: &[f32],
    ) -> Result<(), PipelineError> {
        let state = self.bound()?;
        let n = state.population_size;
        let g = self.descriptor.gene_count();
        population.check_dimensions(n, g)?;
        let stride = Stage::Mutation.draws_per_lane(g, MaskPolicy::default());
        check_draws(Stage::Mutation, n * stride, random.len())?;
        if let Some(fitness) = protect_best {
            check_len("fitness vector", n, fitness.len())?;
            self.queue
                .write_buffer(&state.fitness, 0, bytemuck::cast_slice(fitness));
        }

        self.queue
            .write_buffer(&state.chromosomes, 0, bytemuck::cast_slice(population.dna()));
        self.queue
            .write_buffer(&state.rnum, 0, bytemuck::cast_slice(&random[..n * stride]));
        let params = StageParams {
            protect_best: u32::from(protect_best.is_some()),
            probability: prob_mutate,
            ..self.base_params(n, stride)
        };
        let workgroups = (n as u32).div_ceil(WORKGROUP_SIZE);
        self.dispatch(
            state,
            &self.single_gene_mutate_pipeline,
            params,
            workgroups,
            "single_gene_mutate",
        )?;
        self.read_population(state, population)?;

        log::debug!("single_gene_mutate: {} lanes", n);
        Ok(())
    }

    fn ratios(&self) -> Result<Vec<f32>, PipelineError> {
        let state = self.bound()?;
        Ok(self.read_back(&state.ratios, state.population_size)?)
    }

    fn mate_assignment(&self) -> Result<Vec<u32>, PipelineError> {
        let state = self.bound()?;
        Ok(self.read_back(&state.mates, state.population_size)?)
    }

    fn crossover_mask(&self) -> Result<Vec<i32>, PipelineError> {
        let state = self.bound()?;
        let len = state.population_size * self.descriptor.gene_count();
        Ok(self.read_back(&state.cross_map, len)?)
    }
}

fn create_stage_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..BINDING_COUNT)
        .map(|binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: if binding == 0 {
                    wgpu::BufferBindingType::Uniform
                } else {
                    wgpu::BufferBindingType::Storage { read_only: false }
                },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        })
        .collect();

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Stage Bind Group Layout"),
        entries: &entries,
    })
}

fn create_stage_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    layout_source: &str,
    label: &str,
    body: &str,
) -> wgpu::ComputePipeline {
    let source = format!("{layout_source}\n{COMMON_SHADER}\n{body}");
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        module: &module,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    })
}

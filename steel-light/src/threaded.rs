//! Light engine with a batched task queue.
//!
//! Callers queue work instead of touching the engine directly. Tasks are divided into
//! `PreUpdate` (setup) and `PostUpdate` (completion) phases around a full propagation
//! drain, so section bookkeeping for a chunk always lands before its light is computed
//! and completions only fire once that light is published.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use steel_utils::{BlockPos, ChunkPos, SectionPos};
use tokio::sync::oneshot;

use crate::block_state::{LightChunkGetter, LightLayer};
use crate::config::LightConfig;
use crate::data_layer::DataLayer;
use crate::error::LightError;
use crate::level_light_engine::{LevelLightEngine, LightReader};

/// Task type for light engine operations.
///
/// Tasks are executed in a specific order to ensure correct light propagation:
/// 1. All `PreUpdate` tasks of the batch run first (marking sections, queueing data)
/// 2. Light propagation runs until no work is left
/// 3. All `PostUpdate` tasks of the batch run last (retention, completions)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    /// Tasks executed before light propagation.
    PreUpdate,
    /// Tasks executed after light propagation.
    PostUpdate,
}

/// A light engine task with its associated type.
type LightTask = (TaskType, Box<dyn FnOnce(&mut LevelLightEngine) + Send>);

/// Thread-safe light engine that batches and schedules lighting operations.
pub struct ThreadedLevelLightEngine {
    /// The engines doing the propagation.
    light_engine: Mutex<LevelLightEngine>,
    /// Queued tasks waiting to be executed.
    light_tasks: Mutex<Vec<LightTask>>,
    task_per_batch: AtomicUsize,
    scheduled: AtomicBool,
    reader: LightReader,
}

impl fmt::Debug for ThreadedLevelLightEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadedLevelLightEngine")
            .field("queued_tasks", &self.light_tasks.lock().len())
            .field("task_per_batch", &self.task_per_batch.load(Ordering::Relaxed))
            .field("scheduled", &self.scheduled.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ThreadedLevelLightEngine {
    /// Creates a threaded engine reading blocks from `chunk_source`.
    pub fn new(
        chunk_source: Arc<dyn LightChunkGetter>,
        config: LightConfig,
    ) -> Result<Self, LightError> {
        let task_per_batch = config.task_per_batch;
        let engine = LevelLightEngine::new(chunk_source, config)?;
        let reader = engine.reader();
        Ok(Self {
            light_engine: Mutex::new(engine),
            light_tasks: Mutex::new(Vec::new()),
            task_per_batch: AtomicUsize::new(task_per_batch),
            scheduled: AtomicBool::new(false),
            reader,
        })
    }

    /// A reader of the published light. Never blocks on the engine.
    #[must_use]
    pub fn reader(&self) -> LightReader {
        self.reader.clone()
    }

    /// Changes how many queued tasks trigger an update.
    pub fn set_task_per_batch(&self, task_per_batch: usize) {
        self.task_per_batch
            .store(task_per_batch.max(1), Ordering::Relaxed);
    }

    /// Adds a task to the queue and runs a batch once enough tasks are waiting.
    fn add_task<F>(&self, task_type: TaskType, task: F)
    where
        F: FnOnce(&mut LevelLightEngine) + Send + 'static,
    {
        let mut tasks = self.light_tasks.lock();
        tasks.push((task_type, Box::new(task)));
        let full = tasks.len() >= self.task_per_batch.load(Ordering::Relaxed);
        drop(tasks);

        if full {
            self.run_update();
        }
    }

    /// Schedules a changed block for recomputation after the next batch's setup.
    pub fn check_block(&self, pos: BlockPos) {
        self.add_task(TaskType::PostUpdate, move |engine| engine.check_block(pos));
    }

    /// Marks a section as holding blocks or not.
    pub fn update_section_status(&self, section: SectionPos, is_empty: bool) {
        self.add_task(TaskType::PreUpdate, move |engine| {
            engine.update_section_status(section, is_empty);
        });
    }

    /// Switches sky light sources of a column on or off.
    pub fn enable_light_sources(&self, chunk: ChunkPos, enabled: bool) {
        self.add_task(TaskType::PreUpdate, move |engine| {
            engine.enable_light_sources(chunk, enabled);
        });
    }

    /// Queues a loaded light array, or drops a queued one.
    pub fn queue_section_data(
        &self,
        layer: LightLayer,
        section: SectionPos,
        data: Option<DataLayer>,
        non_edge: bool,
    ) {
        self.add_task(TaskType::PreUpdate, move |engine| {
            engine.queue_section_data(layer, section, data, non_edge);
        });
    }

    /// Keeps light arrays of a column's removed sections for reuse.
    pub fn retain_data(&self, chunk: ChunkPos, retain: bool) {
        self.add_task(TaskType::PreUpdate, move |engine| {
            engine.retain_data(chunk, retain);
        });
    }

    /// Forgets a column: queued arrays are dropped and every section is demoted.
    pub fn update_chunk_status(&self, chunk: ChunkPos) {
        self.add_task(TaskType::PreUpdate, move |engine| {
            engine.retain_data(chunk, false);
            engine.enable_light_sources(chunk, false);
            for y in engine.min_light_section()..engine.max_light_section() {
                let section = SectionPos::of_chunk(chunk, y);
                engine.queue_section_data(LightLayer::Block, section, None, true);
                engine.queue_section_data(LightLayer::Sky, section, None, true);
            }
            let build_sections = engine.config().min_section_y..engine.config().max_section_y();
            for y in build_sections {
                engine.update_section_status(SectionPos::of_chunk(chunk, y), true);
            }
        });
    }

    /// Lights a newly loaded column.
    ///
    /// `non_empty_sections` are the section Ys holding blocks and `lights` the emitting
    /// blocks with their emission. With `exclude_blocks` the emitters are assumed to be
    /// lit already (for example by loaded light arrays) and are not re-seeded. The
    /// receiver completes once the column's light has been published.
    pub fn light_chunk(
        &self,
        chunk: ChunkPos,
        non_empty_sections: Vec<i32>,
        lights: Vec<(BlockPos, u8)>,
        exclude_blocks: bool,
    ) -> Result<oneshot::Receiver<ChunkPos>, LightError> {
        if let Some(&(_, emission)) = lights.iter().find(|(_, emission)| *emission > 15) {
            return Err(LightError::InvalidLightLevel(emission));
        }

        self.add_task(TaskType::PreUpdate, move |engine| {
            for y in non_empty_sections {
                engine.update_section_status(SectionPos::of_chunk(chunk, y), false);
            }
            engine.enable_light_sources(chunk, true);
            if !exclude_blocks {
                for (pos, emission) in lights {
                    if let Err(err) = engine.on_block_emission_increase(pos, emission) {
                        log::warn!("Skipping light source at {pos:?}: {err}");
                    }
                }
            }
        });

        let (sender, receiver) = oneshot::channel();
        self.add_task(TaskType::PostUpdate, move |engine| {
            engine.retain_data(chunk, false);
            sender.send(chunk).ok();
        });
        Ok(receiver)
    }

    /// Runs up to one batch of queued tasks around a full propagation drain.
    ///
    /// The engine lock is taken before the batch is removed from the queue, so batches
    /// run in the order their tasks were queued.
    pub fn run_update(&self) {
        let mut engine = self.light_engine.lock();

        let mut tasks = self.light_tasks.lock();
        let count = tasks
            .len()
            .min(self.task_per_batch.load(Ordering::Relaxed));
        let batch: Vec<LightTask> = tasks.drain(..count).collect();
        drop(tasks);

        let (pre_update_tasks, post_update_tasks): (Vec<_>, Vec<_>) = batch
            .into_iter()
            .partition(|(task_type, _)| *task_type == TaskType::PreUpdate);

        for (_, task) in pre_update_tasks {
            task(&mut engine);
        }

        let left = engine.run_updates(usize::MAX, true, true);
        log::trace!("light batch of {count} tasks used {} steps", usize::MAX - left);

        for (_, task) in post_update_tasks {
            task(&mut engine);
        }
    }

    /// Runs a batch if there is work and no other caller is already running one.
    pub fn try_schedule_update(&self) {
        if !self.has_work() {
            return;
        }
        if self
            .scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.run_update();
            self.scheduled.store(false, Ordering::Release);
        }
    }

    /// Runs batches until neither tasks nor light work remain.
    pub fn run_until_idle(&self) {
        while self.has_work() {
            self.run_update();
        }
    }

    /// Checks if there are any pending tasks or light updates.
    #[must_use]
    pub fn has_work(&self) -> bool {
        let tasks = self.light_tasks.lock();
        let has_tasks = !tasks.is_empty();
        drop(tasks);

        let engine = self.light_engine.lock();
        let has_light_work = engine.has_light_work();
        drop(engine);

        has_tasks || has_light_work
    }

    /// Runs `f` with exclusive access to the engine.
    pub fn with_engine<T>(&self, f: impl FnOnce(&mut LevelLightEngine) -> T) -> T {
        f(&mut self.light_engine.lock())
    }
}

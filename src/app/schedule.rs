//! System scheduling and stage execution.
//!
//! This module is responsible for:
//! * grouping systems into user-named stages,
//! * building a per-stage dependency DAG from declared access sets,
//! * executing independent systems concurrently on the thread pool while
//!   preserving per-stage ordering.
//!
//! ## Scheduling model
//!
//! Stages are identified by tag types; systems register against a stage and
//! keep their registration order. When a stage is scheduled, the scheduler
//! builds a DAG over its systems with an edge `A → B` iff `A` precedes `B`
//! in registration order **and** their access sets conflict. Systems with no
//! predecessors are submitted to the pool immediately; every completion
//! decrements its successors' indegrees and submits those that reach zero.
//!
//! Stages are serialized in the order they were enqueued: a stage's DAG is
//! not built or submitted until the previous stage fully completed.
//!
//! ## Failure
//!
//! A failing system does not cancel the stage; its successors still run.
//! Failures carry stage and system identity and surface as one aggregate
//! from [`SystemSchedule::run`].

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use crate::app::access::AccessSets;
use crate::app::error::{ScheduleFailures, SystemFailure};
use crate::app::system::System;
use crate::app::world::World;
use crate::ecs::error::{EcsResult, RegistryError, ResourceError};
use crate::parallel::task::{Task, TaskCompleter};

/// Unique identifier for a stage tag type.
pub type StageId = u16;

struct StageRegistry {
    by_type: HashMap<TypeId, StageId>,
    names: Vec<&'static str>,
}

static STAGES: OnceLock<RwLock<StageRegistry>> = OnceLock::new();

fn stage_registry() -> &'static RwLock<StageRegistry> {
    STAGES.get_or_init(|| {
        RwLock::new(StageRegistry {
            by_type: HashMap::new(),
            names: Vec::new(),
        })
    })
}

/// Returns the [`StageId`] for tag type `S`, minting one on first use.
pub fn stage_id_of<S: 'static>() -> EcsResult<StageId> {
    {
        let registry = stage_registry()
            .read()
            .map_err(|_| RegistryError::PoisonedLock)?;
        if let Some(&id) = registry.by_type.get(&TypeId::of::<S>()) {
            return Ok(id);
        }
    }

    let mut registry = stage_registry()
        .write()
        .map_err(|_| RegistryError::PoisonedLock)?;
    if let Some(&id) = registry.by_type.get(&TypeId::of::<S>()) {
        return Ok(id);
    }
    let id =
        StageId::try_from(registry.names.len()).map_err(|_| ResourceError::CapacityExceeded)?;
    registry.by_type.insert(TypeId::of::<S>(), id);
    registry.names.push(type_name::<S>());
    Ok(id)
}

fn stage_name(stage: StageId) -> &'static str {
    stage_registry()
        .read()
        .map(|registry| registry.names.get(stage as usize).copied().unwrap_or("?"))
        .unwrap_or("?")
}

/// One enqueued stage execution, snapshot at run time.
struct StagePlan {
    name: &'static str,
    systems: Vec<Arc<dyn System>>,
}

/// Shared state of one executing stage DAG.
struct StageRun {
    stage: &'static str,
    world: World,
    systems: Vec<Arc<dyn System>>,
    dependents: Vec<Vec<usize>>,
    indegree: Vec<AtomicUsize>,
    remaining: AtomicUsize,
    failures: Mutex<Vec<(usize, SystemFailure)>>,
    completer: Mutex<Option<TaskCompleter<()>>>,
}

/// Submits system `index` of the stage as a pool task.
///
/// On completion the task decrements successors' indegrees, submitting those
/// that reach zero, and signals stage completion when every system has
/// terminated.
fn submit_system(run: &Arc<StageRun>, index: usize) {
    let system = Arc::clone(&run.systems[index]);
    let world = run.world.clone();
    let job_run = Arc::clone(run);

    run.world.pool().submit_future(async move {
        let run = job_run;
        let name = system.name();
        let result = system.run(world).await;

        if let Err(error) = result {
            log::error!("system {} failed in stage {}: {}", name, run.stage, error);
            run.failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((index, SystemFailure { stage: run.stage, system: name, error }));
        }

        for &dependent in &run.dependents[index] {
            if run.indegree[dependent].fetch_sub(1, Ordering::AcqRel) == 1 {
                submit_system(&run, dependent);
            }
        }

        if run.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            let completer = run
                .completer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(completer) = completer {
                completer.complete(());
            }
        }
    });
}

/// Executes one stage to completion, returning its failures keyed by system
/// registration index.
async fn run_stage(plan: StagePlan, world: World) -> Vec<(usize, SystemFailure)> {
    let count = plan.systems.len();
    if count == 0 {
        log::warn!("stage {} scheduled with no registered systems", plan.name);
        return Vec::new();
    }

    let accesses: Vec<AccessSets> = plan.systems.iter().map(|system| system.access()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut indegree = vec![0usize; count];
    for later in 0..count {
        for earlier in 0..later {
            if accesses[earlier].conflicts_with(&accesses[later]) {
                dependents[earlier].push(later);
                indegree[later] += 1;
            }
        }
    }

    let (stage_task, completer) = Task::<()>::completion();
    let run = Arc::new(StageRun {
        stage: plan.name,
        world,
        systems: plan.systems,
        dependents,
        indegree: indegree.iter().copied().map(AtomicUsize::new).collect(),
        remaining: AtomicUsize::new(count),
        failures: Mutex::new(Vec::new()),
        completer: Mutex::new(Some(completer)),
    });

    for (index, &degree) in indegree.iter().enumerate() {
        if degree == 0 {
            submit_system(&run, index);
        }
    }

    stage_task.await;

    let mut failures = std::mem::take(
        &mut *run.failures.lock().unwrap_or_else(PoisonError::into_inner),
    );
    failures.sort_by_key(|(index, _)| *index);
    failures
}

/// Stage-grouped system storage and the stage run queue.
pub struct SystemSchedule {
    stages: Vec<Vec<Arc<dyn System>>>,
    queue: Vec<StageId>,
}

impl Default for SystemSchedule {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSchedule {
    /// Creates an empty schedule.
    pub fn new() -> Self {
        Self { stages: Vec::new(), queue: Vec::new() }
    }

    fn stage_systems_mut(&mut self, stage: StageId) -> &mut Vec<Arc<dyn System>> {
        let index = stage as usize;
        if index >= self.stages.len() {
            self.stages.resize_with(index + 1, Vec::new);
        }
        &mut self.stages[index]
    }

    /// Registers a system against stage tag `S`, keeping registration order.
    pub fn add_system<S: 'static>(&mut self, system: impl System + 'static) -> EcsResult<()> {
        let stage = stage_id_of::<S>()?;
        self.stage_systems_mut(stage).push(Arc::new(system));
        Ok(())
    }

    /// Appends an execution intent for stage tag `S`.
    pub fn schedule<S: 'static>(&mut self) -> EcsResult<()> {
        self.queue.push(stage_id_of::<S>()?);
        Ok(())
    }

    /// Number of systems registered for stage tag `S`.
    pub fn system_count<S: 'static>(&self) -> EcsResult<usize> {
        let stage = stage_id_of::<S>()?;
        Ok(self
            .stages
            .get(stage as usize)
            .map_or(0, |systems| systems.len()))
    }

    /// Drains the stage queue into an awaitable that completes when every
    /// appended intent has fully executed.
    ///
    /// Stages execute strictly in enqueue order; failures aggregate across
    /// stages and surface as one [`ScheduleFailures`] value.
    pub fn run(&mut self, world: &World) -> Task<Result<(), ScheduleFailures>> {
        let plans: Vec<StagePlan> = self
            .queue
            .drain(..)
            .map(|stage| StagePlan {
                name: stage_name(stage),
                systems: self
                    .stages
                    .get(stage as usize)
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect();

        let task_world = world.clone();
        let task = Task::new(async move {
            let mut failures = Vec::new();
            for plan in plans {
                let stage_failures = run_stage(plan, task_world.clone()).await;
                failures.extend(stage_failures.into_iter().map(|(_, failure)| failure));
            }
            if failures.is_empty() {
                Ok(())
            } else {
                Err(ScheduleFailures { failures })
            }
        });
        task.start_on(world.pool());
        task
    }
}

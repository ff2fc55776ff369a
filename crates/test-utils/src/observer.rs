use std::sync::{Arc, Mutex};

use mlorch::engine::{PipelineEvent, PipelineObserver};
use mlorch::types::TaskStatus;

/// Observer that keeps every event for later assertions.
///
/// Clones share the same log, so a test can hand one clone to the pipeline
/// and inspect another afterwards.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<PipelineEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Every status a task moved through, starting from `Unsubmitted`.
    pub fn status_trail(&self, task: &str) -> Vec<TaskStatus> {
        let mut trail = vec![TaskStatus::Unsubmitted];
        for event in self.events() {
            match event {
                PipelineEvent::StatusChanged { task: t, to, .. } if t == task => trail.push(to),
                _ => {}
            }
        }
        trail
    }

    /// Task ids in the order their submissions succeeded.
    pub fn submitted(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::Submitted { task, .. } => Some(task),
                _ => None,
            })
            .collect()
    }

    /// Iteration at which a task was first seen with `status`.
    pub fn first_iteration_with(&self, task: &str, status: TaskStatus) -> Option<u64> {
        self.events().into_iter().find_map(|e| match e {
            PipelineEvent::Snapshot { iteration, tasks } => tasks
                .iter()
                .any(|row| row.id == task && row.status == status)
                .then_some(iteration),
            _ => None,
        })
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_event(&mut self, event: &PipelineEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// src/engine/pipeline.rs

use std::collections::HashSet;

use futures::future::join_all;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use super::observer::{PipelineObserver, TracingObserver};
use super::report::{PipelineOutcome, PipelineReport};
use super::{PipelineEvent, PipelineOptions, TaskSnapshot};
use crate::client::PlatformClient;
use crate::dag::TaskGraph;
use crate::errors::{PollError, SubmissionError};
use crate::task::TaskId;
use crate::types::{FailureCause, TaskStatus};

/// Drives a [`TaskGraph`] to completion against a [`PlatformClient`].
///
/// The pipeline owns the graph for the duration of the run. Submissions
/// within one iteration happen sequentially in declaration order; status
/// polls for in-flight tasks run concurrently. Every remote call is bounded
/// by `request_timeout`.
pub struct Pipeline<C, O = TracingObserver> {
    graph: TaskGraph,
    client: C,
    options: PipelineOptions,
    observer: O,
}

/// What happened to one task during a concurrent poll round.
enum PollRecord {
    Polled {
        from: TaskStatus,
        to: TaskStatus,
    },
    Errored {
        from: TaskStatus,
        to: TaskStatus,
        attempt: u32,
        error: String,
        exhausted: bool,
    },
}

impl<C: PlatformClient> Pipeline<C, TracingObserver> {
    pub fn new(graph: TaskGraph, client: C, options: PipelineOptions) -> Self {
        Self {
            graph,
            client,
            options,
            observer: TracingObserver,
        }
    }
}

impl<C: PlatformClient, O: PipelineObserver> Pipeline<C, O> {
    /// Replace the event sink.
    pub fn with_observer<P: PipelineObserver>(self, observer: P) -> Pipeline<C, P> {
        Pipeline {
            graph: self.graph,
            client: self.client,
            options: self.options,
            observer,
        }
    }

    /// Run until every task is terminal or blocked, or a budget runs out.
    ///
    /// Failures never abort the loop early: tasks that do not depend on a
    /// failed task keep running (unless `fail_fast` is set, in which case no
    /// new work is submitted once something failed). The outcome is encoded
    /// in the returned report.
    pub async fn run(mut self) -> PipelineReport {
        let started = Instant::now();
        let mut iteration: u64 = 0;
        let mut reported_blocked: HashSet<TaskId> = HashSet::new();

        self.emit(PipelineEvent::Started {
            tasks: self.graph.tasks().map(|t| t.id().to_string()).collect(),
        });

        let outcome = loop {
            iteration += 1;
            debug!(iteration, "pipeline iteration");

            if self.submissions_allowed() {
                self.submit_ready().await;
            }
            self.poll_in_flight().await;
            self.report_blocked(&mut reported_blocked);
            self.emit_snapshot(iteration);

            if self.graph.is_settled() {
                break if self.graph.failed_tasks().is_empty() && self.graph.all_terminal() {
                    PipelineOutcome::Succeeded
                } else {
                    PipelineOutcome::Failed
                };
            }

            if !self.submissions_allowed() && self.graph.in_flight().is_empty() {
                info!("fail-fast: no tasks left in flight, stopping");
                break PipelineOutcome::Failed;
            }

            if self.options.max_iterations.is_some_and(|max| iteration >= max) {
                warn!(iteration, "iteration budget exhausted");
                self.time_out_unfinished();
                break PipelineOutcome::TimedOut;
            }

            let mut nap = self.options.poll_interval;
            if let Some(limit) = self.options.timeout {
                let elapsed = started.elapsed();
                if elapsed >= limit {
                    warn!(?elapsed, "pipeline timeout reached");
                    self.time_out_unfinished();
                    break PipelineOutcome::TimedOut;
                }
                nap = nap.min(limit - elapsed);
            }

            time::sleep(nap).await;
        };

        self.emit(PipelineEvent::Finished {
            outcome,
            iterations: iteration,
        });

        PipelineReport::from_graph(&self.graph, outcome, iteration, started.elapsed())
    }

    fn submissions_allowed(&self) -> bool {
        !(self.options.fail_fast && !self.graph.failed_tasks().is_empty())
    }

    /// Submit every task that was ready at the start of this step.
    async fn submit_ready(&mut self) {
        let request_timeout = self.options.request_timeout;

        for id in self.graph.ready_tasks() {
            if !self.submissions_allowed() {
                debug!(task = %id, "fail-fast: skipping submission");
                break;
            }

            let Some(task) = self.graph.task_mut(&id) else {
                continue;
            };

            let result = match time::timeout(request_timeout, task.submit(&self.client)).await {
                Ok(result) => result,
                Err(_) => {
                    let err = SubmissionError::TimedOut(request_timeout);
                    task.fail(FailureCause::Submission(err.to_string()));
                    Err(err)
                }
            };
            let to = task.status();

            match result {
                Ok(handle) => self.observer.on_event(&PipelineEvent::Submitted {
                    task: id.clone(),
                    handle,
                }),
                Err(err) => self.observer.on_event(&PipelineEvent::SubmissionFailed {
                    task: id.clone(),
                    error: err.to_string(),
                }),
            }
            self.emit(PipelineEvent::StatusChanged {
                task: id,
                from: TaskStatus::Unsubmitted,
                to,
            });
        }
    }

    /// Poll every in-flight task concurrently.
    async fn poll_in_flight(&mut self) {
        let request_timeout = self.options.request_timeout;
        let max_failures = self.options.max_poll_failures;
        let client = &self.client;

        let polls = self
            .graph
            .tasks_mut()
            .filter(|task| task.status().is_in_flight())
            .map(move |task| async move {
                let from = task.status();
                let result = match time::timeout(request_timeout, task.refresh_status(client)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(PollError::TimedOut(request_timeout)),
                };

                let record = match result {
                    Ok(to) => PollRecord::Polled { from, to },
                    Err(err) => {
                        let exhausted = task.record_poll_failure(&err, max_failures);
                        PollRecord::Errored {
                            from,
                            to: task.status(),
                            attempt: task.poll_failures(),
                            error: err.to_string(),
                            exhausted,
                        }
                    }
                };
                (task.id().to_string(), record)
            });

        let records = join_all(polls).await;

        for (task, record) in records {
            let (from, to) = match record {
                PollRecord::Polled { from, to } => (from, to),
                PollRecord::Errored {
                    from,
                    to,
                    attempt,
                    error,
                    exhausted,
                } => {
                    self.emit(PipelineEvent::PollFailed {
                        task: task.clone(),
                        attempt,
                        error,
                        exhausted,
                    });
                    (from, to)
                }
            };
            if from != to {
                self.emit(PipelineEvent::StatusChanged { task, from, to });
            }
        }
    }

    fn report_blocked(&mut self, reported: &mut HashSet<TaskId>) {
        let newly: Vec<TaskId> = self
            .graph
            .blocked_tasks()
            .into_iter()
            .filter(|id| reported.insert(id.clone()))
            .collect();
        if !newly.is_empty() {
            self.emit(PipelineEvent::Blocked { tasks: newly });
        }
    }

    fn emit_snapshot(&mut self, iteration: u64) {
        let tasks = self
            .graph
            .tasks_with_blocked()
            .map(|(t, blocked)| TaskSnapshot {
                id: t.id().to_string(),
                kind: t.kind(),
                status: t.status(),
                blocked,
            })
            .collect();
        self.emit(PipelineEvent::Snapshot { iteration, tasks });
    }

    /// Mark every unfinished task as failed by timeout. Blocked tasks keep
    /// their `Unsubmitted` status.
    fn time_out_unfinished(&mut self) {
        let unfinished: Vec<TaskId> = self
            .graph
            .tasks_with_blocked()
            .filter(|(t, blocked)| !t.is_terminal() && !blocked)
            .map(|(t, _)| t.id().to_string())
            .collect();

        for id in unfinished {
            let Some(task) = self.graph.task_mut(&id) else {
                continue;
            };
            let from = task.status();
            if task.fail(FailureCause::TimedOut) {
                self.emit(PipelineEvent::StatusChanged {
                    task: id,
                    from,
                    to: TaskStatus::Failed,
                });
            }
        }
    }

    fn emit(&mut self, event: PipelineEvent) {
        self.observer.on_event(&event);
    }
}

// tests/pipeline_runs.rs

use std::time::Duration;

use mlorch::client::ClientError;
use mlorch::engine::{Pipeline, PipelineEvent, PipelineOptions, PipelineOutcome};
use mlorch::errors::MlorchError;
use mlorch::types::{FailureCause, TaskStatus};
use mlorch_test_utils::{
    Call, FakeClient, RecordingObserver, TaskSpecBuilder, graph, init_tracing, test_options,
};

fn transport_error() -> ClientError {
    ClientError::Transport("connection reset".to_string())
}

#[tokio::test(start_paused = true)]
async fn full_pipeline_succeeds_in_dependency_order() {
    init_tracing();
    let client = FakeClient::new();
    client.script("job_1", ["Running", "Running", "Succeeded"]);
    client.script("job_2", ["Running", "Running", "Succeeded"]);

    let g = graph(vec![
        TaskSpecBuilder::run("job_1", "hello.py job_1").build(),
        TaskSpecBuilder::run("job_2", "hello.py job_2").tier("Large").build(),
        TaskSpecBuilder::run("job_3", "hello.py job_3").build(),
        TaskSpecBuilder::model("model_1").depends_on(&["job_3"]).build(),
        TaskSpecBuilder::app("app_1").depends_on(&["model_1"]).build(),
    ]);
    let observer = RecordingObserver::new();

    let report = Pipeline::new(g, client.clone(), test_options())
        .with_observer(observer.clone())
        .run()
        .await;

    assert_eq!(report.outcome, PipelineOutcome::Succeeded);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.iterations, 3);
    assert!(report.tasks.iter().all(|t| t.status == TaskStatus::Succeeded));
    assert!(report.tasks.iter().all(|t| t.remote_handle.is_some()));
    assert_eq!(
        observer.submitted(),
        ["job_1", "job_2", "job_3", "model_1", "app_1"]
    );
    assert_eq!(observer.first_iteration_with("model_1", TaskStatus::Succeeded), Some(2));

    let events = observer.events();
    assert!(matches!(events.first(), Some(PipelineEvent::Started { tasks }) if tasks.len() == 5));
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::Finished {
            outcome: PipelineOutcome::Succeeded,
            iterations: 3
        })
    ));
    assert!(report.into_result().is_ok());
}

#[tokio::test(start_paused = true)]
async fn failed_branch_blocks_dependents_but_independent_work_finishes() {
    init_tracing();
    let client = FakeClient::new();
    client.script("A", ["Running", "Error"]);
    client.script("D", ["Running", "Running", "Running", "Succeeded"]);

    let g = graph(vec![
        TaskSpecBuilder::run("A", "a.py").build(),
        TaskSpecBuilder::run("B", "b.py").depends_on(&["A"]).build(),
        TaskSpecBuilder::run("C", "c.py").depends_on(&["B"]).build(),
        TaskSpecBuilder::run("D", "d.py").build(),
    ]);
    let observer = RecordingObserver::new();

    let report = Pipeline::new(g, client.clone(), test_options())
        .with_observer(observer.clone())
        .run()
        .await;

    assert_eq!(report.outcome, PipelineOutcome::Failed);
    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.status_of("A"), Some(TaskStatus::Failed));
    assert_eq!(report.status_of("B"), Some(TaskStatus::Unsubmitted));
    assert_eq!(report.status_of("C"), Some(TaskStatus::Unsubmitted));
    assert_eq!(report.status_of("D"), Some(TaskStatus::Succeeded));
    assert_eq!(report.blocked(), ["B", "C"]);
    assert_eq!(report.failed(), ["A"]);
    assert_eq!(client.submissions(), ["A", "D"]);

    let blocked_events: Vec<_> = observer
        .events()
        .into_iter()
        .filter(|e| matches!(e, PipelineEvent::Blocked { .. }))
        .collect();
    assert_eq!(
        blocked_events,
        vec![PipelineEvent::Blocked {
            tasks: vec!["B".to_string(), "C".to_string()]
        }]
    );

    match report.into_result() {
        Err(MlorchError::PipelineFailed { failed }) => assert_eq!(failed, ["A", "B", "C"]),
        other => panic!("expected PipelineFailed, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn submission_failure_does_not_stop_other_tasks() {
    init_tracing();
    let client = FakeClient::new();
    client.fail_submit(
        "A",
        ClientError::Rejected {
            status: 400,
            body: "unknown hardware tier".to_string(),
        },
    );

    let g = graph(vec![
        TaskSpecBuilder::run("A", "a.py").build(),
        TaskSpecBuilder::run("B", "b.py").build(),
    ]);

    let report = Pipeline::new(g, client.clone(), test_options()).run().await;

    assert_eq!(report.outcome, PipelineOutcome::Failed);
    assert_eq!(report.status_of("B"), Some(TaskStatus::Succeeded));
    let a = report.task("A").unwrap();
    assert!(a.remote_handle.is_none());
    assert!(matches!(&a.failure, Some(FailureCause::Submission(msg)) if msg.contains("hardware tier")));
}

#[tokio::test(start_paused = true)]
async fn fail_fast_stops_new_submissions() {
    init_tracing();
    let client = FakeClient::new();
    client.fail_submit("A", transport_error());
    client.script("slow", ["Running", "Succeeded"]);

    let g = graph(vec![
        TaskSpecBuilder::run("slow", "slow.py").build(),
        TaskSpecBuilder::run("A", "a.py").build(),
        TaskSpecBuilder::run("B", "b.py").build(),
    ]);
    let options = PipelineOptions {
        fail_fast: true,
        ..test_options()
    };

    let report = Pipeline::new(g, client.clone(), options).run().await;

    assert_eq!(report.outcome, PipelineOutcome::Failed);
    // Already in flight before the failure: polled to completion.
    assert_eq!(report.status_of("slow"), Some(TaskStatus::Succeeded));
    assert_eq!(report.status_of("A"), Some(TaskStatus::Failed));
    assert_eq!(report.status_of("B"), Some(TaskStatus::Unsubmitted));
    assert!(report.blocked().is_empty());
    assert_eq!(client.submissions(), ["slow", "A"]);
}

#[tokio::test(start_paused = true)]
async fn transient_poll_errors_are_retried() {
    init_tracing();
    let client = FakeClient::new();
    client
        .then_poll_error("job", transport_error())
        .then_poll_error("job", transport_error())
        .then_status("job", "Succeeded");

    let g = graph(vec![TaskSpecBuilder::run("job", "train.py").build()]);
    let observer = RecordingObserver::new();

    let report = Pipeline::new(g, client.clone(), test_options())
        .with_observer(observer.clone())
        .run()
        .await;

    assert_eq!(report.outcome, PipelineOutcome::Succeeded);
    assert_eq!(report.iterations, 3);
    assert_eq!(client.polls_of("job"), 3);

    let attempts: Vec<u32> = observer
        .events()
        .into_iter()
        .filter_map(|e| match e {
            PipelineEvent::PollFailed {
                attempt, exhausted, ..
            } => {
                assert!(!exhausted);
                Some(attempt)
            }
            _ => None,
        })
        .collect();
    assert_eq!(attempts, [1, 2]);
}

#[tokio::test(start_paused = true)]
async fn persistent_poll_errors_fail_the_task() {
    init_tracing();
    let client = FakeClient::new();
    client.then_poll_error("job", transport_error());

    let g = graph(vec![
        TaskSpecBuilder::run("job", "train.py").build(),
        TaskSpecBuilder::run("after", "report.py").depends_on(&["job"]).build(),
    ]);

    let report = Pipeline::new(g, client.clone(), test_options()).run().await;

    assert_eq!(report.outcome, PipelineOutcome::Failed);
    assert_eq!(report.iterations, 3);
    let job = report.task("job").unwrap();
    assert_eq!(job.status, TaskStatus::Failed);
    assert!(matches!(
        &job.failure,
        Some(FailureCause::PollExhausted { attempts: 3, last_error }) if last_error.contains("connection reset")
    ));
    assert!(report.task("after").unwrap().blocked);
}

#[tokio::test(start_paused = true)]
async fn hanging_poll_is_bounded_by_request_timeout() {
    init_tracing();
    let client = FakeClient::new();
    client.hang_polls("stuck");

    let g = graph(vec![TaskSpecBuilder::run("stuck", "train.py").build()]);
    let options = PipelineOptions {
        max_poll_failures: 2,
        request_timeout: Duration::from_secs(5),
        ..test_options()
    };

    let report = Pipeline::new(g, client.clone(), options).run().await;

    assert_eq!(report.outcome, PipelineOutcome::Failed);
    assert!(matches!(
        &report.task("stuck").unwrap().failure,
        Some(FailureCause::PollExhausted { attempts: 2, last_error }) if last_error.contains("timed out")
    ));
}

#[tokio::test(start_paused = true)]
async fn hanging_submission_is_bounded_by_request_timeout() {
    init_tracing();
    let client = FakeClient::new();
    client.hang_submit("stuck");

    let g = graph(vec![TaskSpecBuilder::run("stuck", "train.py").build()]);

    let report = Pipeline::new(g, client.clone(), test_options()).run().await;

    assert_eq!(report.outcome, PipelineOutcome::Failed);
    let stuck = report.task("stuck").unwrap();
    assert!(stuck.remote_handle.is_none());
    assert!(matches!(&stuck.failure, Some(FailureCause::Submission(msg)) if msg.contains("timed out")));
}

#[tokio::test(start_paused = true)]
async fn wall_clock_budget_times_out_unfinished_tasks() {
    init_tracing();
    let client = FakeClient::new();
    client.script("forever", ["Running"]);

    let g = graph(vec![
        TaskSpecBuilder::run("forever", "serve.py").build(),
        TaskSpecBuilder::run("quick", "quick.py").build(),
        TaskSpecBuilder::run("next", "next.py").depends_on(&["forever"]).build(),
    ]);
    let options = PipelineOptions {
        timeout: Some(Duration::from_secs(10)),
        ..test_options()
    };

    let report = Pipeline::new(g, client.clone(), options).run().await;

    assert_eq!(report.outcome, PipelineOutcome::TimedOut);
    assert_eq!(report.exit_code(), 1);
    assert!(report.elapsed >= Duration::from_secs(10));
    assert_eq!(report.status_of("quick"), Some(TaskStatus::Succeeded));
    for id in ["forever", "next"] {
        let task = report.task(id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed, "{id}");
        assert_eq!(task.failure, Some(FailureCause::TimedOut), "{id}");
    }

    match report.into_result() {
        Err(MlorchError::Timeout { unfinished, .. }) => assert_eq!(unfinished, ["forever", "next"]),
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn iteration_budget_times_out() {
    init_tracing();
    let client = FakeClient::new();
    client.script("forever", ["Running"]);

    let g = graph(vec![TaskSpecBuilder::run("forever", "serve.py").build()]);
    let options = PipelineOptions {
        timeout: None,
        max_iterations: Some(4),
        ..test_options()
    };

    let report = Pipeline::new(g, client.clone(), options).run().await;

    assert_eq!(report.outcome, PipelineOutcome::TimedOut);
    assert_eq!(report.iterations, 4);
    assert_eq!(client.polls_of("forever"), 4);
}

#[tokio::test(start_paused = true)]
async fn status_trails_only_move_forward() {
    init_tracing();
    let client = FakeClient::new();
    client.script("job_1", ["Queued", "Running", "Finishing", "Succeeded"]);
    client.script("job_2", ["Pending", "Failed"]);
    client.script("app_1", ["Preparing", "Running"]);

    let g = graph(vec![
        TaskSpecBuilder::run("job_1", "a.py").build(),
        TaskSpecBuilder::run("job_2", "b.py").build(),
        TaskSpecBuilder::app("app_1").depends_on(&["job_1"]).build(),
        TaskSpecBuilder::model("model_1").depends_on(&["job_2"]).build(),
    ]);
    let observer = RecordingObserver::new();

    Pipeline::new(g, client.clone(), test_options())
        .with_observer(observer.clone())
        .run()
        .await;

    for id in ["job_1", "job_2", "app_1", "model_1"] {
        let trail = observer.status_trail(id);
        for pair in trail.windows(2) {
            assert!(
                pair[0].can_advance_to(pair[1]) && pair[0] != pair[1],
                "{id}: {trail:?}"
            );
        }
    }
    assert_eq!(
        observer.status_trail("job_1"),
        [
            TaskStatus::Unsubmitted,
            TaskStatus::Submitted,
            TaskStatus::InProgress,
            TaskStatus::Succeeded
        ]
    );
    assert_eq!(observer.status_trail("model_1"), [TaskStatus::Unsubmitted]);
}

#[tokio::test(start_paused = true)]
async fn apps_are_deployed_one_at_a_time() {
    init_tracing();
    let client = FakeClient::new();
    client.with_running_app("app-legacy");

    let g = graph(vec![
        TaskSpecBuilder::app("blue").build(),
        TaskSpecBuilder::app("green").build(),
    ]);

    let report = Pipeline::new(g, client.clone(), test_options()).run().await;

    assert_eq!(report.outcome, PipelineOutcome::Succeeded);
    let app_calls: Vec<Call> = client
        .calls()
        .into_iter()
        .filter(|c| !matches!(c, Call::Status(_)))
        .collect();
    assert_eq!(
        app_calls,
        vec![
            Call::RunningApps,
            Call::UnpublishApp("app-legacy".to_string()),
            Call::CreateApp("blue".to_string()),
            Call::StartApp("app-blue".to_string()),
            Call::RunningApps,
            Call::UnpublishApp("app-blue".to_string()),
            Call::CreateApp("green".to_string()),
            Call::StartApp("app-green".to_string()),
        ]
    );
    assert_eq!(client.running_app_ids(), ["app-green"]);
}

#[tokio::test(start_paused = true)]
async fn stopped_run_fails_on_first_sighting() {
    init_tracing();
    let client = FakeClient::new();
    client.script("job", ["Running", "Stopped"]);

    let g = graph(vec![TaskSpecBuilder::run("job", "train.py").build()]);
    let report = Pipeline::new(g, client.clone(), test_options()).run().await;

    assert_eq!(report.outcome, PipelineOutcome::Failed);
    assert_eq!(report.iterations, 2);
    assert_eq!(client.polls_of("job"), 2);
    assert!(matches!(
        &report.task("job").unwrap().failure,
        Some(FailureCause::Remote(status)) if status == "Stopped"
    ));
}

#[tokio::test(start_paused = true)]
async fn empty_graph_succeeds_immediately() {
    init_tracing();
    let client = FakeClient::new();

    let report = Pipeline::new(graph(vec![]), client.clone(), test_options())
        .run()
        .await;

    assert_eq!(report.outcome, PipelineOutcome::Succeeded);
    assert_eq!(report.iterations, 1);
    assert!(report.tasks.is_empty());
    assert!(client.calls().is_empty());
}

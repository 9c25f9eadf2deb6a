//! The fetch/dispatch loop

use std::time::Duration;

use runloop_engine::{
    DispatchError, FetchError, Invocation, Outcome, SendError, StatusError, StepReport,
    handler_fn,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{
    mount_error_ack, mount_next_invocation, mount_next_status, mount_response_ack, requests_to,
    response_path, runtime_for, start_runtime_mock,
};

fn succeed() -> impl runloop_engine::Handler<Error = SendError> {
    handler_fn::<_, SendError>(|_ctx, _invocation: &mut Invocation| {
        Box::pin(async move { Ok::<(), SendError>(()) })
    })
}

#[tokio::test]
async fn failed_fetch_is_reported_and_not_counted() {
    let server = start_runtime_mock().await;
    mount_next_status(&server, 503).await;

    let mut runtime = runtime_for(&server);
    let mut invocation = Invocation::new();
    let report = runtime.step(&mut invocation, &succeed()).await;

    assert!(matches!(
        report,
        StepReport::FetchFailed(FetchError::Status(StatusError::Server(503)))
    ));
    assert_eq!(runtime.invocations(), 0);
}

#[tokio::test]
async fn successful_steps_count_invocations() {
    let server = start_runtime_mock().await;
    mount_next_invocation(&server, "abc123", "{}").await;
    mount_response_ack(&server, "abc123", 202, 2).await;

    let mut runtime = runtime_for(&server);
    let mut invocation = Invocation::new();
    let handler = succeed();

    match runtime.step(&mut invocation, &handler).await {
        StepReport::Dispatched {
            count,
            request_id,
            result,
            ..
        } => {
            assert_eq!(count, 1);
            assert_eq!(request_id.as_str(), "abc123");
            assert!(matches!(result, Ok(Outcome::Succeeded)));
        }
        other => panic!("expected a dispatch, got {other:?}"),
    }

    let report = runtime.step(&mut invocation, &handler).await;
    assert!(matches!(report, StepReport::Dispatched { count: 2, .. }));
    assert_eq!(runtime.invocations(), 2);
}

#[tokio::test]
async fn failed_delivery_is_reported_as_unhandled() {
    let server = start_runtime_mock().await;
    mount_next_invocation(&server, "abc123", "{}").await;
    mount_response_ack(&server, "abc123", 500, 1).await;

    let mut runtime = runtime_for(&server);
    let mut invocation = Invocation::new();
    let report = runtime.step(&mut invocation, &succeed()).await;

    assert!(matches!(
        report,
        StepReport::Dispatched {
            result: Err(DispatchError::Respond(SendError::Rejected(
                StatusError::Server(500)
            ))),
            ..
        }
    ));
}

#[tokio::test]
async fn run_serves_invocations_until_stopped() {
    let server = start_runtime_mock().await;
    mount_next_invocation(&server, "abc123", "ping").await;
    Mock::given(method("POST"))
        .and(path(response_path("abc123")))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let runtime = runtime_for(&server);
    let echo = handler_fn::<_, SendError>(|_ctx, invocation: &mut Invocation| {
        Box::pin(async move {
            let body = invocation.body().to_vec();
            invocation.respond_bytes(body).await
        })
    });
    let task = tokio::spawn(async move {
        runtime.run(echo).await;
    });

    let served = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let sent = requests_to(&server, &response_path("abc123")).await;
            if sent.len() >= 2 {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("loop should keep serving invocations");
    task.abort();

    assert!(served.iter().all(|req| req.body == b"ping"));
}

#[derive(Debug, thiserror::Error)]
#[error("widget jammed")]
struct Jammed;

fn explode(message: &str) -> Result<(), Jammed> {
    panic!("{message}")
}

#[tokio::test]
async fn repeated_fetch_failures_escalate_backoff() {
    let server = start_runtime_mock().await;
    mount_next_status(&server, 503).await;

    let mut runtime = runtime_for(&server);
    let mut invocation = Invocation::new();
    let handler = succeed();
    for _ in 0..4 {
        runtime.step(&mut invocation, &handler).await;
    }

    assert_eq!(runtime.backoff().fail_count(), 4);
    assert_eq!(runtime.backoff().fail_wait(), Duration::from_millis(50));
}

#[tokio::test]
async fn reported_handler_error_does_not_back_off() {
    let server = start_runtime_mock().await;
    mount_next_invocation(&server, "abc123", "{}").await;
    mount_error_ack(&server, "abc123", 202, 1).await;

    let mut runtime = runtime_for(&server);
    let mut invocation = Invocation::new();
    let handler = handler_fn::<_, Jammed>(|_ctx, _invocation: &mut Invocation| {
        Box::pin(async move { Err::<(), _>(Jammed) })
    });

    let report = runtime.step(&mut invocation, &handler).await;
    assert!(matches!(
        report,
        StepReport::Dispatched {
            result: Ok(Outcome::Failed(_)),
            ..
        }
    ));
    assert_eq!(runtime.backoff().fail_count(), 0);
}

#[tokio::test]
async fn reported_panic_does_not_back_off() {
    let server = start_runtime_mock().await;
    mount_next_invocation(&server, "abc123", "{}").await;
    mount_error_ack(&server, "abc123", 202, 1).await;

    let mut runtime = runtime_for(&server);
    let mut invocation = Invocation::new();
    let handler = handler_fn::<_, Jammed>(|_ctx, _invocation: &mut Invocation| {
        Box::pin(async move { explode("boom") })
    });

    let report = runtime.step(&mut invocation, &handler).await;
    assert!(matches!(
        report,
        StepReport::Dispatched {
            result: Ok(Outcome::Panicked(_)),
            ..
        }
    ));
    assert_eq!(runtime.backoff().fail_count(), 0);
}

#[tokio::test]
async fn rejected_acknowledgement_backs_off() {
    let server = start_runtime_mock().await;
    mount_next_invocation(&server, "abc123", "{}").await;
    mount_response_ack(&server, "abc123", 500, 1).await;

    let mut runtime = runtime_for(&server);
    let mut invocation = Invocation::new();
    runtime.step(&mut invocation, &succeed()).await;

    assert_eq!(runtime.backoff().fail_count(), 1);
    assert_eq!(runtime.backoff().fail_wait(), Duration::ZERO);
}

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chat_session::{
    ChatSession, SendConfig, SendHooks, SendOutcome, SessionOptions, SessionStatus,
    STOPPED_PLACEHOLDER,
};
use support::{
    content_frame, wait_until, CountingIds, RecordingSink, Script, ScriptedTransport, Step,
};

fn harness_with_interval(
    flush_interval: Duration,
) -> (ChatSession, Arc<ScriptedTransport>, Arc<RecordingSink>) {
    let transport = Arc::new(ScriptedTransport::new());
    let sink = Arc::new(RecordingSink::new());
    let session = ChatSession::with_options(
        Arc::clone(&transport) as Arc<dyn chat_session::ChatTransport>,
        SessionOptions {
            notice_sink: Arc::clone(&sink) as Arc<dyn chat_session::NoticeSink>,
            id_source: Arc::new(CountingIds::default()),
            flush_interval,
        },
    );
    (session, transport, sink)
}

fn spawn_send(
    session: &ChatSession,
    successes: &Arc<AtomicUsize>,
    errors: &Arc<Mutex<Vec<String>>>,
) -> tokio::task::JoinHandle<Result<SendOutcome, chat_session::SessionError>> {
    let session = session.clone();
    let successes = Arc::clone(successes);
    let errors = Arc::clone(errors);
    tokio::spawn(async move {
        let mut on_success = move || {
            successes.fetch_add(1, Ordering::SeqCst);
        };
        let mut on_error = move |message: &str| {
            errors.lock().unwrap().push(message.to_string());
        };
        let mut hooks = SendHooks {
            on_success: Some(&mut on_success),
            on_error: Some(&mut on_error),
        };
        session
            .send_message("Hello", &SendConfig::new("m"), &mut hooks)
            .await
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_after_one_delta_keeps_exactly_that_delta() {
    let (session, transport, sink) = harness_with_interval(Duration::ZERO);
    transport.push_script(Script::completing(vec![
        content_frame("He"),
        Step::AwaitCancel,
    ]));

    let successes = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let task = spawn_send(&session, &successes, &errors);

    wait_until(|| {
        session
            .messages()
            .last()
            .is_some_and(|message| message.content == "He")
    })
    .await;

    session.stop_generating();
    // Synchronous from the caller's perspective: settled before the task joins.
    assert_eq!(session.status(), SessionStatus::Idle);
    let messages = session.messages();
    assert_eq!(messages[1].content, "He");
    assert!(!messages[1].streaming);

    let outcome = task.await.expect("task joins").expect("stop is not an error");
    assert_eq!(outcome, SendOutcome::Stopped);
    assert_eq!(successes.load(Ordering::SeqCst), 0);
    assert!(errors.lock().unwrap().is_empty());
    assert!(sink.recorded().is_empty(), "cancellation raises no user-visible error");
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_force_flushes_deltas_still_held_by_the_throttle() {
    let (session, transport, _sink) = harness_with_interval(Duration::from_secs(3600));
    transport.push_script(Script::completing(vec![
        content_frame("He"),
        content_frame("llo"),
        Step::AwaitCancel,
    ]));

    let successes = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let task = spawn_send(&session, &successes, &errors);

    // First flush is always due, so "He" lands; "llo" stays buffered behind
    // the hour-long interval until stop forces it out.
    wait_until(|| {
        session
            .messages()
            .last()
            .is_some_and(|message| message.content == "He")
    })
    .await;

    session.stop_generating();
    assert_eq!(session.messages()[1].content, "Hello");

    let outcome = task.await.expect("task joins").expect("stop is not an error");
    assert_eq!(outcome, SendOutcome::Stopped);
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_with_no_content_substitutes_terminated_placeholder() {
    let (session, transport, _sink) = harness_with_interval(Duration::ZERO);
    transport.push_script(Script::completing(vec![Step::AwaitCancel]));

    let successes = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let task = spawn_send(&session, &successes, &errors);

    wait_until(|| session.status() == SessionStatus::Streaming).await;
    session.stop_generating();

    let messages = session.messages();
    assert_eq!(messages[1].content, STOPPED_PLACEHOLDER);
    assert!(!messages[1].streaming);
    assert_eq!(session.status(), SessionStatus::Idle);

    task.await.expect("task joins").expect("stop is not an error");
}

#[tokio::test(flavor = "multi_thread")]
async fn at_most_one_message_streams_at_any_time() {
    let (session, transport, _sink) = harness_with_interval(Duration::ZERO);
    transport.push_script(Script::completing(vec![
        content_frame("a"),
        Step::AwaitCancel,
    ]));

    let successes = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let task = spawn_send(&session, &successes, &errors);

    wait_until(|| session.status() == SessionStatus::Streaming).await;
    let streaming = session
        .messages()
        .iter()
        .filter(|message| message.streaming)
        .count();
    assert_eq!(streaming, 1);

    session.stop_generating();
    task.await.expect("task joins").expect("stop is not an error");
    assert!(session.messages().iter().all(|message| !message.streaming));
}

#[tokio::test(flavor = "multi_thread")]
async fn clear_cancels_the_inflight_transport_before_resetting() {
    let (session, transport, sink) = harness_with_interval(Duration::ZERO);
    transport.push_script(Script::completing(vec![
        content_frame("partial"),
        Step::AwaitCancel,
    ]));

    let successes = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let task = spawn_send(&session, &successes, &errors);

    wait_until(|| session.status() == SessionStatus::Streaming).await;
    session.clear_messages();

    assert!(session.messages().is_empty());
    assert!(session.conversation_id().is_none());
    assert!(session.last_error().is_none());
    assert_eq!(session.status(), SessionStatus::Idle);

    let outcome = task.await.expect("task joins").expect("clear is not an error");
    assert_eq!(outcome, SendOutcome::Stopped);
    assert_eq!(successes.load(Ordering::SeqCst), 0);
    assert!(errors.lock().unwrap().is_empty());
    assert!(sink.recorded().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_without_an_active_run_is_a_no_op() {
    let (session, _transport, sink) = harness_with_interval(Duration::ZERO);

    session.stop_generating();

    assert_eq!(session.status(), SessionStatus::Idle);
    assert!(session.messages().is_empty());
    assert!(sink.recorded().is_empty());
}

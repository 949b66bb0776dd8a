use actor_dispatch::mock::{ManualScheduler, ResponseRecorder};
use actor_dispatch::{
    BlockingWaiter, Completion, Response, ResponseStatus, TaskScheduler, TimerWaiter,
    TokioScheduler, Value, ValueKind,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

const RACERS: usize = 16;

/// Races `RACERS` threads completing the same waiter; returns how many claimed it.
fn race(completion: Arc<dyn Completion>) -> usize {
    let barrier = Arc::new(Barrier::new(RACERS));
    let claimed = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..RACERS)
        .map(|i| {
            let completion = Arc::clone(&completion);
            let barrier = Arc::clone(&barrier);
            let claimed = Arc::clone(&claimed);
            thread::spawn(move || {
                barrier.wait();
                if completion.complete(Response::ok(i as i64)) == Ok(true) {
                    claimed.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    claimed.load(Ordering::SeqCst)
}

#[test]
fn test_blocking_waiter_accepts_exactly_one_result() {
    let waiter = Arc::new(BlockingWaiter::new("race", Some(ValueKind::Int), Duration::from_secs(5)));
    assert_eq!(race(Arc::clone(&waiter) as Arc<dyn Completion>), 1);

    let response = waiter.wait_for_result();
    assert_eq!(response.status(), ResponseStatus::Ok);
    assert_eq!(response.data().and_then(Value::as_int).map(|n| n < RACERS as i64), Some(true));
    assert!(waiter.has_completed());
    assert!(!waiter.is_timed_out());
}

#[test]
fn test_timer_waiter_delivers_exactly_one_result() {
    let scheduler = ManualScheduler::new();
    let recorder = ResponseRecorder::new();
    let waiter = TimerWaiter::new(
        "race",
        Some(ValueKind::Int),
        Duration::from_secs(5),
        Arc::new(scheduler.clone()),
        recorder.callback(),
    );
    waiter.arm();
    assert_eq!(race(Arc::new(waiter.clone())), 1);

    assert_eq!(recorder.statuses(), vec![ResponseStatus::Ok]);
    assert_eq!(scheduler.pending_count(), 0);
    assert!(!waiter.accept(Response::status_only(ResponseStatus::Accepted)));
    assert_eq!(recorder.len(), 1);
}

#[test]
fn test_result_racing_timeout_on_blocking_waiter() {
    for _ in 0..20 {
        let waiter = Arc::new(BlockingWaiter::new("edge", None, Duration::from_millis(5)));
        let completer = Arc::clone(&waiter);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            completer.complete(Response::ok("maybe"))
        });
        let response = waiter.wait_for_result();
        let claimed = handle.join().unwrap().unwrap();

        match response.status() {
            ResponseStatus::Ok => assert!(claimed && !waiter.is_timed_out()),
            ResponseStatus::Timeout => assert!(!claimed && waiter.is_timed_out()),
            other => panic!("unexpected status {other}"),
        }
    }
}

#[test]
fn test_timer_waiter_rearm_supersedes_previous_timer() {
    let scheduler = ManualScheduler::new();
    let recorder = ResponseRecorder::new();
    let waiter = TimerWaiter::new(
        "rearm",
        None,
        Duration::from_millis(100),
        Arc::new(scheduler.clone()),
        recorder.callback(),
    );
    waiter.arm();
    waiter.set_timeout(Duration::from_millis(500));

    assert_eq!(scheduler.pending_count(), 1);
    assert_eq!(
        scheduler.delays(),
        vec![Duration::from_millis(500)]
    );
    assert_eq!(waiter.timeout(), Duration::from_millis(500));
    assert_eq!(scheduler.fire_all(), 1);
    assert_eq!(recorder.statuses(), vec![ResponseStatus::Timeout]);
}

#[test]
fn test_wrong_payload_type_consumes_the_slot() {
    let waiter = BlockingWaiter::new("typed", Some(ValueKind::Text), Duration::from_secs(1));
    assert!(waiter.complete(Response::ok(1.5)).is_err());
    assert_eq!(waiter.complete(Response::ok("fine")), Ok(false));
    assert_eq!(waiter.wait_for_result().status(), ResponseStatus::Exception);
}

#[test]
fn test_null_payload_passes_type_check() {
    let waiter = BlockingWaiter::new("typed", Some(ValueKind::Text), Duration::from_secs(1));
    assert_eq!(
        waiter.complete(Response::new(ResponseStatus::Ok, None, None, Some(Value::Null))),
        Ok(true)
    );
    assert_eq!(waiter.wait_for_result().status(), ResponseStatus::Ok);
}

/// Timer waiter on the real tokio scheduler.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timer_waiter_times_out_on_tokio() {
    let scheduler = TokioScheduler::try_current().expect("inside a runtime");
    let recorder = ResponseRecorder::new();
    let started = Instant::now();
    let waiter = TimerWaiter::new(
        "tokio",
        None,
        Duration::from_millis(50),
        Arc::new(scheduler.clone()) as Arc<dyn TaskScheduler>,
        recorder.callback(),
    );
    waiter.arm();
    assert!(waiter.accept(Response::status_only(ResponseStatus::Accepted)));

    let waiting = recorder.clone();
    let terminal = tokio::task::spawn_blocking(move || {
        waiting.wait_for_terminal(Duration::from_secs(5))
    })
    .await
    .expect("Failed to join waiting task")
    .expect("Timer never fired");

    assert_eq!(terminal.status(), ResponseStatus::Timeout);
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert_eq!(
        recorder.statuses(),
        vec![ResponseStatus::Accepted, ResponseStatus::Timeout]
    );
    assert_eq!(waiter.complete(Response::ok("late")), Ok(false));
    assert_eq!(scheduler.pending_count(), 0);
}

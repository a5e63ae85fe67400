//! Integration tests for admission and dispatch ordering.
//!
//! Tests run on tokio's current-thread runtime, so everything submitted
//! before the first `.await` is queued before the run loop takes a turn.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};

use ordo_executor::{Executor, MemorySink, TaskError, TaskSpec};

const TIMEOUT: Duration = Duration::from_secs(5);

type Journal = Arc<Mutex<Vec<String>>>;

fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

/// Helper: occupy the executor's only slot until `release` fires.
async fn occupy(executor: &Executor) -> (oneshot::Sender<()>, ordo_executor::TaskHandle<(), ()>) {
    let (started_tx, started_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let handle = executor.submit_task(
        TaskSpec::new(move || async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
            Ok(())
        })
        .name("blocker"),
    );
    timeout(TIMEOUT, started_rx)
        .await
        .expect("blocker never started")
        .unwrap();
    (release_tx, handle)
}

#[tokio::test]
async fn running_never_exceeds_limit() {
    let executor = Executor::new(3).unwrap();
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let current = current.clone();
            let peak = peak.clone();
            executor.submit_task(
                TaskSpec::new(move || async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(5)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, ()>(i)
                })
                .priority(i % 4),
            )
        })
        .collect();

    timeout(TIMEOUT, async {
        for handle in handles {
            handle.await.unwrap();
        }
    })
    .await
    .expect("timed out");

    assert_eq!(peak.load(Ordering::SeqCst), 3);
    assert_eq!(current.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn higher_priority_starts_first_when_slot_frees() {
    let executor = Executor::new(1).unwrap();
    let order = journal();
    let (release, blocker) = occupy(&executor).await;

    let handles: Vec<_> = [("a", 0), ("b", 0), ("c", 5), ("d", 0), ("e", 0)]
        .into_iter()
        .map(|(name, priority)| {
            let order = order.clone();
            executor.submit_task(
                TaskSpec::new(move || async move {
                    order.lock().unwrap().push(name.to_string());
                    Ok::<_, ()>(())
                })
                .name(name)
                .priority(priority),
            )
        })
        .collect();

    release.send(()).unwrap();
    timeout(TIMEOUT, async {
        blocker.await.unwrap();
        for handle in handles {
            handle.await.unwrap();
        }
    })
    .await
    .expect("timed out");

    assert_eq!(entries(&order), vec!["c", "a", "b", "d", "e"]);
}

#[tokio::test]
async fn equal_priority_runs_in_submission_order() {
    let executor = Executor::new(1).unwrap();
    let order = journal();

    let handles: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(|name| {
            let order = order.clone();
            executor.submit_task(
                TaskSpec::new(move || async move {
                    order.lock().unwrap().push(name.to_string());
                    Ok::<_, ()>(())
                })
                .name(name)
                .priority(2),
            )
        })
        .collect();

    timeout(TIMEOUT, async {
        for handle in handles {
            handle.await.unwrap();
        }
    })
    .await
    .expect("timed out");

    assert_eq!(entries(&order), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn burst_with_limit_two_starts_priority_task_first() {
    let sink = MemorySink::new();
    let executor = Executor::builder()
        .concurrency(2)
        .log_sink(Arc::new(sink.clone()))
        .build()
        .unwrap();

    let handles: Vec<_> = [0, 0, 5, 0, 0]
        .into_iter()
        .enumerate()
        .map(|(i, priority)| {
            executor.submit_task(
                TaskSpec::new(|| async {
                    sleep(Duration::from_millis(5)).await;
                    Ok::<_, ()>(())
                })
                .name(format!("task{}", i + 1))
                .priority(priority),
            )
        })
        .collect();

    timeout(TIMEOUT, async {
        for handle in handles {
            handle.await.unwrap();
        }
    })
    .await
    .expect("timed out");

    assert_eq!(
        sink.started(),
        vec!["task3", "task1", "task2", "task4", "task5"]
    );
}

#[tokio::test]
async fn limit_one_waits_for_previous_to_settle() {
    let executor = Executor::new(1).unwrap();
    let order = journal();

    let first = {
        let order = order.clone();
        executor.submit(move || async move {
            order.lock().unwrap().push("first:start".into());
            sleep(Duration::from_millis(20)).await;
            order.lock().unwrap().push("first:end".into());
            Err::<(), _>("first failed")
        })
    };
    let second = {
        let order = order.clone();
        executor.submit(move || async move {
            order.lock().unwrap().push("second:start".into());
            Ok::<_, &str>(())
        })
    };

    timeout(TIMEOUT, async {
        assert_eq!(first.await.unwrap_err().into_failure(), Some("first failed"));
        second.await.unwrap();
    })
    .await
    .expect("timed out");

    assert_eq!(
        entries(&order),
        vec!["first:start", "first:end", "second:start"]
    );
}

#[tokio::test]
async fn failures_are_isolated_per_task() {
    let executor = Executor::new(2).unwrap();

    let failing = executor.submit(|| async { Err::<u32, _>("io error".to_string()) });
    let panicking = executor.submit(|| async {
        if true {
            panic!("worker exploded");
        }
        Ok::<u32, String>(0)
    });
    let fine = executor.submit(|| async { Ok::<_, String>(10) });

    timeout(TIMEOUT, async {
        match failing.await {
            Err(TaskError::Failed(e)) => assert_eq!(e, "io error"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(panicking.await.unwrap_err().is_panic());
        assert_eq!(fine.await.unwrap(), 10);

        // The executor keeps accepting work afterwards.
        let later = executor.submit(|| async { Ok::<_, String>(11) });
        assert_eq!(later.await.unwrap(), 11);
    })
    .await
    .expect("timed out");

    let stats = executor.stats().await.unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.panicked, 1);
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.running, 0);
}

#[tokio::test]
async fn submit_all_preserves_submission_order() {
    let executor = Executor::new(3).unwrap();

    let delays = [30u64, 5, 0];
    let works = delays.into_iter().enumerate().map(|(i, delay)| {
        move || async move {
            sleep(Duration::from_millis(delay)).await;
            Ok::<_, String>(i + 1)
        }
    });

    let results = timeout(TIMEOUT, executor.submit_all(works))
        .await
        .expect("timed out")
        .unwrap();
    assert_eq!(results, vec![1, 2, 3]);
}

#[tokio::test]
async fn submit_all_rejects_with_first_failure() {
    let executor = Executor::new(2).unwrap();
    let finished = Arc::new(AtomicUsize::new(0));

    let works: Vec<_> = [Err("f1 failed"), Ok(2)]
        .into_iter()
        .map(|outcome| {
            let finished = finished.clone();
            move || async move {
                if outcome.is_ok() {
                    sleep(Duration::from_millis(10)).await;
                }
                finished.fetch_add(1, Ordering::SeqCst);
                outcome
            }
        })
        .collect();

    let err = timeout(TIMEOUT, executor.submit_all(works))
        .await
        .expect("timed out")
        .unwrap_err();
    assert_eq!(err.into_failure(), Some("f1 failed"));

    // The sibling still runs to completion.
    timeout(TIMEOUT, async {
        while finished.load(Ordering::SeqCst) < 2 {
            sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("sibling never finished");
}

#[tokio::test]
async fn submit_all_rejects_large_batch_without_waiting_on_earlier_tasks() {
    const TASKS: usize = 35;
    let executor = Executor::new(40).unwrap();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let mut gate = Some(release_rx);

    let works: Vec<_> = (0..TASKS)
        .map(|i| {
            let held = gate.take();
            move || async move {
                if let Some(release) = held {
                    let _ = release.await;
                }
                if i == TASKS - 1 {
                    return Err(format!("task {i} failed"));
                }
                Ok(i)
            }
        })
        .collect();

    // Task 0 is still held open, so this only resolves if the last task's
    // failure is reported as soon as it settles.
    let err = timeout(Duration::from_millis(300), executor.submit_all(works))
        .await
        .expect("failure was held back behind an unsettled task")
        .unwrap_err();
    assert_eq!(err.into_failure().as_deref(), Some("task 34 failed"));

    release_tx.send(()).unwrap();
    timeout(TIMEOUT, async {
        while executor.stats().await.unwrap().completed() < TASKS as u64 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out");
}

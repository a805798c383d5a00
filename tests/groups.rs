//! Concurrency groups: mutual exclusion between members, dominance over
//! priority, and independence between different groups.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;

use taskloom::{TaskError, TaskGroup, TaskPriority, TaskScheduler, TaskSpec};

type Log = Arc<Mutex<Vec<&'static str>>>;

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn push(log: &Log, entry: &'static str) {
    log.lock().unwrap().push(entry);
}

fn snapshot(log: &Log) -> Vec<&'static str> {
    log.lock().unwrap().clone()
}

async fn breathe() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn group_occupancy_dominates_priority() {
    let scheduler = TaskScheduler::new();
    scheduler.start();
    let log = log();

    let (tx, rx) = oneshot::channel::<()>();
    let mut rx = Some(rx);
    let first = scheduler.queue_task(
        TaskSpec::new(TaskPriority::Low, {
            let log = log.clone();
            move |ctx| {
                let log = log.clone();
                let rx = rx.take();
                async move {
                    push(&log, "1a");
                    if let Some(rx) = rx {
                        let _ = ctx.wait_for(rx).await?;
                    }
                    push(&log, "1b");
                    Ok::<_, TaskError>(())
                }
            }
        })
        .with_group(TaskGroup::new("port")),
    );

    breathe().await;
    // The Low task occupies the group; a High sibling must still wait.
    let second = scheduler.queue_task(
        TaskSpec::new(TaskPriority::High, {
            let log = log.clone();
            move |_ctx| {
                let log = log.clone();
                async move {
                    push(&log, "2a");
                    Ok::<_, TaskError>(())
                }
            }
        })
        .with_group(TaskGroup::new("port")),
    );

    breathe().await;
    assert_eq!(snapshot(&log), vec!["1a"]);

    tx.send(()).unwrap();
    first.await.unwrap();
    second.await.unwrap();
    assert_eq!(snapshot(&log), vec!["1a", "1b", "2a"]);
}

#[tokio::test]
async fn paused_occupant_keeps_the_group_across_checkpoints() {
    let scheduler = TaskScheduler::new();
    scheduler.start();
    let log = log();

    let (started_tx, started_rx) = oneshot::channel::<()>();
    let (ack_tx, ack_rx) = oneshot::channel::<()>();

    let first = scheduler.queue_task(
        TaskSpec::new(TaskPriority::Normal, {
            let log = log.clone();
            let mut gate = Some((started_tx, ack_rx));
            move |ctx| {
                let log = log.clone();
                let gate = gate.take();
                async move {
                    push(&log, "1a");
                    if let Some((started, ack)) = gate {
                        let _ = started.send(());
                        let _ = ack.await;
                    }
                    ctx.checkpoint().await;
                    push(&log, "1b");
                    Ok::<_, TaskError>(())
                }
            }
        })
        .with_group(TaskGroup::new("port")),
    );

    started_rx.await.unwrap();
    let second = scheduler.queue_task(
        TaskSpec::new(TaskPriority::High, {
            let log = log.clone();
            move |_ctx| {
                let log = log.clone();
                async move {
                    push(&log, "2a");
                    Ok::<_, TaskError>(())
                }
            }
        })
        .with_group(TaskGroup::new("port")),
    );
    breathe().await;
    ack_tx.send(()).unwrap();

    first.await.unwrap();
    second.await.unwrap();
    // A checkpoint does not release the group slot.
    assert_eq!(snapshot(&log), vec!["1a", "1b", "2a"]);
}

#[tokio::test(start_paused = true)]
async fn different_groups_run_independently() {
    let scheduler = TaskScheduler::new();
    scheduler.start();
    let log = log();

    let first = scheduler.queue_task(
        TaskSpec::new(TaskPriority::Normal, {
            let log = log.clone();
            move |ctx| {
                let log = log.clone();
                async move {
                    push(&log, "1a");
                    ctx.wait_for(tokio::time::sleep(Duration::from_millis(50))).await?;
                    push(&log, "1b");
                    Ok::<_, TaskError>(())
                }
            }
        })
        .with_group(TaskGroup::new("port-a")),
    );

    let second = scheduler.queue_task(
        TaskSpec::new(TaskPriority::Normal, {
            let log = log.clone();
            move |_ctx| {
                let log = log.clone();
                async move {
                    push(&log, "2a");
                    Ok::<_, TaskError>(())
                }
            }
        })
        .with_group(TaskGroup::new("port-b")),
    );

    first.await.unwrap();
    second.await.unwrap();
    assert_eq!(snapshot(&log), vec!["1a", "2a", "1b"]);
}

#[tokio::test]
async fn ungrouped_tasks_ignore_group_occupancy() {
    let scheduler = TaskScheduler::new();
    scheduler.start();
    let log = log();

    let (tx, rx) = oneshot::channel::<()>();
    let mut rx = Some(rx);
    let grouped = scheduler.queue_task(
        TaskSpec::new(TaskPriority::Normal, {
            let log = log.clone();
            move |ctx| {
                let log = log.clone();
                let rx = rx.take();
                async move {
                    push(&log, "grouped-a");
                    if let Some(rx) = rx {
                        let _ = ctx.wait_for(rx).await?;
                    }
                    push(&log, "grouped-b");
                    Ok::<_, TaskError>(())
                }
            }
        })
        .with_group(TaskGroup::new("port")),
    );

    let free = scheduler.queue_task(TaskSpec::new(TaskPriority::Normal, {
        let log = log.clone();
        move |_ctx| {
            let log = log.clone();
            async move {
                push(&log, "free");
                Ok::<_, TaskError>(())
            }
        }
    }));

    free.await.unwrap();
    tx.send(()).unwrap();
    grouped.await.unwrap();
    assert_eq!(snapshot(&log), vec!["grouped-a", "free", "grouped-b"]);
}

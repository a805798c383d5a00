//! End-to-end scheduling behavior: start/stop, priorities, checkpoints,
//! interrupt behaviors, and waiting tasks.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;

use taskloom::{TaskError, TaskInterruptBehavior, TaskPriority, TaskScheduler, TaskSpec};

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

/// Lets the driver and spawned bodies make progress without relying on time.
async fn breathe() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn does_not_execute_tasks_before_start() {
    let scheduler = TaskScheduler::new();
    let log = log();

    let handle = scheduler.queue_task(TaskSpec::new(TaskPriority::Normal, {
        let log = log.clone();
        move |_ctx| {
            let log = log.clone();
            async move {
                push(&log, "ran");
                Ok::<_, TaskError>(())
            }
        }
    }));

    breathe().await;
    assert!(snapshot(&log).is_empty());

    scheduler.start();
    handle.await.unwrap();
    assert_eq!(snapshot(&log), vec!["ran"]);
}

#[tokio::test]
async fn resolves_with_the_body_return_value() {
    let scheduler = TaskScheduler::new();
    scheduler.start();

    let handle = scheduler.queue_task(TaskSpec::new(TaskPriority::Normal, |_ctx| async move {
        Ok::<_, TaskError>(7)
    }));

    assert_eq!(handle.await.unwrap(), 7);
}

#[tokio::test]
async fn resumes_across_multiple_checkpoints() {
    let scheduler = TaskScheduler::new();
    scheduler.start();
    let log = log();

    let handle = scheduler.queue_task(TaskSpec::new(TaskPriority::Normal, {
        let log = log.clone();
        move |ctx| {
            let log = log.clone();
            async move {
                push(&log, "a");
                ctx.checkpoint().await;
                push(&log, "b");
                ctx.checkpoint().await;
                push(&log, "c");
                Ok::<_, TaskError>(())
            }
        }
    }));

    handle.await.unwrap();
    assert_eq!(snapshot(&log), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn equal_priority_runs_in_submission_order() {
    let scheduler = TaskScheduler::new();
    let log = log();

    let mut handles = Vec::new();
    for (first, second, value) in [("1a", "1b", 1), ("2a", "2b", 2)] {
        handles.push(scheduler.queue_task(TaskSpec::new(TaskPriority::Normal, {
            let log = log.clone();
            move |ctx| {
                let log = log.clone();
                async move {
                    push(&log, first);
                    ctx.checkpoint().await;
                    push(&log, second);
                    Ok::<_, TaskError>(value)
                }
            }
        })));
    }

    scheduler.start();
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    assert_eq!(results, vec![1, 2]);
    // The first task keeps winning the FIFO tie at its checkpoint.
    assert_eq!(snapshot(&log), vec!["1a", "1b", "2a", "2b"]);
}

#[tokio::test]
async fn higher_priority_runs_first() {
    let scheduler = TaskScheduler::new();
    let log = log();

    let mut handles = Vec::new();
    for (priority, entry) in [
        (TaskPriority::Low, "low"),
        (TaskPriority::Idle, "idle"),
        (TaskPriority::High, "high"),
        (TaskPriority::Normal, "normal"),
    ] {
        handles.push(scheduler.queue_task(TaskSpec::new(priority, {
            let log = log.clone();
            move |_ctx| {
                let log = log.clone();
                async move {
                    push(&log, entry);
                    Ok::<_, TaskError>(())
                }
            }
        })));
    }

    scheduler.start();
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(snapshot(&log), vec!["high", "normal", "low", "idle"]);
}

#[tokio::test]
async fn higher_priority_task_interrupts_at_checkpoint() {
    let scheduler = TaskScheduler::new();
    scheduler.start();
    let log = log();

    let (started_tx, started_rx) = oneshot::channel::<()>();
    let (ack_tx, ack_rx) = oneshot::channel::<()>();

    let first = scheduler.queue_task(TaskSpec::new(TaskPriority::Normal, {
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
    }));

    started_rx.await.unwrap();
    let second = scheduler.queue_task(TaskSpec::new(TaskPriority::High, {
        let log = log.clone();
        move |ctx| {
            let log = log.clone();
            async move {
                push(&log, "2a");
                ctx.checkpoint().await;
                push(&log, "2b");
                Ok::<_, TaskError>(())
            }
        }
    }));
    // Let the queue command land before releasing the first task.
    breathe().await;
    ack_tx.send(()).unwrap();

    second.await.unwrap();
    first.await.unwrap();
    assert_eq!(snapshot(&log), vec!["1a", "2a", "2b", "1b"]);
}

#[tokio::test]
async fn forbidden_task_is_never_interrupted() {
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
                    ctx.checkpoint().await;
                    push(&log, "1c");
                    Ok::<_, TaskError>(())
                }
            }
        })
        .with_interrupt(TaskInterruptBehavior::Forbidden),
    );

    started_rx.await.unwrap();
    let second = scheduler.queue_task(TaskSpec::new(TaskPriority::High, {
        let log = log.clone();
        move |ctx| {
            let log = log.clone();
            async move {
                push(&log, "2a");
                ctx.checkpoint().await;
                push(&log, "2b");
                Ok::<_, TaskError>(())
            }
        }
    }));
    breathe().await;
    ack_tx.send(()).unwrap();

    first.await.unwrap();
    second.await.unwrap();
    assert_eq!(snapshot(&log), vec!["1a", "1b", "1c", "2a", "2b"]);
}

#[tokio::test]
async fn restart_task_reruns_from_the_top_after_preemption() {
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
                    ctx.checkpoint().await;
                    push(&log, "1c");
                    Ok::<_, TaskError>(())
                }
            }
        })
        .with_interrupt(TaskInterruptBehavior::Restart),
    );

    started_rx.await.unwrap();
    let second = scheduler.queue_task(TaskSpec::new(TaskPriority::High, {
        let log = log.clone();
        move |ctx| {
            let log = log.clone();
            async move {
                push(&log, "2a");
                ctx.checkpoint().await;
                push(&log, "2b");
                ctx.checkpoint().await;
                push(&log, "2c");
                Ok::<_, TaskError>(())
            }
        }
    }));
    breathe().await;
    ack_tx.send(()).unwrap();

    second.await.unwrap();
    first.await.unwrap();
    // The gate is consumed on the first invocation, so the rerun goes
    // straight through.
    assert_eq!(snapshot(&log), vec!["1a", "2a", "2b", "2c", "1a", "1b", "1c"]);
}

#[tokio::test]
async fn restart_task_resumes_a_settled_wait_instead_of_rerunning() {
    let scheduler = TaskScheduler::new();
    scheduler.start();
    let log = log();

    let (tx, rx) = oneshot::channel::<i32>();
    let mut rx = Some(rx);
    let restartable = scheduler.queue_task(
        TaskSpec::new(TaskPriority::Normal, {
            let log = log.clone();
            move |ctx| {
                let log = log.clone();
                let rx = rx.take();
                async move {
                    push(&log, "r-start");
                    let rx = rx.ok_or_else(|| TaskError::fail("unexpected rerun"))?;
                    let value = ctx
                        .wait_for(rx)
                        .await?
                        .map_err(|e| TaskError::fail(e.to_string()))?;
                    push(&log, "r-resume");
                    Ok::<_, TaskError>(value)
                }
            }
        })
        .with_interrupt(TaskInterruptBehavior::Restart),
    );

    breathe().await;
    scheduler.stop().await;
    tx.send(21).unwrap();
    breathe().await;

    let high = scheduler.queue_task(TaskSpec::new(TaskPriority::High, {
        let log = log.clone();
        move |_ctx| {
            let log = log.clone();
            async move {
                push(&log, "high");
                Ok::<_, TaskError>(())
            }
        }
    }));
    scheduler.start();

    high.await.unwrap();
    // Switching to the High task is not a preemption: the task was only
    // Pending because its wait settled, so the value survives.
    assert_eq!(restartable.await.unwrap(), 21);
    assert_eq!(snapshot(&log), vec!["r-start", "high", "r-resume"]);
}

#[tokio::test]
async fn completed_restart_task_is_not_rerun() {
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
                    ctx.checkpoint().await;
                    push(&log, "1b");
                    Ok::<_, TaskError>(())
                }
            }
        })
        .with_interrupt(TaskInterruptBehavior::Restart),
    );
    first.await.unwrap();

    let second = scheduler.queue_task(TaskSpec::new(TaskPriority::High, {
        let log = log.clone();
        move |_ctx| {
            let log = log.clone();
            async move {
                push(&log, "2a");
                Ok::<_, TaskError>(())
            }
        }
    }));
    second.await.unwrap();

    assert_eq!(snapshot(&log), vec!["1a", "1b", "2a"]);
}

#[tokio::test]
async fn wait_for_resumes_with_the_settled_value() {
    let scheduler = TaskScheduler::new();
    scheduler.start();

    let (tx, rx) = oneshot::channel::<i32>();
    let mut rx = Some(rx);
    let handle = scheduler.queue_task(TaskSpec::new(TaskPriority::Normal, move |ctx| {
        let rx = rx.take();
        async move {
            let rx = rx.ok_or_else(|| TaskError::fail("unexpected rerun"))?;
            let value = ctx
                .wait_for(rx)
                .await?
                .map_err(|e| TaskError::fail(e.to_string()))?;
            Ok::<_, TaskError>(value * 2)
        }
    }));

    breathe().await;
    tx.send(21).unwrap();
    assert_eq!(handle.await.unwrap(), 42);
}

#[tokio::test]
async fn waiting_task_blocks_lower_priority_work() {
    let scheduler = TaskScheduler::new();
    scheduler.start();
    let log = log();

    let (tx, rx) = oneshot::channel::<()>();
    let mut rx = Some(rx);
    let first = scheduler.queue_task(TaskSpec::new(TaskPriority::Normal, {
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
    }));

    let second = scheduler.queue_task(TaskSpec::new(TaskPriority::Idle, {
        let log = log.clone();
        move |_ctx| {
            let log = log.clone();
            async move {
                push(&log, "2a");
                Ok::<_, TaskError>(())
            }
        }
    }));

    breathe().await;
    // The Normal task is only waiting, but Idle work must not sneak in.
    assert_eq!(snapshot(&log), vec!["1a"]);

    tx.send(()).unwrap();
    first.await.unwrap();
    second.await.unwrap();
    assert_eq!(snapshot(&log), vec!["1a", "1b", "2a"]);
}

#[tokio::test(start_paused = true)]
async fn waiting_task_lets_equal_priority_work_run() {
    let scheduler = TaskScheduler::new();
    scheduler.start();
    let log = log();

    let first = scheduler.queue_task(TaskSpec::new(TaskPriority::Normal, {
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
    }));

    let second = scheduler.queue_task(TaskSpec::new(TaskPriority::Normal, {
        let log = log.clone();
        move |_ctx| {
            let log = log.clone();
            async move {
                push(&log, "2a");
                Ok::<_, TaskError>(())
            }
        }
    }));

    first.await.unwrap();
    second.await.unwrap();
    assert_eq!(snapshot(&log), vec!["1a", "2a", "1b"]);
}

#[tokio::test(start_paused = true)]
async fn waits_resume_in_settlement_order() {
    let scheduler = TaskScheduler::new();
    scheduler.start();
    let log = log();

    let mut handles = Vec::new();
    for (first, second, delay) in [("1a", "1b", 100u64), ("2a", "2b", 50u64)] {
        handles.push(scheduler.queue_task(TaskSpec::new(TaskPriority::Normal, {
            let log = log.clone();
            move |ctx| {
                let log = log.clone();
                async move {
                    push(&log, first);
                    ctx.wait_for(tokio::time::sleep(Duration::from_millis(delay))).await?;
                    push(&log, second);
                    Ok::<_, TaskError>(())
                }
            }
        })));
    }

    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(snapshot(&log), vec!["1a", "2a", "2b", "1b"]);
}

#[tokio::test]
async fn stop_freezes_tasks_and_start_resumes_them() {
    let scheduler = TaskScheduler::new();
    scheduler.start();
    let log = log();

    let (tx, rx) = oneshot::channel::<()>();
    let mut rx = Some(rx);
    let handle = scheduler.queue_task(TaskSpec::new(TaskPriority::Normal, {
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
    }));

    breathe().await;
    assert_eq!(snapshot(&log), vec!["1a"]);

    scheduler.stop().await;
    tx.send(()).unwrap();
    breathe().await;
    // The wait settled, but a stopped scheduler grants no steps.
    assert_eq!(snapshot(&log), vec!["1a"]);

    scheduler.start();
    handle.await.unwrap();
    assert_eq!(snapshot(&log), vec!["1a", "1b"]);
}

#[tokio::test]
async fn failing_body_rejects_the_handle() {
    let scheduler = TaskScheduler::new();
    scheduler.start();

    let handle = scheduler.queue_task(TaskSpec::new(TaskPriority::Normal, |_ctx| async move {
        Err::<(), _>(TaskError::fail("boom"))
    }));

    let err = handle.await.unwrap_err();
    assert!(matches!(err, TaskError::Fail { .. }));
    assert!(err.to_string().contains("boom"));
}

async fn read_phase(ctx: &taskloom::TaskContext, log: &Log) -> Result<i32, TaskError> {
    push(log, "read");
    ctx.checkpoint().await;
    Ok(20)
}

async fn write_phase(ctx: &taskloom::TaskContext, log: &Log, value: i32) -> Result<i32, TaskError> {
    push(log, "write");
    ctx.checkpoint().await;
    Ok(value + 22)
}

#[tokio::test]
async fn bodies_compose_from_helper_functions() {
    let scheduler = TaskScheduler::new();
    scheduler.start();
    let log = log();

    let handle = scheduler.queue_task(TaskSpec::new(TaskPriority::Normal, {
        let log = log.clone();
        move |ctx| {
            let log = log.clone();
            async move {
                let value = read_phase(&ctx, &log).await?;
                write_phase(&ctx, &log, value).await
            }
        }
    }));

    assert_eq!(handle.await.unwrap(), 42);
    assert_eq!(snapshot(&log), vec!["read", "write"]);
}

#[tokio::test]
async fn tasks_can_queue_further_tasks_through_a_cloned_handle() {
    let scheduler = TaskScheduler::new();
    scheduler.start();
    let log = log();

    let inner_scheduler = scheduler.clone();
    let outer = scheduler.queue_task(TaskSpec::new(TaskPriority::Normal, {
        let log = log.clone();
        move |ctx| {
            let log = log.clone();
            let scheduler = inner_scheduler.clone();
            async move {
                push(&log, "outer");
                // Independent submission, not delegation: the new task queues
                // behind this one.
                let _detached = scheduler.queue_task(TaskSpec::new(TaskPriority::Normal, {
                    let log = log.clone();
                    move |_ctx| {
                        let log = log.clone();
                        async move {
                            push(&log, "inner");
                            Ok::<_, TaskError>(())
                        }
                    }
                }));
                ctx.checkpoint().await;
                push(&log, "outer-done");
                Ok::<_, TaskError>(())
            }
        }
    }));

    outer.await.unwrap();
    breathe().await;
    assert_eq!(snapshot(&log), vec!["outer", "outer-done", "inner"]);
}

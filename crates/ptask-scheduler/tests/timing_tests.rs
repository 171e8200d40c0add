//! Deterministic timing tests driven by a manual clock.
//!
//! The task body advances the clock itself to simulate job execution time,
//! and `wait_for_period` moves it to the next activation.

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel;
use ptask_errors::PtaskResult;
use ptask_scheduler::{TaskParams, TaskRegistry};
use ptask_time::{Clock, ManualClock, SharedClock, Timestamp};

fn clock_at(ms: u64) -> (Arc<ManualClock>, SharedClock) {
    let clock = Arc::new(ManualClock::starting_at(Timestamp::from_millis(ms)));
    let shared: SharedClock = clock.clone();
    (clock, shared)
}

#[test]
fn test_activations_do_not_drift() -> PtaskResult {
    let (clock, shared) = clock_at(1_000);
    let reg = TaskRegistry::new(1, shared)?;
    let (tx, rx) = channel::unbounded();

    let body_clock = Arc::clone(&clock);
    let id = reg.short_create(TaskParams::from_millis(10), move |task| {
        task.start_period();
        for job_ms in [3_u64, 7, 1, 9] {
            body_clock.advance(Duration::from_millis(job_ms));
            task.wait_for_period();
            let _sent = tx.send((body_clock.now(), task.next_activation()));
        }
    })?;
    reg.join(id)?;

    let observed: Vec<_> = rx.try_iter().collect();
    let expected: Vec<_> = (1..=4_u64)
        .map(|k| {
            (
                Timestamp::from_millis(1_000 + 10 * k),
                Timestamp::from_millis(1_000 + 10 * (k + 1)),
            )
        })
        .collect();
    assert_eq!(observed, expected);
    Ok(())
}

#[test]
fn test_overrun_counts_one_miss_and_catches_up() -> PtaskResult {
    let (clock, shared) = clock_at(0);
    let reg = TaskRegistry::new(1, shared)?;
    let (tx, rx) = channel::unbounded();

    let body_clock = Arc::clone(&clock);
    let id = reg.short_create(TaskParams::from_millis(10), move |task| {
        task.start_period();
        for job_ms in [3_u64, 12, 1] {
            body_clock.advance(Duration::from_millis(job_ms));
            let _sent = tx.send(task.deadline_miss());
            task.wait_for_period();
        }
    })?;
    reg.join(id)?;

    let misses: Vec<bool> = rx.try_iter().collect();
    assert_eq!(misses, vec![false, true, false]);
    assert_eq!(reg.miss_count(id)?, 1);
    // 0 + 3 -> 10 (sleep) -> 22 (overrun, no sleep) -> 23 -> 30 (sleep)
    assert_eq!(clock.now(), Timestamp::from_millis(30));
    Ok(())
}

#[test]
fn test_deadline_shorter_than_period() -> PtaskResult {
    let (clock, shared) = clock_at(0);
    let reg = TaskRegistry::new(1, shared)?;

    let body_clock = Arc::clone(&clock);
    let params = TaskParams::from_millis(10).with_deadline(Duration::from_millis(4));
    let id = reg.short_create(params, move |task| {
        task.start_period();
        body_clock.advance(Duration::from_millis(4));
        assert!(!task.deadline_miss());
        body_clock.advance(Duration::from_micros(1));
        assert!(task.deadline_miss());
        task.wait_for_period();
        assert_eq!(task.next_deadline(), Timestamp::from_millis(14));
    })?;
    reg.join(id)?;

    let stats = reg.stats(id)?;
    assert_eq!(stats.miss_count, 1);
    assert_eq!(stats.activations, 1);
    Ok(())
}

#[test]
fn test_miss_count_visible_while_running() -> PtaskResult {
    let (clock, shared) = clock_at(0);
    let reg = TaskRegistry::new(1, shared)?;
    let (missed_tx, missed_rx) = channel::bounded(0);
    let (resume_tx, resume_rx) = channel::bounded::<()>(0);

    let body_clock = Arc::clone(&clock);
    let id = reg.short_create(TaskParams::from_millis(5), move |task| {
        task.start_period();
        body_clock.advance(Duration::from_millis(6));
        let _missed = task.deadline_miss();
        let _sent = missed_tx.send(());
        let _resumed = resume_rx.recv();
    })?;

    assert!(missed_rx.recv().is_ok());
    assert_eq!(reg.miss_count(id)?, 1);
    assert!(resume_tx.send(()).is_ok());
    reg.join(id)?;
    Ok(())
}

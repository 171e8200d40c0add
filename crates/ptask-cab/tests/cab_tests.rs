//! Behavioural tests for CABs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use ptask_cab::{CabPool, DEFAULT_MAX_CAB_BUFFERS};
use ptask_errors::{PtaskError, PtaskResult, Resource};
use ptask_time::{ManualClock, MonotonicClock, SharedClock, Timestamp};

fn manual_pool(start_ms: u64) -> PtaskResult<(Arc<ManualClock>, CabPool)> {
    let clock = Arc::new(ManualClock::starting_at(Timestamp::from_millis(start_ms)));
    let shared: SharedClock = clock.clone();
    let pool = CabPool::new(8, DEFAULT_MAX_CAB_BUFFERS, shared)?;
    Ok((clock, pool))
}

#[test]
fn test_writer_never_blocked_by_reader_of_older_value() -> PtaskResult {
    let (clock, pool) = manual_pool(100)?;
    let cab = pool.create("ints", vec![0_i32; 2])?;

    let mut w = cab.reserve_write()?;
    *w = 5;
    assert_eq!(w.commit()?, Timestamp::from_millis(100));

    let reader_a = cab.reserve_read()?;
    assert_eq!(*reader_a, 5);
    assert_eq!(reader_a.timestamp(), Timestamp::from_millis(100));

    clock.advance(Duration::from_millis(10));
    let mut w = cab.reserve_write()?;
    assert_ne!(w.buffer_index(), reader_a.buffer_index());
    *w = 7;
    assert_eq!(w.commit()?, Timestamp::from_millis(110));

    let reader_b = cab.reserve_read()?;
    assert_eq!(*reader_b, 7);
    assert_eq!(reader_b.timestamp(), Timestamp::from_millis(110));
    // Reader A still sees the value it fetched.
    assert_eq!(*reader_a, 5);

    let a_index = reader_a.buffer_index();
    let b_index = reader_b.buffer_index();
    drop(reader_a);

    let busy = cab.busy_counts();
    assert_eq!(busy[a_index], 0);
    assert_eq!(busy[b_index], 1);
    Ok(())
}

#[test]
fn test_read_before_publish_is_unavailable() -> PtaskResult {
    let (_clock, pool) = manual_pool(0)?;
    let cab = pool.create("empty", vec![0_u64; 3])?;
    assert!(!cab.has_value());
    assert_eq!(cab.reserve_read().map(|g| *g), Err(PtaskError::Unavailable));
    assert_eq!(cab.last_timestamp(), None);
    Ok(())
}

#[test]
fn test_write_then_read_round_trip() -> PtaskResult {
    let (_clock, pool) = manual_pool(42)?;
    let cab = pool.create_zeroed("bytes", 3, 8)?;

    let at = cab.write_with(|buf| buf.copy_from_slice(b"abcdefgh"))?;
    let (copy, seen_at) = cab.read_with(|buf, t| (buf.to_vec(), t))?;
    assert_eq!(copy, b"abcdefgh");
    assert_eq!(seen_at, at);
    assert_eq!(cab.last_timestamp(), Some(Timestamp::from_millis(42)));
    assert_eq!(cab.busy_counts(), vec![0, 0, 0]);
    Ok(())
}

#[test]
fn test_reset_hides_value_until_next_commit() -> PtaskResult {
    let (_clock, pool) = manual_pool(0)?;
    let cab = pool.create("resettable", vec![0_u8; 2])?;
    cab.write_with(|v| *v = 1)?;

    let held = cab.reserve_read()?;
    cab.reset();
    assert!(!cab.has_value());
    assert_eq!(cab.reserve_read().map(|g| *g), Err(PtaskError::Unavailable));
    // Reset leaves existing readers alone.
    assert_eq!(*held, 1);
    drop(held);

    cab.write_with(|v| *v = 2)?;
    assert_eq!(cab.read_with(|v, _| *v)?, 2);
    Ok(())
}

#[test]
fn test_reset_keeps_last_commit_time() -> PtaskResult {
    let (clock, pool) = manual_pool(5)?;
    let cab = pool.create("stamped", vec![0_u8; 3])?;
    let first = cab.write_with(|v| *v = 1)?;

    cab.reset();
    assert!(!cab.has_value());
    assert_eq!(cab.last_timestamp(), Some(first));

    clock.advance(Duration::from_millis(10));
    let second = cab.write_with(|v| *v = 2)?;
    assert_eq!(cab.last_timestamp(), Some(second));
    assert_eq!(cab.read_with(|_, at| at)?, Timestamp::from_millis(15));
    Ok(())
}

#[test]
fn test_abandoned_write_keeps_previous_value() -> PtaskResult {
    let (_clock, pool) = manual_pool(0)?;
    let cab = pool.create("abandon", vec![0_u16; 3])?;
    cab.write_with(|v| *v = 10)?;

    {
        let mut w = cab.reserve_write()?;
        *w = 99;
    }

    assert_eq!(cab.read_with(|v, _| *v)?, 10);
    assert_eq!(cab.busy_counts(), vec![0, 0, 0]);
    Ok(())
}

#[test]
fn test_three_buffers_two_readers_one_writer() -> PtaskResult {
    let (_clock, pool) = manual_pool(0)?;
    let cab = pool.create("triple", vec![0_u32; 3])?;
    cab.write_with(|v| *v = 1)?;

    let r1 = cab.reserve_read()?;
    cab.write_with(|v| *v = 2)?;
    let r2 = cab.reserve_read()?;

    // Buffers of r1 and r2 are busy, one is left for the writer.
    let mut w = cab.reserve_write()?;
    assert_ne!(w.buffer_index(), r1.buffer_index());
    assert_ne!(w.buffer_index(), r2.buffer_index());
    *w = 3;
    w.commit()?;

    assert_eq!((*r1, *r2), (1, 2));
    assert_eq!(cab.read_with(|v, _| *v)?, 3);
    Ok(())
}

#[test]
fn test_writer_exhaustion_is_reported() -> PtaskResult {
    let (_clock, pool) = manual_pool(0)?;
    let cab = pool.create("pair", vec![0_u8; 2])?;
    cab.write_with(|v| *v = 1)?;
    let _r1 = cab.reserve_read()?;
    cab.write_with(|v| *v = 2)?;
    let _r2 = cab.reserve_read()?;

    // Two readers on two buffers: nothing left for the writer.
    assert_eq!(
        cab.reserve_write().map(|w| w.buffer_index()),
        Err(PtaskError::ResourceExhausted(Resource::CabBuffers))
    );
    Ok(())
}

#[test]
fn test_concurrent_writer_and_readers_see_whole_values() -> PtaskResult {
    // Three readers can pin three old buffers; with the published one and
    // the writer's, five buffers are needed.
    let pool = CabPool::new(1, 5, MonotonicClock::shared())?;
    // Each value is a run of identical words; a torn read would mix them.
    let cab = pool.create_with("stress", 5, || [0_u64; 16])?;
    let stop = Arc::new(AtomicBool::new(false));

    let writer = {
        let cab = Arc::clone(&cab);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut n = 0_u64;
            while !stop.load(Ordering::Relaxed) {
                n += 1;
                if cab.write_with(|v| v.fill(n)).is_err() {
                    return false;
                }
            }
            true
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let cab = Arc::clone(&cab);
            thread::spawn(move || {
                let mut last_seen = 0_u64;
                for _ in 0..5_000 {
                    match cab.read_with(|v, _| (v[0], v.iter().all(|w| *w == v[0]))) {
                        Ok((first, whole)) => {
                            if !whole || first < last_seen {
                                return false;
                            }
                            last_seen = first;
                        }
                        Err(PtaskError::Unavailable) => {}
                        Err(_) => return false,
                    }
                }
                true
            })
        })
        .collect();

    for reader in readers {
        assert!(matches!(reader.join(), Ok(true)), "reader saw a torn or stale value");
    }
    stop.store(true, Ordering::Relaxed);
    assert!(matches!(writer.join(), Ok(true)), "writer failed to reserve");
    assert_eq!(cab.busy_counts(), vec![0; 5]);
    Ok(())
}

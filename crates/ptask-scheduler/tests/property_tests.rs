//! Property-based tests for the scheduler crate.

use std::sync::Arc;

use proptest::prelude::*;
use ptask_errors::{PtaskError, Resource};
use ptask_scheduler::{MAX_RT_PRIORITY, SchedPolicy, TaskId, TaskParams, TaskRegistry};
use ptask_time::ManualClock;
use quickcheck_macros::quickcheck;

#[quickcheck]
fn time_shared_accepts_only_zero(priority: u8) -> bool {
    SchedPolicy::TimeShared.validate_priority(priority).is_ok() == (priority == 0)
}

#[quickcheck]
fn real_time_accepts_one_to_max(priority: u8) -> bool {
    let expected = (1..=MAX_RT_PRIORITY).contains(&priority);
    SchedPolicy::Fifo.validate_priority(priority).is_ok() == expected
        && SchedPolicy::RoundRobin.validate_priority(priority).is_ok() == expected
}

#[quickcheck]
fn native_numbers_outside_supported_set_rejected(native: i32) -> bool {
    let accepted = SchedPolicy::try_from(native).is_ok();
    accepted == matches!(native, 0..=2)
}

#[quickcheck]
fn display_parses_back(raw: u8) -> bool {
    let policy = match raw % 3 {
        0 => SchedPolicy::TimeShared,
        1 => SchedPolicy::RoundRobin,
        _ => SchedPolicy::Fifo,
    };
    policy.to_string().parse::<SchedPolicy>() == Ok(policy)
}

#[derive(Debug, Clone)]
enum Op {
    Init,
    /// Run and join the live task at this position (modulo live count).
    Retire(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Init),
        2 => any::<usize>().prop_map(Op::Retire),
    ]
}

/// Reference model of round-robin slot allocation.
struct Model {
    used: Vec<bool>,
    last: Option<usize>,
}

impl Model {
    fn init(&mut self) -> Option<usize> {
        let capacity = self.used.len();
        if self.used.iter().all(|u| *u) {
            return None;
        }
        let mut index = self.last.map_or(0, |last| (last + 1) % capacity);
        while self.used[index] {
            index = (index + 1) % capacity;
        }
        self.used[index] = true;
        self.last = Some(index);
        Some(index)
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_allocation_matches_round_robin_model(
        capacity in 1_usize..6,
        ops in proptest::collection::vec(op_strategy(), 1..24),
    ) {
        let reg = TaskRegistry::new(capacity, Arc::new(ManualClock::new()))?;
        let mut model = Model { used: vec![false; capacity], last: None };
        let mut live: Vec<TaskId> = Vec::new();

        for op in ops {
            match op {
                Op::Init => match (reg.init(), model.init()) {
                    (Ok(id), Some(index)) => {
                        prop_assert_eq!(id.index(), index);
                        reg.set_params(id, TaskParams::from_millis(1))?;
                        live.push(id);
                    }
                    (Err(err), None) => {
                        prop_assert_eq!(err, PtaskError::ResourceExhausted(Resource::TaskSlots));
                    }
                    (got, want) => prop_assert!(false, "registry {:?} vs model {:?}", got, want),
                },
                Op::Retire(pos) => {
                    if live.is_empty() {
                        continue;
                    }
                    let id = live.remove(pos % live.len());
                    reg.create(id, |_task| {})?;
                    reg.join(id)?;
                    model.used[id.index()] = false;
                }
            }
            prop_assert_eq!(reg.len(), live.len());
            prop_assert!(reg.len() <= reg.capacity());
        }
    }
}

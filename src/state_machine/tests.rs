use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::*;

const TABLE: &str = r"
initial: idle
states:
  idle: { tags: [always_safe] }
  ready: {}
  running: { horizon: observe }
  parked: { tags: [always_safe] }
transitions:
  - { source: idle, dest: ready, trigger: prep, conditions: [powered] }
  - { source: ready, dest: running, trigger: run }
  - { source: [idle, ready, running], dest: parked, trigger: park }
";

fn flag(initial: bool) -> (Arc<AtomicBool>, ConditionFn) {
    let flag = Arc::new(AtomicBool::new(initial));
    let probe = flag.clone();
    (flag, Box::new(move || probe.load(Ordering::Relaxed)))
}

fn all_true_registry(names: &[&str]) -> HashMap<String, ConditionFn> {
    names
        .iter()
        .map(|name| ((*name).to_string(), Box::new(|| true) as ConditionFn))
        .collect()
}

/// Machine over [`TABLE`] with a togglable `powered` condition and a
/// togglable darkness flag behind the `observe` horizon.
fn machine_with(powered: bool, dark: bool) -> (StateMachine, Arc<AtomicBool>, Arc<AtomicBool>) {
    let table = StateTable::from_yaml(TABLE).unwrap();
    let (power_flag, power_cond) = flag(powered);
    let mut conditions: HashMap<String, ConditionFn> = HashMap::new();
    conditions.insert("powered".to_string(), power_cond);
    let dark_flag = Arc::new(AtomicBool::new(dark));
    let dark_probe = dark_flag.clone();
    let horizon: HorizonFn = Box::new(move |_| dark_probe.load(Ordering::Relaxed));
    let machine = StateMachine::new(table, 3, conditions, horizon).unwrap();
    (machine, power_flag, dark_flag)
}

#[test]
fn test_condition_blocks_and_counts_attempts() {
    let (mut machine, power, _) = machine_with(false, true);
    let err = machine.fire("prep").unwrap_err();
    assert_eq!(
        err,
        TransitionError::ConditionNotMet {
            trigger: "prep".into(),
            condition: "powered".into(),
            attempts: 1,
        }
    );
    assert_eq!(machine.current_state(), "idle");
    machine.fire("prep").unwrap_err();
    assert_eq!(machine.attempts("prep"), 2);

    power.store(true, Ordering::Relaxed);
    assert_eq!(machine.fire("prep").unwrap(), "ready");
    // Success clears the failure count for that trigger.
    assert_eq!(machine.attempts("prep"), 0);
}

#[test]
fn test_attempts_exhaustion_threshold() {
    let (mut machine, power, _) = machine_with(false, true);
    for _ in 0..3 {
        machine.fire("prep").unwrap_err();
    }
    assert!(machine.attempts_exhausted("prep"));
    power.store(true, Ordering::Relaxed);
    machine.fire("prep").unwrap();
    assert!(!machine.attempts_exhausted("prep"));
}

#[test]
fn test_horizon_gate_waits_without_counting() {
    let (mut machine, _, dark) = machine_with(true, false);
    machine.fire("prep").unwrap();
    for _ in 0..5 {
        let err = machine.fire("run").unwrap_err();
        assert_eq!(
            err,
            TransitionError::HorizonNotSatisfied {
                trigger: "run".into(),
                horizon: "observe".into(),
            }
        );
    }
    // Waiting on the sky is not a fault, however long it takes.
    assert_eq!(machine.attempts("run"), 0);
    assert!(!machine.attempts_exhausted("run"));

    dark.store(true, Ordering::Relaxed);
    assert_eq!(machine.fire("run").unwrap(), "running");
}

#[test]
fn test_park_bypasses_conditions_and_horizon() {
    let table = StateTable::from_yaml(
        r"
initial: running
states:
  running: {}
  parked: { horizon: observe, tags: [always_safe] }
transitions:
  - { source: running, dest: parked, trigger: park, conditions: [powered] }
",
    )
    .unwrap();
    let (_, power_cond) = flag(false);
    let mut conditions: HashMap<String, ConditionFn> = HashMap::new();
    conditions.insert("powered".to_string(), power_cond);
    // Horizon always refuses, condition always refuses: park goes anyway.
    let mut machine = StateMachine::new(table, 3, conditions, Box::new(|_| false)).unwrap();
    assert_eq!(machine.fire(TRIGGER_PARK).unwrap(), "parked");
    assert_eq!(machine.attempts(TRIGGER_PARK), 0);
}

#[test]
fn test_no_matching_transition_leaves_state() {
    let (mut machine, _, _) = machine_with(true, true);
    let err = machine.fire("run").unwrap_err();
    assert_eq!(
        err,
        TransitionError::NoMatchingTransition { state: "idle".into(), trigger: "run".into() }
    );
    assert_eq!(machine.current_state(), "idle");
    assert_eq!(machine.attempts("run"), 0);
}

#[test]
fn test_first_declared_transition_wins() {
    let table = StateTable::from_yaml(
        r"
initial: a
states: { a: {}, b: {}, c: {} }
transitions:
  - { source: a, dest: b, trigger: go }
  - { source: a, dest: c, trigger: go }
",
    )
    .unwrap();
    let mut machine =
        StateMachine::new(table, 3, HashMap::new(), Box::new(|_| true)).unwrap();
    assert_eq!(machine.fire("go").unwrap(), "b");
}

#[test]
fn test_force_ignores_conditions() {
    let (mut machine, _, _) = machine_with(false, false);
    assert!(machine.current_is_tagged(TAG_ALWAYS_SAFE));
    assert_eq!(machine.force("prep").unwrap(), "ready");
    assert!(!machine.current_is_tagged(TAG_ALWAYS_SAFE));
    assert_eq!(machine.fire(TRIGGER_PARK).unwrap(), "parked");
}

#[test]
fn test_table_load_errors() {
    let bad_initial = StateTable::from_yaml(
        "initial: nope\nstates: { a: {} }\ntransitions:\n  - { source: a, dest: a, trigger: go }\n",
    );
    assert!(matches!(bad_initial.unwrap_err(), StateTableError::UnknownInitial(_)));

    let bad_state = StateTable::from_yaml(
        "initial: a\nstates: { a: {} }\ntransitions:\n  - { source: a, dest: b, trigger: go }\n",
    );
    assert!(matches!(
        bad_state.unwrap_err(),
        StateTableError::UnknownState { ref state, .. } if state == "b"
    ));

    let no_transitions =
        StateTable::from_yaml("initial: a\nstates: { a: {} }\ntransitions: []\n");
    assert!(matches!(no_transitions.unwrap_err(), StateTableError::NoTransitions));

    let garbage = StateTable::from_yaml("not: [valid");
    assert!(matches!(garbage.unwrap_err(), StateTableError::Parse(_)));
}

#[test]
fn test_unregistered_condition_is_rejected() {
    let table = StateTable::from_yaml(TABLE).unwrap();
    let Err(err) = StateMachine::new(table, 3, HashMap::new(), Box::new(|_| true)) else {
        panic!("a table naming an unanswered condition must not build");
    };
    assert!(matches!(
        err,
        StateTableError::UnknownCondition { ref condition, .. } if condition == "powered"
    ));
}

#[test]
fn test_builtin_table_shape() {
    let table = StateTable::builtin().unwrap();
    assert_eq!(table.initial(), "sleeping");
    assert!(table.has_state("housekeeping"));
    assert!(table.is_tagged("parking", TAG_ALWAYS_SAFE));
    assert!(table.is_tagged("parked", TAG_ALWAYS_SAFE));
    assert!(!table.is_tagged("scheduling", TAG_ALWAYS_SAFE));
    assert!(table.horizon_names().contains("observe"));
    let conditions = table.condition_names();
    assert!(conditions.contains("mount_is_tracking"));
    assert!(conditions.contains("camera_is_idle"));
}

#[test]
fn test_builtin_table_resumes_from_parked() {
    let table = StateTable::builtin().unwrap();
    let registry = all_true_registry(&[
        "mount_is_initialized",
        "mount_is_tracking",
        "mount_is_parked",
        "camera_is_idle",
    ]);
    let mut machine = StateMachine::new(table, 5, registry, Box::new(|_| true)).unwrap();
    machine.fire("get_ready").unwrap();
    machine.fire("schedule").unwrap();
    // A weather interrupt parks mid-night; once conditions clear the
    // night carries on from parked without a trip through housekeeping.
    machine.force(TRIGGER_PARK).unwrap();
    machine.fire("set_park").unwrap();
    assert_eq!(machine.current_state(), "parked");
    assert_eq!(machine.fire("get_ready").unwrap(), "ready");
}

#[test]
fn test_builtin_table_full_cycle() {
    let table = StateTable::builtin().unwrap();
    let registry = all_true_registry(&[
        "mount_is_initialized",
        "mount_is_tracking",
        "mount_is_parked",
        "camera_is_idle",
    ]);
    let mut machine = StateMachine::new(table, 5, registry, Box::new(|_| true)).unwrap();
    for trigger in [
        "get_ready",
        "schedule",
        "start_slewing",
        "track",
        "observe",
        "analyze",
        "adjust_tracking",
        "observe",
        "analyze",
        "schedule",
        "park",
        "set_park",
        "clean_up",
        "goto_sleep",
    ] {
        let state = machine.fire(trigger).unwrap().to_string();
        println!("{trigger} -> {state}");
    }
    assert_eq!(machine.current_state(), "sleeping");
}

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::Deserialize;

/// Declarative description of the observing cycle: named states with tags
/// and optional per-state sun horizons, plus the triggered transitions
/// between them. Loaded from YAML and validated once at startup so the
/// machine never has to re-check names at runtime.
#[derive(Debug, Clone)]
pub struct StateTable {
    initial: String,
    states: HashMap<String, StateInfo>,
    transitions: Vec<Transition>,
}

#[derive(Debug, Clone)]
struct StateInfo {
    tags: HashSet<String>,
    horizon: Option<String>,
}

/// One edge of the cycle. `guard_horizon` is copied from the destination
/// state's `horizon` field at load time, so firing only needs to look at
/// the transition itself.
#[derive(Debug, Clone)]
pub struct Transition {
    sources: Vec<String>,
    dest: String,
    trigger: String,
    conditions: Vec<String>,
    guard_horizon: Option<String>,
}

impl Transition {
    pub fn sources(&self) -> &[String] { &self.sources }
    pub fn dest(&self) -> &str { &self.dest }
    pub fn trigger(&self) -> &str { &self.trigger }
    pub fn conditions(&self) -> &[String] { &self.conditions }
    pub fn guard_horizon(&self) -> Option<&str> { self.guard_horizon.as_deref() }

    pub fn matches(&self, state: &str, trigger: &str) -> bool {
        self.trigger == trigger && self.sources.iter().any(|s| s == state)
    }
}

#[derive(Debug, Deserialize)]
struct RawTable {
    initial: String,
    states: HashMap<String, RawState>,
    transitions: Vec<RawTransition>,
}

#[derive(Debug, Default, Deserialize)]
struct RawState {
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    horizon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTransition {
    source: SourceSpec,
    dest: String,
    trigger: String,
    #[serde(default)]
    conditions: Vec<String>,
}

/// `source` may be a single state name or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SourceSpec {
    One(String),
    Many(Vec<String>),
}

impl StateTable {
    pub fn from_yaml(yaml: &str) -> Result<Self, StateTableError> {
        let raw: RawTable = serde_yaml::from_str(yaml)?;
        Self::build(raw)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StateTableError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// The nightly observing cycle shipped with the binary.
    pub fn builtin() -> Result<Self, StateTableError> {
        Self::from_yaml(include_str!("../../resources/state_table/default.yaml"))
    }

    fn build(raw: RawTable) -> Result<Self, StateTableError> {
        if raw.transitions.is_empty() {
            return Err(StateTableError::NoTransitions);
        }
        let states: HashMap<String, StateInfo> = raw
            .states
            .into_iter()
            .map(|(name, rs)| {
                let info = StateInfo { tags: rs.tags.into_iter().collect(), horizon: rs.horizon };
                (name, info)
            })
            .collect();
        if !states.contains_key(&raw.initial) {
            return Err(StateTableError::UnknownInitial(raw.initial));
        }
        let mut transitions = Vec::with_capacity(raw.transitions.len());
        for rt in raw.transitions {
            let sources = match rt.source {
                SourceSpec::One(s) => vec![s],
                SourceSpec::Many(list) => list,
            };
            for source in &sources {
                if !states.contains_key(source) {
                    return Err(StateTableError::UnknownState {
                        trigger: rt.trigger.clone(),
                        state: source.clone(),
                    });
                }
            }
            let dest_info =
                states.get(&rt.dest).ok_or_else(|| StateTableError::UnknownState {
                    trigger: rt.trigger.clone(),
                    state: rt.dest.clone(),
                })?;
            let guard_horizon = dest_info.horizon.clone();
            transitions.push(Transition {
                sources,
                dest: rt.dest,
                trigger: rt.trigger,
                conditions: rt.conditions,
                guard_horizon,
            });
        }
        Ok(Self { initial: raw.initial, states, transitions })
    }

    pub fn initial(&self) -> &str { &self.initial }

    pub fn has_state(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }

    pub fn is_tagged(&self, state: &str, tag: &str) -> bool {
        self.states.get(state).is_some_and(|info| info.tags.contains(tag))
    }

    pub fn transitions(&self) -> &[Transition] { &self.transitions }

    /// Every condition name any transition refers to.
    pub fn condition_names(&self) -> HashSet<&str> {
        self.transitions
            .iter()
            .flat_map(|tr| tr.conditions.iter().map(String::as_str))
            .collect()
    }

    /// Every horizon name any transition guards on.
    pub fn horizon_names(&self) -> HashSet<&str> {
        self.transitions.iter().filter_map(|tr| tr.guard_horizon.as_deref()).collect()
    }
}

#[derive(Debug)]
pub enum StateTableError {
    Io(std::io::Error),
    Parse(serde_yaml::Error),
    UnknownInitial(String),
    UnknownState { trigger: String, state: String },
    UnknownCondition { trigger: String, condition: String },
    UnknownHorizon { state: String, horizon: String },
    NoTransitions,
}

impl fmt::Display for StateTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateTableError::Io(e) => write!(f, "could not read state table: {e}"),
            StateTableError::Parse(e) => write!(f, "could not parse state table: {e}"),
            StateTableError::UnknownInitial(s) => {
                write!(f, "initial state {s:?} is not declared")
            }
            StateTableError::UnknownState { trigger, state } => {
                write!(f, "transition {trigger:?} refers to undeclared state {state:?}")
            }
            StateTableError::UnknownCondition { trigger, condition } => {
                write!(f, "transition {trigger:?} needs unknown condition {condition:?}")
            }
            StateTableError::UnknownHorizon { state, horizon } => {
                write!(f, "state {state:?} guards on unknown horizon {horizon:?}")
            }
            StateTableError::NoTransitions => write!(f, "state table has no transitions"),
        }
    }
}

impl std::error::Error for StateTableError {}

impl From<std::io::Error> for StateTableError {
    fn from(e: std::io::Error) -> Self { StateTableError::Io(e) }
}

impl From<serde_yaml::Error> for StateTableError {
    fn from(e: serde_yaml::Error) -> Self { StateTableError::Parse(e) }
}

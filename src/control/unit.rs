use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;

use super::safety::{SafetyMonitor, WeatherReading};
use crate::config::UnitConfig;
use crate::hardware::{AsyncOp, Observatory, OpStatus};
use crate::scheduler::{Scheduler, ScoringContext};
use crate::sky::{self, SkyPos};
use crate::state_machine::{
    ConditionFn, HorizonFn, StateMachine, StateTable, StateTableError, TAG_ALWAYS_SAFE,
    TRIGGER_PARK, TransitionError,
};
use crate::util::Countdown;
use crate::{error, event, info, log, warn};

const ST_SLEEPING: &str = "sleeping";
const ST_READY: &str = "ready";
const ST_SCHEDULING: &str = "scheduling";
const ST_SLEWING: &str = "slewing";
const ST_TRACKING: &str = "tracking";
const ST_OBSERVING: &str = "observing";
const ST_ANALYZING: &str = "analyzing";
const ST_PARKING: &str = "parking";
const ST_PARKED: &str = "parked";
const ST_HOUSEKEEPING: &str = "housekeeping";

const TR_GET_READY: &str = "get_ready";
const TR_SCHEDULE: &str = "schedule";
const TR_START_SLEWING: &str = "start_slewing";
const TR_TRACK: &str = "track";
const TR_OBSERVE: &str = "observe";
const TR_ANALYZE: &str = "analyze";
const TR_ADJUST_TRACKING: &str = "adjust_tracking";
const TR_SET_PARK: &str = "set_park";
const TR_CLEAN_UP: &str = "clean_up";
const TR_GOTO_SLEEP: &str = "goto_sleep";

/// Snapshot published on every loop pass for observers outside the unit.
#[derive(Debug, Clone)]
pub struct UnitStatus {
    pub state: String,
    pub target: Option<String>,
    pub cycles: u32,
    pub exposures: u32,
    pub safe: bool,
}

/// What the loop does after handling one state.
enum Step {
    Fire(&'static str),
    Idle(TimeDelta),
    Stay,
    Halt,
}

/// How a supervised hardware operation wound down.
enum OpOutcome {
    Done,
    Failed,
    TimedOut,
    Interrupted,
}

/// Owner of the night: holds the state machine, the scheduler, the
/// hardware and the safety monitor, and runs the observing loop over them.
pub struct ControlUnit {
    machine: StateMachine,
    scheduler: Scheduler,
    observatory: Observatory,
    safety: SafetyMonitor,
    cfg: UnitConfig,
    cycles: u32,
    slewed_to: Option<SkyPos>,
    status_tx: watch::Sender<UnitStatus>,
}

impl ControlUnit {
    /// Wires the state table to the actual hardware probes and the
    /// configured sky limits.
    ///
    /// # Errors
    /// Fails when the table names a condition no hardware probe answers,
    /// or a horizon the configuration does not define.
    pub fn new(
        cfg: UnitConfig,
        table: StateTable,
        scheduler: Scheduler,
        observatory: Observatory,
        weather_rx: watch::Receiver<Option<WeatherReading>>,
    ) -> Result<(Self, watch::Receiver<UnitStatus>), StateTableError> {
        for tr in table.transitions() {
            if let Some(horizon) = tr.guard_horizon() {
                if cfg.horizons.sun_limit(horizon).is_none() {
                    return Err(StateTableError::UnknownHorizon {
                        state: tr.dest().to_string(),
                        horizon: horizon.to_string(),
                    });
                }
            }
        }
        let conditions = capability_registry(&observatory);
        let site = cfg.site.observer_site();
        let horizons = cfg.horizons;
        let simulate_night = cfg.simulates("night");
        let horizon_gate: HorizonFn = Box::new(move |name| {
            if simulate_night {
                return true;
            }
            horizons
                .sun_limit(name)
                .is_some_and(|limit| sky::sun_altitude_deg(site, Utc::now()) <= limit)
        });
        let machine =
            StateMachine::new(table, cfg.max_transition_attempts, conditions, horizon_gate)?;
        let safety = SafetyMonitor::new(
            site,
            cfg.horizons.observe,
            cfg.weather_stale(),
            cfg.safety_delay(),
            simulate_night,
            weather_rx,
        );
        let (status_tx, status_rx) = watch::channel(UnitStatus {
            state: machine.current_state().to_string(),
            target: None,
            cycles: 0,
            exposures: 0,
            safe: false,
        });
        let unit = Self {
            machine,
            scheduler,
            observatory,
            safety,
            cfg,
            cycles: 0,
            slewed_to: None,
            status_tx,
        };
        Ok((unit, status_rx))
    }

    /// Runs the observing loop until the cycle limit or an unrecoverable
    /// condition halts it.
    ///
    /// Each pass takes a fresh safety verdict, publishes a status
    /// snapshot, forces a park when conditions are unsafe in a state not
    /// tagged [`TAG_ALWAYS_SAFE`], and otherwise performs the current
    /// state's behavior.
    pub async fn run(&mut self) {
        info!(
            "unit {:?} starting in state {}",
            self.cfg.name,
            self.machine.current_state()
        );
        loop {
            let verdict = self.safety.verdict(Utc::now());
            self.publish_status(verdict.is_safe());
            if !verdict.is_safe() && !self.machine.current_is_tagged(TAG_ALWAYS_SAFE) {
                warn!("{verdict}, leaving state {}", self.machine.current_state());
                if !self.force_park() {
                    idle(self.cfg.retry_wait()).await;
                }
                continue;
            }
            let step = match self.machine.current_state() {
                ST_SLEEPING => self.act_sleeping().await,
                ST_READY => Step::Fire(TR_SCHEDULE),
                ST_SCHEDULING => self.act_scheduling(),
                ST_SLEWING => self.act_slewing().await,
                ST_TRACKING => Step::Fire(TR_OBSERVE),
                ST_OBSERVING => self.act_observing().await,
                ST_ANALYZING => self.act_analyzing(),
                ST_PARKING => self.act_parking().await,
                ST_PARKED => self.act_parked(),
                ST_HOUSEKEEPING => self.act_housekeeping(),
                other => {
                    error!("no behavior for state {other:?}, forcing park");
                    self.force_park();
                    Step::Idle(self.cfg.retry_wait())
                }
            };
            match step {
                Step::Fire(trigger) => self.fire_step(trigger).await,
                Step::Idle(delay) => idle(delay).await,
                Step::Stay => {}
                Step::Halt => break,
            }
        }
        let verdict = self.safety.verdict(Utc::now());
        self.publish_status(verdict.is_safe());
        info!(
            "unit stopping after {} cycle(s): {} exposure(s), {}/{} field(s) finished",
            self.cycles,
            self.scheduler.exposures_total(),
            self.scheduler.completed_count(),
            self.scheduler.total_count()
        );
    }

    pub fn scheduler(&self) -> &Scheduler { &self.scheduler }
    pub fn machine(&self) -> &StateMachine { &self.machine }

    /// Fires a trigger and translates each refusal into loop behavior:
    /// an unmet condition retries or escalates, an unsatisfied horizon
    /// simply waits, a missing transition waits too (the table may only
    /// offer it after conditions change).
    async fn fire_step(&mut self, trigger: &'static str) {
        match self.machine.fire(trigger) {
            Ok(state) => info!("{trigger} -> {state}"),
            Err(TransitionError::HorizonNotSatisfied { horizon, .. }) => {
                info!("waiting on {horizon} horizon before {trigger}");
                idle(self.cfg.wait_delay()).await;
            }
            Err(e @ TransitionError::ConditionNotMet { .. }) => {
                warn!("{e}");
                self.recover_or_park(trigger).await;
            }
            Err(e @ TransitionError::NoMatchingTransition { .. }) => {
                error!("{e}");
                idle(self.cfg.retry_wait()).await;
            }
        }
    }

    /// After a refused transition or failed operation: wait and retry
    /// while attempts remain, otherwise give up on the cycle and park.
    async fn recover_or_park(&mut self, trigger: &str) {
        if self.machine.attempts_exhausted(trigger) {
            error!(
                "{trigger} failed {} time(s), giving up and parking",
                self.machine.attempts(trigger)
            );
            self.force_park();
        } else {
            idle(self.cfg.retry_wait()).await;
        }
    }

    /// Drives the machine toward park unconditionally. Returns whether a
    /// park transition existed from the current state.
    fn force_park(&mut self) -> bool {
        match self.machine.force(TRIGGER_PARK) {
            Ok(state) => {
                log!("forced park, now {state}");
                true
            }
            Err(e) => {
                event!("park not available: {e}");
                false
            }
        }
    }

    /// Supervises one hardware operation: polls its status on the
    /// configured cadence, re-checks safety between polls and enforces
    /// `timeout`. The status check runs first, so work that finished just
    /// before conditions turned is still credited.
    async fn wait_op(&mut self, op: &mut AsyncOp, timeout: TimeDelta) -> OpOutcome {
        let limit = Countdown::new(timeout);
        let period = self.cfg.status_check_interval().to_std().unwrap_or_default();
        let mut ticker = tokio::time::interval(period.max(std::time::Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match op.poll() {
                OpStatus::Done => return OpOutcome::Done,
                OpStatus::Failed => return OpOutcome::Failed,
                OpStatus::Running => {}
            }
            if !self.machine.current_is_tagged(TAG_ALWAYS_SAFE) {
                let verdict = self.safety.verdict(Utc::now());
                if !verdict.is_safe() {
                    warn!("{verdict} while waiting on {}", op.what());
                    self.cancel_op(op).await;
                    return OpOutcome::Interrupted;
                }
            }
            if limit.is_lapsed() {
                warn!("{} exceeded its {} s budget", op.what(), timeout.num_seconds());
                self.cancel_op(op).await;
                return OpOutcome::TimedOut;
            }
        }
    }

    /// Asks the operation to stop and waits out the grace period.
    /// Hardware that ignores the request is latched as a fault so the
    /// safety monitor keeps the unit grounded; a later successful park
    /// clears the latch.
    async fn cancel_op(&mut self, op: &mut AsyncOp) {
        op.cancel();
        let grace = self.cfg.cancel_grace().to_std().unwrap_or_default();
        if op.acknowledged(grace).await {
            event!("{} cancelled cleanly", op.what());
        } else {
            error!(
                "{} ignored cancellation for {:.1} s, flagging fault",
                op.what(),
                grace.as_secs_f64()
            );
            self.safety.flag_hardware_fault(format!("{} ignored cancel", op.what()));
        }
    }

    async fn act_sleeping(&mut self) -> Step {
        if self.cfg.run_once && self.cycles > 0 {
            info!("run_once set, staying asleep");
            return Step::Halt;
        }
        if self.machine.attempts_exhausted(TR_GET_READY) {
            error!("mount would not initialize, halting");
            return Step::Halt;
        }
        // Bench runs attempt their one cycle regardless; a continuous unit
        // sleeps through bad conditions instead of churning the cycle.
        if !self.cfg.run_once {
            let verdict = self.safety.verdict(Utc::now());
            if !verdict.is_safe() {
                info!("{verdict}, staying asleep");
                return Step::Idle(self.cfg.wait_delay());
            }
        }
        if !self.observatory.mount().is_initialized() {
            info!("initializing mount");
            let mut op = self.observatory.mount().initialize().await;
            match self.wait_op(&mut op, self.cfg.init_timeout()).await {
                OpOutcome::Done => {}
                OpOutcome::Failed | OpOutcome::TimedOut => {
                    let attempts = self.machine.penalize(TR_GET_READY);
                    warn!("mount initialization failed (attempt {attempts})");
                    self.recover_or_park(TR_GET_READY).await;
                    return Step::Stay;
                }
                OpOutcome::Interrupted => return Step::Stay,
            }
        }
        Step::Fire(TR_GET_READY)
    }

    fn act_scheduling(&mut self) -> Step {
        let ctx = self.scoring_context(Utc::now());
        if self.scheduler.select(&ctx).is_some() {
            return Step::Fire(TR_START_SLEWING);
        }
        if self.scheduler.has_pending() {
            info!("nothing observable right now, waiting");
        } else {
            info!("field catalog exhausted");
            if self.cfg.run_once {
                return Step::Fire(TRIGGER_PARK);
            }
            log!("holding until the catalog resets at end of night");
        }
        Step::Idle(self.cfg.wait_delay())
    }

    async fn act_slewing(&mut self) -> Step {
        let Some(target) = self.scheduler.current_position() else {
            warn!("no target to slew to, parking");
            return Step::Fire(TRIGGER_PARK);
        };
        if self.observatory.mount().is_tracking() && self.slewed_to == Some(target) {
            event!("already tracking the target, skipping slew");
            return Step::Fire(TR_TRACK);
        }
        info!("slewing to {target}");
        let mut op = self.observatory.mount().slew_to(target).await;
        match self.wait_op(&mut op, self.cfg.slew_timeout()).await {
            OpOutcome::Done => {
                self.slewed_to = Some(target);
                Step::Fire(TR_TRACK)
            }
            // The tracking condition on the next transition counts the
            // failure and decides about retries.
            OpOutcome::Failed | OpOutcome::TimedOut => Step::Fire(TR_TRACK),
            OpOutcome::Interrupted => Step::Stay,
        }
    }

    async fn act_observing(&mut self) -> Step {
        let header = self.scheduler.current_observation().map(|obs| {
            (obs.name().to_string(), obs.exptime(), obs.exposures_taken(), obs.min_nexp())
        });
        let Some((name, exptime, taken, total)) = header else {
            warn!("no current observation, parking");
            return Step::Fire(TRIGGER_PARK);
        };
        info!("exposure {}/{} on {} ({} s)", taken + 1, total, name, exptime.num_seconds());
        let mut op = self.observatory.camera().expose(exptime, &name).await;
        let budget = exptime + self.cfg.exposure_overhead();
        match self.wait_op(&mut op, budget).await {
            OpOutcome::Done => {
                self.scheduler.record_exposure();
                Step::Fire(TR_ANALYZE)
            }
            OpOutcome::Failed | OpOutcome::TimedOut => {
                let attempts = self.machine.penalize(TR_ANALYZE);
                warn!("exposure on {name} failed (attempt {attempts})");
                self.recover_or_park(TR_ANALYZE).await;
                Step::Stay
            }
            OpOutcome::Interrupted => {
                warn!("exposure on {name} interrupted, frame discarded");
                Step::Stay
            }
        }
    }

    fn act_analyzing(&mut self) -> Step {
        let Some(obs) = self.scheduler.current_observation() else {
            return Step::Fire(TR_SCHEDULE);
        };
        if obs.is_complete() || obs.at_set_boundary() {
            // Between exposure sets a target switch is cheap, so the
            // scheduler gets to reconsider.
            Step::Fire(TR_SCHEDULE)
        } else {
            Step::Fire(TR_ADJUST_TRACKING)
        }
    }

    async fn act_parking(&mut self) -> Step {
        if self.observatory.mount().is_parked() {
            return Step::Fire(TR_SET_PARK);
        }
        info!("parking the mount");
        let mut op = self.observatory.mount().park().await;
        match self.wait_op(&mut op, self.cfg.park_timeout()).await {
            OpOutcome::Done => {
                self.slewed_to = None;
                self.safety.clear_hardware_fault();
                Step::Fire(TR_SET_PARK)
            }
            OpOutcome::Failed | OpOutcome::TimedOut => {
                let attempts = self.machine.penalize(TR_SET_PARK);
                error!("park attempt {attempts} failed");
                if self.machine.attempts_exhausted(TR_SET_PARK) {
                    error!("mount will not park, halting for operator attention");
                    Step::Halt
                } else {
                    Step::Idle(self.cfg.retry_wait())
                }
            }
            OpOutcome::Interrupted => Step::Stay,
        }
    }

    /// Parked mid-run the unit decides how the night goes on: a bench run
    /// wraps up, daylight means the night is over, a recovered sky resumes
    /// observing with the catalog's progress intact, and anything else
    /// holds here with the mount safely stowed.
    fn act_parked(&mut self) -> Step {
        if self.cfg.run_once {
            return Step::Fire(TR_CLEAN_UP);
        }
        let now = Utc::now();
        if !self.safety.is_dark(now) {
            info!("night is over, cleaning up");
            return Step::Fire(TR_CLEAN_UP);
        }
        let verdict = self.safety.verdict(now);
        if verdict.is_safe() {
            info!("conditions recovered, resuming the night");
            Step::Fire(TR_GET_READY)
        } else {
            log!("{verdict}, staying parked");
            Step::Idle(self.cfg.wait_delay())
        }
    }

    fn act_housekeeping(&mut self) -> Step {
        self.cycles += 1;
        info!(
            "cycle {} done: {} sequence(s) started, {}/{} field(s) finished, {} exposure(s)",
            self.cycles,
            self.scheduler.observed_log().len(),
            self.scheduler.completed_count(),
            self.scheduler.total_count(),
            self.scheduler.exposures_total()
        );
        if !self.cfg.run_once {
            self.scheduler.reset_for_new_night();
        }
        Step::Fire(TR_GOTO_SLEEP)
    }

    fn scoring_context(&self, now: DateTime<Utc>) -> ScoringContext {
        let site = self.cfg.site.observer_site();
        ScoringContext {
            time: now,
            site,
            moon: sky::moon_position(now),
            end_of_night: sky::end_of_night(site, now, self.cfg.horizons.observe),
        }
    }

    fn publish_status(&self, safe: bool) {
        let status = UnitStatus {
            state: self.machine.current_state().to_string(),
            target: self.scheduler.current_observation().map(|obs| obs.name().to_string()),
            cycles: self.cycles,
            exposures: self.scheduler.exposures_total(),
            safe,
        };
        self.status_tx.send_replace(status);
    }
}

/// Condition probes the state table may refer to, answered live by the
/// hardware flags.
fn capability_registry(observatory: &Observatory) -> HashMap<String, ConditionFn> {
    let mut registry: HashMap<String, ConditionFn> = HashMap::new();
    let for_init = observatory.mount_handle();
    registry.insert("mount_is_initialized".to_string(), Box::new(move || for_init.is_initialized()));
    let for_tracking = observatory.mount_handle();
    registry.insert("mount_is_tracking".to_string(), Box::new(move || for_tracking.is_tracking()));
    let for_parked = observatory.mount_handle();
    registry.insert("mount_is_parked".to_string(), Box::new(move || for_parked.is_parked()));
    let camera = observatory.camera_handle();
    registry.insert("camera_is_idle".to_string(), Box::new(move || !camera.is_exposing()));
    registry
}

async fn idle(delay: TimeDelta) {
    tokio::time::sleep(delay.to_std().unwrap_or_default()).await;
}

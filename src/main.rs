#![allow(dead_code, clippy::similar_names)]
#![warn(clippy::shadow_reuse, clippy::shadow_same, clippy::builtin_type_shadow)]
mod config;
mod control;
mod hardware;
mod scheduler;
mod sky;
mod state_machine;
mod util;

use crate::config::UnitConfig;
use crate::control::{ControlUnit, UnitStatus, WeatherReading};
use crate::hardware::{Observatory, SimCamera, SimMount, SimTimings};
use crate::scheduler::{Altitude, Constraint, Duration, MoonAvoidance, Scheduler};
use crate::state_machine::StateTable;
use std::{env, sync::Arc};
use tokio::sync::watch;

const WEATHER_SIM_PERIOD: std::time::Duration = std::time::Duration::from_secs(30);

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() {
    let cfg = match env::var("ARGUS_CONFIG") {
        Ok(path) => UnitConfig::from_file(&path)
            .unwrap_or_else(|e| fatal!("Could not load unit config from {path}: {e}")),
        Err(_) => {
            info!("ARGUS_CONFIG not set, using built-in defaults");
            UnitConfig::default()
        }
    };
    info!("Unit {} starting up at {:.4} {:.4}", cfg.name, cfg.site.latitude, cfg.site.longitude);

    let table = match env::var("ARGUS_STATE_TABLE") {
        Ok(path) => StateTable::from_file(&path)
            .unwrap_or_else(|e| fatal!("Could not load state table from {path}: {e}")),
        Err(_) => {
            StateTable::builtin().unwrap_or_else(|e| fatal!("Built-in state table is broken: {e}"))
        }
    };

    let scheduler = match env::var("ARGUS_FIELDS") {
        Ok(path) => Scheduler::from_file(&path, default_constraints(&cfg))
            .unwrap_or_else(|e| fatal!("Could not load field catalog from {path}: {e}")),
        Err(_) => {
            warn!("ARGUS_FIELDS not set, starting with an empty catalog");
            Scheduler::new(Vec::new(), default_constraints(&cfg))
                .unwrap_or_else(|e| fatal!("Empty catalog rejected: {e}"))
        }
    };
    sched!("Catalog holds {} field(s)", scheduler.total_count());

    let status_period = cfg
        .status_check_interval()
        .to_std()
        .unwrap_or_default()
        .max(std::time::Duration::from_millis(1));

    // The channel starts empty; the monitor treats a missing reading as
    // unsafe without arming its cooldown.
    let (weather_tx, weather_rx) = watch::channel(None);
    if cfg.simulates("weather") {
        weather_tx.send_replace(Some(WeatherReading::good("simulated clear sky")));
        tokio::spawn(async move {
            let mut clock = tokio::time::interval(WEATHER_SIM_PERIOD);
            loop {
                clock.tick().await;
                if weather_tx.send(Some(WeatherReading::good("simulated clear sky"))).is_err() {
                    break;
                }
            }
        });
    } else {
        warn!("No weather source configured, the unit will hold until readings arrive");
    }

    let observatory = Observatory::new(
        Arc::new(SimMount::new(SimTimings::default())),
        Arc::new(SimCamera::new()),
    );

    let (mut unit, status_rx) = ControlUnit::new(cfg, table, scheduler, observatory, weather_rx)
        .unwrap_or_else(|e| fatal!("State table rejected: {e}"));

    tokio::spawn(async move {
        let mut clock = tokio::time::interval(status_period);
        loop {
            clock.tick().await;
            if status_rx.has_changed().is_err() {
                break;
            }
            report(&status_rx.borrow().clone());
        }
    });

    unit.run().await;
    info!("Control loop finished, shutting down");
}

fn default_constraints(cfg: &UnitConfig) -> Vec<Box<dyn Constraint>> {
    vec![
        Box::new(Altitude::new(cfg.scheduler.altitude_weight, cfg.horizons.horizon)),
        Box::new(MoonAvoidance::new(cfg.scheduler.moon_weight, cfg.scheduler.moon_min_separation)),
        Box::new(Duration::new(cfg.scheduler.duration_weight, cfg.horizons.horizon)),
    ]
}

fn report(status: &UnitStatus) {
    let target = status.target.as_deref().unwrap_or("none");
    log!(
        "[{}] target: {target}, cycle {}, {} exposure(s), conditions {}",
        status.state,
        status.cycles,
        status.exposures,
        if status.safe { "safe" } else { "unsafe" }
    );
}

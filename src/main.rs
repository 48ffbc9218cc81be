use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde_json::json;
use tokio::time::{interval, Duration};

use vario_core::filters::altitude::VerticalSpeedFormula;
use vario_core::igc::LogParser;
use vario_core::sensors::{
    AlertKind, BenchBarometer, BenchGps, BenchImu, BenchPower, Clock, Hardware, ManualClock, MonotonicClock,
    SilentAudio,
};
use vario_core::{CycleReport, FlightComputer, FlightPhase, VarioConfig};

#[derive(Parser, Debug)]
#[command(name = "vario")]
#[command(about = "Replay an IGC flight log through the variometer core", long_about = None)]
struct Args {
    /// IGC log (plain or .gz)
    #[arg(long)]
    igc: PathBuf,

    /// Cycle period in milliseconds
    #[arg(long, default_value_t = 100)]
    tick_ms: u32,

    /// Stop after this many milliseconds (0 = until the log ends)
    #[arg(long, default_value_t = 0)]
    duration_ms: u32,

    /// JSON config; missing fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bench battery voltage
    #[arg(long, default_value_t = 4.0)]
    battery_voltage: f32,

    /// Derive vertical speed from the previous altitude instead of the legacy formula
    #[arg(long, default_value_t = false)]
    corrected_vario: bool,

    /// Keep the zero speed/heading of raw B-records
    #[arg(long, default_value_t = false)]
    raw_speed: bool,

    /// Pace cycles against the wall clock
    #[arg(long, default_value_t = false)]
    realtime: bool,

    /// Write a live status JSON file when the run ends
    #[arg(long)]
    status_out: Option<PathBuf>,
}

/// Accumulates per-cycle figures for the summary.
#[derive(Default)]
struct RunStats {
    cycles: u64,
    valid_cycles: u64,
    mode_cycles: BTreeMap<&'static str, u64>,
    phases_seen: Vec<FlightPhase>,
    transitions: u64,
    max_altitude: f32,
    vs_pairs: Vec<(f64, f64)>,
}

impl RunStats {
    fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        if report.snapshot.is_valid {
            self.valid_cycles += 1;
        }
        *self.mode_cycles.entry(report.mode.label()).or_insert(0) += 1;
        if !self.phases_seen.contains(&report.phase) {
            self.phases_seen.push(report.phase);
        }
        if report.transition.is_some() {
            self.transitions += 1;
        }
        if self.cycles == 1 || report.snapshot.altitude > self.max_altitude {
            self.max_altitude = report.snapshot.altitude;
        }
        if let Some(reference) = report.reference_vertical_speed {
            self.vs_pairs
                .push((report.snapshot.vertical_speed as f64, reference as f64));
        }
    }
}

fn rmse_pairs(pairs: &[(f64, f64)]) -> f64 {
    if pairs.is_empty() {
        return f64::INFINITY;
    }
    let sum_sq: f64 = pairs.iter().map(|(a, b)| (a - b).powi(2)).sum();
    (sum_sq / pairs.len() as f64).sqrt()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if args.tick_ms == 0 {
        anyhow::bail!("--tick-ms must be positive");
    }

    let mut config = match args.config.as_ref() {
        Some(path) => VarioConfig::load(path)?,
        None => VarioConfig::default(),
    };
    if args.corrected_vario {
        config.altitude.vertical_speed_formula = VerticalSpeedFormula::PreviousAltitudeBaseline;
    }

    let mut records = LogParser::load(&args.igc)
        .with_context(|| format!("loading {}", args.igc.display()))?;
    if !args.raw_speed {
        LogParser::derive_ground_track(&mut records);
    }
    let record_count = records.len();
    let first_baro = records.first().map(|r| r.baro_altitude).unwrap_or(0.0);

    log::info!(
        "[VARIO] {} records from {}, tick {} ms, formula {:?}",
        record_count,
        args.igc.display(),
        args.tick_ms,
        config.altitude.vertical_speed_formula
    );

    // Bench collaborators stand in for the hardware; replay drives the fixes
    let mut baro = BenchBarometer::at_altitude(first_baro, config.qnh_hpa);
    let mut gps = BenchGps::default();
    let mut imu = BenchImu::default();
    let mut power = BenchPower::new(args.battery_voltage);
    let mut audio = SilentAudio::default();
    let mut hw = Hardware {
        barometer: &mut baro,
        gps: &mut gps,
        imu: &mut imu,
        power: &mut power,
        audio: &mut audio,
    };

    let manual = ManualClock::starting_at(0);
    let wall = MonotonicClock::new();
    let clock: &dyn Clock = if args.realtime { &wall } else { &manual };
    let mut ticker = args
        .realtime
        .then(|| interval(Duration::from_millis(u64::from(args.tick_ms))));

    let started_at = Utc::now();
    let mut fc = FlightComputer::new(config, &mut hw);
    if !fc.enable_replay(records, clock.now_millis()) {
        anyhow::bail!("replay refused {}", args.igc.display());
    }

    let mut stats = RunStats::default();
    loop {
        match ticker.as_mut() {
            Some(t) => {
                t.tick().await;
            }
            None => manual.advance(args.tick_ms),
        }

        let report = fc.run_cycle(&mut hw, clock);
        stats.record(&report);

        if !fc.replay_active() {
            log::info!("[VARIO] log finished after {} cycles", stats.cycles);
            break;
        }
        if args.duration_ms > 0 && report.now_ms >= args.duration_ms {
            log::info!("[VARIO] duration reached at {} ms", report.now_ms);
            break;
        }
    }

    hw.audio.play_alert(AlertKind::Shutdown);

    if let Some(path) = args.status_out.as_ref() {
        fc.status()
            .save(path)
            .with_context(|| format!("writing status to {}", path.display()))?;
    }

    let snapshot = fc.snapshot();
    let valid_ratio = if stats.cycles > 0 {
        stats.valid_cycles as f64 / stats.cycles as f64
    } else {
        0.0
    };
    let summary = json!({
        "log": args.igc.display().to_string(),
        "records": record_count,
        "started_at": started_at.to_rfc3339(),
        "finished_at": Utc::now().to_rfc3339(),
        "vertical_speed_formula": format!("{:?}", fc.altitude_estimator().formula()),
        "cycles": stats.cycles,
        "valid_ratio": valid_ratio,
        "mode_cycles": stats.mode_cycles,
        "mode_transitions": stats.transitions,
        "phases": stats.phases_seen.iter().map(|p| format!("{:?}", p)).collect::<Vec<_>>(),
        "max_altitude": stats.max_altitude,
        "final_altitude": snapshot.altitude,
        "vario_rmse": rmse_pairs(&stats.vs_pairs),
        "vario_pairs": stats.vs_pairs.len(),
        "final_mode": fc.mode().label(),
        "final_phase": format!("{:?}", fc.phase()),
        "health": fc.health().format_status(),
        "health_error": fc.health().last_error(),
        "tones": audio.tones,
        "alerts": audio.alerts.iter().map(|a| format!("{:?}", a)).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

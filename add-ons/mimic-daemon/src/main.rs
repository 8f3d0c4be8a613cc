//! Mimic daemon
//!
//! Runs a simulated NAO in-process: gesture-follow from an optional perception
//! recording, spoken commands typed one per line on stdin, Ctrl-C to stop.

use mimic_core::{
    ActionContext, ActionEvent, ActionSupervisor, ActuatorBank, Arbiter, ControlLoop, MimicConfig,
    MotionLibrary, NoPerception, OverrideFlag, PerceptionMapper, PerceptionSource,
    RealtimeStepper, ReplayPerception,
};
use mimic_voice::{LineTranscripts, VoiceCommandRouter, VoiceListener};
use std::io::BufReader;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn perception_source(config: &MimicConfig) -> Box<dyn PerceptionSource> {
    let Some(path) = &config.perception_replay else {
        return Box::new(NoPerception);
    };
    match ReplayPerception::open(path, true) {
        Ok(replay) => {
            tracing::info!(path = %path.display(), frames = replay.remaining(), "replaying perception");
            Box::new(replay)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "perception replay unavailable; gesture-follow idle");
            Box::new(NoPerception)
        }
    }
}

fn log_event(event: &ActionEvent) {
    match serde_json::to_string(event) {
        Ok(json) => tracing::info!(target: "mimic::motion", event = %json, "action event"),
        Err(e) => tracing::debug!(error = %e, "could not encode action event"),
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[mimic-daemon] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MimicConfig::load().expect("load MimicConfig");

    let bank = Arc::new(ActuatorBank::simulated_nao());
    let arbiter = Arc::new(Arbiter::new());
    let stepper = Arc::new(RealtimeStepper::new(config.timestep()));
    let library = MotionLibrary::load_dir(&config.motions_dir, config.timestep_ms, config.stand_ticks);

    let (supervisor, mut events) = ActionSupervisor::spawn(
        ActionContext {
            bank: Arc::clone(&bank),
            arbiter: Arc::clone(&arbiter),
            stepper: stepper.clone(),
        },
        library,
    )
    .expect("start action supervisor");
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    // The stdin reader blocks in read_line; it is left detached at exit.
    let router = Arc::new(VoiceCommandRouter::new(supervisor.sender()));
    let stdin = LineTranscripts::new(BufReader::new(std::io::stdin()));
    if let Err(e) = VoiceListener::spawn(stdin, router) {
        tracing::warn!(error = %e, "voice listener not started");
    }

    let override_flag = OverrideFlag::new();
    let mut control = ControlLoop::new(
        stepper.clone(),
        perception_source(&config),
        PerceptionMapper::new(config.mapper.clone()),
        bank,
        arbiter,
    )
    .with_min_visibility(config.min_visibility)
    .with_override(override_flag.clone());

    tracing::info!(
        timestep_ms = config.timestep_ms,
        motions_dir = %config.motions_dir.display(),
        "Mimic daemon started"
    );

    let mut control_task = tokio::task::spawn_blocking(move || control.run());
    let finished = tokio::select! {
        result = &mut control_task => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("CTRL-C received; stopping control loop");
            override_flag.trigger();
            control_task.await
        }
    };

    match finished {
        Ok(stats) => tracing::info!(
            ticks = stats.ticks,
            frames = stats.frames,
            gesture_ticks = stats.gesture_ticks,
            gated_ticks = stats.gated_ticks,
            "control loop finished"
        ),
        Err(e) => tracing::error!(error = %e, "control loop task failed"),
    }

    stepper.shutdown();
    if let Err(e) = tokio::task::spawn_blocking(move || supervisor.shutdown()).await {
        tracing::error!(error = %e, "supervisor shutdown failed");
    }
    tracing::info!("Mimic daemon stopped");
}

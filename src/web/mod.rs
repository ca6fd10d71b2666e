//! Read-only JSON view of a real-time run.

use std::{
    collections::VecDeque,
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::{net::TcpListener, sync::broadcast};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};

use crate::{
    clock::{GameSpeed, SimulationClock},
    engine::{Engine, TickFrame},
    world::{ResearchView, World},
};

const FRAME_HISTORY: usize = 500;

#[derive(Clone, Serialize)]
pub struct UiFrame {
    pub frame: TickFrame,
    pub completed: bool,
}

#[derive(Clone, Serialize)]
pub struct StateEnvelope {
    pub scenario: String,
    pub total_ticks: u64,
    pub frame: Option<UiFrame>,
    pub completed: bool,
}

#[derive(Clone)]
struct AppState {
    broadcaster: broadcast::Sender<String>,
    latest_frame: Arc<Mutex<Option<UiFrame>>>,
    frames: Arc<Mutex<VecDeque<UiFrame>>>,
    total_ticks: u64,
    scenario_name: String,
    simulation_done: Arc<AtomicBool>,
}

pub struct WebServerConfig {
    pub engine: Engine,
    pub world: World,
    pub ticks: u64,
    pub speed: GameSpeed,
    pub host: String,
    pub port: u16,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Publisher {
    latest: Arc<Mutex<Option<UiFrame>>>,
    frames: Arc<Mutex<VecDeque<UiFrame>>>,
    tx: broadcast::Sender<String>,
}

impl Publisher {
    fn publish(&self, frame: UiFrame) {
        *lock(&self.latest) = Some(frame.clone());
        {
            let mut frames = lock(&self.frames);
            if frames.len() == FRAME_HISTORY {
                frames.pop_front();
            }
            frames.push_back(frame.clone());
        }
        if let Ok(payload) = serde_json::to_string(&frame) {
            let _ = self.tx.send(payload);
        }
    }
}

/// Steps the engine against the wall clock until `ticks` ticks have run or
/// `stop` is raised. Paused time does not count toward `ticks`.
fn run_real_time(
    mut engine: Engine,
    mut world: World,
    ticks: u64,
    speed: GameSpeed,
    publisher: &Publisher,
    stop: &AtomicBool,
) -> Result<()> {
    let mut clock = SimulationClock::new(speed, Instant::now());
    let mut completed = 0;
    while completed < ticks && !stop.load(Ordering::SeqCst) {
        std::thread::sleep(clock.tick_interval());
        let day_fraction = clock.tick(Instant::now());
        if clock.speed() == GameSpeed::Paused {
            continue;
        }
        engine.step(&mut world, day_fraction)?;
        completed += 1;
        publisher.publish(UiFrame {
            frame: TickFrame::capture(&world, engine.scenario_name()),
            completed: false,
        });
    }

    let last = lock(&publisher.latest).clone();
    if let Some(mut frame) = last {
        frame.completed = true;
        publisher.publish(frame);
    }
    Ok(())
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        engine,
        world,
        ticks,
        speed,
        host,
        port,
    } = config;

    let scenario_name = engine.scenario_name().to_string();
    let (tx, _) = broadcast::channel::<String>(512);
    let latest_frame: Arc<Mutex<Option<UiFrame>>> = Arc::new(Mutex::new(None));
    let frames: Arc<Mutex<VecDeque<UiFrame>>> = Arc::new(Mutex::new(VecDeque::new()));
    let simulation_done = Arc::new(AtomicBool::new(false));
    let stop = Arc::new(AtomicBool::new(false));

    let publisher = Publisher {
        latest: latest_frame.clone(),
        frames: frames.clone(),
        tx: tx.clone(),
    };
    let done_for_sim = simulation_done.clone();
    let stop_for_sim = stop.clone();
    let sim_handle = tokio::task::spawn_blocking(move || -> Result<()> {
        let result = run_real_time(engine, world, ticks, speed, &publisher, &stop_for_sim);
        done_for_sim.store(true, Ordering::SeqCst);
        result
    });

    let state = Arc::new(AppState {
        broadcaster: tx,
        latest_frame,
        frames,
        total_ticks: ticks,
        scenario_name: scenario_name.clone(),
        simulation_done,
    });

    let scenario_label = scenario_name.clone();
    tokio::spawn(async move {
        match sim_handle.await {
            Ok(Ok(())) => tracing::info!(scenario = %scenario_label, "simulation completed"),
            Ok(Err(err)) => tracing::error!("simulation error: {err:?}"),
            Err(err) => tracing::error!("simulation task failed: {err:?}"),
        }
    });

    let router = Router::new()
        .route("/api/state", get(latest_state))
        .route("/api/frames", get(all_frames))
        .route("/api/technologies", get(technologies))
        .route("/api/events", get(stream_events))
        .with_state(state);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("serving '{scenario_name}' at http://{addr} (Ctrl+C to stop)");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    stop.store(true, Ordering::SeqCst);
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutting down web view");
}

async fn latest_state(State(state): State<Arc<AppState>>) -> Json<StateEnvelope> {
    let frame = lock(&state.latest_frame).clone();
    Json(StateEnvelope {
        scenario: state.scenario_name.clone(),
        total_ticks: state.total_ticks,
        frame,
        completed: state.simulation_done.load(Ordering::SeqCst),
    })
}

#[derive(Serialize)]
struct FramesResponse {
    scenario: String,
    total_ticks: u64,
    completed: bool,
    frames: Vec<UiFrame>,
}

async fn all_frames(State(state): State<Arc<AppState>>) -> Json<FramesResponse> {
    let frames = lock(&state.frames).iter().cloned().collect();
    Json(FramesResponse {
        scenario: state.scenario_name.clone(),
        total_ticks: state.total_ticks,
        completed: state.simulation_done.load(Ordering::SeqCst),
        frames,
    })
}

async fn technologies(State(state): State<Arc<AppState>>) -> Json<ResearchView> {
    let view = lock(&state.latest_frame)
        .as_ref()
        .map(|ui| ui.frame.research.clone())
        .unwrap_or_default();
    Json(view)
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}

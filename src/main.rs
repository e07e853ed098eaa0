use shepard::core::{BoundingBox, GeoPosition, VehicleMode};
use shepard::hardware::{MavlinkTransport, TransportMessage};
use shepard::mission::{fly_route, FixedRoute, RouteGenerator};
use shepard::processing::{AnalysisDebugger, CameraProvider, DetectionPipeline, DetectionResult, Detector, ImageFrame};
use shepard::telemetry::{LoopbackRelay, MessageRelay, StatusSink, StatusTextSender, TelemetryRelay};
use shepard::utils::{init_logging, CancelToken, SystemConfig};
use shepard::vehicle::{LocationProvider, MavlinkVehicle, ModeAck, ModeArbiter, SimVehicle, Vehicle, VehicleLocation};
use shepard::{Convergence, GroundPlaneGeolocator, GuidanceController, GuidanceResult};
use mavlink::common::MavMessage;
use std::error::Error;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const MISSION: &str = "shepard::mission";

/// Frames of a flat grey field at a fixed rate
struct SyntheticCamera {
    width: u32,
    height: u32,
    interval: Duration,
    sequence: u64,
}

impl CameraProvider for SyntheticCamera {
    fn capture(&mut self) -> DetectionResult<ImageFrame> {
        thread::sleep(self.interval);
        self.sequence += 1;
        let pixels = vec![128u8; (self.width * self.height) as usize];
        Ok(ImageFrame::new(self.width, self.height, self.sequence, pixels))
    }
}

/// Reports a pad under the camera centre on every `period`-th frame
struct PeriodicDetector {
    period: u64,
}

impl Detector for PeriodicDetector {
    fn predict(&mut self, frame: &ImageFrame) -> Option<BoundingBox> {
        if frame.sequence % self.period != 0 {
            return None;
        }
        let (w, h) = (frame.width as f64, frame.height as f64);
        Some(BoundingBox::new(w / 2.0, h / 2.0, w / 10.0, h / 10.0))
    }
}

struct LogDebugger;

impl AnalysisDebugger for LogDebugger {
    fn update(&mut self, frame: &ImageFrame, detection: Option<&BoundingBox>) {
        debug!(frame = frame.sequence, detection = ?detection, "Analysis frame");
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map_or("shepard", |s| s.as_str());

    let mut live = false;
    let mut config_path = None;
    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--live" => live = true,
            path if !path.starts_with("--") && config_path.is_none() => config_path = Some(path.to_string()),
            other => {
                eprintln!("Usage: {} [config.json] [--live]", program);
                return Err(format!("Unexpected argument '{}'", other).into());
            }
        }
    }

    let config = match config_path {
        Some(path) => SystemConfig::from_file(path)?,
        None => SystemConfig::simulation(),
    };
    init_logging(config.log_level)?;

    if live {
        run_live(&config)
    } else {
        run_simulated(&config)
    }
}

/// Fly against the in-process simulator, echoing status text through a loopback relay
fn run_simulated(config: &SystemConfig) -> Result<(), Box<dyn Error>> {
    let home = GeoPosition::global_relative(-35.363261, 149.165230, 0.0);
    let sim = Arc::new(SimVehicle::new(home, config.sim.clone()));
    sim.arm();
    sim.set_mode(VehicleMode::Guided);

    let loopback = LoopbackRelay::new();
    loopback.subscribe(Arc::new(|frame: &TransportMessage| {
        if let MavMessage::STATUSTEXT(data) = &frame.message {
            info!(target: MISSION, chunk = data.chunk_seq, severity = ?data.severity, "Status text on loopback");
        }
    }));
    let status = Arc::new(StatusTextSender::new(Arc::new(loopback)));

    fly_mission(sim, status, config)
}

/// Fly a real autopilot over the configured TCP link
fn run_live(config: &SystemConfig) -> Result<(), Box<dyn Error>> {
    let transport = MavlinkTransport::connect(&config.link)?;
    let mut relay = TelemetryRelay::new(transport, config.relay.clone());
    let handle = relay.handle();

    let vehicle = Arc::new(MavlinkVehicle::new(Arc::new(handle.clone())));
    handle.subscribe(vehicle.listener());

    let cancel = CancelToken::new();
    let relay_cancel = cancel.clone();
    let relay_thread = thread::Builder::new()
        .name("relay".to_string())
        .spawn(move || relay.run(&relay_cancel))?;

    let status = Arc::new(StatusTextSender::new(Arc::new(handle)));
    let result = fly_mission(vehicle, status, config);

    cancel.cancel();
    match relay_thread.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(target: MISSION, error = %e, "Relay ended with error"),
        Err(_) => error!(target: MISSION, "Relay thread panicked"),
    }
    result
}

fn fly_mission(
    vehicle: Arc<dyn Vehicle>,
    status: Arc<dyn StatusSink>,
    config: &SystemConfig,
) -> Result<(), Box<dyn Error>> {
    let arbiter = ModeArbiter::spawn(vehicle.clone(), config.modes.clone())?;
    let nav = GuidanceController::new(vehicle.clone(), arbiter.client(), config.guidance.clone()).with_status_sink(status);

    let location: Arc<dyn LocationProvider> = Arc::new(VehicleLocation::new(vehicle));
    let (width, height) = config.camera.resolution();
    let pipeline = DetectionPipeline::new(
        Box::new(SyntheticCamera {
            width,
            height,
            interval: Duration::from_millis(200),
            sequence: 0,
        }),
        Box::new(PeriodicDetector { period: 10 }),
        Box::new(GroundPlaneGeolocator::new(location.clone())),
        location,
        config.camera,
    )?
    .with_debugger(Box::new(LogDebugger));
    pipeline.subscribe(|frame: &ImageFrame, lon: f64, lat: f64| {
        info!(target: MISSION, frame = frame.sequence, lon, lat, "Landing pad candidate");
    });

    let detection_cancel = CancelToken::new();
    let detection = pipeline.start(detection_cancel.clone())?;

    let result = fly(&nav);

    detection_cancel.cancel();
    match detection.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(target: MISSION, error = %e, "Detection ended with error"),
        Err(_) => error!(target: MISSION, "Detection thread panicked"),
    }

    result.map_err(Into::into)
}

/// Survey, then return to launch whatever the survey outcome
fn fly(nav: &GuidanceController) -> GuidanceResult<()> {
    if !nav.wait_until_armed_and_guided()?.is_converged() {
        return Ok(());
    }
    let _ = nav.send_status_message("Mission start");

    let outcome = survey(nav)?;
    info!(target: MISSION, outcome = ?outcome, "Survey finished");

    let ticket = nav.return_to_launch()?;
    match ticket.wait() {
        ModeAck::Confirmed => info!(target: MISSION, "Returning to launch"),
        other => warn!(target: MISSION, ack = ?other, "RTL not confirmed"),
    }
    Ok(())
}

fn survey(nav: &GuidanceController) -> GuidanceResult<Convergence> {
    let outcome = nav.takeoff(10.0)?;
    if !outcome.is_converged() {
        return Ok(outcome);
    }
    nav.set_groundspeed(2.0)?;

    for (d_north, d_east) in [(10.0, 0.0), (0.0, 10.0), (-10.0, 0.0), (0.0, -10.0)] {
        let outcome = nav.set_position_relative(d_north, d_east)?;
        if !outcome.is_converged() {
            return Ok(outcome);
        }
    }

    let outcome = nav.set_altitude_relative(5.0)?;
    if !outcome.is_converged() {
        return Ok(outcome);
    }
    nav.set_heading(90.0)?;
    nav.set_heading_relative(-45.0)?;

    let route = FixedRoute::square(15.0).generate_route(4);
    let progress = fly_route(nav, &route, 10.0)?;
    info!(target: MISSION, completed = progress.completed, "Search route flown");
    Ok(progress.outcome)
}

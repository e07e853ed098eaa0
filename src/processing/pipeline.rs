//! Detection pipeline
//!
//! One cycle: capture a frame, run the detector, update the debugger if one is
//! attached, then for a detection read the vehicle pose once, build the
//! normalized inference record from it, geolocate it at that same pose and hand `(frame, lon, lat)` to every subscriber in
//! registration order. A cycle without a detection notifies nobody.

use crate::algorithms::Geolocator;
use crate::api::callback::{ListenerHandle, ListenerRegistry};
use crate::core::{BoundingBox, CameraIntrinsics, InferenceRecord};
use crate::utils::cancel::CancelToken;
use crate::vehicle::{LocationProvider, Pose};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

/// Captured image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    /// Capture counter assigned by the camera
    pub sequence: u64,
    pub pixels: Arc<[u8]>,
}

impl ImageFrame {
    pub fn new(width: u32, height: u32, sequence: u64, pixels: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            sequence,
            pixels: pixels.into(),
        }
    }
}

/// Detection pipeline errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DetectionError {
    #[error("Camera capture failed: {reason}")]
    CaptureFailed { reason: String },
    #[error("Invalid camera intrinsics: {reason}")]
    InvalidIntrinsics { reason: String },
    #[error("Could not start detection thread: {reason}")]
    SpawnFailed { reason: String },
}

/// Result type for the detection pipeline
pub type DetectionResult<T> = Result<T, DetectionError>;

pub trait CameraProvider: Send {
    fn capture(&mut self) -> DetectionResult<ImageFrame>;
}

pub trait Detector: Send {
    /// Bounding box of the detected object, if any
    fn predict(&mut self, frame: &ImageFrame) -> Option<BoundingBox>;
}

/// Live view of detection results
pub trait AnalysisDebugger: Send {
    fn update(&mut self, frame: &ImageFrame, detection: Option<&BoundingBox>);
}

/// Receives `(frame, longitude, latitude)` for every geolocated detection
pub type DetectionSubscriber = dyn Fn(&ImageFrame, f64, f64) + Send + Sync;

/// What a single cycle produced
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Detector found nothing
    NoDetection,
    /// Detection could not be placed on the ground
    Unlocated(InferenceRecord),
    /// Subscribers were notified
    Notified { lon: f64, lat: f64, subscribers: usize },
}

pub struct DetectionPipeline {
    camera: Box<dyn CameraProvider>,
    detector: Box<dyn Detector>,
    debugger: Option<Box<dyn AnalysisDebugger>>,
    geolocator: Box<dyn Geolocator>,
    location: Arc<dyn LocationProvider>,
    intrinsics: CameraIntrinsics,
    subscribers: Arc<ListenerRegistry<DetectionSubscriber>>,
    cycles: u64,
}

impl DetectionPipeline {
    pub fn new(
        camera: Box<dyn CameraProvider>,
        detector: Box<dyn Detector>,
        geolocator: Box<dyn Geolocator>,
        location: Arc<dyn LocationProvider>,
        intrinsics: CameraIntrinsics,
    ) -> DetectionResult<Self> {
        let (width, height) = intrinsics.resolution();
        if width == 0 || height == 0 {
            return Err(DetectionError::InvalidIntrinsics {
                reason: format!("resolution {}x{}", width, height),
            });
        }
        if !(intrinsics.focal_length() > 0.0) {
            return Err(DetectionError::InvalidIntrinsics {
                reason: format!("focal length {}", intrinsics.focal_length()),
            });
        }

        Ok(Self {
            camera,
            detector,
            debugger: None,
            geolocator,
            location,
            intrinsics,
            subscribers: Arc::new(ListenerRegistry::new()),
            cycles: 0,
        })
    }

    pub fn with_debugger(mut self, debugger: Box<dyn AnalysisDebugger>) -> Self {
        self.debugger = Some(debugger);
        self
    }

    pub fn subscribe<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(&ImageFrame, f64, f64) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(Arc::new(callback))
    }

    pub fn unsubscribe(&self, handle: ListenerHandle) -> bool {
        self.subscribers.unsubscribe(handle)
    }

    /// Registry shared with the running loop, for subscribing after `start`
    pub fn subscriptions(&self) -> Arc<ListenerRegistry<DetectionSubscriber>> {
        Arc::clone(&self.subscribers)
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    /// Normalizes a detection by image resolution and pairs it with the
    /// altitude of `pose`
    pub fn inference(&self, detection: &BoundingBox, pose: &Pose) -> InferenceRecord {
        let (width, height) = self.intrinsics.resolution();
        InferenceRecord {
            x_norm: detection.x / width as f64,
            y_norm: detection.y / height as f64,
            relative_altitude: pose.altitude(),
        }
    }

    /// Run exactly one cycle
    pub fn run_once(&mut self) -> DetectionResult<CycleOutcome> {
        let frame = self.camera.capture()?;
        let detection = self.detector.predict(&frame);
        self.cycles += 1;

        if let Some(debugger) = self.debugger.as_mut() {
            debugger.update(&frame, detection.as_ref());
        }

        let Some(detection) = detection else {
            trace!(frame = frame.sequence, "No detection");
            return Ok(CycleOutcome::NoDetection);
        };

        let pose = self.location.pose();
        let inference = self.inference(&detection, &pose);
        let Some((lon, lat)) = self.geolocator.get_object_location_at(&self.intrinsics, &inference, &pose) else {
            debug!(frame = frame.sequence, x = inference.x_norm, y = inference.y_norm, "Detection not geolocated");
            return Ok(CycleOutcome::Unlocated(inference));
        };

        let subscribers = self.subscribers.snapshot();
        debug!(frame = frame.sequence, lon, lat, subscribers = subscribers.len(), "Detection geolocated");
        for subscriber in &subscribers {
            subscriber(&frame, lon, lat);
        }

        Ok(CycleOutcome::Notified {
            lon,
            lat,
            subscribers: subscribers.len(),
        })
    }

    /// Repeat cycles until cancelled. A capture failure ends the loop.
    pub fn run(&mut self, cancel: &CancelToken) -> DetectionResult<()> {
        info!(subscribers = self.subscribers.len(), "Detection loop started");
        while !cancel.is_cancelled() {
            if let Err(e) = self.run_once() {
                warn!(error = %e, cycles = self.cycles, "Detection loop stopped");
                return Err(e);
            }
        }
        info!(cycles = self.cycles, "Detection loop cancelled");
        Ok(())
    }

    /// Run the loop on a dedicated thread
    pub fn start(mut self, cancel: CancelToken) -> DetectionResult<JoinHandle<DetectionResult<()>>> {
        thread::Builder::new()
            .name("detection".to_string())
            .spawn(move || self.run(&cancel))
            .map_err(|e| DetectionError::SpawnFailed { reason: e.to_string() })
    }

    /// Completed cycles
    pub fn cycle_count(&self) -> u64 {
        self.cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{geomath, GroundPlaneGeolocator};
    use crate::core::{GeoPosition, VehicleMode};
    use crate::vehicle::{SimConfig, SimVehicle, Vehicle, VehicleLocation};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct CountingCamera {
        next: u64,
        fail_after: Option<u64>,
    }

    impl CameraProvider for CountingCamera {
        fn capture(&mut self) -> DetectionResult<ImageFrame> {
            if self.fail_after.is_some_and(|limit| self.next >= limit) {
                return Err(DetectionError::CaptureFailed {
                    reason: "camera unplugged".to_string(),
                });
            }
            self.next += 1;
            Ok(ImageFrame::new(100, 100, self.next, vec![0u8; 4]))
        }
    }

    /// Replays detections, repeating the last one
    struct ScriptedDetector {
        script: VecDeque<Option<BoundingBox>>,
    }

    impl Detector for ScriptedDetector {
        fn predict(&mut self, _frame: &ImageFrame) -> Option<BoundingBox> {
            if self.script.len() > 1 {
                self.script.pop_front().flatten()
            } else {
                self.script.front().copied().flatten()
            }
        }
    }

    struct RecordingDebugger {
        updates: Arc<Mutex<Vec<(u64, bool)>>>,
    }

    impl AnalysisDebugger for RecordingDebugger {
        fn update(&mut self, frame: &ImageFrame, detection: Option<&BoundingBox>) {
            self.updates.lock().push((frame.sequence, detection.is_some()));
        }
    }

    /// Returns `(x_norm, y_norm)` as the location and records each inference
    struct EchoGeolocator {
        seen: Arc<Mutex<Vec<InferenceRecord>>>,
        locate: bool,
    }

    impl Geolocator for EchoGeolocator {
        fn get_object_location(
            &self,
            _camera: &CameraIntrinsics,
            inference: &InferenceRecord,
        ) -> Option<(f64, f64)> {
            self.seen.lock().push(*inference);
            self.locate.then_some((inference.x_norm, inference.y_norm))
        }
    }

    struct Hover;

    impl LocationProvider for Hover {
        fn pose(&self) -> Pose {
            Pose {
                location: GeoPosition::global_relative(0.0, 0.0, 12.0),
                heading: 0.0,
            }
        }
    }

    fn pipeline(
        script: Vec<Option<BoundingBox>>,
        locate: bool,
    ) -> (DetectionPipeline, Arc<Mutex<Vec<InferenceRecord>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = DetectionPipeline::new(
            Box::new(CountingCamera { next: 0, fail_after: None }),
            Box::new(ScriptedDetector { script: script.into() }),
            Box::new(EchoGeolocator { seen: Arc::clone(&seen), locate }),
            Arc::new(Hover),
            CameraIntrinsics::new(800.0, 0.0, (100, 100)),
        )
        .unwrap();
        (pipeline, seen)
    }

    #[test]
    fn test_inference_is_normalized_by_resolution() {
        let (mut pipeline, seen) = pipeline(vec![Some(BoundingBox::new(50.0, 50.0, 10.0, 10.0))], true);

        let outcome = pipeline.run_once().unwrap();
        assert_eq!(
            seen.lock()[0],
            InferenceRecord {
                x_norm: 0.5,
                y_norm: 0.5,
                relative_altitude: 12.0
            }
        );
        assert_eq!(outcome, CycleOutcome::Notified { lon: 0.5, lat: 0.5, subscribers: 0 });
    }

    #[test]
    fn test_no_detection_notifies_nobody_but_updates_debugger() {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let (pipeline, seen) = pipeline(vec![None, Some(BoundingBox::new(25.0, 75.0, 5.0, 5.0))], true);
        let mut pipeline = pipeline.with_debugger(Box::new(RecordingDebugger {
            updates: Arc::clone(&updates),
        }));

        let calls = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&calls);
        pipeline.subscribe(move |_, _, _| *counter.lock() += 1);

        assert_eq!(pipeline.run_once().unwrap(), CycleOutcome::NoDetection);
        assert_eq!(*calls.lock(), 0);
        assert!(seen.lock().is_empty());

        pipeline.run_once().unwrap();
        assert_eq!(*calls.lock(), 1);
        assert_eq!(*updates.lock(), vec![(1, false), (2, true)]);
    }

    #[test]
    fn test_subscribers_called_in_order_with_same_tuple() {
        let (pipeline, _) = pipeline(vec![Some(BoundingBox::new(20.0, 40.0, 5.0, 5.0))], true);
        let mut pipeline = pipeline;
        let calls = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (1..=3u32)
            .map(|id| {
                let calls = Arc::clone(&calls);
                pipeline.subscribe(move |frame: &ImageFrame, lon, lat| {
                    calls.lock().push((id, frame.sequence, lon, lat));
                })
            })
            .collect();

        pipeline.run_once().unwrap();
        assert_eq!(
            *calls.lock(),
            vec![(1, 1, 0.2, 0.4), (2, 1, 0.2, 0.4), (3, 1, 0.2, 0.4)]
        );

        assert!(pipeline.unsubscribe(handles[0]));
        calls.lock().clear();
        pipeline.run_once().unwrap();
        assert_eq!(calls.lock().iter().map(|c| c.0).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_unlocated_detection_is_skipped() {
        let (mut pipeline, seen) = pipeline(vec![Some(BoundingBox::new(50.0, 50.0, 1.0, 1.0))], false);
        let calls = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&calls);
        pipeline.subscribe(move |_, _, _| *counter.lock() += 1);

        assert!(matches!(pipeline.run_once().unwrap(), CycleOutcome::Unlocated(_)));
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(*calls.lock(), 0);
    }

    #[test]
    fn test_rejects_degenerate_intrinsics() {
        let build = |intrinsics| {
            DetectionPipeline::new(
                Box::new(CountingCamera { next: 0, fail_after: None }),
                Box::new(ScriptedDetector { script: VecDeque::from([None]) }),
                Box::new(EchoGeolocator { seen: Arc::default(), locate: true }),
                Arc::new(Hover),
                intrinsics,
            )
        };
        assert!(matches!(
            build(CameraIntrinsics::new(800.0, 0.0, (0, 480))),
            Err(DetectionError::InvalidIntrinsics { .. })
        ));
        assert!(matches!(
            build(CameraIntrinsics::new(0.0, 0.0, (640, 480))),
            Err(DetectionError::InvalidIntrinsics { .. })
        ));
    }

    #[test]
    fn test_started_loop_runs_until_cancelled() {
        let (pipeline, _) = pipeline(vec![Some(BoundingBox::new(10.0, 10.0, 1.0, 1.0))], true);
        let registry = pipeline.subscriptions();
        let calls = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&calls);
        registry.subscribe(Arc::new(move |_: &ImageFrame, _: f64, _: f64| *counter.lock() += 1));

        let cancel = CancelToken::new();
        let worker = pipeline.start(cancel.clone()).unwrap();
        thread::sleep(Duration::from_millis(50));
        cancel.cancel();

        assert_eq!(worker.join().unwrap(), Ok(()));
        assert!(*calls.lock() > 0);
    }

    #[test]
    fn test_capture_failure_ends_loop() {
        let mut pipeline = DetectionPipeline::new(
            Box::new(CountingCamera { next: 0, fail_after: Some(3) }),
            Box::new(ScriptedDetector { script: VecDeque::from([None]) }),
            Box::new(EchoGeolocator { seen: Arc::default(), locate: true }),
            Arc::new(Hover),
            CameraIntrinsics::new(800.0, 0.0, (100, 100)),
        )
        .unwrap();

        assert!(matches!(
            pipeline.run(&CancelToken::new()),
            Err(DetectionError::CaptureFailed { .. })
        ));
        assert_eq!(pipeline.cycle_count(), 3);
    }

    #[test]
    fn test_cycle_reads_moving_vehicle_once() {
        let sim = Arc::new(SimVehicle::new(
            GeoPosition::global_relative(-35.0, 149.0, 0.0),
            SimConfig::default(),
        ));
        sim.arm();
        sim.set_mode(VehicleMode::Guided);
        sim.command_goto(&geomath::offset(&sim.peek().location, 100.0, 0.0).with_alt(10.0))
            .unwrap();

        let location: Arc<dyn LocationProvider> = Arc::new(VehicleLocation::new(sim.clone()));
        let mut pipeline = DetectionPipeline::new(
            Box::new(CountingCamera { next: 0, fail_after: None }),
            Box::new(ScriptedDetector { script: VecDeque::from([Some(BoundingBox::new(50.0, 50.0, 4.0, 4.0))]) }),
            Box::new(GroundPlaneGeolocator::new(Arc::clone(&location))),
            location,
            CameraIntrinsics::new(800.0, 0.0, (100, 100)),
        )
        .unwrap();

        let outcome = pipeline.run_once().unwrap();
        assert_eq!(sim.poll_count(), 1);

        let moved = sim.peek().location;
        assert_eq!(moved.alt, 3.0);
        match outcome {
            CycleOutcome::Notified { lon, lat, .. } => {
                assert!((lon - moved.lon).abs() < 1e-12);
                assert!((lat - moved.lat).abs() < 1e-12);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}

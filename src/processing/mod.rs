//! Image capture and detection processing

pub mod pipeline;

pub use pipeline::{
    AnalysisDebugger, CameraProvider, CycleOutcome, DetectionError, DetectionPipeline, DetectionResult,
    DetectionSubscriber, Detector, ImageFrame,
};

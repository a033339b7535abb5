use std::path::Path;

use image::{ImageReader, RgbImage, imageops::FilterType};
use serde::{Deserialize, Serialize};

use crate::core::error::SkinCheckError;

pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// One box the model reported for an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub label: String,
    /// Percentage with one fractional digit, e.g. `"87.3%"`.
    pub confidence: String,
    /// (x1, y1, x2, y2) in the resized model-input coordinate space
    pub bbox: [f32; 4],
}

impl DetectionRecord {
    pub fn new<S: Into<String>>(label: S, confidence: f32, bbox: [f32; 4]) -> Self {
        Self {
            label: label.into(),
            confidence: format_confidence(confidence),
            bbox,
        }
    }
}

/// Renders a [0, 1] score as a percentage string with one fractional digit.
pub fn format_confidence(confidence: f32) -> String {
    let confidence = if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    format!("{:.1}%", confidence * 100.0)
}

/// Result of running the detector over one image. `Success` with an empty
/// list means the model ran and found nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    Success(Vec<DetectionRecord>),
    Failure(String),
}

impl DetectionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, DetectionOutcome::Failure(_))
    }

    pub fn records(self) -> Vec<DetectionRecord> {
        match self {
            DetectionOutcome::Success(records) => records,
            DetectionOutcome::Failure(_) => Vec::new(),
        }
    }
}

pub trait Detector: Send + Sync {
    /// Side length of the square input; boxes are reported in this space.
    fn input_dimension(&self) -> u32;

    fn detect(&self, img_path: &Path) -> DetectionOutcome;

    /// The plain record list, with failures logged and turned into no findings.
    fn detect_records(&self, img_path: &Path) -> Vec<DetectionRecord> {
        let outcome = self.detect(img_path);
        if let DetectionOutcome::Failure(reason) = &outcome {
            tracing::error!("Detection error for {}: {}", img_path.display(), reason);
        }
        outcome.records()
    }
}

/// A box straight out of the model, before formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub label: String,
    pub score: f32,
    pub bbox: [f32; 4],
}

/// Runs a pretrained model over an already prepared square RGB image.
pub trait InferenceBackend: Send + Sync {
    fn infer(&self, input: &RgbImage) -> Result<Vec<RawDetection>, SkinCheckError>;

    /// Input side length the model is fixed to, if any. `None` means the
    /// backend takes whatever size it is handed.
    fn input_dimension(&self) -> Option<u32> {
        None
    }
}

/// Loads an image and turns it into the model's input: 8-bit RGB, stretched
/// to `size` x `size` whatever the original aspect ratio.
pub fn prepare_input(img_path: &Path, size: u32) -> Result<RgbImage, SkinCheckError> {
    let img = ImageReader::open(img_path)?.with_guessed_format()?.decode()?;
    let rgb = img.to_rgb8();
    Ok(image::imageops::resize(&rgb, size, size, FilterType::Triangle))
}

/// Detector that prepares the input from disk and hands it to a backend.
pub struct ImageDetector<B> {
    backend: B,
    input_size: u32,
}

impl<B: InferenceBackend> ImageDetector<B> {
    /// Fails when the backend only accepts a different input size, since
    /// boxes would come back in a space the result page does not scale by.
    pub fn new(backend: B, input_size: u32) -> Result<Self, SkinCheckError> {
        if input_size == 0 {
            return Err(SkinCheckError::inference("input size must be positive"));
        }
        if let Some(fixed) = backend.input_dimension().filter(|&fixed| fixed != input_size) {
            return Err(SkinCheckError::inference(format!(
                "model input is {fixed}x{fixed}, configured image size is {input_size}"
            )));
        }
        Ok(Self {
            backend,
            input_size,
        })
    }
}

impl<B: InferenceBackend> Detector for ImageDetector<B> {
    fn input_dimension(&self) -> u32 {
        self.input_size
    }

    fn detect(&self, img_path: &Path) -> DetectionOutcome {
        let input = match prepare_input(img_path, self.input_size) {
            Ok(input) => input,
            Err(e) => return DetectionOutcome::Failure(format!("unreadable image: {e}")),
        };
        match self.backend.infer(&input) {
            Ok(raw) => {
                tracing::info!("Detected {} objects in {}", raw.len(), img_path.display());
                DetectionOutcome::Success(
                    raw.into_iter()
                        .map(|det| DetectionRecord::new(det.label, det.score, det.bbox))
                        .collect(),
                )
            }
            Err(e) => DetectionOutcome::Failure(e.to_string()),
        }
    }
}

#[cfg(feature = "yolo")]
pub use yolo_backend::YoloV8Backend;

#[cfg(feature = "yolo")]
mod yolo_backend {
    use std::env;
    use std::sync::Mutex;

    use image::RgbImage;
    use rand::Rng;
    use rand::distr::Alphanumeric;
    use yolo_v8::YoloV8ObjectDetection;

    use super::{DEFAULT_INPUT_SIZE, InferenceBackend, RawDetection};
    use crate::core::error::SkinCheckError;

    /// YOLOv8 TorchScript model. Calls are serialized since the runtime is
    /// not known to be reentrant.
    pub struct YoloV8Backend {
        yolo: Mutex<YoloV8ObjectDetection>,
    }

    impl YoloV8Backend {
        /// The crate locates its own TorchScript weights; there is no path
        /// to pass in.
        pub fn load() -> Self {
            tracing::info!("Loading YOLOv8 model");
            Self {
                yolo: Mutex::new(YoloV8ObjectDetection::new()),
            }
        }
    }

    impl InferenceBackend for YoloV8Backend {
        fn input_dimension(&self) -> Option<u32> {
            // the exported network is traced at 640x640
            Some(DEFAULT_INPUT_SIZE)
        }

        fn infer(&self, input: &RgbImage) -> Result<Vec<RawDetection>, SkinCheckError> {
            // the yolo runtime reads its input from a file path
            let mut temp_path = env::temp_dir();
            let rand_str: String = rand::rng()
                .sample_iter(&Alphanumeric)
                .take(12)
                .map(char::from)
                .collect();
            temp_path.push(format!("{}_yolo_input.png", rand_str));
            input.save_with_format(&temp_path, image::ImageFormat::Png)?;

            let temp_file_name = temp_path.to_string_lossy().to_string();
            let image = yolo_v8::image::Image::new(
                &temp_file_name,
                YoloV8ObjectDetection::input_dimension(),
            );
            let detections = {
                // a panic mid-inference leaves the weights untouched
                let yolo = self.yolo.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                // stock YOLOv8 predictor defaults: conf 0.25, iou 0.7
                yolo.predict(&image, 0.25, 0.7).postprocess().0
            };

            if let Err(e) = std::fs::remove_file(&temp_path) {
                tracing::warn!("Failed to remove {}: {}", temp_path.display(), e);
            }

            Ok(detections
                .into_iter()
                .map(|bbox| RawDetection {
                    label: bbox.name.to_string(),
                    score: bbox.conf as f32,
                    bbox: [
                        bbox.xmin as f32,
                        bbox.ymin as f32,
                        bbox.xmax as f32,
                        bbox.ymax as f32,
                    ],
                })
                .collect())
        }
    }
}

//! Stub model runtime for exercising the load and serving paths without
//! libtorch.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{ClassificationResult, DecodedImage, ImageClassifier, InferenceError, LoadError, ModelLoader};

#[derive(Clone)]
enum Behaviour {
    /// Label from the top-left pixel, score from the width.
    Pixel,
    Fixed(String, f32),
    Broken,
}

#[derive(Clone)]
pub struct StubLoader {
    loads: Arc<AtomicUsize>,
    delay: Duration,
    fail_first: usize,
    panics: bool,
    behaviour: Behaviour,
}

impl StubLoader {
    pub fn new() -> Self {
        Self {
            loads: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
            fail_first: 0,
            panics: false,
            behaviour: Behaviour::Pixel,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_first(mut self, attempts: usize) -> Self {
        self.fail_first = attempts;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn returning(mut self, label: &str, score: f32) -> Self {
        self.behaviour = Behaviour::Fixed(label.to_string(), score);
        self
    }

    pub fn broken_model(mut self) -> Self {
        self.behaviour = Behaviour::Broken;
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModelLoader for StubLoader {
    fn model_id(&self) -> &str {
        "stub/detector"
    }

    fn load(&self) -> Result<Arc<dyn ImageClassifier>, LoadError> {
        let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        if self.panics {
            panic!("weights are corrupt");
        }
        if attempt < self.fail_first {
            return Err(LoadError::Source(format!("stub load {} failed", attempt)));
        }
        Ok(Arc::new(StubClassifier {
            behaviour: self.behaviour.clone(),
        }))
    }
}

struct StubClassifier {
    behaviour: Behaviour,
}

impl ImageClassifier for StubClassifier {
    fn classify(&self, image: &DecodedImage) -> Result<ClassificationResult, InferenceError> {
        match &self.behaviour {
            Behaviour::Pixel => {
                let label = if image.as_rgb().get_pixel(0, 0)[0] > 127 {
                    "Deepfake"
                } else {
                    "Realism"
                };
                Ok(ClassificationResult {
                    label: label.to_string(),
                    score: (image.width() % 100) as f32 / 100.0,
                })
            }
            Behaviour::Fixed(label, score) => Ok(ClassificationResult {
                label: label.clone(),
                score: *score,
            }),
            Behaviour::Broken => Err(InferenceError::Shape {
                expected: 2,
                actual: 1000,
            }),
        }
    }
}

pub fn rgb_image(width: u32, height: u32) -> DecodedImage {
    DecodedImage::from_rgb(RgbImage::from_pixel(width, height, Rgb([0, 0, 0])))
}

pub fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// PNG whose top-left pixel drives the stub's label and whose width drives
/// its score.
pub fn png_for(width: u32, fake: bool) -> Vec<u8> {
    let red = if fake { 255 } else { 0 };
    let image = RgbImage::from_pixel(width, 4, Rgb([red, 10, 10]));
    encode(DynamicImage::ImageRgb8(image), ImageFormat::Png)
}

//! Process-wide owner of the detector model.
//!
//! The model is loaded lazily on the first `ensure_loaded` call. Loads are
//! single-flight: the first caller starts the load on the blocking pool and
//! parks a shared future in the slot, and every caller that arrives while
//! the load is running awaits that same future. Once the model is stored in
//! the `OnceLock` it never changes, and the ready path does not take the
//! slot lock at all.
//!
//! A failed load leaves the handle in `Failed`. Callers that were waiting
//! on it all get the same error; the next call after that starts a fresh
//! attempt.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use shared::{ModelState, ModelStatus};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Instant;

use super::{ClassificationResult, DecodedImage, ImageClassifier, InferenceError, LoadError, ModelLoader};

type LoadResult = Result<Arc<dyn ImageClassifier>, LoadError>;
type PendingLoad = Shared<BoxFuture<'static, LoadResult>>;

enum Slot {
    Unloaded,
    Loading { attempt: u32, pending: PendingLoad },
    Ready,
    Failed(LoadError),
}

struct Lifecycle {
    slot: Slot,
    attempts: u32,
    loaded_at: Option<DateTime<Utc>>,
}

struct Inner {
    loader: Arc<dyn ModelLoader>,
    model: OnceLock<Arc<dyn ImageClassifier>>,
    lifecycle: Mutex<Lifecycle>,
}

#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<Inner>,
}

impl ModelHandle {
    pub fn new<L: ModelLoader + 'static>(loader: L) -> Self {
        Self {
            inner: Arc::new(Inner {
                loader: Arc::new(loader),
                model: OnceLock::new(),
                lifecycle: Mutex::new(Lifecycle {
                    slot: Slot::Unloaded,
                    attempts: 0,
                    loaded_at: None,
                }),
            }),
        }
    }

    pub fn model_id(&self) -> &str {
        self.inner.loader.model_id()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.model.get().is_some()
    }

    pub async fn ensure_loaded(&self) -> LoadResult {
        if let Some(model) = self.inner.model.get() {
            return Ok(Arc::clone(model));
        }

        let pending = {
            let mut lifecycle = self.inner.lock();
            // The load may have settled between the fast-path check and the lock.
            if let Some(model) = self.inner.model.get() {
                return Ok(Arc::clone(model));
            }
            let in_flight = match &lifecycle.slot {
                Slot::Loading { pending, .. } => Some(pending.clone()),
                Slot::Unloaded | Slot::Failed(_) | Slot::Ready => None,
            };
            match in_flight {
                Some(pending) => {
                    log::debug!("Model {} is loading, waiting for it", self.model_id());
                    pending
                }
                None => self.start_load(&mut lifecycle),
            }
        };

        pending.await
    }

    /// Runs one forward pass. The model must already be loaded.
    pub fn classify(&self, image: &DecodedImage) -> Result<ClassificationResult, InferenceError> {
        let model = self.inner.model.get().ok_or(InferenceError::NotReady)?;
        model.classify(image)
    }

    pub fn status(&self) -> ModelStatus {
        let lifecycle = self.inner.lock();
        let (state, error) = match &lifecycle.slot {
            Slot::Unloaded => (ModelState::Unloaded, None),
            Slot::Loading { .. } => (ModelState::Loading, None),
            Slot::Ready => (ModelState::Ready, None),
            Slot::Failed(err) => (ModelState::Failed, Some(err.to_string())),
        };
        ModelStatus {
            state,
            model_id: self.model_id().to_string(),
            loaded_at: lifecycle.loaded_at,
            load_attempts: lifecycle.attempts,
            error,
        }
    }

    fn start_load(&self, lifecycle: &mut Lifecycle) -> PendingLoad {
        lifecycle.attempts += 1;
        let attempt = lifecycle.attempts;
        log::info!(
            "Lazy-loading deepfake model {} (attempt {}, this should only happen once)",
            self.model_id(),
            attempt
        );

        // The blocking task settles the slot itself, so the load completes
        // even if every request waiting on it goes away.
        let inner = Arc::clone(&self.inner);
        let task = tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let result = panic::catch_unwind(AssertUnwindSafe(|| inner.loader.load()))
                .unwrap_or_else(|payload| Err(LoadError::Runtime(panic_message(payload))));
            inner.settle(attempt, &result, started);
            result
        });

        let inner = Arc::clone(&self.inner);
        let pending = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    let result = Err(LoadError::Join(e.to_string()));
                    inner.settle(attempt, &result, Instant::now());
                    result
                }
            }
        }
        .boxed()
        .shared();

        lifecycle.slot = Slot::Loading {
            attempt,
            pending: pending.clone(),
        };
        pending
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, attempt: u32, result: &LoadResult, started: Instant) {
        let mut lifecycle = self.lock();
        match &lifecycle.slot {
            Slot::Loading { attempt: current, .. } if *current == attempt => {}
            _ => return,
        }

        match result {
            Ok(model) => {
                if self.model.set(Arc::clone(model)).is_err() {
                    log::warn!(
                        "Model {} was already set, keeping the first instance",
                        self.loader.model_id()
                    );
                }
                lifecycle.slot = Slot::Ready;
                lifecycle.loaded_at = Some(Utc::now());
                log::info!(
                    "Model {} loaded successfully in {:.1}s",
                    self.loader.model_id(),
                    started.elapsed().as_secs_f32()
                );
            }
            Err(err) => {
                log::error!(
                    "Failed to load model {} (attempt {}): {}",
                    self.loader.model_id(),
                    attempt,
                    err
                );
                lifecycle.slot = Slot::Failed(err.clone());
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("model loader panicked: {}", message)
}

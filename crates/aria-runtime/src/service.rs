//! Rendering service - session lifecycle and the paced render loop
//!
//! A session moves through
//!
//! ```text
//! Idle -> Initializing -> Streaming -> Draining -> Idle
//!                              \-> Failed
//! ```
//!
//! Every stream runs the same per-frame sequence on a producer task:
//! 1. media time `t = i / fps`
//! 2. expression `min(i, len - 1)` (the last expression is held)
//! 3. camera pose from the trajectory at `t`
//! 4. deform a frame-local copy of the scene, rasterize (with retries)
//! 5. wait for the frame's deadline
//! 6. emit
//!
//! Frames travel over a channel of capacity one, so the producer never runs
//! more than one frame ahead of the consumer. Dropping the [`FrameStream`]
//! stops the producer before it computes another frame.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::Stream;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use aria_audio::{AudioBuffer, FeatureConfig, FeatureExtractor};
use aria_core::{Accelerator, AriaError, AriaResult, Reservation, Vec3, WeightStore};
use aria_inference::{
    DeformationModel, ExpressionModel, ExpressionVector, FacialRegion, DEFORMATION_PREFIX, EXPRESSION_PREFIX,
};
use aria_time::{FramePacer, MediaClock};
use aria_visual::{CameraTrajectory, Frame, OrbitTrajectory, Projection, Rasterizer, SplatRasterizer, SplatScene};

use crate::config::EngineConfig;
use crate::guard::ResourceGuard;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::stats::RenderStats;

/// Render session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Initializing,
    Streaming,
    Draining,
    Failed,
}

/// Scene and networks a session renders with
#[derive(Debug, Clone)]
pub struct SessionComponents {
    pub scene: SplatScene,
    pub expression: ExpressionModel,
    pub deformation: DeformationModel,
}

impl SessionComponents {
    /// Load everything named by `config` from safetensors checkpoints
    pub fn load(config: &EngineConfig) -> AriaResult<Self> {
        let scene_store = WeightStore::open(&config.model_path)?;
        let scene = SplatScene::from_store(&scene_store)?;

        let expression = match &config.expression_model_path {
            Some(path) => ExpressionModel::from_store(&WeightStore::open(path)?, EXPRESSION_PREFIX)?,
            None => ExpressionModel::from_store(&scene_store, EXPRESSION_PREFIX)?,
        };

        let deformation = match &config.deformation_model_path {
            Some(path) => DeformationModel::from_store(&WeightStore::open(path)?, DEFORMATION_PREFIX)?,
            None => DeformationModel::from_store_or_neutral(&scene_store, DEFORMATION_PREFIX)?,
        };

        Ok(Self {
            scene,
            expression,
            deformation,
        })
    }

    fn check_compatible(&self) -> AriaResult<()> {
        let points = self.deformation.point_count();
        if points != 1 && points != self.scene.len() {
            return Err(AriaError::ModelLoad(format!(
                "deformation covers {points} points, scene has {} gaussians",
                self.scene.len()
            )));
        }
        Ok(())
    }
}

/// Where `reset` reloads components from
enum ComponentSource {
    Checkpoints,
    Provided(Arc<SessionComponents>),
}

/// Loaded session state shared read-only with running streams
struct LoadedSession {
    components: Arc<SessionComponents>,
    _scene_memory: Reservation,
}

/// Avatar rendering service: owns the loaded scene and networks and turns
/// audio into paced frame streams
pub struct RenderingService {
    config: EngineConfig,
    guard: ResourceGuard,
    extractor: Arc<FeatureExtractor>,
    rasterizer: Arc<dyn Rasterizer>,
    trajectory: Arc<dyn CameraTrajectory>,
    retry: RetryPolicy,
    clock: MediaClock,
    source: ComponentSource,
    session: Option<Arc<LoadedSession>>,
    state: Arc<Mutex<SessionState>>,
    stats: Arc<Mutex<RenderStats>>,
}

impl RenderingService {
    /// Validate paths, check the accelerator, load checkpoints and admit the
    /// scene. Any failure aborts construction.
    pub fn initialize(config: EngineConfig, accelerator: Arc<dyn Accelerator>) -> AriaResult<Self> {
        let config = config.resolve()?;
        info!(model = %config.model_path.display(), "Initializing rendering service");

        for path in [config.model_path.as_path(), config.expression_path(), config.deformation_path()] {
            if !path.exists() {
                error!(path = %path.display(), "Model file missing");
                return Err(AriaError::model_not_found(path));
            }
        }

        Self::build(config, accelerator, ComponentSource::Checkpoints)
    }

    /// Build a service around already-loaded components
    pub fn with_components(
        config: EngineConfig,
        accelerator: Arc<dyn Accelerator>,
        components: SessionComponents,
    ) -> AriaResult<Self> {
        let config = config.resolve()?;
        Self::build(config, accelerator, ComponentSource::Provided(Arc::new(components)))
    }

    fn build(config: EngineConfig, accelerator: Arc<dyn Accelerator>, source: ComponentSource) -> AriaResult<Self> {
        let guard = ResourceGuard::new(Arc::clone(&accelerator), &config);
        let extractor = FeatureExtractor::new(FeatureConfig::with_sample_rate(config.sample_rate))?;
        let rasterizer = SplatRasterizer::new(config.render.clone(), accelerator)?;
        let trajectory = OrbitTrajectory::with_orbit(
            Projection::from_config(&config.render),
            config.orbit_radius,
            config.orbit_rate,
        );
        let clock = MediaClock::new(config.render.frame_rate, config.sample_rate)?;

        let mut service = Self {
            retry: RetryPolicy::new(config.max_frame_retries),
            config,
            guard,
            extractor: Arc::new(extractor),
            rasterizer: Arc::new(rasterizer),
            trajectory: Arc::new(trajectory),
            clock,
            source,
            session: None,
            state: Arc::new(Mutex::new(SessionState::Initializing)),
            stats: Arc::new(Mutex::new(RenderStats::default())),
        };
        service.load_session()?;
        Ok(service)
    }

    fn load_session(&mut self) -> AriaResult<()> {
        self.set_state(SessionState::Initializing);
        match self.try_load_session() {
            Ok(session) => {
                info!(
                    gaussians = session.components.scene.len(),
                    deformation_points = session.components.deformation.point_count(),
                    "Rendering service ready"
                );
                self.session = Some(Arc::new(session));
                self.set_state(SessionState::Idle);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Rendering service initialization failed");
                self.set_state(SessionState::Failed);
                Err(e)
            }
        }
    }

    fn try_load_session(&self) -> AriaResult<LoadedSession> {
        self.guard.check_available()?;

        let components = match &self.source {
            ComponentSource::Checkpoints => Arc::new(SessionComponents::load(&self.config)?),
            ComponentSource::Provided(components) => Arc::clone(components),
        };
        components.check_compatible()?;

        let scene_memory = self.guard.admit_scene(components.scene.footprint_bytes())?;
        Ok(LoadedSession {
            components,
            _scene_memory: scene_memory,
        })
    }

    /// Replace the rasterizer (custom backends, instrumentation)
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    /// Replace the default orbit camera
    pub fn with_trajectory(mut self, trajectory: Arc<dyn CameraTrajectory>) -> Self {
        self.trajectory = trajectory;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn stats(&self) -> RenderStats {
        self.stats.lock().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    /// Number of frames `render_frames` will emit for `audio`
    ///
    /// Counted at the buffer's own sample rate, before any resampling.
    pub fn total_frames(&self, audio: &AudioBuffer) -> u64 {
        if audio.sample_rate() == self.clock.sample_rate() {
            return self.clock.total_frames(audio.len());
        }
        MediaClock::new(self.clock.frame_rate(), audio.sample_rate())
            .map_or(0, |clock| clock.total_frames(audio.len()))
    }

    /// Start a paced frame stream for `audio`.
    ///
    /// Must be called from within a tokio runtime. Audio at a different
    /// sample rate is resampled first.
    pub fn render_frames(&self, audio: AudioBuffer) -> AriaResult<FrameStream> {
        let session = self
            .session
            .clone()
            .ok_or_else(|| AriaError::Processing("rendering service has been cleaned up".into()))?;
        let handle = Handle::try_current().map_err(|e| AriaError::Unexpected(format!("no tokio runtime: {e}")))?;

        let total_frames = self.total_frames(&audio);
        let audio = if audio.sample_rate() == self.config.sample_rate {
            audio
        } else {
            debug!(from = audio.sample_rate(), to = self.config.sample_rate, "Resampling input audio");
            audio.resample(self.config.sample_rate)?
        };

        {
            let mut state = self.state.lock();
            if matches!(*state, SessionState::Streaming | SessionState::Draining) {
                return Err(AriaError::Processing("a frame stream is already active".into()));
            }
            *state = SessionState::Streaming;
        }
        self.stats.lock().streams_started += 1;

        let (tx, rx) = mpsc::channel(1);
        let job = StreamJob {
            session,
            extractor: Arc::clone(&self.extractor),
            rasterizer: Arc::clone(&self.rasterizer),
            trajectory: Arc::clone(&self.trajectory),
            accelerator: Arc::clone(self.guard.accelerator()),
            retry: self.retry,
            clock: self.clock,
            state: Arc::clone(&self.state),
            stats: Arc::clone(&self.stats),
        };
        handle.spawn(job.run(audio, total_frames, tx));

        Ok(FrameStream { rx, total_frames })
    }

    /// Release accelerator memory and drop the loaded scene and networks.
    ///
    /// Refused with `Processing` while a frame stream is still active; drain
    /// or drop the stream first.
    pub fn cleanup(&mut self) -> AriaResult<()> {
        {
            let mut state = self.state.lock();
            if matches!(*state, SessionState::Streaming | SessionState::Draining) {
                warn!(state = ?*state, "Cleanup refused while streaming");
                return Err(AriaError::Processing("cannot release resources while a frame stream is active".into()));
            }
            *state = SessionState::Idle;
        }
        self.session = None;
        self.rasterizer.release_memory();
        self.guard.release();
        info!("Rendering service cleaned up");
        Ok(())
    }

    /// Tear down and reload the scene and networks with the same configuration.
    /// Refused while a frame stream is active.
    pub fn reset(&mut self) -> AriaResult<()> {
        self.cleanup()?;
        self.load_session()?;
        info!("Rendering service reset");
        Ok(())
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.lock();
        if *state != next {
            debug!(from = ?*state, to = ?next, "Session state");
            *state = next;
        }
    }
}

/// Lazy, paced sequence of frames for one audio clip.
///
/// Ends after the last frame or right after the first error.
pub struct FrameStream {
    rx: mpsc::Receiver<AriaResult<Frame>>,
    total_frames: u64,
}

impl FrameStream {
    /// Next frame, `None` once the stream has ended
    pub async fn next(&mut self) -> Option<AriaResult<Frame>> {
        self.rx.recv().await
    }

    /// Frames this stream emits when it completes
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Drain the stream, stopping at the first error
    pub async fn collect_frames(mut self) -> AriaResult<Vec<Frame>> {
        let mut frames = Vec::with_capacity(self.total_frames as usize);
        while let Some(item) = self.next().await {
            frames.push(item?);
        }
        Ok(frames)
    }
}

impl Stream for FrameStream {
    type Item = AriaResult<Frame>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Expression used for frame `index`: the matching one, or the last one
/// once the sequence is exhausted
pub fn expression_for_frame(expressions: &[ExpressionVector], index: u64) -> ExpressionVector {
    match expressions.len() {
        0 => ExpressionVector::neutral(),
        n => expressions[(index as usize).min(n - 1)],
    }
}

/// Everything a producer task needs, detached from the service
struct StreamJob {
    session: Arc<LoadedSession>,
    extractor: Arc<FeatureExtractor>,
    rasterizer: Arc<dyn Rasterizer>,
    trajectory: Arc<dyn CameraTrajectory>,
    accelerator: Arc<dyn Accelerator>,
    retry: RetryPolicy,
    clock: MediaClock,
    state: Arc<Mutex<SessionState>>,
    stats: Arc<Mutex<RenderStats>>,
}

enum StreamEnd {
    Completed,
    Cancelled,
    Failed(AriaError),
}

impl StreamJob {
    async fn run(self, audio: AudioBuffer, total_frames: u64, tx: mpsc::Sender<AriaResult<Frame>>) {
        info!(
            samples = audio.len(),
            duration_secs = audio.duration_secs(),
            total_frames,
            "Stream started"
        );

        match self.stream(&audio, total_frames, &tx).await {
            StreamEnd::Completed => {
                self.set_state(SessionState::Draining);
                self.stats.lock().streams_completed += 1;
                info!(frames = total_frames, "Stream completed");
                self.set_state(SessionState::Idle);
            }
            StreamEnd::Cancelled => {
                self.rasterizer.release_memory();
                self.stats.lock().streams_cancelled += 1;
                info!("Stream cancelled by consumer");
                self.set_state(SessionState::Idle);
            }
            StreamEnd::Failed(e) => {
                error!(error = %e, kind = ?e.kind(), "Stream failed");
                self.stats.lock().streams_failed += 1;
                self.set_state(SessionState::Failed);
                let _ = tx.send(Err(e)).await;
            }
        }
    }

    async fn stream(&self, audio: &AudioBuffer, total_frames: u64, tx: &mpsc::Sender<AriaResult<Frame>>) -> StreamEnd {
        let components = &self.session.components;

        let expressions = match guarded(|| {
            let features = self.extractor.extract(audio);
            components.expression.infer_batch(&features)
        }) {
            Ok(expressions) => expressions,
            Err(e) => return StreamEnd::Failed(e),
        };
        debug!(expressions = expressions.len(), "Inferred expressions");

        let mut pacer = FramePacer::start(self.clock);
        let mut positions = Vec::with_capacity(components.scene.len());

        for index in 0..total_frames {
            let expression = expression_for_frame(&expressions, index);
            let t = self.clock.frame_time(index);

            let started = Instant::now();
            let frame = match self.render_with_retry(&expression, t, index, &mut positions) {
                Ok(frame) => frame,
                Err(e) => return StreamEnd::Failed(e),
            };
            let compute = started.elapsed();
            debug!(
                frame = index,
                compute_ms = compute.as_secs_f64() * 1000.0,
                mouth = expression.region_energy(FacialRegion::Mouth),
                "Frame rendered"
            );

            let pacing = tokio::select! {
                biased;
                _ = tx.closed() => return StreamEnd::Cancelled,
                pacing = pacer.wait_for(index) => pacing,
            };

            if tx.send(Ok(frame)).await.is_err() {
                return StreamEnd::Cancelled;
            }

            let mut stats = self.stats.lock();
            stats.frames_emitted += 1;
            stats.last_frame_compute = compute;
            if pacing.is_late() {
                stats.late_frames += 1;
            }
            stats.max_lateness = stats.max_lateness.max(pacer.stats().max_lateness);
        }

        StreamEnd::Completed
    }

    fn render_with_retry(
        &self,
        expression: &ExpressionVector,
        t: f64,
        index: u64,
        positions: &mut Vec<Vec3>,
    ) -> AriaResult<Frame> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.render_once(expression, t, index, positions) {
                Ok(frame) => return Ok(frame),
                Err(e) => e,
            };

            match self.retry.decide(&err, attempt) {
                RetryDecision::Retry => {
                    warn!(frame = index, attempt, error = %err, "Frame failed, retrying");
                    self.stats.lock().retries += 1;
                }
                RetryDecision::ReleaseAndFail => {
                    error!(frame = index, error = %err, "Accelerator memory exhausted, releasing");
                    self.rasterizer.release_memory();
                    self.accelerator.release_cached();
                    return Err(err);
                }
                RetryDecision::Fail => {
                    if attempt > 1 {
                        error!(frame = index, attempts = attempt, error = %err, "Frame retries exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }

    /// One attempt at a frame
    fn render_once(
        &self,
        expression: &ExpressionVector,
        t: f64,
        index: u64,
        positions: &mut Vec<Vec3>,
    ) -> AriaResult<Frame> {
        let components = &self.session.components;
        guarded(|| {
            let offset = components.deformation.deform(expression);
            let deformed = components
                .scene
                .apply_deformation_into(&offset, std::mem::take(positions))?;
            let pose = self.trajectory.pose_at(t);
            let frame = self.rasterizer.render(&deformed, &pose, index);
            *positions = deformed.into_positions();
            frame
        })
    }

    fn set_state(&self, next: SessionState) {
        *self.state.lock() = next;
    }
}

/// Run producer-side compute, turning a panic into `Unexpected`
fn guarded<T>(compute: impl FnOnce() -> AriaResult<T>) -> AriaResult<T> {
    catch_unwind(AssertUnwindSafe(compute))
        .unwrap_or_else(|payload| Err(AriaError::Unexpected(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic during rendering: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic during rendering: {s}")
    } else {
        "panic during rendering".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aria_core::EXPRESSION_DIM;

    fn expr(v: f32) -> ExpressionVector {
        ExpressionVector::from_values([v; EXPRESSION_DIM])
    }

    #[test]
    fn test_expression_index_clamped() {
        let expressions = [expr(0.1), expr(0.2), expr(0.3)];
        assert_eq!(expression_for_frame(&expressions, 0), expr(0.1));
        assert_eq!(expression_for_frame(&expressions, 2), expr(0.3));
        assert_eq!(expression_for_frame(&expressions, 3), expr(0.3));
        assert_eq!(expression_for_frame(&expressions, 1_000), expr(0.3));
        assert_eq!(expression_for_frame(&[], 5), ExpressionVector::neutral());
    }

    #[test]
    fn test_guarded_turns_panic_into_unexpected() {
        let result: AriaResult<u32> = guarded(|| panic!("feature extraction blew up"));
        match result {
            Err(AriaError::Unexpected(msg)) => assert!(msg.contains("feature extraction blew up")),
            other => panic!("expected Unexpected, got {other:?}"),
        }
        assert_eq!(guarded(|| Ok(7)).unwrap(), 7);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "panic during rendering: boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "panic during rendering: bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "panic during rendering");
    }
}

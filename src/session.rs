use crate::{
    error::{CompileError, RenderError, ResourceError},
    uniform::RuntimeUniforms,
};
use std::{
    fs::read,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

/// The seam between the session state machine and the graphics backend.
/// The real implementation is [`crate::renderer::Renderer`]; tests drive
/// the session against a recording stub instead.
pub trait RenderBackend {
    /// Recreates the pipeline and its dynamic resources from new fragment
    /// source. On failure the previously built pipeline must stay fully
    /// usable and nothing from the attempt may leak.
    fn rebuild(&mut self, fragment_source: &str) -> Result<(), CompileError>;

    /// Uploads an RGBA8 image for the next free texture slot.
    fn add_texture(&mut self, width: u32, height: u32, data: &[u8]);

    fn clear_textures(&mut self);

    fn resize(&mut self, width: u32, height: u32);

    /// One draw of the active pipeline with the given uniform values.
    fn draw(&mut self, uniforms: &RuntimeUniforms) -> Result<(), RenderError>;

    /// Blocks until the device is idle. Called before teardown.
    fn finish(&mut self);

    /// How many texture slots the backend can bind besides the uniform
    /// block.
    fn max_texture_slots(&self) -> u32;
}

/// Recompilation state. `Compiling` is only ever observed transiently
/// because the backend compiler is invoked synchronously; `Failed` keeps
/// the previously active pipeline on screen.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PipelineState {
    Compiling,
    Active,
    Failed,
}

#[derive(Debug)]
pub enum PointerButton {
    Left,
    Right,
}

/// A texture slot handed to the fragment shader. The path identifies the
/// resource when the shader is saved; the GPU-side objects live in the
/// backend and survive recompiles untouched.
#[derive(Debug)]
pub struct TextureBinding {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Owns the live-coding state: the active fragment source, the ordered
/// texture bindings, and the per-frame uniform values. All mutation and
/// rendering happen on one thread; a recompile completes before the next
/// frame is recorded.
pub struct Session<B> {
    backend: B,
    bindings: Vec<TextureBinding>,
    epoch: Option<Instant>,
    fragment_source: String,
    frame_index: i32,
    last_frame: Option<Instant>,
    size: (u32, u32),
    state: PipelineState,
    uniforms: RuntimeUniforms,
}

impl<B: RenderBackend> Session<B> {
    /// The backend must already have been built with `fragment_source`,
    /// so the session starts with a renderable pipeline.
    pub fn new(backend: B, fragment_source: String) -> Self {
        Self {
            backend,
            bindings: vec![],
            epoch: None,
            fragment_source,
            frame_index: 0,
            last_frame: None,
            size: (0, 0),
            state: PipelineState::Active,
            uniforms: RuntimeUniforms::default(),
        }
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Compiles new fragment source and swaps it in. On failure the old
    /// source and pipeline remain active and the compiler's message is
    /// returned for display.
    pub fn request_recompile(&mut self, source: String) -> Result<(), CompileError> {
        self.state = PipelineState::Compiling;

        match self.backend.rebuild(&source) {
            Ok(()) => {
                self.fragment_source = source;
                self.state = PipelineState::Active;
                Ok(())
            }
            Err(err) => {
                self.state = PipelineState::Failed;
                Err(err)
            }
        }
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Loads an image file and binds it to the next free slot. Slot 0 is
    /// the uniform block, so the first texture lands at slot 1. On failure
    /// the binding list is left unchanged.
    pub fn add_texture_binding(&mut self, path: &Path) -> Result<u32, ResourceError> {
        let bytes = read(path).map_err(|source| ResourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let image = image::load_from_memory(&bytes).map_err(|source| ResourceError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        let image = image.into_rgba8();
        let (width, height) = image.dimensions();

        self.backend.add_texture(width, height, image.as_raw());
        self.bindings.push(TextureBinding {
            path: path.to_path_buf(),
            width,
            height,
        });

        log::info!("Bound texture {} at slot {}", path.display(), self.bindings.len());

        Ok(self.bindings.len() as u32)
    }

    pub fn texture_bindings(&self) -> &[TextureBinding] {
        &self.bindings
    }

    pub fn texture_addable(&self) -> bool {
        (self.bindings.len() as u32) < self.backend.max_texture_slots()
    }

    pub fn clear_texture_bindings(&mut self) {
        self.bindings.clear();
        self.backend.clear_textures();
    }

    /// Advances time, frame delta and frame index for the frame about to
    /// be recorded. The first call establishes the time epoch.
    pub fn update(&mut self, now: Instant) {
        let epoch = *self.epoch.get_or_insert(now);

        let delta = match self.last_frame {
            Some(last) => now.saturating_duration_since(last),
            None => Duration::ZERO,
        };
        self.last_frame = Some(now);

        self.uniforms.time = now.saturating_duration_since(epoch).as_secs_f32();
        self.uniforms.delta_time = delta.as_secs_f32();
        self.uniforms.frame = self.frame_index;
        self.frame_index = self.frame_index.wrapping_add(1);
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        self.uniforms.pointer[0] = x;
        self.uniforms.pointer[1] = y;
    }

    pub fn pointer_button(&mut self, button: PointerButton, pressed: bool) {
        let value = if pressed { 1.0 } else { 0.0 };
        match button {
            PointerButton::Left => self.uniforms.pointer[2] = value,
            PointerButton::Right => self.uniforms.pointer[3] = value,
        }
    }

    /// Applies a window resize. Zero-area (minimized) and repeated
    /// same-size events are ignored, so no frame renders with mismatched
    /// surface and uniform dimensions.
    pub fn on_resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 || (width, height) == self.size {
            return;
        }

        self.size = (width, height);
        self.uniforms.resolution = [width as f32, height as f32];
        self.backend.resize(width, height);
    }

    /// Records one draw of the active pipeline with the current uniforms.
    pub fn render(&mut self) -> Result<(), RenderError> {
        self.backend.draw(&self.uniforms)
    }

    /// Device-idle barrier before resources are released.
    pub fn finish(&mut self) {
        self.backend.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const DEFAULT_SOURCE: &str = "@fragment fn main() -> @location(0) vec4<f32> { .. }";

    struct DrawCall {
        bound_texture_slots: Vec<u32>,
        source: String,
        uniforms: RuntimeUniforms,
    }

    /// Records every backend call and keeps created/released bookkeeping
    /// for the dynamic GPU objects. Sources containing `undeclared` are
    /// rejected, standing in for the real compiler.
    #[derive(Default)]
    struct StubBackend {
        created_pipelines: usize,
        draws: Vec<DrawCall>,
        pipeline_source: Option<String>,
        released_pipelines: usize,
        resizes: Vec<(u32, u32)>,
        textures: Vec<(u32, u32)>,
    }

    impl StubBackend {
        fn live_pipelines(&self) -> usize {
            self.created_pipelines - self.released_pipelines
        }
    }

    impl RenderBackend for StubBackend {
        fn rebuild(&mut self, fragment_source: &str) -> Result<(), CompileError> {
            if fragment_source.contains("undeclared") {
                return Err(CompileError {
                    message: "unknown identifier `undeclared`".to_owned(),
                });
            }

            self.created_pipelines += 1;
            if self.pipeline_source.replace(fragment_source.to_owned()).is_some() {
                self.released_pipelines += 1;
            }

            Ok(())
        }

        fn add_texture(&mut self, width: u32, height: u32, _data: &[u8]) {
            self.textures.push((width, height));
        }

        fn clear_textures(&mut self) {
            self.textures.clear();
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.resizes.push((width, height));
        }

        fn draw(&mut self, uniforms: &RuntimeUniforms) -> Result<(), RenderError> {
            let source = self
                .pipeline_source
                .clone()
                .ok_or(RenderError::FrameNotStarted)?;

            self.draws.push(DrawCall {
                bound_texture_slots: (1..=self.textures.len() as u32).collect(),
                source,
                uniforms: *uniforms,
            });

            Ok(())
        }

        fn finish(&mut self) {}

        fn max_texture_slots(&self) -> u32 {
            3
        }
    }

    fn session() -> Session<StubBackend> {
        let mut backend = StubBackend::default();
        backend.rebuild(DEFAULT_SOURCE).unwrap();
        Session::new(backend, DEFAULT_SOURCE.to_owned())
    }

    fn temp_image(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("shaderpad-{}-{}", std::process::id(), name));
        image::save_buffer(&path, &[0xff; 2 * 2 * 4], 2, 2, image::ColorType::Rgba8).unwrap();
        path
    }

    #[test]
    fn successful_recompile_activates_new_source() {
        let mut session = session();

        let new_source = "fn main() { /* plasma */ }".to_owned();
        session.request_recompile(new_source.clone()).unwrap();

        assert_eq!(session.state(), PipelineState::Active);
        assert_eq!(session.fragment_source(), new_source);
        assert_eq!(session.backend.pipeline_source.as_deref(), Some(new_source.as_str()));
    }

    #[test]
    fn failed_recompile_keeps_previous_pipeline_rendering() {
        let mut session = session();

        let err = session
            .request_recompile("fn main() { undeclared }".to_owned())
            .unwrap_err();

        assert!(!err.message.is_empty());
        assert_eq!(session.state(), PipelineState::Failed);
        assert_eq!(session.fragment_source(), DEFAULT_SOURCE);

        // The last-known-good shader still draws.
        session.render().unwrap();
        assert_eq!(session.backend.draws.last().unwrap().source, DEFAULT_SOURCE);
    }

    #[test]
    fn recompile_recovers_after_failure() {
        let mut session = session();

        session
            .request_recompile("undeclared".to_owned())
            .unwrap_err();
        session.request_recompile("fn main() {}".to_owned()).unwrap();

        assert_eq!(session.state(), PipelineState::Active);
        assert_eq!(session.fragment_source(), "fn main() {}");
    }

    #[test]
    fn repeated_recompiles_do_not_accumulate_pipelines() {
        let mut session = session();

        for index in 0..100 {
            session
                .request_recompile(format!("fn main() {{ let v = {}; }}", index))
                .unwrap();
        }

        assert_eq!(session.backend.live_pipelines(), 1);
        assert_eq!(session.backend.released_pipelines, 100);
    }

    #[test]
    fn texture_slots_follow_call_order() {
        let mut session = session();

        let first = temp_image("first.png");
        let second = temp_image("second.png");

        assert_eq!(session.add_texture_binding(&first).unwrap(), 1);
        assert_eq!(session.add_texture_binding(&second).unwrap(), 2);

        let paths: Vec<_> = session
            .texture_bindings()
            .iter()
            .map(|binding| binding.path.clone())
            .collect();
        assert_eq!(paths, vec![first, second]);
        assert!(session.texture_addable());
    }

    #[test]
    fn missing_texture_leaves_bindings_unchanged() {
        let mut session = session();

        let err = session
            .add_texture_binding(Path::new("/nonexistent/tex.png"))
            .unwrap_err();

        assert!(matches!(err, ResourceError::Io { .. }));
        assert!(session.texture_bindings().is_empty());
        assert!(session.backend.textures.is_empty());
    }

    #[test]
    fn undecodable_texture_is_rejected() {
        let mut session = session();

        let path = std::env::temp_dir().join(format!("shaderpad-{}-bogus.png", std::process::id()));
        std::fs::write(&path, b"not an image").unwrap();

        let err = session.add_texture_binding(&path).unwrap_err();

        assert!(matches!(err, ResourceError::Decode { .. }));
        assert!(session.texture_bindings().is_empty());
    }

    #[test]
    fn draw_binds_textures_in_slot_order() {
        let mut session = session();

        let path = temp_image("sampled.png");
        assert_eq!(session.add_texture_binding(&path).unwrap(), 1);

        session
            .request_recompile("fn main() { sample texture0 }".to_owned())
            .unwrap();
        session.render().unwrap();

        let draw = session.backend.draws.last().unwrap();
        assert_eq!(draw.bound_texture_slots, vec![1]);
        assert_eq!(draw.source, "fn main() { sample texture0 }");
    }

    #[test]
    fn hundred_frames_advance_time_and_frame_index() {
        let mut session = session();
        session.on_resize(640, 480);

        let start = Instant::now();
        let mut previous_time = -1.0f32;

        for iteration in 0..100 {
            session.update(start + Duration::from_millis(16 * iteration));
            session.render().unwrap();

            let draw = session.backend.draws.last().unwrap();
            assert_eq!(draw.uniforms.frame, iteration as i32);
            if iteration > 0 {
                assert!(draw.uniforms.time > previous_time);
                assert!((draw.uniforms.delta_time - 0.016).abs() < 1e-4);
            }
            previous_time = draw.uniforms.time;
        }
    }

    #[test]
    fn resize_is_idempotent() {
        let mut session = session();

        session.on_resize(800, 600);
        let after_first = session.uniforms;
        session.on_resize(800, 600);

        assert_eq!(session.uniforms, after_first);
        assert_eq!(session.backend.resizes, vec![(800, 600)]);
        assert_eq!(session.uniforms.resolution, [800.0, 600.0]);
    }

    #[test]
    fn minimized_resize_is_ignored() {
        let mut session = session();

        session.on_resize(800, 600);
        session.on_resize(0, 600);
        session.on_resize(800, 0);

        assert_eq!(session.backend.resizes, vec![(800, 600)]);
    }

    #[test]
    fn pointer_state_flows_into_uniforms() {
        let mut session = session();

        session.pointer_moved(120.0, 48.0);
        session.pointer_button(PointerButton::Left, true);
        session.pointer_button(PointerButton::Right, true);
        session.pointer_button(PointerButton::Right, false);
        session.update(Instant::now());
        session.render().unwrap();

        let draw = session.backend.draws.last().unwrap();
        assert_eq!(draw.uniforms.pointer, [120.0, 48.0, 1.0, 0.0]);
    }

    #[test]
    fn clearing_bindings_resets_slots() {
        let mut session = session();

        let path = temp_image("cleared.png");
        session.add_texture_binding(&path).unwrap();
        session.clear_texture_bindings();

        assert!(session.texture_bindings().is_empty());
        assert!(session.backend.textures.is_empty());

        assert_eq!(session.add_texture_binding(&path).unwrap(), 1);
    }
}

use crate::{
    event::{AppResponse, AppStatus, EventProxyWinit, UserEvent},
    fps_counter::FpsCounter,
    fs::{create_shader_file, read_file, select_shader_file, select_texture, write_file},
    meta,
    renderer::Renderer,
    session::{PointerButton, Session},
    ui::{EditContext, Ui, UiState},
};
use anyhow::Result;
use egui_wgpu_backend::{RenderPass, ScreenDescriptor};
use egui_winit::State;
use std::{path::PathBuf, time::Instant};
use winit::{event::WindowEvent, event_loop::EventLoop, window::Window};

const DEFAULT_FRAGMENT: &str = include_str!("assets/frag.default.wgsl");

pub struct Core {
    closing: bool,
    event_proxy: EventProxyWinit<UserEvent>,
    fps_counter: FpsCounter,
    has_validation_error: bool,
    scale_factor: f32,
    session: Session<Renderer>,
    shader_path: Option<PathBuf>,
    size: (u32, u32),
    state: State,
    status: AppStatus,
    status_clock: Instant,
    ui: Ui,
    ui_edit_context: EditContext,
    ui_render_pass: RenderPass,
}

impl Core {
    pub fn new<W>(
        event_loop: &EventLoop<UserEvent>,
        w: &W,
        width: u32,
        height: u32,
        scale_factor: f32,
    ) -> Result<Self>
    where
        W: raw_window_handle::HasRawWindowHandle + raw_window_handle::HasRawDisplayHandle,
    {
        let renderer = Renderer::new(w, width, height, DEFAULT_FRAGMENT)?;

        let mut state = State::new(event_loop);
        state.set_pixels_per_point(scale_factor);

        let ui_render_pass = RenderPass::new(renderer.device_ref(), renderer.format(), 1);

        let mut session = Session::new(renderer, DEFAULT_FRAGMENT.to_owned());
        session.on_resize(width, height);

        let event_proxy = EventProxyWinit::from_proxy(event_loop.create_proxy());

        Ok(Self {
            closing: false,
            event_proxy,
            fps_counter: FpsCounter::new(),
            has_validation_error: false,
            scale_factor,
            session,
            shader_path: None,
            size: (width, height),
            state,
            status: AppStatus::Info("Shader compiled successfully!".to_owned()),
            status_clock: Instant::now(),
            ui: Ui::new(),
            ui_edit_context: EditContext {
                frag: DEFAULT_FRAGMENT.to_owned(),
            },
            ui_render_pass,
        })
    }

    pub fn handle_mouse_input(&mut self, button: PointerButton, pressed: bool) {
        self.session.pointer_button(button, pressed);
    }

    pub fn handle_user_event(&mut self, event: UserEvent) -> AppResponse {
        let mut response = AppResponse::default();

        match event {
            UserEvent::AddTexture => {
                if let Some(path) = select_texture() {
                    match self.session.add_texture_binding(&path) {
                        Ok(slot) => {
                            self.change_status(AppStatus::Info(format!(
                                "Texture bound at group {}, declare it and hit Run",
                                slot
                            )));
                        }
                        Err(err) => {
                            log::error!("Failed to open texture: {}", err);
                            self.change_status(AppStatus::Warning(err.to_string()));
                        }
                    }
                }
            }
            UserEvent::NewFile => {
                self.session.clear_texture_bindings();
                self.ui_edit_context.frag = DEFAULT_FRAGMENT.to_owned();
                self.shader_path = None;

                response.set_title = Some(format_title(&self.shader_path));
                response.request_redraw = self.recompile();
            }
            UserEvent::OpenFile => {
                if let Some(path) = select_shader_file() {
                    match read_file(&path) {
                        Ok(contents) => {
                            let (frag, texture_paths) = meta::parse(&contents);

                            self.session.clear_texture_bindings();
                            for texture_path in &texture_paths {
                                if let Err(err) = self.session.add_texture_binding(texture_path) {
                                    log::warn!("Skipping texture binding: {}", err);
                                }
                            }

                            self.ui_edit_context.frag = frag;
                            self.shader_path = Some(path);

                            response.set_title = Some(format_title(&self.shader_path));
                            response.request_redraw = self.recompile();
                        }
                        Err(err) => {
                            log::error!("Failed to open file: {}", err);
                            self.change_status(AppStatus::Error(err.to_string()));
                        }
                    }
                }
            }
            UserEvent::Run => {
                response.request_redraw = self.recompile();
            }
            UserEvent::SaveFile => {
                if let Some(title) = self.save_file_impl(false) {
                    response.set_title = Some(title);
                }
            }
            UserEvent::SaveFileAs => {
                if let Some(title) = self.save_file_impl(true) {
                    response.set_title = Some(title);
                }
            }
        }

        response
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        if matches!(event, WindowEvent::CloseRequested) {
            self.closing = true;
        }

        let _ = self.state.on_event(self.ui.context(), event);
    }

    pub fn redraw(&mut self, window: &Window) -> bool {
        if self.closing {
            return false;
        }

        let mut request_redraw = false;

        if self.status_clock.elapsed().as_secs() > 5 {
            self.status = AppStatus::Idle;
        }

        self.session.update(Instant::now());

        match self.render(window) {
            Ok(Some(error)) => {
                self.has_validation_error = true;

                if let wgpu::Error::Validation { description, .. } = &error {
                    log::error!("Validation error: {}", description);
                }

                self.change_status(AppStatus::Error("Shader validation error".to_owned()));
            }
            Ok(None) => {}
            Err(error) => match error.downcast_ref::<crate::error::RenderError>() {
                Some(crate::error::RenderError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                    panic!("Swapchain error: {}. Rendering cannot continue.", error)
                }
                Some(_) | None => {
                    log::warn!("Failed to render: {}", error);
                    request_redraw = true;
                }
            },
        }

        request_redraw
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.session.on_resize(width, height);
    }

    pub fn set_scale_factor(&mut self, scale_factor: f32) {
        self.scale_factor = scale_factor;
        self.state.set_pixels_per_point(scale_factor);
    }

    pub fn shutdown(&mut self) {
        self.session.finish();
    }

    pub fn update_cursor(&mut self, x: f32, y: f32) {
        self.session.pointer_moved(x, y);
    }

    fn change_status(&mut self, status: AppStatus) {
        self.status = status;

        self.status_clock = Instant::now();
    }

    fn recompile(&mut self) -> bool {
        match self
            .session
            .request_recompile(self.ui_edit_context.frag.clone())
        {
            Ok(()) => {
                self.has_validation_error = false;
                log::info!(
                    "Shader compiled successfully ({} bytes)",
                    self.session.fragment_source().len()
                );
                self.change_status(AppStatus::Info("Shader compiled successfully!".to_owned()));

                true
            }
            Err(err) => {
                self.change_status(AppStatus::Error(err.to_string()));

                false
            }
        }
    }

    /// One frame: uniform update happened in `redraw`, then shader pass,
    /// UI pass and present, in that order. Returns a latched validation
    /// error if this frame's commands were rejected by the device.
    fn render(&mut self, window: &Window) -> Result<Option<wgpu::Error>> {
        let ui_state = UiState {
            fps: self.fps_counter.tick(),
            pipeline_state: self.session.state(),
            status: self.status.clone(),
            texture_addable: self.session.texture_addable(),
            texture_labels: self
                .session
                .texture_bindings()
                .iter()
                .enumerate()
                .map(|(index, binding)| {
                    format!(
                        "@group({}): {} ({}x{})",
                        index + 1,
                        binding.path.display(),
                        binding.width,
                        binding.height
                    )
                })
                .collect(),
        };

        let raw_input = self.state.take_egui_input(window);
        let full_output = self.ui.prepare(
            raw_input,
            &mut self.ui_edit_context,
            &self.event_proxy,
            ui_state,
        );

        self.state
            .handle_platform_output(window, self.ui.context(), full_output.platform_output);

        let clipped_primitives = self.ui.context().tessellate(full_output.shapes);
        let textures_delta = full_output.textures_delta;

        let screen_descriptor = ScreenDescriptor {
            physical_width: self.size.0,
            physical_height: self.size.1,
            scale_factor: self.scale_factor,
        };

        self.session.backend_mut().frame_start()?;

        let shader_pass_skipped = self.has_validation_error;
        if !shader_pass_skipped {
            self.session.render()?;
        }

        let ui_render_pass = &mut self.ui_render_pass;
        let overlay_result = self
            .session
            .backend_mut()
            .render_overlay(|device, queue, view| {
                ui_render_pass.add_textures(device, queue, &textures_delta)?;
                ui_render_pass.update_buffers(device, queue, &clipped_primitives, &screen_descriptor);

                let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("UI Encoder"),
                });

                ui_render_pass.execute(
                    &mut encoder,
                    view,
                    &clipped_primitives,
                    &screen_descriptor,
                    if shader_pass_skipped {
                        Some(wgpu::Color::BLACK)
                    } else {
                        None
                    },
                )?;

                queue.submit(Some(encoder.finish()));

                ui_render_pass.remove_textures(textures_delta)?;

                Ok(())
            });

        // Close the frame even if the overlay failed, so the error scope
        // stays balanced and the surface texture is released.
        let device_error = self.session.backend_mut().frame_finish(!self.closing);
        overlay_result?;

        Ok(device_error)
    }

    fn save_file_impl(&mut self, save_as: bool) -> Option<String> {
        if save_as || self.shader_path.is_none() {
            match create_shader_file(&format!("shader.{}", crate::fs::SHADER_EXTENSION)) {
                Some(path) => self.shader_path = Some(path),
                // Cancelled in the dialog.
                None => return None,
            }
        }

        let path = self.shader_path.as_ref().unwrap();

        let texture_paths: Vec<_> = self
            .session
            .texture_bindings()
            .iter()
            .map(|binding| &binding.path)
            .collect();
        write_file(path, meta::compose(&self.ui_edit_context.frag, &texture_paths));

        log::info!("Saving shader file: {:?}", path);

        self.change_status(AppStatus::Info("Shader saved successfully!".to_owned()));

        Some(format_title(&self.shader_path))
    }
}

pub fn format_title(file_path: &Option<PathBuf>) -> String {
    format!(
        "Shaderpad - {}",
        match file_path {
            Some(file_path) => file_path.display().to_string(),
            None => "Untitled".to_owned(),
        }
    )
}

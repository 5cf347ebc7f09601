use crate::{
    core::{format_title, Core},
    event::UserEvent,
    session::PointerButton,
};
use anyhow::Result;
use winit::{
    dpi::{LogicalSize, Size},
    event::{ElementState, Event, MouseButton, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopBuilder},
    window::{Window, WindowBuilder},
};

pub struct App {
    core: Core,
    event_loop: EventLoop<UserEvent>,
    window: Window,
}

impl App {
    pub fn new() -> Result<Self> {
        let event_loop = EventLoopBuilder::<UserEvent>::with_user_event().build();

        let window = WindowBuilder::new()
            .with_min_inner_size(Size::Logical(LogicalSize::new(720.0, 360.0)))
            .with_title(format_title(&None))
            .build(&event_loop)?;

        let inner_size = window.inner_size();

        let core = Core::new(
            &event_loop,
            &window,
            inner_size.width,
            inner_size.height,
            window.scale_factor() as f32,
        )?;

        Ok(Self {
            core,
            event_loop,
            window,
        })
    }

    pub fn run(mut self) {
        self.event_loop.run(move |event, _, control_flow| {
            *control_flow = ControlFlow::Poll;

            match event {
                Event::MainEventsCleared => self.window.request_redraw(),
                Event::RedrawRequested(_) => {
                    if self.core.redraw(&self.window) {
                        self.window.request_redraw();
                    }
                }
                Event::WindowEvent {
                    ref event,
                    window_id,
                } if window_id == self.window.id() => {
                    self.core.handle_window_event(event);

                    match event {
                        WindowEvent::CloseRequested => *control_flow = ControlFlow::Exit,
                        WindowEvent::CursorMoved { position, .. } => self
                            .core
                            .update_cursor(position.x as f32, position.y as f32),
                        WindowEvent::MouseInput { button, state, .. } => {
                            let pressed = *state == ElementState::Pressed;
                            match button {
                                MouseButton::Left => {
                                    self.core.handle_mouse_input(PointerButton::Left, pressed)
                                }
                                MouseButton::Right => {
                                    self.core.handle_mouse_input(PointerButton::Right, pressed)
                                }
                                _ => {}
                            }
                        }
                        WindowEvent::Resized(physical_size) => {
                            self.core.resize(physical_size.width, physical_size.height);
                            self.window.request_redraw();
                        }
                        WindowEvent::ScaleFactorChanged {
                            scale_factor,
                            new_inner_size,
                        } => {
                            self.core.set_scale_factor(*scale_factor as f32);
                            self.core.resize(new_inner_size.width, new_inner_size.height);
                        }
                        _ => {}
                    }
                }
                Event::UserEvent(event) => {
                    let response = self.core.handle_user_event(event);

                    if let Some(title) = response.set_title {
                        self.window.set_title(&title);
                    }

                    if response.request_redraw {
                        self.window.request_redraw();
                    }
                }
                Event::LoopDestroyed => self.core.shutdown(),
                _ => {}
            }
        });
    }
}

use crate::{
    event::{AppStatus, EventProxy, UserEvent},
    session::PipelineState,
};
use egui::{
    widgets, Align, Button, CentralPanel, Color32, Context, FullOutput, Layout, RawInput,
    ScrollArea, TextEdit, TopBottomPanel,
};

pub struct EditContext {
    pub frag: String,
}

pub struct UiState {
    pub fps: usize,
    pub pipeline_state: PipelineState,
    pub status: AppStatus,
    pub texture_addable: bool,
    pub texture_labels: Vec<String>,
}

pub struct Ui {
    context: Context,
}

impl Ui {
    pub fn new() -> Self {
        Self {
            context: Context::default(),
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn prepare(
        &mut self,
        raw_input: RawInput,
        edit_context: &mut EditContext,
        event_proxy: &impl EventProxy<UserEvent>,
        state: UiState,
    ) -> FullOutput {
        self.context.run(raw_input, |ctx| {
            self.ui(ctx, edit_context, event_proxy, &state);
        })
    }

    fn ui(
        &self,
        ctx: &Context,
        edit_context: &mut EditContext,
        event_proxy: &impl EventProxy<UserEvent>,
        state: &UiState,
    ) {
        let is_dark = ctx.style().visuals.dark_mode;

        TopBottomPanel::bottom("status").show(ctx, |ui| match &state.status {
            AppStatus::Info(message) => {
                ui.label(message);
            }
            AppStatus::Warning(message) => {
                ui.colored_label(
                    if is_dark {
                        Color32::KHAKI
                    } else {
                        Color32::DARK_RED
                    },
                    message,
                );
            }
            AppStatus::Error(message) => {
                ui.colored_label(
                    if is_dark {
                        Color32::LIGHT_RED
                    } else {
                        Color32::DARK_RED
                    },
                    message,
                );
            }
            AppStatus::Idle => {}
        });

        CentralPanel::default().show(ctx, |ui| {
            ui.horizontal_wrapped(|ui| {
                if ui.button("Run").clicked() {
                    event_proxy.send_event(UserEvent::Run);
                }

                ui.separator();

                if ui.button("New").clicked() {
                    event_proxy.send_event(UserEvent::NewFile);
                }
                if ui.button("Open").clicked() {
                    event_proxy.send_event(UserEvent::OpenFile);
                }
                if ui.button("Save").clicked() {
                    event_proxy.send_event(UserEvent::SaveFile);
                }
                if ui.button("Save As").clicked() {
                    event_proxy.send_event(UserEvent::SaveFileAs);
                }

                ui.separator();

                if ui
                    .add_enabled(state.texture_addable, Button::new("Add Texture"))
                    .clicked()
                {
                    event_proxy.send_event(UserEvent::AddTexture);
                }

                widgets::global_dark_light_mode_switch(ui);

                ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                    ui.label(format!("{} fps", state.fps));

                    if state.pipeline_state == PipelineState::Failed {
                        ui.colored_label(
                            if is_dark {
                                Color32::KHAKI
                            } else {
                                Color32::DARK_RED
                            },
                            "showing last compiled shader",
                        );
                    }
                });
            });

            if !state.texture_labels.is_empty() {
                ui.horizontal_wrapped(|ui| {
                    for label in &state.texture_labels {
                        ui.label(label);
                    }
                });
            }

            ScrollArea::vertical().show(ui, |ui| {
                ui.with_layout(Layout::top_down(Align::Min), |ui| {
                    TextEdit::multiline(&mut edit_context.frag)
                        .code_editor()
                        .desired_width(f32::INFINITY)
                        .desired_rows(32)
                        .show(ui);
                });
            });
        });
    }
}

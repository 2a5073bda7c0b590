use std::ops::Range;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use egui::{ColorImage, TextureHandle, TextureOptions};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::ollama::{ModelBackend, OllamaClient};
use crate::prompts;
use crate::render::{self, RenderRequest, RenderSettings, RenderedImage};
use crate::session::{self, ModelSession, SessionStatus};
use crate::settings::{self, Settings};
use crate::styles::StylePreset;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Handwriting,
    Assistant,
}

pub struct HandscriptApp {
    runtime: tokio::runtime::Runtime,
    settings: Settings,
    client: OllamaClient,
    tab: Tab,

    text: String,
    style: StylePreset,
    font_path: String,
    output_path: String,
    render_rx: Option<Receiver<Result<RenderedImage>>>,
    preview: Option<TextureHandle>,

    models: Vec<String>,
    models_rx: Option<Receiver<Result<Vec<String>>>>,
    selected_model: Option<String>,
    session: ModelSession,
    prompt: String,
    selection: Option<Range<usize>>,

    status: String,
    error: Option<String>,
}

impl HandscriptApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> std::io::Result<Self> {
        let (settings, error) = match settings::load_settings(None) {
            Ok(settings) => (settings, None),
            Err(err) => (Settings::default(), Some(format!("{}", Error::Settings(err)))),
        };
        // eframe owns the main thread; streams and model queries run here.
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        let client = OllamaClient::from_settings(&settings);
        let selected_model = settings.ai_model.clone();

        let mut app = Self {
            runtime,
            client,
            tab: Tab::Handwriting,
            text: String::new(),
            style: StylePreset::Default,
            font_path: settings.font_path.clone().unwrap_or_default(),
            output_path: String::new(),
            render_rx: None,
            preview: None,
            models: Vec::new(),
            models_rx: None,
            selected_model,
            session: ModelSession::new(),
            prompt: String::new(),
            selection: None,
            status: "Ready".to_string(),
            error,
            settings,
        };
        app.refresh_models(&cc.egui_ctx);
        Ok(app)
    }

    fn refresh_models(&mut self, ctx: &egui::Context) {
        let (tx, rx) = mpsc::channel();
        let client = self.client.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let _ = tx.send(client.list_models().await);
            ctx.request_repaint();
        });
        self.models_rx = Some(rx);
        self.status = format!("Loading models from {}", self.client.host());
    }

    fn start_render(&mut self, ctx: &egui::Context) {
        let output = if self.output_path.trim().is_empty() {
            let dir = self.settings.output_dir();
            if let Err(source) = std::fs::create_dir_all(&dir) {
                self.show_error(Error::Write { path: dir, source });
                return;
            }
            dir.join(crate::default_output_name(OffsetDateTime::now_local().ok()))
        } else {
            PathBuf::from(self.output_path.trim())
        };
        let font = Some(self.font_path.trim())
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);
        let request = RenderRequest::new(self.text.clone(), self.style, output).with_font(font);
        let settings = RenderSettings::from(&self.settings);

        let (tx, rx) = mpsc::channel();
        let ctx = ctx.clone();
        thread::spawn(move || {
            let _ = tx.send(render::render(&request, &settings));
            ctx.request_repaint();
        });
        self.render_rx = Some(rx);
        self.status = "Rendering...".to_string();
    }

    fn send_prompt(&mut self) {
        let Some(model) = self.selected_model.clone() else {
            self.show_error(Error::NoModel("select one from the list first".to_string()));
            return;
        };
        let prompt = self.prompt.trim().to_string();
        if prompt.is_empty() {
            self.status = "Prompt is empty".to_string();
            return;
        }
        let _guard = self.runtime.enter();
        self.session.start(self.client.clone(), &model, &prompt);
        self.selection = None;
        self.status = format!("Generating with {}", model);
    }

    fn import_response(&mut self) {
        let text = self.session.import_text(self.selection.clone());
        if text.is_empty() {
            self.status = "Nothing to import".to_string();
            return;
        }
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push('\n');
        }
        self.text.push_str(&text);
        self.tab = Tab::Handwriting;
        self.status = format!("Imported {} characters", text.chars().count());
    }

    fn show_error(&mut self, err: Error) {
        warn!("{}", err);
        self.status = format!("{} error", err.kind().as_str());
        self.error = Some(err.to_string());
    }

    fn poll_background(&mut self, ctx: &egui::Context) {
        if let Some(rx) = &self.render_rx {
            match rx.try_recv() {
                Ok(result) => {
                    self.render_rx = None;
                    match result {
                        Ok(rendered) => self.show_preview(ctx, rendered),
                        Err(err) => self.show_error(err),
                    }
                }
                Err(TryRecvError::Disconnected) => self.render_rx = None,
                Err(TryRecvError::Empty) => {}
            }
        }

        if let Some(rx) = &self.models_rx {
            match rx.try_recv() {
                Ok(result) => {
                    self.models_rx = None;
                    match result {
                        Ok(models) => {
                            let keep = self
                                .selected_model
                                .as_ref()
                                .is_some_and(|model| models.contains(model));
                            if !keep {
                                self.selected_model = models.first().cloned();
                            }
                            self.status = format!("{} models available", models.len());
                            self.models = models;
                        }
                        Err(err) => self.show_error(err),
                    }
                }
                Err(TryRecvError::Disconnected) => self.models_rx = None,
                Err(TryRecvError::Empty) => {}
            }
        }

        if self.session.poll() {
            match self.session.status() {
                SessionStatus::Finished => self.status = "Response complete".to_string(),
                SessionStatus::Failed(message) => {
                    self.status = "service error".to_string();
                    self.error = Some(message.clone());
                }
                _ => {}
            }
        }
        if self.session.is_streaming() {
            ctx.request_repaint_after(Duration::from_millis(50));
        }
    }

    fn show_preview(&mut self, ctx: &egui::Context, rendered: RenderedImage) {
        let (width, height) = rendered.dimensions();
        let image = ColorImage::from_rgba_unmultiplied(
            [width as usize, height as usize],
            rendered.image.as_raw(),
        );
        self.preview = Some(ctx.load_texture("page-preview", image, TextureOptions::LINEAR));
        self.status = if rendered.overflow_chars > 0 {
            format!(
                "Saved {} ({} characters did not fit)",
                rendered.path.display(),
                rendered.overflow_chars
            )
        } else {
            format!("Saved {}", rendered.path.display())
        };
        debug!("preview updated from {}", rendered.path.display());
    }

    fn handwriting_tab(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.columns(2, |columns| {
            let ui = &mut columns[0];
            ui.label("Text");
            egui::ScrollArea::vertical()
                .id_salt("text-input")
                .max_height(360.0)
                .show(ui, |ui| {
                    ui.add(
                        egui::TextEdit::multiline(&mut self.text)
                            .desired_rows(16)
                            .desired_width(f32::INFINITY),
                    );
                });

            egui::Grid::new("render-form").num_columns(2).show(ui, |ui| {
                ui.label("Style");
                egui::ComboBox::from_id_salt("style")
                    .selected_text(self.style.as_str())
                    .show_ui(ui, |ui| {
                        for preset in StylePreset::ALL {
                            ui.selectable_value(&mut self.style, preset, preset.as_str())
                                .on_hover_text(preset.description());
                        }
                    });
                ui.end_row();

                ui.label("Font file");
                ui.text_edit_singleline(&mut self.font_path)
                    .on_hover_text("Leave empty to use a system font");
                ui.end_row();

                ui.label("Output");
                ui.text_edit_singleline(&mut self.output_path)
                    .on_hover_text("Leave empty for a timestamped PNG in the output directory");
                ui.end_row();
            });

            ui.horizontal(|ui| {
                let busy = self.render_rx.is_some();
                if ui
                    .add_enabled(!busy, egui::Button::new("Convert"))
                    .clicked()
                {
                    self.start_render(ctx);
                }
                if ui.button("Clear").clicked() {
                    self.text.clear();
                }
                if busy {
                    ui.spinner();
                }
            });

            let ui = &mut columns[1];
            ui.label("Preview");
            match &self.preview {
                Some(texture) => {
                    ui.add(egui::Image::new(texture).shrink_to_fit());
                }
                None => {
                    ui.weak("Convert some text to see the page here.");
                }
            }
        });
    }

    fn assistant_tab(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.horizontal(|ui| {
            ui.label("Model");
            egui::ComboBox::from_id_salt("model")
                .selected_text(self.selected_model.as_deref().unwrap_or("(none)"))
                .show_ui(ui, |ui| {
                    for model in &self.models {
                        ui.selectable_value(&mut self.selected_model, Some(model.clone()), model);
                    }
                });
            if ui
                .add_enabled(self.models_rx.is_none(), egui::Button::new("Refresh"))
                .clicked()
            {
                self.refresh_models(ctx);
            }
        });

        for category in prompts::categories() {
            ui.horizontal_wrapped(|ui| {
                ui.label(format!("{}:", category));
                for template in prompts::in_category(category) {
                    if ui
                        .button(template.label)
                        .on_hover_text(template.description)
                        .clicked()
                    {
                        match prompts::render_placeholder(template.name) {
                            Ok(prompt) => self.prompt = prompt,
                            Err(err) => self.error = Some(format!("{:#}", err)),
                        }
                    }
                }
            });
        }

        ui.add(
            egui::TextEdit::multiline(&mut self.prompt)
                .hint_text("Ask for text to copy out by hand")
                .desired_rows(4)
                .desired_width(f32::INFINITY),
        );

        ui.horizontal(|ui| {
            let streaming = self.session.is_streaming();
            if ui
                .add_enabled(!streaming, egui::Button::new("Send"))
                .clicked()
            {
                self.send_prompt();
            }
            if ui.add_enabled(streaming, egui::Button::new("Stop")).clicked() {
                self.session.cancel();
                self.status = "Stopped".to_string();
            }
            if ui.button("Clear").clicked() {
                self.session.clear();
                self.selection = None;
            }
            if ui
                .button("Import selection")
                .on_hover_text("Without a selection the whole response is imported")
                .clicked()
            {
                self.import_response();
            }
            if streaming {
                ui.spinner();
            }
        });

        ui.separator();
        egui::ScrollArea::vertical()
            .id_salt("response")
            .stick_to_bottom(true)
            .show(ui, |ui| {
                let mut response: &str = self.session.response();
                let output = egui::TextEdit::multiline(&mut response)
                    .desired_rows(18)
                    .desired_width(f32::INFINITY)
                    .show(ui);
                // No cursor means focus moved elsewhere (the import button),
                // so the last selection stands.
                if let Some(range) = output.cursor_range {
                    self.selection = session::char_selection(
                        range.primary.ccursor.index,
                        range.secondary.ccursor.index,
                    );
                }
            });
    }
}

impl eframe::App for HandscriptApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_background(ctx);

        egui::TopBottomPanel::top("tabs").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.tab, Tab::Handwriting, "Handwriting");
                ui.selectable_value(&mut self.tab, Tab::Assistant, "AI assistant");
            });
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.label(&self.status);
        });

        egui::CentralPanel::default().show(ctx, |ui| match self.tab {
            Tab::Handwriting => self.handwriting_tab(ui, ctx),
            Tab::Assistant => self.assistant_tab(ui, ctx),
        });

        if let Some(message) = self.error.clone() {
            let mut open = true;
            egui::Window::new("Error")
                .collapsible(false)
                .resizable(false)
                .open(&mut open)
                .show(ctx, |ui| {
                    ui.label(&message);
                });
            if !open {
                self.error = None;
            }
        }
    }
}

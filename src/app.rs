use crate::chat::ChatSession;
use crate::completion::{CompletionClient, CompletionConfig, DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::event::AppEvent;
use crate::settings::store::FileStore;
use crate::settings::{self, FeatureToggles, SettingsStore, ViewMode};
use crate::table::interchange;
use crate::table::Table;
use crate::template::export::{self, bulk_documents, write_archive};
use crate::template::{insert_placeholder, TemplateKind, TemplateSettings};
use crate::theme::Theme;
use eframe::egui::{self, Color32, RichText, ScrollArea};
use std::fs;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::info;

const PASTE_SUBMIT_THRESHOLD: usize = 100;

pub fn completion_config(store: &impl SettingsStore) -> CompletionConfig {
    let non_blank = |key: &str, default: &str| {
        store
            .get(key)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    };
    CompletionConfig {
        api_base: non_blank(settings::API_BASE, DEFAULT_API_BASE),
        model: non_blank(settings::MODEL, DEFAULT_MODEL),
    }
}

fn long_paste(events: &[egui::Event], toggles: FeatureToggles) -> Option<&str> {
    if !toggles.paste_submit {
        return None;
    }
    events.iter().find_map(|event| match event {
        egui::Event::Paste(text) if text.chars().count() > PASTE_SUBMIT_THRESHOLD => {
            Some(text.as_str())
        }
        _ => None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TemplateField {
    Custom,
    From,
    To,
    Cc,
    Bcc,
    ReadReceipt,
    DeliveryReceipt,
    Subject,
    Body,
}

impl TemplateField {
    const EMAIL: [(TemplateField, &'static str, bool); 8] = [
        (TemplateField::From, "From", false),
        (TemplateField::To, "To", false),
        (TemplateField::Cc, "Cc", false),
        (TemplateField::Bcc, "Bcc", false),
        (TemplateField::ReadReceipt, "Read Receipt", false),
        (TemplateField::DeliveryReceipt, "Delivery Receipt", false),
        (TemplateField::Subject, "Subject", false),
        (TemplateField::Body, "Body", true),
    ];

    fn text_mut(self, template: &mut TemplateSettings) -> &mut String {
        let email = &mut template.email;
        match self {
            Self::Custom => &mut template.custom,
            Self::From => &mut email.from,
            Self::To => &mut email.to,
            Self::Cc => &mut email.cc,
            Self::Bcc => &mut email.bcc,
            Self::ReadReceipt => &mut email.read_receipt,
            Self::DeliveryReceipt => &mut email.delivery_receipt,
            Self::Subject => &mut email.subject,
            Self::Body => &mut email.body,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FocusedField {
    field: TemplateField,
    selection: (usize, usize),
}

pub struct TabletalkApp {
    rx: Receiver<AppEvent>,
    completion: CompletionClient,
    store: FileStore,
    theme: Theme,
    session: ChatSession,
    mode: ViewMode,
    api_key: String,
    system_prompt: String,
    user_prompt: String,
    list_name: String,
    api_base: String,
    model: String,
    template: TemplateSettings,
    toggles: FeatureToggles,
    focused_field: Option<FocusedField>,
    diagnostics_log: Vec<String>,
}

impl TabletalkApp {
    pub fn new(
        rx: Receiver<AppEvent>,
        completion: CompletionClient,
        store: FileStore,
        theme: Theme,
        warnings: Vec<String>,
    ) -> Self {
        let table: Table = store.load_json(settings::CSV_DATA);
        let mut app = Self {
            rx,
            completion,
            session: ChatSession::with_table(table),
            mode: store.load_json(settings::UI_MODE),
            api_key: store.get_or_default(settings::OPENAI_KEY),
            system_prompt: store.get_or_default(settings::SYSTEM_PROMPT),
            user_prompt: store.get_or_default(settings::USER_PROMPT),
            list_name: store.get_or_default(settings::LIST_NAME),
            api_base: store.get_or_default(settings::API_BASE),
            model: store.get_or_default(settings::MODEL),
            template: store.load_json(settings::TEMPLATE_DATA),
            toggles: store.load_json(settings::FEATURE_TOGGLES),
            store,
            theme,
            focused_field: None,
            diagnostics_log: Vec::new(),
        };

        for warning in warnings {
            app.log_diagnostic(format!("settings warning: {warning}"));
        }

        app
    }

    fn timestamp() -> String {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(duration) => duration.as_secs().to_string(),
            Err(_) => "0".to_string(),
        }
    }

    fn log_diagnostic(&mut self, message: impl Into<String>) {
        self.diagnostics_log
            .push(format!("[{}] {}", Self::timestamp(), message.into()));
    }

    fn persist_table(&mut self) {
        self.store.save_json(settings::CSV_DATA, self.session.table());
    }

    fn persist_settings(&mut self) {
        self.store.set_text(settings::OPENAI_KEY, &self.api_key);
        self.store.set_text(settings::SYSTEM_PROMPT, &self.system_prompt);
        self.store.set_text(settings::USER_PROMPT, &self.user_prompt);
        self.store.set_text(settings::LIST_NAME, &self.list_name);
        self.store.set_text(settings::API_BASE, &self.api_base);
        self.store.set_text(settings::MODEL, &self.model);
        self.store.save_json(settings::UI_MODE, &self.mode);
        self.store.save_json(settings::TEMPLATE_DATA, &self.template);
        self.store.save_json(settings::FEATURE_TOGGLES, &self.toggles);

        if !self.store.is_dirty() {
            return;
        }
        if let Err(err) = self.store.flush() {
            self.log_diagnostic(format!("failed to persist settings: {err}"));
        }
    }

    fn submit_prompt(&mut self, prompt: String) {
        self.persist_settings();
        let api_key = settings::api_key(&self.store);
        let request = match self
            .session
            .begin_request(api_key, &self.system_prompt, &prompt)
        {
            Ok(request) => request,
            Err(err) => {
                self.log_diagnostic(format!("request not sent: {err}"));
                return;
            }
        };

        self.completion.set_config(completion_config(&self.store));
        if let Err(err) = self.completion.send(request) {
            self.session.fail(&err.to_string());
            self.log_diagnostic(format!("request not sent: {err}"));
        }
    }

    fn drain_events(&mut self, ctx: &egui::Context) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.apply_event(event, ctx),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.log_diagnostic("event channel disconnected");
                    break;
                }
            }
        }
    }

    fn apply_event(&mut self, event: AppEvent, ctx: &egui::Context) {
        match event {
            AppEvent::CompletionReceived(text) => {
                self.session.complete(&text);
                self.persist_table();
                let added = self.session.highlights().len();
                self.log_diagnostic(format!("completion merged, {added} new rows"));
            }
            AppEvent::CompletionFailed(message) => {
                self.session.fail(&message);
                self.log_diagnostic(format!("completion failed: {message}"));
            }
        }
        ctx.request_repaint();
    }

    fn clear_data(&mut self) {
        self.session.clear();
        self.persist_table();
        self.log_diagnostic("table cleared");
    }

    fn undo_last_batch(&mut self) {
        let removed = self.session.highlights().len();
        self.session.undo_last_batch();
        self.persist_table();
        self.log_diagnostic(format!("removed {removed} rows from last response"));
    }

    fn export_csv(&mut self) {
        let file_name = interchange::export_file_name(&self.list_name);
        let Some(path) = rfd::FileDialog::new()
            .add_filter("CSV", &["csv"])
            .set_file_name(file_name.as_str())
            .save_file()
        else {
            return;
        };

        match fs::write(&path, self.session.export_csv()) {
            Ok(()) => {
                info!(path = %path.display(), "exported csv");
                self.log_diagnostic(format!("exported {}", path.display()));
            }
            Err(err) => {
                self.session.fail(&format!("failed to write {}: {err}", path.display()));
                self.log_diagnostic(format!("csv export failed: {err}"));
            }
        }
    }

    fn import_csv(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("CSV", &["csv", "txt"])
            .pick_file()
        else {
            return;
        };

        match fs::read_to_string(&path) {
            Ok(text) => {
                self.session.import_csv(&text);
                self.persist_table();
                let added = self.session.highlights().len();
                info!(path = %path.display(), added, "imported csv");
                self.log_diagnostic(format!("imported {added} rows from {}", path.display()));
            }
            Err(err) => {
                self.session.fail(&format!("failed to read {}: {err}", path.display()));
                self.log_diagnostic(format!("csv import failed: {err}"));
            }
        }
    }

    fn export_documents(&mut self) {
        let base = export::export_base(&self.list_name).to_string();
        let Some(path) = rfd::FileDialog::new()
            .add_filter("ZIP", &["zip"])
            .set_file_name(export::archive_file_name(&base).as_str())
            .save_file()
        else {
            return;
        };

        let documents = bulk_documents(&self.template, self.session.table(), &base);
        match write_archive(&path, &documents) {
            Ok(()) => self.log_diagnostic(format!(
                "wrote {} documents to {}",
                documents.len(),
                path.display()
            )),
            Err(err) => {
                self.session.fail(&err.to_string());
                self.log_diagnostic(format!("bulk export failed: {err}"));
            }
        }
    }

    fn insert_into_focused_field(&mut self, column: &str) {
        let Some(focused) = self.focused_field else {
            return;
        };
        let text = focused.field.text_mut(&mut self.template);
        let (updated, selection) = insert_placeholder(text, focused.selection, column);
        *text = updated;
        self.focused_field = Some(FocusedField {
            field: focused.field,
            selection: (selection.1, selection.1),
        });
    }

    fn render_top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.strong("Tabletalk");
                ui.separator();
                ui.add(
                    egui::TextEdit::singleline(&mut self.list_name)
                        .hint_text("List Name")
                        .desired_width(220.0),
                );
                ui.label(format!("All: {}", self.session.table().data_len()));
                ui.label(format!("New: {}", self.session.highlights().len()));
                ui.separator();
                for mode in ViewMode::ALL {
                    ui.selectable_value(&mut self.mode, mode, mode.label());
                }
            });
        });
    }

    fn render_table_view(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("prompt_panel")
            .resizable(true)
            .min_height(90.0)
            .show(ctx, |ui| self.render_prompt(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Clear Data").clicked() {
                    self.clear_data();
                }
                if ui.button("Export CSV").clicked() {
                    self.export_csv();
                }
                if ui.button("Import CSV").clicked() {
                    self.import_csv();
                }
            });

            if let Some(response) = self.session.response() {
                if response.starts_with("Error:") {
                    ui.label(RichText::new(response).color(self.theme.danger));
                }
            }

            self.render_filter_tags(ui);

            ui.horizontal(|ui| {
                ui.label("Search");
                let mut search = self.session.search().to_string();
                if ui
                    .add(egui::TextEdit::singleline(&mut search).desired_width(f32::INFINITY))
                    .changed()
                {
                    self.session.set_search(search);
                }
            });
            ui.separator();

            self.render_table(ui);
        });
    }

    fn render_filter_tags(&mut self, ui: &mut egui::Ui) {
        if self.session.filters().is_empty() {
            return;
        }

        ui.label(RichText::new("Exclude").color(self.theme.text_muted));
        let mut removed: Option<(String, String)> = None;
        ui.horizontal_wrapped(|ui| {
            for (column, value) in self.session.filters().entries() {
                let tag = self.theme.tag_button(column, value);
                if ui
                    .add(tag)
                    .on_hover_text(format!("Remove filter {value} from {column}"))
                    .clicked()
                {
                    removed = Some((column.to_string(), value.to_string()));
                }
            }
        });

        if let Some((column, value)) = removed {
            self.session.remove_exclude(&column, &value);
        }
    }

    fn render_table(&mut self, ui: &mut egui::Ui) {
        let table = self.session.table();
        if table.is_empty() {
            ui.label(RichText::new("No data yet").color(self.theme.text_muted));
            return;
        }

        let header = table.header();
        let visible = self.session.visible_indices();
        let highlights = self.session.highlights();
        let tints: Vec<bool> = visible.iter().map(|index| highlights.contains(*index)).collect();
        let header_tint = self.theme.header_tint;
        let new_row_tint = self.theme.new_row_tint;

        let mut clicked: Option<(String, String)> = None;
        ScrollArea::both()
            .id_salt("csv_table")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                egui::Grid::new("csv_grid")
                    .striped(false)
                    .spacing([16.0, 6.0])
                    .with_row_color(move |row, _style| {
                        if row == 0 {
                            Some(header_tint)
                        } else if tints.get(row - 1).copied().unwrap_or(false) {
                            Some(new_row_tint)
                        } else {
                            None
                        }
                    })
                    .show(ui, |ui| {
                        for column in header {
                            let label = egui::Label::new(RichText::new(column).strong())
                                .sense(egui::Sense::click());
                            if ui.add(label).clicked() {
                                clicked = Some((column.clone(), column.clone()));
                            }
                        }
                        ui.end_row();

                        for index in &visible {
                            let Some(row) = table.data_row(*index) else {
                                continue;
                            };
                            for (column, cell) in header.iter().zip(row) {
                                let label = egui::Label::new(cell.as_str())
                                    .sense(egui::Sense::click());
                                if ui.add(label).clicked() {
                                    clicked = Some((column.clone(), cell.clone()));
                                }
                            }
                            ui.end_row();
                        }
                    });
            });

        if let Some((column, value)) = clicked {
            self.session.exclude(&column, &value);
        }
    }

    fn take_long_paste(&self, ui: &egui::Ui, prompt_id: egui::Id) -> Option<String> {
        if self.session.is_loading() || !ui.memory(|memory| memory.has_focus(prompt_id)) {
            return None;
        }
        let pasted =
            ui.input(|input| long_paste(&input.events, self.toggles).map(str::to_string))?;
        ui.input_mut(|input| {
            input
                .events
                .retain(|event| !matches!(event, egui::Event::Paste(_)))
        });
        Some(pasted)
    }

    fn render_prompt(&mut self, ui: &mut egui::Ui) {
        let prompt_id = egui::Id::new("user_prompt");
        let mut submit: Option<String> = None;

        if let Some(pasted) = self.take_long_paste(ui, prompt_id) {
            self.user_prompt = pasted.clone();
            submit = Some(pasted);
        }

        ui.horizontal(|ui| {
            let buttons_width = 110.0;
            ui.add(
                egui::TextEdit::multiline(&mut self.user_prompt)
                    .id(prompt_id)
                    .hint_text("Describe the rows you want...")
                    .desired_rows(4)
                    .desired_width(ui.available_width() - buttons_width),
            );

            ui.vertical(|ui| {
                let has_batch = !self.session.highlights().is_empty();
                let undo = self.theme.warn_button("Undo", has_batch);
                if ui.add_enabled(has_batch, undo).clicked() {
                    self.undo_last_batch();
                }

                let loading = self.session.is_loading();
                if loading {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Busy...");
                    });
                } else if ui.button("Submit").clicked() {
                    submit = Some(self.user_prompt.clone());
                }
            });
        });

        if let Some(prompt) = submit {
            self.submit_prompt(prompt);
        }
    }

    fn render_template_view(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let row_count = self.session.table().data_len();
            ui.horizontal(|ui| {
                for kind in [TemplateKind::Custom, TemplateKind::Email] {
                    if ui
                        .selectable_value(&mut self.template.kind, kind, kind.label())
                        .changed()
                    {
                        self.focused_field = None;
                    }
                }
                ui.separator();
                ui.label("Filename");
                ui.add(
                    egui::TextEdit::singleline(&mut self.template.filename)
                        .hint_text(format!(
                            "{}_{{#}}.{}",
                            export::export_base(&self.list_name),
                            self.template.kind.extension()
                        ))
                        .desired_width(220.0),
                );
                let label = format!(
                    "Export {row_count} {}",
                    self.template.active().kind().label().to_uppercase()
                );
                if ui.add_enabled(row_count > 0, egui::Button::new(label)).clicked() {
                    self.export_documents();
                }
            });
            ui.separator();

            let header: Vec<String> = self.session.table().header().to_vec();
            let mut inserted: Option<String> = None;
            ui.horizontal_wrapped(|ui| {
                for column in &header {
                    if ui
                        .add_enabled(self.focused_field.is_some(), egui::Button::new(column))
                        .clicked()
                    {
                        inserted = Some(column.clone());
                    }
                }
            });
            if let Some(column) = inserted {
                self.insert_into_focused_field(&column);
            }
            ui.separator();

            ScrollArea::vertical()
                .id_salt("template_fields")
                .show(ui, |ui| match self.template.kind {
                    TemplateKind::Custom => {
                        ui.label("Template:");
                        self.template_field_editor(ui, TemplateField::Custom, true);
                    }
                    TemplateKind::Email => {
                        for (field, label, multiline) in TemplateField::EMAIL {
                            ui.label(format!("{label}:"));
                            self.template_field_editor(ui, field, multiline);
                        }
                    }
                });
        });
    }

    fn template_field_editor(&mut self, ui: &mut egui::Ui, field: TemplateField, multiline: bool) {
        let text = field.text_mut(&mut self.template);
        let editor = if multiline {
            egui::TextEdit::multiline(text).desired_rows(10)
        } else {
            egui::TextEdit::singleline(text)
        };
        let output = editor
            .id_salt(("template_field", field as u8))
            .desired_width(f32::INFINITY)
            .show(ui);

        if output.response.has_focus() {
            let end = text.chars().count();
            let selection = output
                .state
                .cursor
                .char_range()
                .map(|range| (range.primary.index, range.secondary.index))
                .unwrap_or((end, end));
            self.focused_field = Some(FocusedField { field, selection });
        }
    }

    fn render_settings_view(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let frame = self.theme.card_frame();
            frame.show(ui, |ui| {
                ui.label("OpenAI API Key:");
                ui.add(
                    egui::TextEdit::singleline(&mut self.api_key)
                        .password(true)
                        .desired_width(f32::INFINITY),
                );
                ui.label("System Prompt:");
                ui.add(
                    egui::TextEdit::multiline(&mut self.system_prompt)
                        .desired_rows(4)
                        .desired_width(f32::INFINITY),
                );
                ui.label("Model:");
                ui.add(egui::TextEdit::singleline(&mut self.model).hint_text(DEFAULT_MODEL));
                ui.label("API endpoint:");
                ui.add(
                    egui::TextEdit::singleline(&mut self.api_base)
                        .hint_text(DEFAULT_API_BASE)
                        .desired_width(f32::INFINITY),
                );
                ui.checkbox(
                    &mut self.toggles.paste_submit,
                    "Submit long pastes immediately",
                );
                ui.label(
                    RichText::new(format!("Stored in {}", self.store.path().display()))
                        .color(self.theme.text_muted)
                        .small(),
                );
            });

            ui.add_space(self.theme.spacing_8);
            let response = if self.session.is_loading() {
                "Busy...".to_string()
            } else {
                self.session.response().unwrap_or_default().to_string()
            };
            ScrollArea::vertical()
                .id_salt("response_area")
                .max_height(240.0)
                .show(ui, |ui| {
                    ui.label(RichText::new(response).monospace());
                });

            ui.separator();
            egui::CollapsingHeader::new("Diagnostics")
                .default_open(false)
                .show(ui, |ui| {
                    ScrollArea::vertical()
                        .id_salt("diagnostics_log")
                        .max_height(120.0)
                        .stick_to_bottom(true)
                        .show(ui, |ui| {
                            for entry in &self.diagnostics_log {
                                ui.label(RichText::new(entry).color(Color32::GRAY));
                            }
                        });
                });
        });
    }
}

impl eframe::App for TabletalkApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events(ctx);
        self.render_top_bar(ctx);
        match self.mode {
            ViewMode::Table => self.render_table_view(ctx),
            ViewMode::Template => self.render_template_view(ctx),
            ViewMode::Settings => self.render_settings_view(ctx),
        }
        self.persist_settings();

        if self.session.is_loading() || self.completion.is_busy() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

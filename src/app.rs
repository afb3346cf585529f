use crate::chart::paint::paint_chart;
use crate::chart::surface::ChartHost;
use crate::chart::{ChartHandle, ChartKind, ImageExport};
use crate::config::AppConfig;
use crate::event::AppEvent;
use crate::format::markup::{self, Block, Span};
use crate::session::chat::ChatSession;
use crate::session::{Entry, Message, Role, TableSpec};
use crate::theme::Theme;
use crate::toolkit::{format_number, format_percentage, Debouncer, FrameClipboard, KeyedThrottle, ToastKind};
use chrono::Local;
use eframe::egui::{self, text::LayoutJob, Color32, FontId, RichText, ScrollArea, TextFormat};
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

const VALIDATION_DELAY: Duration = Duration::from_millis(300);
const EXPORT_THROTTLE: Duration = Duration::from_secs(1);

enum UiAction {
    Submit(String),
    Copy(u64),
    CopyLink(u64),
    Share(u64),
    ExportData(u64),
    SavePng(u64),
    ChangeChart(u64, ChartKind),
    ExportTranscript,
    Clear,
    DismissToast(u64),
    ChartPainted(String, egui::Rect),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ExportAction {
    Share,
    Csv,
    Png,
    Transcript,
}

pub struct AttendanceApp {
    rx: Receiver<AppEvent>,
    session: ChatSession,
    theme: Theme,
    frame_clipboard: FrameClipboard,
    endpoint_label: String,
    export_dir: PathBuf,
    max_query_chars: usize,
    input_buffer: String,
    input_invalid: bool,
    validation: Debouncer,
    export_throttle: KeyedThrottle<(ExportAction, Option<u64>)>,
    pending_image: Option<ImageExport>,
    diagnostics_log: Vec<String>,
    scroll_to_bottom: bool,
}

impl AttendanceApp {
    pub fn new(
        rx: Receiver<AppEvent>,
        session: ChatSession,
        config: &AppConfig,
        frame_clipboard: FrameClipboard,
        endpoint_label: String,
        warnings: Vec<String>,
        initial_query: Option<String>,
    ) -> Self {
        let mut app = Self {
            rx,
            session,
            theme: Theme::default(),
            frame_clipboard,
            endpoint_label,
            export_dir: config.export_dir.clone(),
            max_query_chars: config.max_query_chars,
            input_buffer: String::new(),
            input_invalid: false,
            validation: Debouncer::new(VALIDATION_DELAY),
            export_throttle: KeyedThrottle::new(EXPORT_THROTTLE),
            pending_image: None,
            diagnostics_log: Vec::new(),
            scroll_to_bottom: false,
        };

        for warning in warnings {
            app.log_diagnostic(format!("config warning: {warning}"));
        }
        if let Some(query) = initial_query {
            app.log_diagnostic(format!("submitting linked query: {query}"));
            app.session.submit_user_text(&query);
        }

        app
    }

    fn timestamp() -> String {
        Local::now().format("%H:%M:%S").to_string()
    }

    fn log_diagnostic(&mut self, message: impl Into<String>) {
        self.diagnostics_log
            .push(format!("[{}] {}", Self::timestamp(), message.into()));
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
            AppEvent::QueryCompleted { request_id, result } => {
                if let Err(err) = &result {
                    self.log_diagnostic(format!("request {request_id} failed: {err}"));
                }
                self.session.complete_query(request_id, result);
                self.scroll_to_bottom = true;
                ctx.request_repaint();
            }
        }
    }

    fn handle_screenshot(&mut self, ctx: &egui::Context) {
        let capture = ctx.input(|input| {
            input.raw.events.iter().find_map(|event| match event {
                egui::Event::Screenshot { image, .. } => Some(image.clone()),
                _ => None,
            })
        });
        let (Some(capture), Some(request)) = (capture, self.pending_image.take()) else {
            return;
        };
        let pixels_per_point = ctx.pixels_per_point();
        match self
            .session
            .finish_chart_image(&request, &capture, pixels_per_point, &self.export_dir)
        {
            Some(path) => self.log_diagnostic(format!("saved {}", path.display())),
            None => self.log_diagnostic(format!("failed to save {}", request.filename)),
        }
    }

    fn handle_keyboard(&mut self, ctx: &egui::Context) {
        let clear = ctx.input_mut(|input| input.consume_key(egui::Modifiers::COMMAND, egui::Key::L));
        if clear {
            self.session.clear_session();
        }
        if ctx.input(|input| input.key_pressed(egui::Key::Escape)) {
            self.session.toolkit_mut().toasts.dismiss_all();
        }
    }

    fn flush_clipboard(&mut self, ctx: &egui::Context) {
        if let Some(text) = self.frame_clipboard.take() {
            ctx.copy_text(text);
        }
    }

    fn refresh_validation(&mut self, ctx: &egui::Context) {
        let now = Instant::now();
        if self.validation.fire(now) {
            self.input_invalid = self.input_buffer.chars().count() > self.max_query_chars;
        } else if self.validation.pending() {
            ctx.request_repaint_after(VALIDATION_DELAY);
        }
    }

    /// Drops a repeat of the same export on the same message within the throttle window.
    fn allow_export(&mut self, action: ExportAction, id: Option<u64>) -> bool {
        let allowed = self.export_throttle.try_acquire((action, id), Instant::now());
        if !allowed {
            self.log_diagnostic(format!("ignored repeated {action:?} request"));
        }
        allowed
    }

    fn apply_action(&mut self, action: UiAction, ctx: &egui::Context) {
        match action {
            UiAction::Submit(text) => {
                if self.session.submit_user_text(&text).is_some() {
                    self.scroll_to_bottom = true;
                }
            }
            UiAction::Copy(id) => self.session.copy_message(id),
            UiAction::CopyLink(id) => self.session.copy_query_link(id),
            UiAction::Share(id) => {
                if self.allow_export(ExportAction::Share, Some(id)) {
                    self.session.share_message(id);
                }
            }
            UiAction::ExportData(id) => {
                if self.allow_export(ExportAction::Csv, Some(id)) {
                    if let Some(path) = self.session.export_message_data(id, &self.export_dir) {
                        self.log_diagnostic(format!("saved {}", path.display()));
                    }
                }
            }
            UiAction::SavePng(id) => {
                if self.allow_export(ExportAction::Png, Some(id)) {
                    if let Some(request) = self.session.request_chart_image(id) {
                        self.pending_image = Some(request);
                        ctx.send_viewport_cmd(egui::ViewportCommand::Screenshot(Default::default()));
                    }
                }
            }
            UiAction::ChangeChart(id, kind) => {
                self.session.change_chart_type(id, kind);
            }
            UiAction::ExportTranscript => {
                if self.allow_export(ExportAction::Transcript, None) {
                    if let Some(path) = self.session.export_transcript(&self.export_dir) {
                        self.log_diagnostic(format!("saved {}", path.display()));
                    }
                }
            }
            UiAction::Clear => self.session.clear_session(),
            UiAction::DismissToast(id) => self.session.toolkit_mut().toasts.dismiss(id),
            UiAction::ChartPainted(mount, rect) => self
                .session
                .charts_mut()
                .host_mut()
                .record_painted_rect(&mount, rect),
        }
    }

    fn render_top_bar(&self, ctx: &egui::Context, actions: &mut Vec<UiAction>) {
        let (status, color) = if self.session.pending_request() {
            ("Waiting for response...", self.theme.warning)
        } else {
            ("Ready", self.theme.success)
        };
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.strong("Attendance Assistant");
                ui.separator();
                ui.label(RichText::new(&self.endpoint_label).color(self.theme.text_muted));
                ui.separator();
                ui.label(RichText::new(status).color(color));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Clear chat").clicked() {
                        actions.push(UiAction::Clear);
                    }
                    if ui.button("Export chat").clicked() {
                        actions.push(UiAction::ExportTranscript);
                    }
                });
            });
        });
    }

    fn render_left_panel(&self, ctx: &egui::Context, actions: &mut Vec<UiAction>) {
        egui::SidePanel::left("suggestions_panel")
            .resizable(true)
            .default_width(240.0)
            .show(ctx, |ui| {
                ui.heading("Suggestions");
                ui.separator();
                for suggestion in self.session.suggestions() {
                    let button = egui::Button::new(format!("💡 {suggestion}")).wrap();
                    if ui.add_sized([ui.available_width(), 0.0], button).clicked() {
                        actions.push(UiAction::Submit(suggestion.clone()));
                    }
                }

                ui.separator();
                ui.strong("Export folder");
                ui.label(
                    RichText::new(self.export_dir.display().to_string())
                        .small()
                        .color(self.theme.text_muted),
                );
            });
    }

    fn render_markup(&self, ui: &mut egui::Ui, text: &str, base: Color32) {
        let strong = ui.visuals().strong_text_color();
        for block in markup::parse(text) {
            let (prefix, spans) = match block {
                Block::Break => {
                    ui.add_space(self.theme.spacing_4);
                    continue;
                }
                Block::Bullet(spans) => (markup::BULLET, spans),
                Block::Line(spans) => ("", spans),
            };
            let mut job = LayoutJob::default();
            let plain = TextFormat {
                font_id: FontId::proportional(14.0),
                color: base,
                ..Default::default()
            };
            if !prefix.is_empty() {
                job.append(prefix, 8.0, plain.clone());
            }
            for Span { text, bold, italic } in spans {
                job.append(
                    &text,
                    0.0,
                    TextFormat {
                        color: if bold { strong } else { base },
                        italics: italic,
                        ..plain.clone()
                    },
                );
            }
            ui.label(job);
        }
    }

    fn render_table(&self, ui: &mut egui::Ui, id: u64, table: &TableSpec) {
        if table.rows.is_empty() {
            ui.label(RichText::new("No class data").color(self.theme.text_muted));
            return;
        }
        egui::Grid::new(("table", id))
            .striped(true)
            .spacing([18.0, 4.0])
            .show(ui, |ui| {
                for header in ["Class", "Present", "Absent", "Attendance"] {
                    ui.strong(header);
                }
                ui.end_row();
                for row in &table.rows {
                    ui.label(&row.label);
                    ui.label(format_number(row.present as f64));
                    ui.label(format_number(row.absent as f64));
                    ui.label(
                        RichText::new(format_percentage(row.percentage, 1))
                            .color(self.theme.percentage_color(row.percentage)),
                    );
                    ui.end_row();
                }
            });
    }

    fn render_chart(&self, ui: &mut egui::Ui, message: &Message, actions: &mut Vec<UiAction>) {
        let mount = message.chart_mount();
        let Some(chart) = self.session.charts().host().chart(&mount) else {
            return;
        };
        let response = paint_chart(ui, chart, &self.theme);
        let visible = response.rect.intersect(ui.clip_rect());
        actions.push(UiAction::ChartPainted(mount.clone(), visible));

        let handle = ChartHandle {
            mount: mount.clone(),
            kind: chart.kind,
        };
        ui.horizontal(|ui| {
            egui::ComboBox::from_id_salt(("chart_kind", message.id))
                .selected_text(chart.kind.as_str())
                .show_ui(ui, |ui| {
                    for kind in ChartKind::ALL {
                        if ui.selectable_label(kind == chart.kind, kind.as_str()).clicked()
                            && kind != chart.kind
                        {
                            actions.push(UiAction::ChangeChart(message.id, kind));
                        }
                    }
                });
            if ui.small_button("Save PNG").clicked() {
                actions.push(UiAction::SavePng(message.id));
            }
            if let Some(metrics) = self.session.charts().chart_metrics(&handle) {
                ui.label(
                    RichText::new(format!(
                        "n={} · avg {} · min {} · max {}",
                        metrics.count,
                        format_number(metrics.average),
                        format_number(metrics.min),
                        format_number(metrics.max)
                    ))
                    .small()
                    .color(self.theme.text_muted),
                );
            }
        });
    }

    fn render_message(&self, ui: &mut egui::Ui, message: &Message, actions: &mut Vec<UiAction>) {
        let (fill, label) = match (message.role, message.is_error) {
            (Role::User, _) => (self.theme.user_bubble, "You"),
            (Role::Bot, true) => (self.theme.error_bubble, "Assistant"),
            (Role::Bot, false) => (self.theme.bot_bubble, "Assistant"),
        };
        let text_color = if message.is_error {
            self.theme.danger
        } else {
            self.theme.text_primary
        };

        self.theme.bubble_frame(fill).show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.horizontal(|ui| {
                ui.strong(label);
                ui.label(
                    RichText::new(message.timestamp.format("%H:%M").to_string())
                        .small()
                        .color(self.theme.text_muted),
                );
            });
            self.render_markup(ui, &message.text, text_color);

            if let Some(table) = &message.attachments.table {
                ui.add_space(self.theme.spacing_8);
                self.render_table(ui, message.id, table);
            }
            if message.attachments.chart.is_some() {
                ui.add_space(self.theme.spacing_8);
                self.render_chart(ui, message, actions);
            }

            if message.role == Role::User {
                if ui.small_button("Copy link").clicked() {
                    actions.push(UiAction::CopyLink(message.id));
                }
            } else {
                ui.horizontal(|ui| {
                    if ui.small_button("Copy").clicked() {
                        actions.push(UiAction::Copy(message.id));
                    }
                    if message.has_actions() {
                        if ui.small_button("Share").clicked() {
                            actions.push(UiAction::Share(message.id));
                        }
                        if message.export.is_some() && ui.small_button("Export CSV").clicked() {
                            actions.push(UiAction::ExportData(message.id));
                        }
                    }
                });
            }
        });
    }

    fn render_transcript(&mut self, ui: &mut egui::Ui, actions: &mut Vec<UiAction>) {
        let transcript_height = (ui.available_height() - 170.0).max(120.0);
        let scroll_to_bottom = std::mem::take(&mut self.scroll_to_bottom);
        ScrollArea::vertical()
            .id_salt("chat_transcript")
            .max_height(transcript_height)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for entry in self.session.entries() {
                    match entry {
                        Entry::Message(message) => self.render_message(ui, message, actions),
                        Entry::Typing => {
                            ui.horizontal(|ui| {
                                ui.spinner();
                                ui.label(
                                    RichText::new("Assistant is typing...")
                                        .italics()
                                        .color(self.theme.text_muted),
                                );
                            });
                        }
                    }
                }
                if scroll_to_bottom {
                    ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
                }
            });
    }

    fn render_composer(&mut self, ui: &mut egui::Ui, actions: &mut Vec<UiAction>) {
        let too_long = self.input_buffer.chars().count() > self.max_query_chars;
        let mut send_now = false;

        self.theme.composer_frame().show(ui, |ui| {
            ui.horizontal(|ui| {
                let response = ui.add(
                    egui::TextEdit::singleline(&mut self.input_buffer)
                        .desired_width(ui.available_width() - 80.0)
                        .hint_text("Ask about attendance..."),
                );
                if response.changed() {
                    self.validation.touch(Instant::now());
                }
                if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    send_now = true;
                    response.request_focus();
                }

                let can_send = !too_long && !self.input_buffer.trim().is_empty();
                send_now |= ui
                    .add_enabled(can_send, egui::Button::new("Send"))
                    .clicked();
                send_now &= can_send;
            });
            if self.input_invalid && too_long {
                ui.label(
                    RichText::new(format!(
                        "Query is too long (max {} characters)",
                        self.max_query_chars
                    ))
                    .small()
                    .color(self.theme.danger),
                );
            }
        });

        if send_now {
            actions.push(UiAction::Submit(std::mem::take(&mut self.input_buffer)));
            self.input_invalid = false;
        }
    }

    fn render_center_panel(&mut self, ctx: &egui::Context, actions: &mut Vec<UiAction>) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Chat");
            ui.separator();

            self.render_transcript(ui, actions);

            ui.separator();
            let diagnostics_title = format!(
                "Diagnostics ({} messages, {} charts)",
                self.session.history_len(),
                self.session.charts().host().chart_count()
            );
            egui::CollapsingHeader::new(diagnostics_title)
                .id_salt("diagnostics")
                .default_open(false)
                .show(ui, |ui| {
                    ScrollArea::vertical()
                        .id_salt("diagnostics_log")
                        .max_height(90.0)
                        .stick_to_bottom(true)
                        .show(ui, |ui| {
                            for entry in &self.diagnostics_log {
                                ui.label(entry);
                            }
                        });
                });

            ui.separator();
            self.render_composer(ui, actions);
        });
    }

    fn render_toasts(&mut self, ctx: &egui::Context, actions: &mut Vec<UiAction>) {
        let now = Instant::now();
        let toasts = &mut self.session.toolkit_mut().toasts;
        toasts.prune(now);
        if let Some(next) = toasts.next_expiry(now) {
            ctx.request_repaint_after(next);
        }

        let toasts = self.session.toolkit().toasts.visible();
        if toasts.is_empty() {
            return;
        }
        egui::Area::new(egui::Id::new("toasts"))
            .order(egui::Order::Foreground)
            .anchor(egui::Align2::RIGHT_BOTTOM, [-16.0, -16.0])
            .show(ctx, |ui| {
                for toast in toasts {
                    let color = match toast.kind {
                        ToastKind::Success => self.theme.success,
                        ToastKind::Warning => self.theme.warning,
                        ToastKind::Error => self.theme.danger,
                        ToastKind::Info => self.theme.accent_primary,
                    };
                    let response = self
                        .theme
                        .card_frame()
                        .stroke(egui::Stroke::new(1.0, color))
                        .show(ui, |ui| {
                            ui.label(RichText::new(&toast.message).color(self.theme.text_primary));
                        })
                        .response
                        .interact(egui::Sense::click());
                    if response.clicked() {
                        actions.push(UiAction::DismissToast(toast.id));
                    }
                }
            });
    }
}

impl eframe::App for AttendanceApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events(ctx);
        self.handle_screenshot(ctx);
        self.handle_keyboard(ctx);
        self.refresh_validation(ctx);

        let mut actions = Vec::new();
        self.render_top_bar(ctx, &mut actions);
        self.render_left_panel(ctx, &mut actions);
        self.render_center_panel(ctx, &mut actions);
        self.render_toasts(ctx, &mut actions);

        for action in actions {
            self.apply_action(action, ctx);
        }
        self.flush_clipboard(ctx);
        if self.session.pending_request() {
            ctx.request_repaint_after(Duration::from_millis(250));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::QueryDispatcher;
    use crate::chart::ChartRenderer;
    use crate::toolkit::Toolkit;
    use std::sync::mpsc;

    struct IdleDispatcher;

    impl QueryDispatcher for IdleDispatcher {
        fn dispatch(&self, _request_id: u64, _query: &str) {}
    }

    fn app() -> AttendanceApp {
        let config = AppConfig::default();
        let clipboard = FrameClipboard::default();
        let toolkit = Toolkit::new(
            config.toast_duration(),
            Box::new(clipboard.clone()),
            Box::new(clipboard.clone()),
        );
        let session = ChatSession::new(
            &config,
            Box::new(IdleDispatcher),
            toolkit,
            ChartRenderer::default(),
        );
        let (_tx, rx) = mpsc::channel();
        AttendanceApp::new(
            rx,
            session,
            &config,
            clipboard,
            "http://127.0.0.1:5000/chatbot-query".to_string(),
            Vec::new(),
            None,
        )
    }

    #[test]
    fn export_throttle_is_per_action_and_message() {
        let mut app = app();
        assert!(app.allow_export(ExportAction::Csv, Some(1)));
        assert!(app.allow_export(ExportAction::Csv, Some(2)));
        assert!(app.allow_export(ExportAction::Share, Some(2)));
        assert!(app.allow_export(ExportAction::Transcript, None));

        assert!(!app.allow_export(ExportAction::Csv, Some(1)));
        assert!(app
            .diagnostics_log
            .last()
            .is_some_and(|line| line.contains("ignored repeated Csv request")));
    }
}

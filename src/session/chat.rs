use super::{Attachments, Entry, Message, Role};
use crate::backend::{QueryDispatcher, QueryError};
use crate::chart::surface::ChartHost;
use crate::chart::{options, ChartHandle, ChartKind, ChartRenderer, ImageExport};
use crate::config::{AppConfig, SuggestionConfig};
use crate::export::{self, ExportError};
use crate::format::{format_response, markup};
use crate::format::response::QueryResponse;
use crate::toolkit::{self, ToastKind, Toolkit};
use chrono::Local;
use eframe::egui;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Base of the links `--link` accepts; the query travels in `q`.
pub const QUERY_LINK_BASE: &str = "attendance-assistant://ask";

pub const GENERIC_FAILURE: &str =
    "Sorry, I encountered an error while processing your request. Please try again.";

/// Conversation state and the request/format/render cycle around it.
pub struct ChatSession {
    entries: Vec<Entry>,
    suggestions: Vec<String>,
    last_query_type: Option<String>,
    in_flight: BTreeSet<u64>,
    next_message_id: u64,
    next_request_id: u64,
    welcome_message: String,
    starter_suggestions: Vec<String>,
    suggestion_config: SuggestionConfig,
    dispatcher: Box<dyn QueryDispatcher>,
    toolkit: Toolkit,
    charts: ChartRenderer,
}

impl ChatSession {
    pub fn new(
        config: &AppConfig,
        dispatcher: Box<dyn QueryDispatcher>,
        toolkit: Toolkit,
        charts: ChartRenderer,
    ) -> Self {
        let mut session = Self {
            entries: Vec::new(),
            suggestions: Vec::new(),
            last_query_type: None,
            in_flight: BTreeSet::new(),
            next_message_id: 1,
            next_request_id: 1,
            welcome_message: config.welcome_message.clone(),
            starter_suggestions: config.starter_suggestions.clone(),
            suggestion_config: config.suggestions.clone(),
            dispatcher,
            toolkit,
            charts,
        };
        session.reset();
        session
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Message(message) => Some(message),
            Entry::Typing => None,
        })
    }

    pub fn message(&self, id: u64) -> Option<&Message> {
        self.messages().find(|message| message.id == id)
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn last_query_type(&self) -> Option<&str> {
        self.last_query_type.as_deref()
    }

    pub fn pending_request(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn typing_visible(&self) -> bool {
        self.entries.iter().any(|entry| matches!(entry, Entry::Typing))
    }

    pub fn toolkit(&self) -> &Toolkit {
        &self.toolkit
    }

    pub fn toolkit_mut(&mut self) -> &mut Toolkit {
        &mut self.toolkit
    }

    pub fn charts(&self) -> &ChartRenderer {
        &self.charts
    }

    pub fn charts_mut(&mut self) -> &mut ChartRenderer {
        &mut self.charts
    }

    /// Appends the user's text and sends it. Blank input is ignored.
    pub fn submit_user_text(&mut self, text: &str) -> Option<u64> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let id = self.take_message_id();
        self.entries.push(Entry::Message(Message::user(id, text)));
        Some(self.dispatch_query(text))
    }

    pub fn dispatch_query(&mut self, text: &str) -> u64 {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.in_flight.insert(request_id);
        self.show_typing();
        self.dispatcher.dispatch(request_id, text);
        request_id
    }

    pub fn complete_query(&mut self, request_id: u64, result: Result<Value, QueryError>) {
        if !self.in_flight.remove(&request_id) {
            tracing::debug!(request_id, "ignoring completion for a cleared session");
            return;
        }
        self.hide_typing();

        match result {
            Ok(payload) => self.append_response(request_id, &payload),
            Err(err) => {
                tracing::error!(request_id, "query failed: {err}");
                let id = self.take_message_id();
                self.entries
                    .push(Entry::Message(Message::bot_error(id, GENERIC_FAILURE)));
            }
        }

        if self.pending_request() {
            self.show_typing();
        }
    }

    fn append_response(&mut self, request_id: u64, payload: &Value) {
        let response = QueryResponse::from_value(payload);
        let formatted = format_response(&response, &self.suggestion_config);
        tracing::info!(request_id, response_type = %formatted.kind, "query completed");

        let id = self.take_message_id();
        let mut message = Message::bot(id, formatted.text);
        message.attachments = Attachments {
            table: formatted.table,
            chart: formatted.chart,
        };
        message.export = formatted.export;
        message.share_date = formatted.share_date;

        if let Some(chart) = &message.attachments.chart {
            let mount = message.chart_mount();
            self.charts.host_mut().add_mount(&mount);
            self.charts.build(
                &mount,
                chart.kind,
                chart.data.clone(),
                &[options::title(&chart.title)],
            );
        }

        self.entries.push(Entry::Message(message));
        self.last_query_type = Some(formatted.kind);
        self.suggestions = formatted.suggestions;
    }

    pub fn clear_session(&mut self) {
        self.reset();
        self.toolkit.show_toast("Chat cleared", ToastKind::Info);
    }

    fn reset(&mut self) {
        self.entries.clear();
        self.charts.host_mut().clear();
        self.in_flight.clear();
        self.last_query_type = None;
        let id = self.take_message_id();
        self.entries
            .push(Entry::Message(Message::bot(id, self.welcome_message.clone())));
        self.suggestions = self.starter_suggestions.clone();
    }

    fn take_message_id(&mut self) -> u64 {
        let id = self.next_message_id;
        self.next_message_id += 1;
        id
    }

    fn show_typing(&mut self) {
        if !self.typing_visible() {
            self.entries.push(Entry::Typing);
        }
    }

    fn hide_typing(&mut self) {
        self.entries.retain(|entry| !matches!(entry, Entry::Typing));
    }

    pub fn copy_message(&mut self, id: u64) {
        if let Some(text) = self.message(id).map(|message| markup::plain_text(&message.text)) {
            let _ = self.toolkit.copy_to_clipboard(&text);
        }
    }

    /// Copies a deep link that re-submits this user query on start-up.
    pub fn copy_query_link(&mut self, id: u64) {
        let Some(query) = self
            .message(id)
            .filter(|message| message.role == Role::User)
            .map(|message| message.text.clone())
        else {
            return;
        };
        match toolkit::with_url_param(QUERY_LINK_BASE, "q", &query) {
            Ok(link) => {
                let _ = self.toolkit.copy_to_clipboard(&link);
            }
            Err(err) => tracing::warn!("could not build query link: {err}"),
        }
    }

    pub fn share_message(&mut self, id: u64) {
        let Some(message) = self.message(id) else {
            return;
        };
        let text = export::share_text(message.share_date.as_deref());
        let _ = self.toolkit.copy_to_clipboard(&text);
    }

    pub fn export_message_data(&mut self, id: u64, dir: &Path) -> Option<PathBuf> {
        let result = match self.message(id).and_then(|message| message.export.as_ref()) {
            Some(data) => export::export_csv(dir, data, Local::now().date_naive()),
            None => Err(ExportError::NothingToExport),
        };
        self.report_export(result, "Data exported successfully!")
    }

    pub fn change_chart_type(&mut self, id: u64, kind: ChartKind) -> Option<ChartHandle> {
        let mount = self.message(id)?.chart_mount();
        let handle = self.charts.change_type(&mount, kind)?;
        self.toolkit.show_toast(
            format!("Chart type changed to {}", kind.as_str()),
            ToastKind::Success,
        );
        Some(handle)
    }

    pub fn request_chart_image(&mut self, id: u64) -> Option<ImageExport> {
        let mount = self.message(id)?.chart_mount();
        match self.charts.export_as_image(&mount, None) {
            Ok(export) => Some(export),
            Err(err) => {
                tracing::warn!("chart export unavailable: {err}");
                self.toolkit
                    .show_toast(format!("Export failed: {err}"), ToastKind::Error);
                None
            }
        }
    }

    pub fn finish_chart_image(
        &mut self,
        request: &ImageExport,
        capture: &egui::ColorImage,
        pixels_per_point: f32,
        dir: &Path,
    ) -> Option<PathBuf> {
        let result = export::export_png(dir, &request.filename, capture, request.rect, pixels_per_point);
        self.report_export(result, "Chart exported successfully!")
    }

    pub fn export_transcript(&mut self, dir: &Path) -> Option<PathBuf> {
        let messages: Vec<Message> = self.messages().cloned().collect();
        let result = export::export_transcript(dir, &messages);
        self.report_export(result, "Chat exported successfully!")
    }

    fn report_export(
        &mut self,
        result: Result<PathBuf, ExportError>,
        success: &str,
    ) -> Option<PathBuf> {
        match result {
            Ok(path) => {
                self.toolkit.show_toast(success, ToastKind::Success);
                Some(path)
            }
            Err(err) => {
                tracing::error!("export failed: {err}");
                self.toolkit
                    .show_toast(format!("Export failed: {err}"), ToastKind::Error);
                None
            }
        }
    }

    pub fn history_len(&self) -> usize {
        self.messages().count()
    }

    #[cfg(test)]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages().last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::FrameClipboard;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct RecordingDispatcher {
        sent: Rc<RefCell<Vec<(u64, String)>>>,
    }

    impl QueryDispatcher for RecordingDispatcher {
        fn dispatch(&self, request_id: u64, query: &str) {
            self.sent.borrow_mut().push((request_id, query.to_string()));
        }
    }

    fn session() -> (ChatSession, RecordingDispatcher, FrameClipboard) {
        let dispatcher = RecordingDispatcher::default();
        let clipboard = FrameClipboard::default();
        let toolkit = Toolkit::new(
            Duration::from_millis(3000),
            Box::new(clipboard.clone()),
            Box::new(clipboard.clone()),
        );
        let session = ChatSession::new(
            &AppConfig::default(),
            Box::new(dispatcher.clone()),
            toolkit,
            ChartRenderer::default(),
        );
        (session, dispatcher, clipboard)
    }

    fn role_count(session: &ChatSession, role: Role) -> usize {
        session.messages().filter(|message| message.role == role).count()
    }

    fn typing_count(session: &ChatSession) -> usize {
        session
            .entries()
            .iter()
            .filter(|entry| matches!(entry, Entry::Typing))
            .count()
    }

    fn department() -> Value {
        json!({
            "type": "department_attendance",
            "date": "2024-03-01",
            "summary": {
                "total_students": 40,
                "total_present": 34,
                "overall_percentage": 85.0,
                "classes": [{ "class_name": "CS 2A", "present": 34, "absent": 6, "percentage": 85.0, "total_students": 40 }]
            }
        })
    }

    #[test]
    fn starts_with_welcome_and_starters() {
        let (session, _, _) = session();
        assert_eq!(session.history_len(), 1);
        assert_eq!(session.suggestions(), AppConfig::default().starter_suggestions.as_slice());
        assert!(!session.pending_request());
    }

    #[test]
    fn blank_input_is_ignored() {
        let (mut session, dispatcher, _) = session();
        assert!(session.submit_user_text("   \n").is_none());
        assert_eq!(session.history_len(), 1);
        assert!(dispatcher.sent.borrow().is_empty());
        assert!(!session.typing_visible());
    }

    #[test]
    fn submit_appends_user_message_and_dispatches_literal_text() {
        let (mut session, dispatcher, _) = session();
        let request = session
            .submit_user_text("  Show CS 2A attendance today ")
            .expect("text should dispatch");
        assert_eq!(
            dispatcher.sent.borrow().as_slice(),
            [(request, "Show CS 2A attendance today".to_string())]
        );
        let user = session.last_message().expect("user message should exist");
        assert_eq!(user.role, Role::User);
        assert!(session.pending_request());
        assert!(session.typing_visible());
    }

    #[test]
    fn success_formats_attaches_and_refreshes_suggestions() {
        let (mut session, _, _) = session();
        let request = session.submit_user_text("dept").expect("text should dispatch");
        session.complete_query(request, Ok(department()));

        assert!(!session.typing_visible());
        assert!(!session.pending_request());
        let reply = session.last_message().expect("reply should exist");
        assert_eq!(reply.role, Role::Bot);
        assert!(reply.text.contains("85.0%"));
        assert!(reply.attachments.table.is_some());
        assert!(reply.has_actions());
        assert!(session.charts().host().chart(&reply.chart_mount()).is_some());
        assert_eq!(session.last_query_type(), Some("department_attendance"));
        assert_eq!(
            session.suggestions(),
            SuggestionConfig::default().department_attendance.as_slice()
        );
    }

    #[test]
    fn failure_appends_generic_error() {
        let (mut session, _, _) = session();
        let request = session.submit_user_text("dept").expect("text should dispatch");
        session.complete_query(request, Err(QueryError::Status(500)));

        let reply = session.last_message().expect("reply should exist");
        assert!(reply.is_error);
        assert_eq!(reply.text, GENERIC_FAILURE);
        assert!(!session.typing_visible());
        assert_eq!(session.suggestions(), AppConfig::default().starter_suggestions.as_slice());
    }

    #[test]
    fn overlapping_requests_never_stack_or_leak_placeholders() {
        let (mut session, _, _) = session();
        let first = session.submit_user_text("one").expect("first should dispatch");
        let second = session.submit_user_text("two").expect("second should dispatch");
        assert_eq!(typing_count(&session), 1);

        session.complete_query(second, Ok(json!({ "type": "help" })));
        assert_eq!(typing_count(&session), 1);
        assert!(matches!(session.entries().last(), Some(Entry::Typing)));

        session.complete_query(first, Err(QueryError::Transport("reset".into())));
        assert_eq!(typing_count(&session), 0);
        assert!(!session.pending_request());
        assert_eq!(role_count(&session, Role::Bot), 3);
    }

    #[test]
    fn clear_session_reseeds_and_drops_late_completions() {
        let (mut session, _, _) = session();
        let done = session.submit_user_text("dept").expect("text should dispatch");
        session.complete_query(done, Ok(department()));
        let late = session.submit_user_text("again").expect("text should dispatch");

        session.clear_session();
        assert_eq!(session.history_len(), 1);
        assert_eq!(session.entries().len(), 1);
        assert_eq!(session.suggestions().len(), 6);
        assert_eq!(session.last_query_type(), None);
        assert_eq!(session.charts().host().chart_count(), 0);

        session.complete_query(late, Ok(department()));
        assert_eq!(session.history_len(), 1);
    }

    #[test]
    fn change_chart_type_needs_a_chart() {
        let (mut session, _, _) = session();
        let request = session.submit_user_text("help").expect("text should dispatch");
        session.complete_query(request, Ok(json!({ "type": "help" })));
        let id = session.last_message().expect("reply should exist").id;
        assert!(session.change_chart_type(id, ChartKind::Mixed).is_none());

        let request = session.submit_user_text("dept").expect("text should dispatch");
        session.complete_query(request, Ok(department()));
        let id = session.last_message().expect("reply should exist").id;
        let handle = session
            .change_chart_type(id, ChartKind::Trend)
            .expect("chart should rebuild");
        assert_eq!(handle.kind, ChartKind::Trend);
    }

    #[test]
    fn query_link_round_trips_through_deep_link_param() {
        let (mut session, _, clipboard) = session();
        session.submit_user_text("Show CS 2A attendance today");
        let id = session.last_message().expect("user message should exist").id;
        session.copy_query_link(id);
        let link = clipboard.take().expect("link should be copied");
        assert!(link.starts_with(QUERY_LINK_BASE));
        assert_eq!(
            toolkit::url_param(&link, "q").as_deref(),
            Some("Show CS 2A attendance today")
        );
    }

    #[test]
    fn share_copies_share_text() {
        let (mut session, _, clipboard) = session();
        let request = session.submit_user_text("dept").expect("text should dispatch");
        session.complete_query(request, Ok(department()));
        let id = session.last_message().expect("reply should exist").id;
        session.share_message(id);
        assert_eq!(
            clipboard.take().as_deref(),
            Some("Attendance Data - 2024-03-01\n\nGenerated by Department Attendance Management System")
        );
    }

    #[test]
    fn export_message_data_writes_csv() {
        let (mut session, _, _) = session();
        let request = session.submit_user_text("dept").expect("text should dispatch");
        session.complete_query(request, Ok(department()));
        let id = session.last_message().expect("reply should exist").id;

        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = session
            .export_message_data(id, dir.path())
            .expect("csv should be written");
        let csv = std::fs::read_to_string(path).expect("csv should be readable");
        assert!(csv.starts_with(export::CLASS_HEADER));

        assert!(session.export_message_data(1, dir.path()).is_none());
    }
}

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

const MAX_VISIBLE_TOASTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub kind: ToastKind,
    pub shown_at: Instant,
    pub duration: Duration,
}

impl Toast {
    pub fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.shown_at) >= self.duration
    }
}

#[derive(Debug)]
pub struct ToastQueue {
    toasts: Vec<Toast>,
    next_id: u64,
    default_duration: Duration,
}

impl ToastQueue {
    pub fn new(default_duration: Duration) -> Self {
        Self {
            toasts: Vec::new(),
            next_id: 1,
            default_duration,
        }
    }

    pub fn show(&mut self, message: impl Into<String>, kind: ToastKind, duration: Option<Duration>) {
        self.show_at(message, kind, duration, Instant::now());
    }

    pub fn show_at(
        &mut self,
        message: impl Into<String>,
        kind: ToastKind,
        duration: Option<Duration>,
        now: Instant,
    ) {
        let id = self.next_id;
        self.next_id += 1;
        self.toasts.push(Toast {
            id,
            message: message.into(),
            kind,
            shown_at: now,
            duration: duration.unwrap_or(self.default_duration),
        });
        if self.toasts.len() > MAX_VISIBLE_TOASTS {
            self.toasts.remove(0);
        }
    }

    pub fn prune(&mut self, now: Instant) {
        self.toasts.retain(|toast| !toast.expired(now));
    }

    pub fn dismiss(&mut self, id: u64) {
        self.toasts.retain(|toast| toast.id != id);
    }

    pub fn dismiss_all(&mut self) {
        self.toasts.clear();
    }

    pub fn visible(&self) -> &[Toast] {
        &self.toasts
    }

    /// Time until the next toast expires, for scheduling a repaint.
    pub fn next_expiry(&self, now: Instant) -> Option<Duration> {
        self.toasts
            .iter()
            .map(|toast| (toast.shown_at + toast.duration).saturating_duration_since(now))
            .min()
    }
}

pub trait ClipboardSink {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// The operating-system clipboard.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl ClipboardSink for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        if self.inner.is_none() {
            let clipboard = arboard::Clipboard::new()
                .map_err(|err| ClipboardError::Unavailable(err.to_string()))?;
            self.inner = Some(clipboard);
        }
        let Some(clipboard) = self.inner.as_mut() else {
            return Err(ClipboardError::Unavailable("clipboard not initialised".into()));
        };
        clipboard
            .set_text(text.to_string())
            .map_err(|err| ClipboardError::Unavailable(err.to_string()))
    }
}

/// Hands text to the window, which copies it on the next frame.
#[derive(Clone, Default)]
pub struct FrameClipboard {
    pending: Arc<Mutex<Option<String>>>,
}

impl FrameClipboard {
    pub fn take(&self) -> Option<String> {
        self.pending.lock().ok().and_then(|mut pending| pending.take())
    }
}

impl ClipboardSink for FrameClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|err| ClipboardError::Unavailable(err.to_string()))?;
        *pending = Some(text.to_string());
        Ok(())
    }
}

pub struct Toolkit {
    pub toasts: ToastQueue,
    clipboard: Box<dyn ClipboardSink>,
    fallback: Box<dyn ClipboardSink>,
}

impl Toolkit {
    pub fn new(
        toast_duration: Duration,
        clipboard: Box<dyn ClipboardSink>,
        fallback: Box<dyn ClipboardSink>,
    ) -> Self {
        Self {
            toasts: ToastQueue::new(toast_duration),
            clipboard,
            fallback,
        }
    }

    pub fn show_toast(&mut self, message: impl Into<String>, kind: ToastKind) {
        self.toasts.show(message, kind, None);
    }

    /// Copies through the system clipboard, then the fallback. Only a
    /// fallback failure is surfaced to the user.
    pub fn copy_to_clipboard(&mut self, text: &str) -> Result<(), ClipboardError> {
        let result = match self.clipboard.set_text(text) {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!("system clipboard failed, using fallback: {err}");
                self.fallback.set_text(text)
            }
        };
        match &result {
            Ok(()) => self.show_toast("Copied to clipboard!", ToastKind::Success),
            Err(err) => {
                tracing::error!("clipboard fallback failed: {err}");
                self.show_toast("Failed to copy text", ToastKind::Error);
            }
        }
        result
    }
}

/// Fires once `wait` has passed since the last `touch`.
#[derive(Debug, Clone)]
pub struct Debouncer {
    wait: Duration,
    last_touch: Option<Instant>,
}

impl Debouncer {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            last_touch: None,
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_touch = Some(now);
    }

    pub fn fire(&mut self, now: Instant) -> bool {
        match self.last_touch {
            Some(touched) if now.saturating_duration_since(touched) >= self.wait => {
                self.last_touch = None;
                true
            }
            _ => false,
        }
    }

    pub fn pending(&self) -> bool {
        self.last_touch.is_some()
    }
}

/// Allows at most one call per `limit`.
#[derive(Debug, Clone)]
pub struct Throttle {
    limit: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(limit: Duration) -> Self {
        Self { limit, last: None }
    }

    pub fn try_acquire(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.limit => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// One [`Throttle`] per key; keys never block each other.
#[derive(Debug, Clone)]
pub struct KeyedThrottle<K> {
    limit: Duration,
    throttles: HashMap<K, Throttle>,
}

impl<K: Eq + Hash> KeyedThrottle<K> {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            throttles: HashMap::new(),
        }
    }

    pub fn try_acquire(&mut self, key: K, now: Instant) -> bool {
        let limit = self.limit;
        self.throttles
            .entry(key)
            .or_insert_with(|| Throttle::new(limit))
            .try_acquire(now)
    }
}

/// Groups thousands and keeps up to three fraction digits: `1234567.5` -> `1,234,567.5`.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let rounded = format!("{:.3}", value.abs());
    let (int_part, frac_part) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::new();
    for (index, digit) in int_part.chars().enumerate() {
        if index > 0 && (int_part.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let negative = value < 0.0 && (int_part != "0" || !frac_part.is_empty());
    let sign = if negative { "-" } else { "" };
    if frac_part.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac_part}")
    }
}

pub fn format_percentage(value: f64, decimals: usize) -> String {
    format!("{value:.decimals$}%")
}

pub fn url_param(raw: &str, name: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Sets `name` on the URL, replacing any existing values for it.
pub fn with_url_param(raw: &str, name: &str, value: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse(raw)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != name)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(name, value);
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct FakeSink {
        fail: bool,
        copied: Rc<RefCell<Vec<String>>>,
    }

    impl ClipboardSink for FakeSink {
        fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
            if self.fail {
                return Err(ClipboardError::Unavailable("fake".into()));
            }
            self.copied.borrow_mut().push(text.to_string());
            Ok(())
        }
    }

    fn toolkit(primary_fails: bool, fallback_fails: bool) -> (Toolkit, Rc<RefCell<Vec<String>>>) {
        let copied = Rc::new(RefCell::new(Vec::new()));
        let toolkit = Toolkit::new(
            Duration::from_millis(3000),
            Box::new(FakeSink { fail: primary_fails, copied: Rc::clone(&copied) }),
            Box::new(FakeSink { fail: fallback_fails, copied: Rc::clone(&copied) }),
        );
        (toolkit, copied)
    }

    #[test]
    fn clipboard_falls_back_silently() {
        let (mut toolkit, copied) = toolkit(true, false);
        toolkit.copy_to_clipboard("hello").expect("fallback should copy");
        assert_eq!(copied.borrow().as_slice(), ["hello".to_string()]);
        assert_eq!(toolkit.toasts.visible()[0].kind, ToastKind::Success);
    }

    #[test]
    fn clipboard_reports_only_fallback_failure() {
        let (mut toolkit, _) = toolkit(true, true);
        assert!(toolkit.copy_to_clipboard("hello").is_err());
        let toast = &toolkit.toasts.visible()[0];
        assert_eq!(toast.kind, ToastKind::Error);
        assert_eq!(toast.message, "Failed to copy text");
    }

    #[test]
    fn frame_clipboard_hands_text_over_once() {
        let frame = FrameClipboard::default();
        let mut sink = frame.clone();
        sink.set_text("copied").expect("frame clipboard should accept text");
        assert_eq!(frame.take().as_deref(), Some("copied"));
        assert!(frame.take().is_none());
    }

    #[test]
    fn toasts_expire_and_cap() {
        let start = Instant::now();
        let mut queue = ToastQueue::new(Duration::from_millis(100));
        for index in 0..6 {
            queue.show_at(format!("toast {index}"), ToastKind::Info, None, start);
        }
        assert_eq!(queue.visible().len(), MAX_VISIBLE_TOASTS);
        assert_eq!(queue.visible()[0].message, "toast 2");

        queue.show_at("long", ToastKind::Warning, Some(Duration::from_secs(5)), start);
        queue.prune(start + Duration::from_millis(150));
        assert_eq!(queue.visible().len(), 1);
        assert_eq!(queue.visible()[0].message, "long");
    }

    #[test]
    fn debouncer_waits_for_quiet_period() {
        let start = Instant::now();
        let mut debounce = Debouncer::new(Duration::from_millis(300));
        debounce.touch(start);
        debounce.touch(start + Duration::from_millis(200));
        assert!(!debounce.fire(start + Duration::from_millis(400)));
        assert!(debounce.fire(start + Duration::from_millis(500)));
        assert!(!debounce.fire(start + Duration::from_millis(900)));
    }

    #[test]
    fn throttle_limits_rate() {
        let start = Instant::now();
        let mut throttle = Throttle::new(Duration::from_secs(1));
        assert!(throttle.try_acquire(start));
        assert!(!throttle.try_acquire(start + Duration::from_millis(500)));
        assert!(throttle.try_acquire(start + Duration::from_millis(1000)));
    }

    #[test]
    fn keyed_throttle_only_limits_the_same_key() {
        let start = Instant::now();
        let mut throttle = KeyedThrottle::new(Duration::from_secs(1));
        assert!(throttle.try_acquire(("csv", 1), start));
        assert!(throttle.try_acquire(("csv", 2), start + Duration::from_millis(100)));
        assert!(throttle.try_acquire(("share", 1), start + Duration::from_millis(200)));
        assert!(!throttle.try_acquire(("csv", 1), start + Duration::from_millis(300)));
        assert!(throttle.try_acquire(("csv", 1), start + Duration::from_millis(1000)));
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(1234567.5), "1,234,567.5");
        assert_eq!(format_number(999.0), "999");
        assert_eq!(format_number(-1000.125), "-1,000.125");
        assert_eq!(format_number(0.0001), "0");
        assert_eq!(format_percentage(85.0, 1), "85.0%");
        assert_eq!(format_percentage(85.456, 2), "85.46%");
    }

    #[test]
    fn url_params_round_trip() {
        let link = with_url_param("http://localhost:5000/chatbot?tab=1&q=old", "q", "Show CS 2A")
            .expect("url should parse");
        assert_eq!(url_param(&link, "q").as_deref(), Some("Show CS 2A"));
        assert_eq!(url_param(&link, "tab").as_deref(), Some("1"));
        assert_eq!(url_param("not a url", "q"), None);
    }
}

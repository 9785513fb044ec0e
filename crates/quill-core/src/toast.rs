//! User-facing notifications: severities, durations and the fixed wording of common actions.
//!
//! Presentation is delegated to a [`ToastSink`]; this module only decides what to show.

use crate::{Error, Result};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Error,
    Info,
    Warning,
    Loading,
}

impl Severity {
    /// `None` for loading toasts, which stay until replaced or dismissed.
    pub fn default_duration(self) -> Option<Duration> {
        match self {
            Self::Success => Some(Duration::from_millis(3000)),
            Self::Error => Some(Duration::from_millis(5000)),
            Self::Info | Self::Warning => Some(Duration::from_millis(4000)),
            Self::Loading => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub severity: Severity,
    #[serde(rename = "duration_ms", serialize_with = "serialize_duration_ms")]
    pub duration: Option<Duration>,
}

fn serialize_duration_ms<S: serde::Serializer>(
    value: &Option<Duration>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
        None => serializer.serialize_none(),
    }
}

impl Toast {
    pub fn new(severity: Severity, message: impl Into<String>, description: Option<&str>) -> Self {
        Self {
            message: message.into(),
            description: description.map(str::to_string),
            severity,
            duration: severity.default_duration(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Severity::Success, message, None)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message, None)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message, None)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message, None)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ToastId(pub u64);

/// The presentation callback.
pub trait ToastSink {
    fn show(&self, toast: &Toast) -> ToastId;

    /// Replaces the toast shown under `id` (a loading toast turning into a result).
    fn replace(&self, id: ToastId, toast: &Toast);

    fn dismiss(&self, id: ToastId);
}

/// Shows toasts through a sink, applying the default durations.
#[derive(Debug)]
pub struct Notifier<S> {
    sink: S,
}

impl<S: ToastSink> Notifier<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn show(&self, toast: &Toast) -> ToastId {
        self.sink.show(toast)
    }

    pub fn success(&self, message: &str, description: Option<&str>) -> ToastId {
        self.show(&Toast::new(Severity::Success, message, description))
    }

    pub fn error(&self, message: &str, description: Option<&str>) -> ToastId {
        self.show(&Toast::new(Severity::Error, message, description))
    }

    pub fn info(&self, message: &str, description: Option<&str>) -> ToastId {
        self.show(&Toast::new(Severity::Info, message, description))
    }

    pub fn warning(&self, message: &str, description: Option<&str>) -> ToastId {
        self.show(&Toast::new(Severity::Warning, message, description))
    }

    /// Shows a loading toast and returns a handle that resolves it in place.
    pub fn loading(&self, message: &str) -> LoadingToast<'_, S> {
        let id = self.show(&Toast::new(Severity::Loading, message, None));
        LoadingToast {
            sink: &self.sink,
            id,
        }
    }

    pub fn action(&self, action: &ActionToast) -> ToastId {
        self.show(&action.toast())
    }

    /// Shows `loading` while `task` runs, then resolves that toast with a message built from
    /// the outcome. The outcome is returned unchanged.
    pub async fn promise<T, E>(
        &self,
        task: impl Future<Output = std::result::Result<T, E>>,
        loading: &str,
        success: impl FnOnce(&T) -> String,
        error: impl FnOnce(&E) -> String,
    ) -> std::result::Result<T, E> {
        let pending = self.loading(loading);
        let outcome = task.await;
        match &outcome {
            Ok(value) => pending.success(&success(value)),
            Err(err) => pending.error(&error(err)),
        }
        outcome
    }
}

#[derive(Debug)]
pub struct LoadingToast<'a, S> {
    sink: &'a S,
    id: ToastId,
}

impl<S: ToastSink> LoadingToast<'_, S> {
    pub fn id(&self) -> ToastId {
        self.id
    }

    pub fn dismiss(self) {
        self.sink.dismiss(self.id);
    }

    pub fn success(self, message: &str) {
        self.sink.replace(self.id, &Toast::success(message));
    }

    pub fn error(self, message: &str) {
        self.sink.replace(self.id, &Toast::error(message));
    }
}

/// The semantic events the app reports to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionToast {
    PostDeleted,
    PostDeleteError,
    PostSaved,
    PostUnsaved,
    PostRelayed,
    PostUnrelayed,
    /// Reaction type as stored (`"admire"`, `"snap"`, `"ovation"`).
    ReactionAdded(String),
    ReactionRemoved,
    Followed(String),
    Unfollowed(String),
    FollowRequested(String),
    FollowRequestAccepted,
    FollowRequestDeclined,
    UserBlocked(String),
    UserUnblocked(String),
    BlockError,
    CommentAdded,
    CommentDeleted,
    CommentError,
    ReportSubmitted,
    ReportError,
    NetworkError,
    /// "Failed to {action}" when an action is named.
    GenericError(Option<String>),
    SignedOut,
    SessionExpired,
    /// "{item} copied to clipboard" when an item is named.
    Copied(Option<String>),
    CopyError,
}

const TRY_AGAIN: &str = "Please try again";

fn reaction_past_tense(kind: &str) -> String {
    if kind == "admire" {
        "admired".to_string()
    } else {
        format!("{kind}d")
    }
}

impl ActionToast {
    /// Kebab-case event names accepted by [`ActionToast::from_name`].
    pub const NAMES: &'static [&'static str] = &[
        "post-deleted",
        "post-delete-error",
        "post-saved",
        "post-unsaved",
        "post-relayed",
        "post-unrelayed",
        "reaction-added",
        "reaction-removed",
        "followed",
        "unfollowed",
        "follow-requested",
        "follow-request-accepted",
        "follow-request-declined",
        "user-blocked",
        "user-unblocked",
        "block-error",
        "comment-added",
        "comment-deleted",
        "comment-error",
        "report-submitted",
        "report-error",
        "network-error",
        "generic-error",
        "signed-out",
        "session-expired",
        "copied",
        "copy-error",
    ];

    pub fn toast(&self) -> Toast {
        use ActionToast::*;
        match self {
            PostDeleted => Toast::success("Post deleted"),
            PostDeleteError => Toast::error("Failed to delete post").with_description(TRY_AGAIN),
            PostSaved => Toast::success("Post saved to bookmarks"),
            PostUnsaved => Toast::info("Removed from bookmarks"),
            PostRelayed => Toast::success("Post relayed to your followers"),
            PostUnrelayed => Toast::info("Relay removed"),
            ReactionAdded(kind) => {
                Toast::success(format!("You {} this post", reaction_past_tense(kind)))
            }
            ReactionRemoved => Toast::info("Reaction removed"),
            Followed(user) => Toast::success(format!("Following {user}")),
            Unfollowed(user) => Toast::info(format!("Unfollowed {user}")),
            FollowRequested(user) => Toast::success(format!("Follow request sent to {user}")),
            FollowRequestAccepted => Toast::success("Follow request accepted"),
            FollowRequestDeclined => Toast::info("Follow request declined"),
            UserBlocked(user) => Toast::success(format!("Blocked {user}")),
            UserUnblocked(user) => Toast::info(format!("Unblocked {user}")),
            BlockError => Toast::error("Failed to block user").with_description(TRY_AGAIN),
            CommentAdded => Toast::success("Comment posted"),
            CommentDeleted => Toast::success("Comment deleted"),
            CommentError => Toast::error("Failed to post comment").with_description(TRY_AGAIN),
            ReportSubmitted => {
                Toast::success("Report submitted").with_description("We'll review this shortly")
            }
            ReportError => Toast::error("Failed to submit report").with_description(TRY_AGAIN),
            NetworkError => Toast::error("Connection error")
                .with_description("Please check your internet connection"),
            GenericError(action) => {
                let toast = match action.as_deref().filter(|a| !a.is_empty()) {
                    Some(action) => Toast::error(format!("Failed to {action}")),
                    None => Toast::error("Something went wrong"),
                };
                toast.with_description(TRY_AGAIN)
            }
            SignedOut => Toast::info("Signed out successfully"),
            SessionExpired => {
                Toast::warning("Session expired").with_description("Please sign in again")
            }
            Copied(item) => match item.as_deref().filter(|i| !i.is_empty()) {
                Some(item) => Toast::success(format!("{item} copied to clipboard")),
                None => Toast::success("Copied to clipboard"),
            },
            CopyError => Toast::error("Failed to copy to clipboard"),
        }
    }

    /// Parses a kebab-case event name. Events about a user or reaction need `arg`; generic
    /// errors and copies take it optionally.
    pub fn from_name(name: &str, arg: Option<&str>) -> Result<Self> {
        let required = || {
            arg.map(str::to_string)
                .ok_or_else(|| Error::MissingToastArgument {
                    name: name.to_string(),
                })
        };
        let optional = || arg.map(str::to_string);

        use ActionToast::*;
        Ok(match name {
            "post-deleted" => PostDeleted,
            "post-delete-error" => PostDeleteError,
            "post-saved" => PostSaved,
            "post-unsaved" => PostUnsaved,
            "post-relayed" => PostRelayed,
            "post-unrelayed" => PostUnrelayed,
            "reaction-added" => ReactionAdded(required()?),
            "reaction-removed" => ReactionRemoved,
            "followed" => Followed(required()?),
            "unfollowed" => Unfollowed(required()?),
            "follow-requested" => FollowRequested(required()?),
            "follow-request-accepted" => FollowRequestAccepted,
            "follow-request-declined" => FollowRequestDeclined,
            "user-blocked" => UserBlocked(required()?),
            "user-unblocked" => UserUnblocked(required()?),
            "block-error" => BlockError,
            "comment-added" => CommentAdded,
            "comment-deleted" => CommentDeleted,
            "comment-error" => CommentError,
            "report-submitted" => ReportSubmitted,
            "report-error" => ReportError,
            "network-error" => NetworkError,
            "generic-error" => GenericError(optional()),
            "signed-out" => SignedOut,
            "session-expired" => SessionExpired,
            "copied" => Copied(optional()),
            "copy-error" => CopyError,
            _ => {
                return Err(Error::UnknownToastEvent {
                    name: name.to_string(),
                });
            }
        })
    }
}

/// Keeps every toast in memory, in display order. Replaced toasts are updated in place.
#[derive(Debug, Default)]
pub struct RecordingToastSink {
    next_id: Cell<u64>,
    shown: RefCell<Vec<(ToastId, Toast)>>,
    dismissed: RefCell<Vec<ToastId>>,
}

impl RecordingToastSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.shown.borrow().iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn get(&self, id: ToastId) -> Option<Toast> {
        self.shown
            .borrow()
            .iter()
            .find(|(i, _)| *i == id)
            .map(|(_, t)| t.clone())
    }

    pub fn dismissed(&self) -> Vec<ToastId> {
        self.dismissed.borrow().clone()
    }
}

impl ToastSink for RecordingToastSink {
    fn show(&self, toast: &Toast) -> ToastId {
        let id = ToastId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.shown.borrow_mut().push((id, toast.clone()));
        id
    }

    fn replace(&self, id: ToastId, toast: &Toast) {
        let mut shown = self.shown.borrow_mut();
        match shown.iter_mut().find(|(i, _)| *i == id) {
            Some(slot) => slot.1 = toast.clone(),
            None => shown.push((id, toast.clone())),
        }
    }

    fn dismiss(&self, id: ToastId) {
        self.dismissed.borrow_mut().push(id);
    }
}

/// Emits toasts as `tracing` events: errors at `error`, warnings at `warn`, the rest at `info`.
#[derive(Debug, Default)]
pub struct TracingToastSink {
    next_id: Cell<u64>,
}

impl ToastSink for TracingToastSink {
    fn show(&self, toast: &Toast) -> ToastId {
        let id = ToastId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        log_toast(id, toast);
        id
    }

    fn replace(&self, id: ToastId, toast: &Toast) {
        log_toast(id, toast);
    }

    fn dismiss(&self, id: ToastId) {
        tracing::debug!(id = id.0, "toast dismissed");
    }
}

fn log_toast(id: ToastId, toast: &Toast) {
    let description = toast.description.as_deref().unwrap_or("");
    match toast.severity {
        Severity::Error => tracing::error!(id = id.0, description, "{}", toast.message),
        Severity::Warning => tracing::warn!(id = id.0, description, "{}", toast.message),
        _ => tracing::info!(id = id.0, description, severity = ?toast.severity, "{}", toast.message),
    }
}

//! Embedded Financing Sessions
//!
//! A session is the partner's hosted application rendered in a sandboxed
//! frame. The orchestrator owns the session; the host only displays it.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::gateway::{FinancingLaunch, OrderId};

/// Lifecycle of a financing session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Launching,
    Active,
    Failed,
}

/// A launched (or launching) financing session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancingSession {
    pub order_id: OrderId,
    pub launch_url: Option<String>,
    pub application_id: Option<String>,
    pub purchase_id: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FinancingSession {
    /// Session for an attempt that has not returned yet
    pub fn launching(order_id: OrderId) -> Self {
        let now = Utc::now();
        Self {
            order_id,
            launch_url: None,
            application_id: None,
            purchase_id: None,
            status: SessionStatus::Launching,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn activate(&mut self, launch: FinancingLaunch) {
        self.launch_url = Some(launch.launch_url);
        self.application_id = launch.application_id;
        self.purchase_id = launch.purchase_id;
        self.status = SessionStatus::Active;
        self.touch();
    }

    pub fn fail(&mut self) {
        self.launch_url = None;
        self.status = SessionStatus::Failed;
        self.touch();
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Displays an active session (Strategy pattern)
pub trait EmbeddedSessionHost: Send + Sync {
    /// Show the session's launch URL; replaces anything already shown
    fn open(&self, session: &FinancingSession) -> Result<()>;

    /// Tear down whatever is shown; closing twice is harmless
    fn close(&self);

    fn is_open(&self) -> bool;
}

/// Attributes of the sandboxed frame
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedFrame {
    pub src: String,
    pub title: String,
    pub allow: String,
    pub sandbox: String,
}

impl EmbeddedFrame {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            title: "Financing Application".into(),
            allow: "payment; geolocation".into(),
            sandbox: "allow-same-origin allow-scripts allow-forms allow-popups allow-popups-to-escape-sandbox".into(),
        }
    }

    /// Render as an `<iframe>` element
    pub fn to_html(&self) -> String {
        format!(
            r#"<iframe src="{}" title="{}" allow="{}" sandbox="{}"></iframe>"#,
            escape_attr(&self.src),
            escape_attr(&self.title),
            escape_attr(&self.allow),
            escape_attr(&self.sandbox),
        )
    }
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Host that keeps the frame to render declaratively
#[derive(Default)]
pub struct FrameHost {
    frame: Mutex<Option<EmbeddedFrame>>,
}

impl FrameHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame currently shown, if any
    pub fn frame(&self) -> Option<EmbeddedFrame> {
        self.frame.lock().clone()
    }
}

impl EmbeddedSessionHost for FrameHost {
    fn open(&self, session: &FinancingSession) -> Result<()> {
        let Some(url) = session.launch_url.as_deref().filter(|u| !u.trim().is_empty()) else {
            return Err(crate::error::CheckoutError::InvalidTransition {
                action: "open a session",
                state: "no launch URL is available",
            });
        };

        tracing::debug!(order_id = %session.order_id, "Opening embedded financing frame");
        *self.frame.lock() = Some(EmbeddedFrame::new(url));
        Ok(())
    }

    fn close(&self) {
        if self.frame.lock().take().is_some() {
            tracing::debug!("Closed embedded financing frame");
        }
    }

    fn is_open(&self) -> bool {
        self.frame.lock().is_some()
    }
}

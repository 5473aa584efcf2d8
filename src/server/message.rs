//! Live-reload message protocol.
//!
//! JSON messages pushed over WebSocket to connected browsers:
//!
//! - `reload`: full page reload (markup/script/image changes)
//! - `css`: refresh stylesheets in place, no page reload
//! - `connected`: handshake acknowledgement

use serde::Serialize;

/// Live-reload message sent over WebSocket. One-directional: the browser
/// client consumes these, nothing is parsed back.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReloadMessage {
    /// Full page reload
    Reload {
        /// Asset class that triggered the reload
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Stylesheet refresh (fast path - no page reload)
    Css {
        /// Stylesheet path relative to the output root
        target: String,
    },

    /// Connection established
    Connected {
        /// Server version for compatibility check
        version: String,
    },
}

impl ReloadMessage {
    pub fn reload(reason: impl Into<String>) -> Self {
        Self::Reload {
            reason: Some(reason.into()),
        }
    }

    pub fn css(target: impl Into<String>) -> Self {
        Self::Css {
            target: target.into(),
        }
    }

    pub fn connected() -> Self {
        Self::Connected {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"reload"}"#.to_string())
    }
}

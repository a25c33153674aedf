//! Code-literal encoding for the host → content direction.
//!
//! The host cannot post messages into the content; it can only ask the
//! container to execute code there. Every outbound payload is therefore
//! rendered as a call to the agent's functions with literal arguments.
//! All dynamic values go through [`js_literal`], never raw interpolation.

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::MessageId;

use super::MessageKind;

// ============================================================================
// Constants
// ============================================================================

/// Default agent namespace on `window`.
pub const DEFAULT_NAMESPACE: &str = "__webBridge";

/// Default outward object on `window` exposing `postMessage`.
pub const DEFAULT_OUTWARD_OBJECT: &str = "ReactNativeWebView";

/// Plain JavaScript identifiers only; no dotted paths.
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("identifier pattern is valid")
});

// ============================================================================
// AgentGlobals
// ============================================================================

/// Names of the globals shared by the agent and the injected calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentGlobals {
    /// Property on `window` holding the agent's functions.
    namespace: String,
    /// Property on `window` whose `postMessage` is the outward primitive.
    outward_object: String,
}

impl Default for AgentGlobals {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            outward_object: DEFAULT_OUTWARD_OBJECT.to_string(),
        }
    }
}

impl AgentGlobals {
    /// Creates globals with custom names.
    #[inline]
    #[must_use]
    pub fn new(namespace: impl Into<String>, outward_object: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            outward_object: outward_object.into(),
        }
    }

    /// Returns the agent namespace.
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the outward object name.
    #[inline]
    #[must_use]
    pub fn outward_object(&self) -> &str {
        &self.outward_object
    }

    /// Sets the agent namespace.
    #[inline]
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the outward object name.
    #[inline]
    #[must_use]
    pub fn with_outward_object(mut self, outward_object: impl Into<String>) -> Self {
        self.outward_object = outward_object.into();
        self
    }

    /// Checks that both names are plain JavaScript identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending value.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("namespace", &self.namespace),
            ("outward object", &self.outward_object),
        ] {
            if !IDENTIFIER.is_match(value) {
                return Err(Error::config(format!(
                    "Invalid {field} {value:?}: must be a JavaScript identifier"
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Literal Encoding
// ============================================================================

/// Encodes a value as a JavaScript literal.
///
/// JSON is valid JavaScript except for the raw line/paragraph separators,
/// which are escaped here as well.
///
/// # Errors
///
/// Returns [`Error::Json`] if the value cannot be serialized.
pub fn js_literal<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value)?;
    if !json.contains(['\u{2028}', '\u{2029}']) {
        return Ok(json);
    }
    Ok(json
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029"))
}

// ============================================================================
// Call Builders
// ============================================================================

/// Builds the code that asks the agent to run its handshake.
#[must_use]
pub fn handshake_call(globals: &AgentGlobals) -> String {
    let ns = globals.namespace();
    format!("if (window.{ns}) {{ window.{ns}.handshake(); }}\ntrue;")
}

/// Builds the code that posts a request into the dedicated channel.
///
/// # Errors
///
/// Returns [`Error::Json`] if `data` cannot be serialized.
pub fn send_call(
    globals: &AgentGlobals,
    kind: &MessageKind,
    message_id: &MessageId,
    data: &Value,
) -> Result<String> {
    Ok(format!(
        "window.{}.sendMessage({}, {}, {});\ntrue;",
        globals.namespace(),
        js_literal(kind.as_str())?,
        js_literal(message_id.as_str())?,
        js_literal(data)?,
    ))
}

/// Builds the code that tears down the dedicated channel.
#[must_use]
pub fn teardown_call(globals: &AgentGlobals) -> String {
    let ns = globals.namespace();
    format!("if (window.{ns}) {{ window.{ns}.teardown(); }}\ntrue;")
}

// ============================================================================
// Tests
// ============================================================================

//! Content-side agent script.
//!
//! The agent is injected once per content load. It owns the dedicated
//! channel on the content side and exposes three functions under the
//! configured namespace:
//!
//! | Function | Effect |
//! |----------|--------|
//! | `handshake()` | Creates the channel and hands one end to the page |
//! | `sendMessage(type, messageId, data)` | Posts a request into the channel |
//! | `teardown()` | Closes and forgets the channel |
//!
//! Everything arriving on the host end of the channel is relayed out as a
//! single JSON text message through `window.<outward>.postMessage`.

// ============================================================================
// Imports
// ============================================================================

use crate::protocol::{AgentGlobals, ERROR_CODE_ALREADY_INITIALIZED, ERROR_CODE_NOT_INITIALIZED};

// ============================================================================
// Public Functions
// ============================================================================

/// Renders the agent script for `globals`.
///
/// Names are substituted verbatim, so `globals` must have passed
/// [`AgentGlobals::validate`].
#[must_use]
pub fn build_agent_script(globals: &AgentGlobals) -> String {
    AGENT_TEMPLATE
        .replace("$NAMESPACE", globals.namespace())
        .replace("$OUTWARD", globals.outward_object())
        .replace(
            "$CODE_ALREADY_INITIALIZED",
            &ERROR_CODE_ALREADY_INITIALIZED.to_string(),
        )
        .replace(
            "$CODE_NOT_INITIALIZED",
            &ERROR_CODE_NOT_INITIALIZED.to_string(),
        )
}

// ============================================================================
// Constants
// ============================================================================

/// Agent template.
///
/// Throws when the outward primitive is missing, which aborts the install
/// for that load. A second install in the same load is a no-op.
const AGENT_TEMPLATE: &str = r#"(function() {
  var outward = window.$OUTWARD;
  if (!outward || typeof outward.postMessage !== "function") {
    throw new Error("$OUTWARD not available");
  }
  if (window.$NAMESPACE) {
    return;
  }

  var port = null;

  function emit(type, messageId, data) {
    outward.postMessage(JSON.stringify({
      type: type,
      messageId: messageId || null,
      data: data
    }));
  }

  function emitError(messageId, message, code) {
    emit("error", messageId, { message: message, code: code });
  }

  window.$NAMESPACE = Object.freeze({
    handshake: function() {
      if (port) {
        emitError("handshake", "MessagePort already initialized", $CODE_ALREADY_INITIALIZED);
        return;
      }
      var channel = new MessageChannel();
      port = channel.port1;
      port.onmessage = function(event) {
        var message = event.data || {};
        emit(message.type, message.messageId, message.data);
      };
      port.start();
      window.postMessage({ type: "handshake", messageId: "handshake" }, "*", [channel.port2]);
    },

    sendMessage: function(type, messageId, data) {
      if (!port) {
        emitError(messageId, "MessagePort not initialized", $CODE_NOT_INITIALIZED);
        return;
      }
      port.postMessage({ type: type, messageId: messageId, data: data });
    },

    teardown: function() {
      if (port) {
        port.close();
        port = null;
      }
    }
  });
})();
true;"#;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_script() {
        let script = build_agent_script(&AgentGlobals::default());

        assert!(script.contains("var outward = window.ReactNativeWebView;"));
        assert!(script.contains("if (window.__webBridge) {"));
        assert!(script.contains("window.__webBridge = Object.freeze({"));
        assert!(script.ends_with("true;"));
    }

    #[test]
    fn test_no_placeholders_left() {
        let script = build_agent_script(&AgentGlobals::new("bridge", "host"));
        assert!(!script.contains('$'));
        assert!(script.contains("window.bridge = Object.freeze"));
        assert!(script.contains("window.host;"));
    }

    #[test]
    fn test_reserved_codes_embedded() {
        let script = build_agent_script(&AgentGlobals::default());
        assert!(script.contains(r#""MessagePort already initialized", 4002"#));
        assert!(script.contains(r#""MessagePort not initialized", 4001"#));
    }

    #[test]
    fn test_handshake_tag_matches_protocol() {
        let script = build_agent_script(&AgentGlobals::default());
        assert!(script.contains(r#"{ type: "handshake", messageId: "handshake" }"#));
    }
}

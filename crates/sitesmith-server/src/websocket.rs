//! WebSocket-based live reload.

use serde::Serialize;
use tokio::sync::broadcast;

/// Path of the live reload WebSocket endpoint.
pub const LIVERELOAD_WS_PATH: &str = "/__livereload";

/// Path of the live reload client script.
pub const LIVERELOAD_SCRIPT_PATH: &str = "/__livereload.js";

/// Messages sent to connected browsers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Full page reload
    Reload,

    /// Swap one stylesheet without reloading
    Css {
        /// URL path of the rebuilt stylesheet
        path: String,
    },

    /// Connection established
    Connected,
}

/// Hub for broadcasting reload messages to all connected clients.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    /// Create a new hub.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected clients.
    pub fn send(&self, msg: ReloadMessage) {
        // No receivers just means no browser is open
        let _ = self.sender.send(msg);
    }

    /// Subscribe to reload messages.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Insert the client script tag before `</body>`, or append it.
pub fn inject_script(html: &str, script_path: &str) -> String {
    let tag = format!(r#"<script src="{}"></script>"#, script_path);

    match html.to_ascii_lowercase().rfind("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..pos]);
            out.push_str(&tag);
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{}{}", html, tag),
    }
}

/// Generate the client-side live reload script.
pub fn livereload_client_script(ws_path: &str) -> String {
    format!(
        r#"
(function() {{
  'use strict';

  var protocol = location.protocol === 'https:' ? 'wss://' : 'ws://';
  var ws = new WebSocket(protocol + location.host + '{}');
  var reconnectAttempts = 0;
  var maxReconnectAttempts = 10;

  function swapStylesheet(path) {{
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    var swapped = false;
    links.forEach(function(link) {{
      var url = new URL(link.href, location.href);
      if (url.pathname === path) {{
        url.searchParams.set('livereload', Date.now());
        link.href = url.toString();
        swapped = true;
      }}
    }});
    return swapped;
  }}

  ws.onopen = function() {{
    reconnectAttempts = 0;
  }};

  ws.onmessage = function(event) {{
    var msg = JSON.parse(event.data);

    switch (msg.type) {{
      case 'reload':
        location.reload();
        break;

      case 'css':
        if (!swapStylesheet(msg.path)) {{
          location.reload();
        }}
        break;

      case 'connected':
        console.log('[livereload] connected');
        break;
    }}
  }};

  ws.onclose = function() {{
    if (reconnectAttempts < maxReconnectAttempts) {{
      reconnectAttempts++;
      setTimeout(function() {{
        location.reload();
      }}, 1000 * reconnectAttempts);
    }}
  }};
}})();
"#,
        ws_path
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_broadcasts_messages() {
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();

        hub.send(ReloadMessage::Reload);

        match rx.try_recv() {
            Ok(ReloadMessage::Reload) => {}
            other => panic!("Expected Reload message, got {:?}", other),
        }
    }

    #[test]
    fn send_without_clients_is_ignored() {
        let hub = ReloadHub::new();

        hub.send(ReloadMessage::Reload);
        let mut rx = hub.subscribe();

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn serializes_messages() {
        let msg = ReloadMessage::Css {
            path: "/assets/css/main.css".to_string(),
        };

        let json = serde_json::to_string(&msg).unwrap();

        assert_eq!(json, r#"{"type":"css","path":"/assets/css/main.css"}"#);
        assert_eq!(
            serde_json::to_string(&ReloadMessage::Reload).unwrap(),
            r#"{"type":"reload"}"#
        );
    }

    #[test]
    fn injects_before_closing_body() {
        let html = "<html><body><p>x</p></BODY></html>";

        let injected = inject_script(html, LIVERELOAD_SCRIPT_PATH);

        assert_eq!(
            injected,
            r#"<html><body><p>x</p><script src="/__livereload.js"></script></BODY></html>"#
        );
    }

    #[test]
    fn appends_when_body_is_missing() {
        let injected = inject_script("<p>fragment</p>", "/lr.js");

        assert_eq!(injected, r#"<p>fragment</p><script src="/lr.js"></script>"#);
    }

    #[test]
    fn client_script_uses_endpoint() {
        let script = livereload_client_script(LIVERELOAD_WS_PATH);

        assert!(script.contains("'/__livereload'"));
        assert!(script.contains("swapStylesheet"));
    }
}

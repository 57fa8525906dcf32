//! Content-layer bridge between the hosted page and the shell.
//!
//! The page talks to the shell through `window.ipc.postMessage` with small
//! JSON commands; the shell answers by evaluating `__leonelBridge.dispatch`
//! with a JSON event. Only the commands listed in [`BridgeRequest`] exist.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::WindowError;

/// Command posted by the page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum BridgeRequest {
    /// Hide the overlay.
    Hide,
    /// Ask for the screen-capture authorization string.
    CheckScreenPermission {
        /// Correlation id echoed in the reply.
        id: u64,
    },
    /// Ask for the current frame.
    GetScreenshot {
        /// Correlation id echoed in the reply.
        id: u64,
    },
    /// Start dragging the frameless window.
    StartDrag,
    /// History changed without a full load.
    InPageNavigation,
}

/// Parses one IPC message body.
///
/// # Errors
/// Returns [`WindowError::Bridge`] for malformed or unknown commands.
pub fn parse_request(body: &str) -> Result<BridgeRequest, WindowError> {
    serde_json::from_str(body).map_err(|error| WindowError::Bridge(error.to_string()))
}

/// Event delivered to the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BridgeEvent {
    /// A reveal finished capturing; `image` is `null` when nothing was captured.
    ScreenshotCaptured {
        /// Base64 JPEG.
        image: Option<String>,
    },
    /// Answer to a request carrying `id`.
    Reply {
        /// Correlation id from the request.
        id: u64,
        /// Reply payload.
        value: Value,
    },
}

/// Builds the script that delivers `event` to the page.
pub fn dispatch_script(event: &BridgeEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(json) => Some(format!(
            "window.__leonelBridge && window.__leonelBridge.dispatch({json});"
        )),
        Err(error) => {
            warn!(event = "bridge.encode_failed", %error, "bridge event not encodable");
            None
        }
    }
}

/// Injected before page scripts on every load. Defines `window.leonel` and
/// reports history changes for single-page navigation.
pub const BRIDGE_SCRIPT: &str = r#"(function () {
  if (window.__leonelBridge) return;
  var listeners = [];
  var pending = {};
  var nextId = 1;
  function post(message) {
    if (window.ipc && window.ipc.postMessage) {
      window.ipc.postMessage(JSON.stringify(message));
    }
  }
  function request(cmd) {
    return new Promise(function (resolve) {
      var id = nextId++;
      pending[id] = resolve;
      post({ cmd: cmd, id: id });
    });
  }
  window.__leonelBridge = {
    dispatch: function (event) {
      if (event.type === 'screenshotCaptured') {
        listeners.slice().forEach(function (cb) {
          try { cb(event.image); } catch (e) {}
        });
      } else if (event.type === 'reply' && pending[event.id]) {
        var resolve = pending[event.id];
        delete pending[event.id];
        resolve(event.value);
      }
    },
    startDrag: function () { post({ cmd: 'startDrag' }); }
  };
  window.leonel = Object.freeze({
    hide: function () { post({ cmd: 'hide' }); },
    onScreenshot: function (cb) { if (typeof cb === 'function') listeners.push(cb); },
    removeScreenshotListener: function () { listeners.length = 0; },
    checkScreenPermission: function () { return request('checkScreenPermission'); },
    getScreenshot: function () { return request('getScreenshot'); }
  });
  function notifyNavigation() { post({ cmd: 'inPageNavigation' }); }
  ['pushState', 'replaceState'].forEach(function (name) {
    var original = history[name];
    history[name] = function () {
      var result = original.apply(this, arguments);
      notifyNavigation();
      return result;
    };
  });
  window.addEventListener('popstate', notifyNavigation);
  window.addEventListener('hashchange', notifyNavigation);
})();"#;

/// Drag strip, Escape-to-hide and image drop hint. Safe to run on every load.
pub const PAGE_CHROME_SCRIPT: &str = r#"(function () {
  if (document.getElementById('leonel-quick-drag')) return;
  var bar = document.createElement('div');
  bar.id = 'leonel-quick-drag';
  bar.style.cssText = 'position:fixed;top:0;left:0;right:0;height:24px;z-index:2147483647;cursor:move;background:transparent;';
  bar.addEventListener('mousedown', function (e) {
    if (e.button === 0 && window.__leonelBridge) window.__leonelBridge.startDrag();
  });
  document.documentElement.appendChild(bar);

  document.addEventListener('keydown', function (e) {
    if (e.key === 'Escape' && window.leonel) window.leonel.hide();
  });

  var hint = document.createElement('div');
  hint.id = 'leonel-quick-drop';
  hint.textContent = 'Suelta la imagen aqui';
  hint.style.cssText = 'display:none;position:fixed;inset:0;z-index:2147483646;align-items:center;justify-content:center;background:rgba(0,0,0,0.55);color:#fff;font:600 14px sans-serif;pointer-events:none;';
  document.documentElement.appendChild(hint);
  function hasImage(e) {
    var items = e.dataTransfer && e.dataTransfer.items;
    if (!items) return false;
    for (var i = 0; i < items.length; i++) {
      if (items[i].kind === 'file' && items[i].type.indexOf('image/') === 0) return true;
    }
    return false;
  }
  document.addEventListener('dragover', function (e) {
    if (!hasImage(e)) return;
    e.preventDefault();
    hint.style.display = 'flex';
  });
  document.addEventListener('dragleave', function (e) {
    if (e.relatedTarget === null) hint.style.display = 'none';
  });
  document.addEventListener('drop', function (e) {
    hint.style.display = 'none';
    if (!hasImage(e)) return;
    e.preventDefault();
    var file = e.dataTransfer.files[0];
    var input = document.querySelector('input[type="file"][accept*="image"]') || document.querySelector('input[type="file"]');
    if (!input || !file) return;
    var transfer = new DataTransfer();
    transfer.items.add(file);
    input.files = transfer.files;
    input.dispatchEvent(new Event('change', { bubbles: true }));
  });
})();"#;

//! Server-sent-events framing.
//!
//! Each event becomes exactly one `data: <json>\n\n` frame. The JSON is
//! compact, so a frame never contains a blank line before its terminator.

use crate::core::Event;
use serde_json::json;

/// Content type of a framed event stream.
pub const CONTENT_TYPE: &str = "text/event-stream";

/// Response headers transports should attach to a framed stream.
pub const RESPONSE_HEADERS: [(&str, &str); 3] = [
    ("Cache-Control", "no-cache"),
    ("Connection", "keep-alive"),
    ("X-Accel-Buffering", "no"),
];

/// Frames one event.
#[must_use]
pub fn frame(event: &Event) -> String {
    match serde_json::to_string(event) {
        Ok(body) => format!("data: {body}\n\n"),
        Err(e) => {
            tracing::error!(error = %e, event = %event.label(), "Failed to serialize event");
            let fallback = json!({"type": "error", "data": {"message": e.to_string()}});
            format!("data: {fallback}\n\n")
        }
    }
}

/// Parses one frame back into an event.
///
/// Returns `None` for anything that is not a single well-formed `data:` frame.
#[must_use]
pub fn parse_frame(frame: &str) -> Option<Event> {
    let body = frame.strip_prefix("data: ")?.strip_suffix("\n\n")?;
    serde_json::from_str(body).ok()
}

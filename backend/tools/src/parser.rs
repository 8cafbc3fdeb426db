//! Extracts a single tool directive from a model response.
//!
//! Structured proposals win; otherwise the raw text is sniffed for an
//! embedded `{"tool": ..., "args": {...}}` object. Anything else means
//! "no tool call" and the text is the final answer.

use agentforge_core::{CompletionResponse, ProposedCall, ToolCall};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

#[derive(Deserialize)]
struct TextDirective {
    tool: String,
    args: Map<String, Value>,
}

/// Return at most one tool call. Never fails: malformed input yields `None`.
pub fn parse_tool_call(response: &CompletionResponse) -> Option<ToolCall> {
    if let Some(first) = response.proposed_calls.first() {
        return Some(from_proposed(first));
    }
    parse_text_directive(&response.text)
}

fn from_proposed(call: &ProposedCall) -> ToolCall {
    let arguments = match &call.arguments {
        Value::Object(map) => map.clone(),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            _ => {
                debug!(tool = %call.name, "Proposed call carried unparsable string arguments");
                Map::new()
            }
        },
        Value::Null => Map::new(),
        other => {
            debug!(tool = %call.name, kind = ?other, "Proposed call arguments are not an object");
            Map::new()
        }
    };
    ToolCall::new(call.name.clone(), arguments)
}

/// Parse from the first `{` in `text`. Trailing prose after the object is ignored.
fn parse_text_directive(text: &str) -> Option<ToolCall> {
    let start = text.find('{')?;
    let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<TextDirective>();
    match stream.next() {
        Some(Ok(directive)) => Some(ToolCall::new(directive.tool, directive.args)),
        Some(Err(e)) => {
            debug!(error = %e, "Embedded JSON is not a tool directive");
            None
        }
        None => None,
    }
}

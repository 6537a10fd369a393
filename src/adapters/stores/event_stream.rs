use serde::Deserialize;
use serde_json::{Map, Value};

use crate::core::models::collection::Snapshot;

/// One `text/event-stream` message.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerEvent {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` parser.
///
/// Network chunks can end anywhere, including inside a UTF-8 sequence, so
/// bytes are buffered until a blank line closes a message.
#[derive(Debug, Default)]
pub struct EventStreamParser {
    buffer: Vec<u8>,
}

impl EventStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every message it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ServerEvent> {
        self.buffer
            .extend(chunk.iter().copied().filter(|&b| b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = find_blank_line(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block)) {
                events.push(event);
            }
        }
        events
    }
}

fn find_blank_line(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn parse_block(block: &str) -> Option<ServerEvent> {
    let mut event = String::from("message");
    let mut data: Vec<&str> = Vec::new();
    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = value.to_string(),
            "data" => data.push(value),
            _ => {}
        }
    }
    if data.is_empty() && event == "message" {
        return None;
    }
    Some(ServerEvent {
        event,
        data: data.join("\n"),
    })
}

/// Payload of the database's `put` and `patch` stream events.
#[derive(Debug, Deserialize)]
pub struct PathData {
    pub path: String,
    pub data: Value,
}

/// Apply a `put`: replace whatever lives at `path` (relative to the
/// subscribed collection) with `data`. `null` removes it.
pub fn apply_put(snapshot: &mut Snapshot, path: &str, data: Value) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some((first, rest)) = segments.split_first() else {
        *snapshot = match data {
            Value::Object(map) => map.into_iter().collect(),
            _ => Snapshot::new(),
        };
        return;
    };

    if rest.is_empty() {
        if data.is_null() {
            snapshot.remove(*first);
        } else {
            snapshot.insert(first.to_string(), data);
        }
        return;
    }

    let entry = snapshot
        .entry(first.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    put_nested(entry, rest, data);
    if entry.as_object().is_some_and(Map::is_empty) {
        snapshot.remove(*first);
    }
}

fn put_nested(node: &mut Value, segments: &[&str], data: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = data;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else { return };

    if rest.is_empty() {
        if data.is_null() {
            map.remove(*first);
        } else {
            map.insert(first.to_string(), data);
        }
        return;
    }

    let child = map
        .entry(first.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    put_nested(child, rest, data);
    if child.as_object().is_some_and(Map::is_empty) {
        map.remove(*first);
    }
}

/// Apply a `patch`: every child of `data` is a `put` below `path`.
pub fn apply_patch(snapshot: &mut Snapshot, path: &str, data: Value) {
    let Value::Object(children) = data else {
        return;
    };
    let base = path.trim_end_matches('/');
    for (child, value) in children {
        apply_put(snapshot, &format!("{base}/{child}"), value);
    }
}

use crate::BridgeError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// An inbound JSON control message. Always a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    body: Map<String, Value>,
}

impl Message {
    pub fn from_text(text: &str) -> Result<Self, BridgeError> {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(body)) => Ok(Message { body }),
            Ok(other) => Err(BridgeError::Decode(format!("expected a JSON object, got {}", json_kind(&other)))),
            Err(e) => Err(BridgeError::Decode(e.to_string())),
        }
    }

    /// The `type` discriminator.
    pub fn kind(&self) -> Option<&str> {
        self.body.get("type").and_then(Value::as_str)
    }

    /// Correlation id set by the request helper.
    pub fn id(&self) -> Option<&str> {
        self.body.get("id").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }

    /// Map the message onto the known kinds. Known kinds with a malformed
    /// payload are a decode failure; unknown kinds are passed through.
    pub fn classify(&self) -> Result<EngineMessage, BridgeError> {
        let payload = || Value::Object(self.body.clone());
        let decode = |e: serde_json::Error| BridgeError::Decode(format!("{}: {}", self.kind().unwrap_or_default(), e));
        let kind = match self.kind() {
            Some(kind) => kind,
            None => return Ok(EngineMessage::Unknown { kind: None }),
        };
        Ok(match kind {
            "profiler_threads" => {
                let p: ThreadsPayload = serde_json::from_value(payload()).map_err(decode)?;
                EngineMessage::ProfilerThreads(p.threads)
            }
            "profiler_strings" => {
                let p: StringsPayload = serde_json::from_value(payload()).map_err(decode)?;
                EngineMessage::ProfilerStrings(p.strings)
            }
            "message" => EngineMessage::Log(serde_json::from_value(payload()).map_err(decode)?),
            "compiler" => EngineMessage::Compiler,
            "compile_progress" => EngineMessage::CompileProgress,
            "compiling_files" => EngineMessage::CompilingFiles,
            "is-asset-server-running" => EngineMessage::AssetServerRunning,
            other => EngineMessage::Unknown { kind: Some(other.to_string()) },
        })
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Known inbound message kinds. Kinds whose payload the bridge does not
/// interpret carry no data; read it from the [`Message`] itself.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    ProfilerThreads(Vec<ThreadEntry>),
    /// 16-hex-digit name hash to name.
    ProfilerStrings(HashMap<String, String>),
    Log(LogLine),
    Compiler,
    CompileProgress,
    CompilingFiles,
    AssetServerRunning,
    Unknown { kind: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ThreadEntry {
    /// Hex thread key; engines send it either as a string or a number.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
}

#[derive(Deserialize)]
struct ThreadsPayload {
    threads: Vec<ThreadEntry>,
}

#[derive(Deserialize)]
struct StringsPayload {
    strings: HashMap<String, String>,
}

/// A console log line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogLine {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub message: String,
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Key {
        S(String),
        N(u64),
    }
    Ok(match Key::deserialize(d)? {
        Key::S(s) => s,
        Key::N(n) => n.to_string(),
    })
}

/// Outbound control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Outbound {
    Command { command: String, arg: Vec<String> },
    Script { script: String },
}

impl Outbound {
    /// A console command line such as `profiler pause`: the first word is the
    /// command, the rest are its arguments.
    pub fn command(line: &str) -> Self {
        let mut parts = line.split(' ');
        let command = parts.next().unwrap_or_default().to_string();
        Outbound::Command { command, arg: parts.map(str::to_string).collect() }
    }

    /// Lua source to execute in the engine.
    pub fn script(source: impl Into<String>) -> Self {
        Outbound::Script { script: source.into() }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_value(self).map(|v| v.to_string()).unwrap_or_default()
    }
}

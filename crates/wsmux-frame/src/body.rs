use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FrameError, Result};

/// Verb used to open a subscription.
pub const VERB_SUBSCRIBE: &str = "subscribe";

const DATA_KEY: &str = "data";

/// Body of a REQUEST frame.
///
/// On the wire this is `{ "<action>": "<verb>", "data": {...} }`, with the
/// action key first and `data` omitted when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    /// Topic-action name, e.g. `parameter` or `cqueues`.
    pub action: String,
    /// Usually [`VERB_SUBSCRIBE`].
    pub verb: String,
    /// Topic-specific options.
    pub data: Option<Value>,
}

impl RequestBody {
    /// Build a subscribe request for `action`.
    pub fn subscribe(action: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            action: action.into(),
            verb: VERB_SUBSCRIBE.to_string(),
            data,
        }
    }

    /// Convert into the JSON object placed in the frame.
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(2);
        map.insert(self.action.clone(), Value::String(self.verb.clone()));
        if let Some(data) = &self.data {
            map.insert(DATA_KEY.to_string(), data.clone());
        }
        Value::Object(map)
    }

    /// Parse a request body object. The first non-`data` key is the action.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| FrameError::malformed("request body is not an object"))?;

        let (action, verb) = map
            .iter()
            .find(|(key, _)| key.as_str() != DATA_KEY)
            .ok_or_else(|| FrameError::malformed("request body has no action"))?;
        let verb = verb
            .as_str()
            .ok_or_else(|| FrameError::malformed(format!("action '{action}' has a non-string verb")))?;

        Ok(Self {
            action: action.clone(),
            verb: verb.to_string(),
            data: map.get(DATA_KEY).cloned(),
        })
    }
}

/// Body of a REPLY frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplyBody {
    /// Topic tag of the initial payload, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dt: Option<String>,
    /// Topic-specific initial payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ReplyBody {
    /// A bare acknowledgement without payload.
    pub fn ack() -> Self {
        Self::default()
    }
}

/// Body of an EXCEPTION frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionBody {
    /// Server-declared error kind, e.g. `BadRequest`.
    pub et: String,
    /// Human-readable message.
    #[serde(default)]
    pub msg: String,
}

/// Body of a DATA frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataBody {
    /// Topic tag, e.g. `PARAMETER`.
    pub dt: String,
    /// Topic-specific push payload.
    #[serde(default)]
    pub data: Value,
}

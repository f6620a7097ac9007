//! Subscribable topics and their request options.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use wsmux_frame::RequestBody;

use crate::error::Result;
use crate::payload::NamedObjectId;

/// Options of an alarm subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmSubscriptionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<bool>,
}

/// Options of a processor subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorSubscriptionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_instances: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_processors: Option<bool>,
}

/// Options of a parameter subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSubscriptionRequest {
    pub id: Vec<NamedObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_on_invalid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_on_expiration: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_from_cache: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_numeric_ids: Option<bool>,
    /// Extend an existing server-side subscription instead of creating one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<i64>,
}

impl ParameterSubscriptionRequest {
    /// Subscribe to the given parameters with numeric ids enabled.
    pub fn numeric<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<NamedObjectId>,
    {
        Self {
            id: ids.into_iter().map(Into::into).collect(),
            use_numeric_ids: Some(true),
            ..Self::default()
        }
    }
}

/// A class of push data the server can stream, with its scoping options.
///
/// A topic carries everything needed to issue its subscribe request again,
/// which is what reconnect replay relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    Events,
    Time,
    /// Link status, optionally narrowed to one instance.
    Links { instance: Option<String> },
    StreamEvents { instance: String },
    Alarms(AlarmSubscriptionRequest),
    /// Connected clients, optionally narrowed to one instance.
    Clients { instance: Option<String> },
    ProcessorStatistics { instance: Option<String> },
    /// Tuples of one named stream.
    Stream { stream: String },
    Instances,
    Processors(ProcessorSubscriptionRequest),
    CommandQueues {
        instance: Option<String>,
        processor: Option<String>,
    },
    CommandQueueEvents {
        instance: Option<String>,
        processor: Option<String>,
    },
    Parameters(ParameterSubscriptionRequest),
}

impl Topic {
    /// Request action name for this topic.
    pub fn action(&self) -> &'static str {
        match self {
            Topic::Events => "events",
            Topic::Time => "time",
            Topic::Links { .. } => "links",
            Topic::StreamEvents { .. } => "streams",
            Topic::Alarms(_) => "alarms",
            Topic::Clients { .. } | Topic::ProcessorStatistics { .. } => "management",
            Topic::Stream { .. } => "stream",
            Topic::Instances => "instance",
            Topic::Processors(_) => "processor",
            Topic::CommandQueues { .. } | Topic::CommandQueueEvents { .. } => "cqueues",
            Topic::Parameters(_) => "parameter",
        }
    }

    /// Stable short name, used in logs and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Topic::Events => "events",
            Topic::Time => "time",
            Topic::Links { .. } => "links",
            Topic::StreamEvents { .. } => "stream-events",
            Topic::Alarms(_) => "alarms",
            Topic::Clients { .. } => "clients",
            Topic::ProcessorStatistics { .. } => "statistics",
            Topic::Stream { .. } => "stream",
            Topic::Instances => "instances",
            Topic::Processors(_) => "processors",
            Topic::CommandQueues { .. } => "command-queues",
            Topic::CommandQueueEvents { .. } => "command-queue-events",
            Topic::Parameters(_) => "parameters",
        }
    }

    /// Build the subscribe request for this topic.
    ///
    /// Option structs that serialize to an empty object are sent without
    /// a `data` field.
    pub fn request_body(&self) -> Result<RequestBody> {
        let data = match self {
            Topic::StreamEvents { instance } => Some(serde_json::json!({ "instance": instance })),
            Topic::Stream { stream } => Some(serde_json::json!({ "stream": stream })),
            Topic::Alarms(options) => non_empty(serde_json::to_value(options)?),
            Topic::Processors(options) => non_empty(serde_json::to_value(options)?),
            Topic::Parameters(request) => Some(serde_json::to_value(request)?),
            _ => None,
        };
        Ok(RequestBody::subscribe(self.action(), data))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn non_empty(value: Value) -> Option<Value> {
    match &value {
        Value::Object(map) if map.is_empty() => None,
        _ => Some(value),
    }
}

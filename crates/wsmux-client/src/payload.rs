//! Typed push payloads, decoded from DATA frames by their topic tag.
//!
//! Only the fields the client routes on are typed; everything else the
//! server sends is kept verbatim in each struct's `extra` map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use wsmux_frame::{DataBody, ReplyBody};

use crate::error::{ClientError, Result};
use crate::topic::Topic;

/// Tag of the bootstrap frame sent first on every connection.
pub const CONNECTION_INFO_TAG: &str = "CONNECTION_INFO";

/// Qualified name of a parameter or other mission database object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NamedObjectId {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl From<&str> for NamedObjectId {
    fn from(name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: None,
        }
    }
}

impl From<String> for NamedObjectId {
    fn from(name: String) -> Self {
        Self {
            name,
            namespace: None,
        }
    }
}

impl std::fmt::Display for NamedObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Server-pushed identity of this client: `CONNECTION_INFO`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    #[serde(default)]
    pub client_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<Instance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor: Option<Processor>,
}

/// `INSTANCE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `PROCESSOR_INFO`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Processor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `EVENT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `TIME_INFO`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_time: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `LINK_EVENT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkEvent {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub link_info: LinkInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkInfo {
    pub instance: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `STREAM_EVENT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Any tag ending in `ALARM_DATA`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq_num: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NamedObjectId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `CLIENT_INFO`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `PROCESSING_STATISTICS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yamcs_processor: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `STREAM_DATA`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamData {
    pub stream: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `COMMAND_QUEUE_INFO`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandQueue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor_name: Option<String>,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `COMMAND_QUEUE_EVENT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandQueueEvent {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub data: CommandQueueEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandQueueEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `PARAMETER`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<i64>,
    #[serde(default)]
    pub parameter: Vec<ParameterValue>,
}

/// One sample inside a `PARAMETER` push.
///
/// With numeric ids enabled the server sends only `numericId`; the client
/// restores `id` from the subscription's mapping before delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NamedObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_id: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribedParameter {
    pub id: NamedObjectId,
    pub numeric_id: u32,
}

/// Initial reply of a parameter subscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSubscriptionReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<i64>,
    #[serde(default)]
    pub subscribed: Vec<SubscribedParameter>,
    #[serde(default)]
    pub invalid: Vec<NamedObjectId>,
    /// `numericId → id`, built from `subscribed`.
    #[serde(skip)]
    pub mapping: BTreeMap<u32, NamedObjectId>,
}

impl ParameterSubscriptionReply {
    pub(crate) fn from_value(value: Value) -> serde_json::Result<Self> {
        let mut reply: Self = serde_json::from_value(value)?;
        reply.mapping = reply
            .subscribed
            .iter()
            .map(|p| (p.numeric_id, p.id.clone()))
            .collect();
        Ok(reply)
    }
}

/// Synchronous payload of a successful subscribe reply.
#[derive(Debug, Clone, PartialEq)]
pub enum InitialReply {
    /// Bare acknowledgement.
    Ack,
    /// Current mission time, for [`Topic::Time`].
    Time(TimeInfo),
    /// Current processor, for [`Topic::Processors`].
    Processor(Processor),
    /// Accepted parameters and their numeric-id mapping.
    Parameters(ParameterSubscriptionReply),
}

impl InitialReply {
    pub(crate) fn decode(topic: &Topic, reply: ReplyBody) -> Result<Self> {
        let Some(data) = reply.data.filter(|data| !data.is_null()) else {
            return match topic {
                Topic::Parameters(_) => Err(ClientError::UnexpectedReply {
                    topic: topic.name().to_string(),
                    reason: "reply carries no subscription".to_string(),
                }),
                _ => Ok(InitialReply::Ack),
            };
        };
        Ok(match topic {
            Topic::Time => InitialReply::Time(serde_json::from_value(data)?),
            Topic::Processors(_) => InitialReply::Processor(serde_json::from_value(data)?),
            Topic::Parameters(_) => {
                InitialReply::Parameters(ParameterSubscriptionReply::from_value(data)?)
            }
            _ => InitialReply::Ack,
        })
    }

    /// Payload as JSON, for printing. `None` for a bare acknowledgement.
    pub fn to_json(&self) -> serde_json::Result<Option<Value>> {
        match self {
            InitialReply::Ack => Ok(None),
            InitialReply::Time(v) => serde_json::to_value(v).map(Some),
            InitialReply::Processor(v) => serde_json::to_value(v).map(Some),
            InitialReply::Parameters(v) => serde_json::to_value(v).map(Some),
        }
    }
}

/// A decoded push event. One variant per topic tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TopicEvent {
    Event(Event),
    TimeInfo(TimeInfo),
    ConnectionInfo(ConnectionInfo),
    LinkEvent(LinkEvent),
    StreamEvent(StreamEvent),
    Alarm(Alarm),
    ClientInfo(ClientInfo),
    Statistics(Statistics),
    StreamData(StreamData),
    Instance(Instance),
    Processor(Processor),
    CommandQueue(CommandQueue),
    CommandQueueEvent(CommandQueueEvent),
    /// Subscription id plus samples; delivered to callers with ids restored.
    Parameters(ParameterData),
}

impl TopicEvent {
    /// Decode a DATA body by its tag.
    ///
    /// Returns `Ok(None)` for tags this client does not know; the server
    /// broadcasts some topics regardless of demand.
    pub fn decode(body: DataBody) -> serde_json::Result<Option<Self>> {
        let DataBody { dt, data } = body;
        let event = match dt.as_str() {
            "EVENT" => TopicEvent::Event(serde_json::from_value(data)?),
            "TIME_INFO" => TopicEvent::TimeInfo(serde_json::from_value(data)?),
            CONNECTION_INFO_TAG => TopicEvent::ConnectionInfo(serde_json::from_value(data)?),
            "LINK_EVENT" => TopicEvent::LinkEvent(serde_json::from_value(data)?),
            "STREAM_EVENT" => TopicEvent::StreamEvent(serde_json::from_value(data)?),
            "CLIENT_INFO" => TopicEvent::ClientInfo(serde_json::from_value(data)?),
            "PROCESSING_STATISTICS" => TopicEvent::Statistics(serde_json::from_value(data)?),
            "STREAM_DATA" => TopicEvent::StreamData(serde_json::from_value(data)?),
            "INSTANCE" => TopicEvent::Instance(serde_json::from_value(data)?),
            "PROCESSOR_INFO" => TopicEvent::Processor(serde_json::from_value(data)?),
            "COMMAND_QUEUE_INFO" => TopicEvent::CommandQueue(serde_json::from_value(data)?),
            "COMMAND_QUEUE_EVENT" => TopicEvent::CommandQueueEvent(serde_json::from_value(data)?),
            "PARAMETER" => TopicEvent::Parameters(serde_json::from_value(data)?),
            tag if tag.ends_with("ALARM_DATA") => TopicEvent::Alarm(serde_json::from_value(data)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    /// Short name of the variant, for logs and CLI output.
    pub fn tag(&self) -> &'static str {
        match self {
            TopicEvent::Event(_) => "EVENT",
            TopicEvent::TimeInfo(_) => "TIME_INFO",
            TopicEvent::ConnectionInfo(_) => CONNECTION_INFO_TAG,
            TopicEvent::LinkEvent(_) => "LINK_EVENT",
            TopicEvent::StreamEvent(_) => "STREAM_EVENT",
            TopicEvent::Alarm(_) => "ALARM_DATA",
            TopicEvent::ClientInfo(_) => "CLIENT_INFO",
            TopicEvent::Statistics(_) => "PROCESSING_STATISTICS",
            TopicEvent::StreamData(_) => "STREAM_DATA",
            TopicEvent::Instance(_) => "INSTANCE",
            TopicEvent::Processor(_) => "PROCESSOR_INFO",
            TopicEvent::CommandQueue(_) => "COMMAND_QUEUE_INFO",
            TopicEvent::CommandQueueEvent(_) => "COMMAND_QUEUE_EVENT",
            TopicEvent::Parameters(_) => "PARAMETER",
        }
    }

    /// Payload as JSON, for printing.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        match self {
            TopicEvent::Event(v) => serde_json::to_value(v),
            TopicEvent::TimeInfo(v) => serde_json::to_value(v),
            TopicEvent::ConnectionInfo(v) => serde_json::to_value(v),
            TopicEvent::LinkEvent(v) => serde_json::to_value(v),
            TopicEvent::StreamEvent(v) => serde_json::to_value(v),
            TopicEvent::Alarm(v) => serde_json::to_value(v),
            TopicEvent::ClientInfo(v) => serde_json::to_value(v),
            TopicEvent::Statistics(v) => serde_json::to_value(v),
            TopicEvent::StreamData(v) => serde_json::to_value(v),
            TopicEvent::Instance(v) => serde_json::to_value(v),
            TopicEvent::Processor(v) => serde_json::to_value(v),
            TopicEvent::CommandQueue(v) => serde_json::to_value(v),
            TopicEvent::CommandQueueEvent(v) => serde_json::to_value(v),
            TopicEvent::Parameters(v) => serde_json::to_value(v),
        }
    }
}

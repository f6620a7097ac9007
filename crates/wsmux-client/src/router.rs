//! Delivery of push events to subscription channels.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{ClientError, Result};
use crate::payload::{NamedObjectId, ParameterSubscriptionReply, TopicEvent};
use crate::topic::Topic;
use crate::SubscriptionId;

/// Server-assigned identity a route matches on, refreshed by every
/// successful subscribe or replay reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Binding {
    pub(crate) subscription_id: Option<i64>,
    pub(crate) mapping: BTreeMap<u32, NamedObjectId>,
}

impl From<&ParameterSubscriptionReply> for Binding {
    fn from(reply: &ParameterSubscriptionReply) -> Self {
        Self {
            subscription_id: reply.subscription_id,
            mapping: reply.mapping.clone(),
        }
    }
}

#[derive(Debug)]
struct Route {
    topic: Topic,
    /// `None` while the route waits for its replay reply on a new link.
    binding: Option<Binding>,
    tx: mpsc::UnboundedSender<Result<TopicEvent>>,
    interrupted: Arc<AtomicBool>,
}

/// Routes keyed by subscription handle id.
///
/// Iteration is in id order, so a frame reaches older subscriptions first.
/// Per-subscription order is the arrival order of frames.
#[derive(Debug, Default)]
pub(crate) struct Router {
    routes: BTreeMap<SubscriptionId, Route>,
}

impl Router {
    pub(crate) fn insert(
        &mut self,
        id: SubscriptionId,
        topic: Topic,
        binding: Binding,
        tx: mpsc::UnboundedSender<Result<TopicEvent>>,
        interrupted: Arc<AtomicBool>,
    ) {
        interrupted.store(false, Ordering::Release);
        self.routes.insert(
            id,
            Route {
                topic,
                binding: Some(binding),
                tx,
                interrupted,
            },
        );
    }

    /// Detach a route. Items already queued on its channel stay there.
    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        self.routes.remove(&id).is_some()
    }

    /// Swap in the identity of a replayed request and resume delivery.
    pub(crate) fn rebind(&mut self, id: SubscriptionId, binding: Binding) -> bool {
        match self.routes.get_mut(&id) {
            Some(route) => {
                route.binding = Some(binding);
                route.interrupted.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Terminate one route with an error as its last item.
    pub(crate) fn fail(&mut self, id: SubscriptionId, err: ClientError) {
        if let Some(route) = self.routes.remove(&id) {
            let _ = route.tx.send(Err(err));
        }
    }

    /// Mark every route as paused until its replay succeeds.
    ///
    /// Server-assigned identities belong to the closed link, so bindings are
    /// dropped here and only [`rebind`](Self::rebind) restores them.
    pub(crate) fn interrupt_all(&mut self) {
        for route in self.routes.values_mut() {
            route.interrupted.store(true, Ordering::Release);
            route.binding = None;
        }
    }

    /// Drop every route, ending all subscription streams.
    pub(crate) fn clear(&mut self) {
        self.routes.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.routes.len()
    }

    /// Deliver `event` to every matching route and return how many got it.
    ///
    /// Routes whose handle is gone are removed on the way.
    pub(crate) fn route(&mut self, event: &TopicEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for (id, route) in &self.routes {
            let Some(item) = matches(&route.topic, route.binding.as_ref(), event) else {
                continue;
            };
            if route.tx.send(Ok(item)).is_err() {
                closed.push(*id);
            } else {
                delivered += 1;
            }
        }

        for id in closed {
            debug!(subscription = id, "subscription receiver gone, detaching");
            self.routes.remove(&id);
        }
        if delivered == 0 {
            trace!(tag = event.tag(), "push matched no subscription");
        }
        delivered
    }
}

/// Decide whether `event` belongs to a route and produce the item to deliver.
fn matches(topic: &Topic, binding: Option<&Binding>, event: &TopicEvent) -> Option<TopicEvent> {
    let accepted = match (topic, event) {
        (Topic::Events, TopicEvent::Event(_))
        | (Topic::Time, TopicEvent::TimeInfo(_))
        | (Topic::StreamEvents { .. }, TopicEvent::StreamEvent(_))
        | (Topic::Alarms(_), TopicEvent::Alarm(_))
        | (Topic::Instances, TopicEvent::Instance(_))
        | (Topic::Processors(_), TopicEvent::Processor(_)) => true,
        (Topic::Links { instance }, TopicEvent::LinkEvent(link)) => {
            scoped(instance, Some(&link.link_info.instance))
        }
        (Topic::Clients { instance }, TopicEvent::ClientInfo(client)) => {
            scoped(instance, client.instance.as_ref())
        }
        (Topic::ProcessorStatistics { instance }, TopicEvent::Statistics(stats)) => {
            scoped(instance, stats.instance.as_ref())
        }
        (Topic::Stream { stream }, TopicEvent::StreamData(data)) => *stream == data.stream,
        (Topic::CommandQueues { instance, processor }, TopicEvent::CommandQueue(queue)) => {
            scoped(instance, queue.instance.as_ref())
                && scoped(processor, queue.processor_name.as_ref())
        }
        (Topic::CommandQueueEvents { instance, processor }, TopicEvent::CommandQueueEvent(ev)) => {
            scoped(instance, ev.data.instance.as_ref())
                && scoped(processor, ev.data.processor_name.as_ref())
        }
        (Topic::Parameters(_), TopicEvent::Parameters(data)) => {
            let binding = binding?;
            if data.subscription_id != binding.subscription_id {
                return None;
            }
            let mut data = data.clone();
            for value in &mut data.parameter {
                if value.id.is_none() {
                    value.id = value
                        .numeric_id
                        .and_then(|numeric| binding.mapping.get(&numeric).cloned());
                }
            }
            return Some(TopicEvent::Parameters(data));
        }
        _ => false,
    };
    accepted.then(|| event.clone())
}

/// An unscoped subscription sees everything; a scoped one only equal names.
fn scoped(wanted: &Option<String>, actual: Option<&String>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => actual == Some(wanted),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::payload::{ParameterData, ParameterValue};

    fn event(dt: &str, data: serde_json::Value) -> TopicEvent {
        TopicEvent::decode(wsmux_frame::DataBody {
            dt: dt.to_string(),
            data,
        })
        .unwrap()
        .unwrap()
    }

    fn add(
        router: &mut Router,
        id: SubscriptionId,
        topic: Topic,
        binding: Binding,
    ) -> mpsc::UnboundedReceiver<Result<TopicEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        router.insert(id, topic, binding, tx, Arc::new(AtomicBool::new(false)));
        rx
    }

    #[test]
    fn scoped_links_only_see_their_instance() {
        let mut router = Router::default();
        let mut all = add(&mut router, 1, Topic::Links { instance: None }, Binding::default());
        let mut sim = add(
            &mut router,
            2,
            Topic::Links {
                instance: Some("simulator".into()),
            },
            Binding::default(),
        );
        let mut events = add(&mut router, 3, Topic::Events, Binding::default());

        let other = event(
            "LINK_EVENT",
            json!({ "linkInfo": { "instance": "other", "name": "udp" } }),
        );
        assert_eq!(router.route(&other), 1);
        assert!(all.try_recv().is_ok());
        assert!(sim.try_recv().is_err());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn stream_data_is_matched_by_name() {
        let mut router = Router::default();
        let mut tm = add(
            &mut router,
            1,
            Topic::Stream {
                stream: "tm_realtime".into(),
            },
            Binding::default(),
        );
        router.route(&event("STREAM_DATA", json!({ "stream": "tc_realtime" })));
        router.route(&event("STREAM_DATA", json!({ "stream": "tm_realtime" })));

        let Ok(Ok(TopicEvent::StreamData(data))) = tm.try_recv() else {
            panic!("expected stream data");
        };
        assert_eq!(data.stream, "tm_realtime");
        assert!(tm.try_recv().is_err());
    }

    #[test]
    fn command_queue_events_filter_on_nested_entry() {
        let mut router = Router::default();
        let mut rx = add(
            &mut router,
            1,
            Topic::CommandQueueEvents {
                instance: Some("simulator".into()),
                processor: Some("realtime".into()),
            },
            Binding::default(),
        );

        let wrong_processor = event(
            "COMMAND_QUEUE_EVENT",
            json!({ "type": "COMMAND_ADDED", "data": { "instance": "simulator", "processorName": "replay" } }),
        );
        let right = event(
            "COMMAND_QUEUE_EVENT",
            json!({ "type": "COMMAND_ADDED", "data": { "instance": "simulator", "processorName": "realtime" } }),
        );
        assert_eq!(router.route(&wrong_processor), 0);
        assert_eq!(router.route(&right), 1);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn parameters_match_subscription_id_and_restore_ids() {
        let mut router = Router::default();
        let binding = Binding {
            subscription_id: Some(7),
            mapping: BTreeMap::from([(1, NamedObjectId::from("/a/b"))]),
        };
        let mut mine = add(
            &mut router,
            1,
            Topic::Parameters(Default::default()),
            binding,
        );
        let mut theirs = add(
            &mut router,
            2,
            Topic::Parameters(Default::default()),
            Binding {
                subscription_id: Some(8),
                ..Binding::default()
            },
        );

        let push = event(
            "PARAMETER",
            json!({ "subscriptionId": 7, "parameter": [{ "numericId": 1, "rawValue": 3 }] }),
        );
        assert_eq!(router.route(&push), 1);
        assert!(theirs.try_recv().is_err());

        let Ok(Ok(TopicEvent::Parameters(ParameterData { parameter, .. }))) = mine.try_recv()
        else {
            panic!("expected parameter data");
        };
        let ParameterValue { id, numeric_id, .. } = &parameter[0];
        assert_eq!(id.as_ref(), Some(&NamedObjectId::from("/a/b")));
        assert_eq!(*numeric_id, Some(1));
    }

    #[test]
    fn rebind_switches_subscription_id_and_resumes() {
        let mut router = Router::default();
        let interrupted = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::unbounded_channel();
        router.insert(
            1,
            Topic::Parameters(Default::default()),
            Binding {
                subscription_id: Some(7),
                ..Binding::default()
            },
            tx,
            interrupted.clone(),
        );

        router.interrupt_all();
        assert!(interrupted.load(Ordering::Acquire));
        // Unbound until the replay reply arrives, even for the old id.
        router.route(&event("PARAMETER", json!({ "subscriptionId": 7, "parameter": [] })));
        assert!(rx.try_recv().is_err());

        assert!(router.rebind(
            1,
            Binding {
                subscription_id: Some(9),
                ..Binding::default()
            }
        ));
        assert!(!interrupted.load(Ordering::Acquire));

        router.route(&event("PARAMETER", json!({ "subscriptionId": 7, "parameter": [] })));
        assert!(rx.try_recv().is_err());
        router.route(&event("PARAMETER", json!({ "subscriptionId": 9, "parameter": [] })));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn dropped_receivers_are_detached() {
        let mut router = Router::default();
        let rx = add(&mut router, 1, Topic::Instances, Binding::default());
        drop(rx);
        assert_eq!(router.route(&event("INSTANCE", json!({ "name": "simulator" }))), 0);
        assert_eq!(router.len(), 0);
    }

    #[test]
    fn fail_delivers_error_then_detaches() {
        let mut router = Router::default();
        let mut rx = add(&mut router, 1, Topic::Time, Binding::default());
        router.fail(
            1,
            ClientError::ServerException {
                kind: "BadRequest".into(),
                message: "no".into(),
            },
        );
        assert!(matches!(rx.try_recv(), Ok(Err(ClientError::ServerException { .. }))));
        assert_eq!(router.len(), 0);
    }

    #[test]
    fn interrupted_routes_keep_unbound_topics_flowing() {
        let mut router = Router::default();
        let mut events = add(&mut router, 1, Topic::Events, Binding::default());
        let mut params = add(
            &mut router,
            2,
            Topic::Parameters(Default::default()),
            Binding {
                subscription_id: Some(3),
                ..Binding::default()
            },
        );
        router.interrupt_all();

        assert_eq!(router.route(&event("EVENT", json!({ "message": "up" }))), 1);
        assert_eq!(
            router.route(&event("PARAMETER", json!({ "subscriptionId": 3, "parameter": [] }))),
            0
        );
        assert!(events.try_recv().is_ok());
        assert!(params.try_recv().is_err());
    }
}

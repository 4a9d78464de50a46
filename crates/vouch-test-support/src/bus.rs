//! Broadcast fan-out feeding [`crate::cluster::MemoryCluster`] streams.

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use vouch_events::WatchEvent;

const FANOUT_CAPACITY: usize = 256;

/// Every published event reaches every live subscriber; streams filter for
/// their own kind.
#[derive(Clone)]
pub struct EventFanout {
    sender: broadcast::Sender<WatchEvent>,
}

impl EventFanout {
    /// Fan-out with room for `capacity` unread events per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// New subscriber that sees events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> BroadcastStream<WatchEvent> {
        BroadcastStream::new(self.sender.subscribe())
    }

    /// Deliver `event` to current subscribers.
    pub fn publish(&self, event: WatchEvent) {
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventFanout {
    fn default() -> Self {
        Self::with_capacity(FANOUT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;
    use vouch_events::{Resource, WatchEvent};

    #[tokio::test]
    async fn subscribers_see_events_published_after_subscribing() {
        let fanout = EventFanout::default();
        fanout.publish(WatchEvent::delete(Resource::headless_header("early")));

        let mut stream = fanout.subscribe();
        assert_eq!(fanout.subscriber_count(), 1);
        fanout.publish(WatchEvent::delete(Resource::headless_header("late")));

        let event = stream.next().await.expect("item").expect("not lagged");
        assert_eq!(event.resource.as_ref().map(Resource::name), Some("late"));

        drop(stream);
        assert_eq!(fanout.subscriber_count(), 0);
    }
}

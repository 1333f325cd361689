use ntc_shared::SeatEvent;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Fan-out of seat and schedule events to in-process subscribers such as the
/// availability stream. Publishing never blocks; slow subscribers lag.
#[derive(Clone)]
pub struct EventProducer {
    sender: broadcast::Sender<SeatEvent>,
}

impl EventProducer {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns the number of subscribers that received the event.
    pub fn publish(&self, event: SeatEvent) -> usize {
        let topic = event.topic();
        let bus_id = event.bus_id();
        match self.sender.send(event) {
            Ok(receivers) => {
                info!("Published {} for bus {} to {} subscribers", topic, bus_id, receivers);
                receivers
            }
            Err(_) => {
                debug!("No subscribers for {} on bus {}", topic, bus_id);
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SeatEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventProducer {
    fn default() -> Self {
        Self::new(1024)
    }
}

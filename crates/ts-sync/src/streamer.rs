use ts_collect::{SinkError, TickConsumer, TickSnapshot};

use crate::protocol;
use crate::Outbox;

/// Buffer consumer that forwards each sealed tick to the controller as a
/// `TICK_MSG` frame.  Ticks sealed while no session is attached are dropped.
pub struct TickStreamer {
    outbox:  Outbox,
    sent:    u64,
    dropped: u64,
}

impl TickStreamer {
    pub fn new(outbox: Outbox) -> Self {
        Self { outbox, sent: 0, dropped: 0 }
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl TickConsumer for TickStreamer {
    fn name(&self) -> &str {
        "tick-streamer"
    }

    fn consume(&mut self, snapshot: &TickSnapshot) -> Result<(), SinkError> {
        if self.outbox.send(&protocol::tick_msg(snapshot.to_json())) {
            self.sent += 1;
        } else {
            self.dropped += 1;
        }
        Ok(())
    }
}

//! The driver loop.

use std::time::{Duration, Instant};

use braid_core::{Client, Environment};

use crate::driver::{EventSource, TransportEvent};

/// Upper bound between ticks, so timers scheduled from other threads while
/// the loop is asleep fire with bounded delay.
const MAX_TICK: Duration = Duration::from_millis(100);

/// Drives one [`Client`]: feeds it transport events and fires its timers.
///
/// Engine deadlines are interpreted against the system clock, so the loop
/// is meant for clients on [`braid_core::SystemEnv`]. Tests with a
/// simulated clock drive [`Client::tick`] directly instead.
pub struct Runtime<E: Environment, S: EventSource> {
    client: Client<E>,
    source: S,
}

impl<E: Environment, S: EventSource> Runtime<E, S> {
    /// Creates a runtime around a client and its event source.
    pub fn new(client: Client<E>, source: S) -> Self {
        Self { client, source }
    }

    /// Runs until the event source is exhausted.
    pub async fn run(mut self) {
        loop {
            let wait = self
                .client
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .unwrap_or(MAX_TICK)
                .min(MAX_TICK);

            tokio::select! {
                event = self.source.next_event() => match event {
                    Some(TransportEvent::Opened) => self.client.transport_opened(),
                    Some(TransportEvent::Message(message)) => self.client.transport_message(message),
                    Some(TransportEvent::Closed) => self.client.transport_closed(),
                    None => {
                        tracing::debug!("event source exhausted, runtime stopping");
                        break;
                    }
                },
                () = tokio::time::sleep(wait) => self.client.tick(),
            }
        }
    }
}

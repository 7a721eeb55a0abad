//! Recording in-memory transport.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use braid_core::{Message, Transport, TransportError, TransportFactory};

/// Records every transport the engine creates through the injected factory.
///
/// Tests hold the `SimNet` and inspect the transports the engine produced;
/// inbound traffic is injected by calling the client's adapter surface
/// directly (`transport_opened` / `transport_message` / `transport_closed`).
#[derive(Clone, Default)]
pub struct SimNet {
    transports: Arc<Mutex<Vec<SimTransport>>>,
}

impl SimNet {
    /// Creates an empty net.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The factory to construct the client with.
    #[must_use]
    pub fn factory(&self) -> TransportFactory {
        let net = self.clone();
        Box::new(move |url| {
            let transport = SimTransport::create(url);
            net.lock().push(transport.clone());
            Box::new(transport)
        })
    }

    /// The most recently created transport, if any.
    #[must_use]
    pub fn transport(&self) -> Option<SimTransport> {
        self.lock().last().cloned()
    }

    /// Number of transports created so far.
    #[must_use]
    pub fn transport_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SimTransport>> {
        self.transports.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Default)]
struct Recorded {
    starts: u32,
    stops: u32,
    sent: Vec<Message>,
    fail_sends: bool,
}

/// Handle to one scripted transport instance.
#[derive(Clone)]
pub struct SimTransport {
    url: String,
    recorded: Arc<Mutex<Recorded>>,
}

impl SimTransport {
    fn create(url: &str) -> Self {
        Self { url: url.to_string(), recorded: Arc::new(Mutex::new(Recorded::default())) }
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Url the transport was created for.
    #[must_use]
    pub fn target_url(&self) -> &str {
        &self.url
    }

    /// How many times `start` was called.
    #[must_use]
    pub fn starts(&self) -> u32 {
        self.lock().starts
    }

    /// How many times `stop` was called.
    #[must_use]
    pub fn stops(&self) -> u32 {
        self.lock().stops
    }

    /// Everything the engine submitted, in submission order.
    #[must_use]
    pub fn sent(&self) -> Vec<Message> {
        self.lock().sent.clone()
    }

    /// Drains and returns the recorded messages.
    pub fn take_sent(&self) -> Vec<Message> {
        std::mem::take(&mut self.lock().sent)
    }

    /// Type tags of everything sent, in order.
    #[must_use]
    pub fn sent_kinds(&self) -> Vec<String> {
        self.lock().sent.iter().map(|m| m.kind().to_string()).collect()
    }

    /// When set, subsequent sends fail with [`TransportError::SendFailed`].
    pub fn fail_sends(&self, fail: bool) {
        self.lock().fail_sends = fail;
    }
}

impl Transport for SimTransport {
    fn start(&mut self) {
        self.lock().starts += 1;
    }

    fn stop(&mut self) {
        self.lock().stops += 1;
    }

    fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        let mut recorded = self.lock();
        if recorded.fail_sends {
            return Err(TransportError::SendFailed("scripted failure".into()));
        }
        recorded.sent.push(message.clone());
        Ok(())
    }

    fn url(&self) -> &str {
        &self.url
    }
}

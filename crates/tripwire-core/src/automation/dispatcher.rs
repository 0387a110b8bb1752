//! Event delivery: background queue with inline fallback.
//!
//! The webhook path hands normalized events to a [`Dispatcher`]. When a
//! queue is attached and ready, events go onto a bounded channel consumed by
//! a single dispatcher loop. Otherwise, or when the channel is full, they are
//! processed inline on the caller's task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tripwire_types::event::NormalizedEvent;

use super::engine::AutomationEngine;
use crate::repository::agent::AgentRepository;
use crate::repository::execution::ExecutionRepository;

/// Background queue port.
pub trait EventQueue: Send + Sync {
    /// Whether the queue can accept events right now.
    fn ready(&self) -> bool;

    /// Queue events in order. Events that could not be queued are handed
    /// back so the caller can process them another way.
    fn enqueue(&self, events: Vec<NormalizedEvent>) -> Result<(), Vec<NormalizedEvent>>;
}

/// [`EventQueue`] backed by a bounded tokio channel.
#[derive(Clone)]
pub struct ChannelQueue {
    tx: mpsc::Sender<NormalizedEvent>,
    running: Arc<AtomicBool>,
}

impl EventQueue for ChannelQueue {
    fn ready(&self) -> bool {
        self.running.load(Ordering::Acquire) && self.tx.capacity() > 0
    }

    fn enqueue(&self, events: Vec<NormalizedEvent>) -> Result<(), Vec<NormalizedEvent>> {
        let mut iter = events.into_iter();
        while let Some(event) = iter.next() {
            if !self.running.load(Ordering::Acquire) {
                let mut rest = vec![event];
                rest.extend(iter);
                return Err(rest);
            }
            if let Err(e) = self.tx.try_send(event) {
                let event = match e {
                    mpsc::error::TrySendError::Full(event) => event,
                    mpsc::error::TrySendError::Closed(event) => event,
                };
                let mut rest = vec![event];
                rest.extend(iter);
                return Err(rest);
            }
        }
        Ok(())
    }
}

/// How a batch of events was delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub queued: usize,
    pub inline: usize,
}

pub struct Dispatcher<A: AgentRepository, E: ExecutionRepository> {
    engine: Arc<AutomationEngine<A, E>>,
    queue: Option<Arc<dyn EventQueue>>,
}

impl<A, E> Dispatcher<A, E>
where
    A: AgentRepository + 'static,
    E: ExecutionRepository + 'static,
{
    /// Dispatcher that always processes events on the caller's task.
    pub fn inline(engine: Arc<AutomationEngine<A, E>>) -> Self {
        Self {
            engine,
            queue: None,
        }
    }

    pub fn with_queue(engine: Arc<AutomationEngine<A, E>>, queue: Arc<dyn EventQueue>) -> Self {
        Self {
            engine,
            queue: Some(queue),
        }
    }

    /// Spawn the dispatcher loop and return a dispatcher feeding it.
    ///
    /// Cancelling `cancel` stops intake; events already queued are drained
    /// before the returned task completes.
    pub fn start(
        engine: Arc<AutomationEngine<A, E>>,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let running = Arc::new(AtomicBool::new(true));
        let queue = ChannelQueue {
            tx,
            running: running.clone(),
        };

        let handle = tokio::spawn(run_loop(engine.clone(), rx, running, cancel));
        (Self::with_queue(engine, Arc::new(queue)), handle)
    }

    pub fn engine(&self) -> &Arc<AutomationEngine<A, E>> {
        &self.engine
    }

    /// Deliver events to the engine, preferring the queue.
    pub async fn deliver(&self, events: Vec<NormalizedEvent>) -> Delivery {
        let total = events.len();
        let leftover = match &self.queue {
            Some(queue) if queue.ready() => match queue.enqueue(events) {
                Ok(()) => Vec::new(),
                Err(rest) => {
                    tracing::warn!(count = rest.len(), "queue rejected events, processing inline");
                    rest
                }
            },
            _ => events,
        };

        let inline = leftover.len();
        for event in &leftover {
            self.engine.process_event(event).await;
        }

        Delivery {
            queued: total - inline,
            inline,
        }
    }
}

async fn run_loop<A, E>(
    engine: Arc<AutomationEngine<A, E>>,
    mut rx: mpsc::Receiver<NormalizedEvent>,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
) where
    A: AgentRepository,
    E: ExecutionRepository,
{
    tracing::info!("event dispatcher started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(event) => {
                    engine.process_event(&event).await;
                }
                None => break,
            },
        }
    }

    running.store(false, Ordering::Release);
    rx.close();

    let mut drained = 0usize;
    while let Some(event) = rx.recv().await {
        engine.process_event(&event).await;
        drained += 1;
    }

    tracing::info!(drained, "event dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::collaborator::Collaborators;
    use crate::automation::matcher::TriggerMatcher;
    use crate::automation::registry::AgentRegistry;
    use crate::testing::*;

    async fn engine() -> Arc<AutomationEngine<MemoryAgentRepo, MemoryExecutionRepo>> {
        let registry = Arc::new(AgentRegistry::new(
            MemoryAgentRepo::default(),
            TriggerMatcher::shared(),
        ));
        registry.create(sample_request()).await.unwrap();
        Arc::new(AutomationEngine::new(
            registry,
            MemoryExecutionRepo::default(),
            Collaborators::new(),
        ))
    }

    #[tokio::test]
    async fn inline_dispatcher_processes_immediately() {
        let engine = engine().await;
        let dispatcher = Dispatcher::inline(engine.clone());

        let delivery = dispatcher.deliver(vec![price_event(12)]).await;
        assert_eq!(delivery, Delivery { queued: 0, inline: 1 });
        assert_eq!(engine.tracker().query(None, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn queued_events_drain_on_shutdown() {
        let engine = engine().await;
        let cancel = CancellationToken::new();
        let (dispatcher, handle) = Dispatcher::start(engine.clone(), 8, cancel.clone());

        let delivery = dispatcher
            .deliver(vec![price_event(12), price_event(15), price_event(20)])
            .await;
        assert_eq!(delivery.queued, 3);

        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(engine.tracker().query(None, None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn stopped_queue_falls_back_to_inline() {
        let engine = engine().await;
        let cancel = CancellationToken::new();
        let (dispatcher, handle) = Dispatcher::start(engine.clone(), 8, cancel.clone());
        cancel.cancel();
        handle.await.unwrap();

        let delivery = dispatcher.deliver(vec![price_event(12)]).await;
        assert_eq!(delivery, Delivery { queued: 0, inline: 1 });
        assert_eq!(engine.tracker().query(None, None).await.unwrap().len(), 1);
    }

    #[test]
    fn full_channel_hands_back_remaining_events() {
        let (tx, _rx) = mpsc::channel(1);
        let queue = ChannelQueue {
            tx,
            running: Arc::new(AtomicBool::new(true)),
        };

        let rest = queue
            .enqueue(vec![price_event(1), price_event(2), price_event(3)])
            .unwrap_err();
        assert_eq!(rest.len(), 2);
        assert!(!queue.ready());
    }
}

//! One-to-many broadcast of published values.
//!
//! A [`Publisher`] appends each value to a chain of relay slots addressed by
//! sequence number. Every [`Listener`] keeps only its own position in that
//! chain and walks it independently, so the publisher never waits for a slow
//! listener and no listener can hold up another. A slot is reclaimed once no
//! attached listener is positioned at or before it.

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

/// Position of a value in the published sequence
type Position = u64;

#[derive(Debug)]
struct Chain<T> {
    /// Position of `slots[0]`
    base: Position,
    /// Retained values; `base + slots.len()` is always the next position to
    /// be published
    slots: VecDeque<T>,
    /// Number of attached listeners at each position
    cursors: BTreeMap<Position, usize>,
    closed: bool,
}

impl<T> Chain<T> {
    fn new() -> Self {
        Self {
            base: 0,
            slots: VecDeque::new(),
            cursors: BTreeMap::new(),
            closed: false,
        }
    }

    fn head(&self) -> Position {
        self.base + self.slots.len() as Position
    }

    fn push(&mut self, value: T) {
        if self.cursors.is_empty() {
            // Nobody can ever read this value; just advance the head
            self.base = self.head() + 1;
            self.slots.clear();
        } else {
            self.slots.push_back(value);
        }
    }

    fn get(&self, position: Position) -> Option<&T> {
        let index = position.checked_sub(self.base)?;
        self.slots.get(index as usize)
    }

    fn attach(&mut self) -> Position {
        let position = self.head();
        *self.cursors.entry(position).or_default() += 1;
        position
    }

    fn release(&mut self, position: Position) {
        if let Some(count) = self.cursors.get_mut(&position) {
            *count -= 1;
            if *count == 0 {
                self.cursors.remove(&position);
            }
        }
    }

    fn advance(&mut self, from: Position) -> Position {
        self.release(from);
        *self.cursors.entry(from + 1).or_default() += 1;
        self.reclaim();
        from + 1
    }

    fn detach(&mut self, position: Position) {
        self.release(position);
        self.reclaim();
    }

    /// Drop every slot that no attached listener can still reach
    fn reclaim(&mut self) {
        let oldest = self.cursors.keys().next().copied().unwrap_or(self.head());
        while self.base < oldest && !self.slots.is_empty() {
            self.slots.pop_front();
            self.base += 1;
        }
    }

    fn listeners(&self) -> usize {
        self.cursors.values().sum()
    }
}

#[derive(Debug)]
struct Shared<T> {
    chain: Mutex<Chain<T>>,
    published: Notify,
}

/// Create a new broadcast channel, returning the publishing side and a handle
/// from which any number of listeners can be attached.
pub fn channel<T: Clone>() -> (Publisher<T>, Listen<T>) {
    let shared = Arc::new(Shared {
        chain: Mutex::new(Chain::new()),
        published: Notify::new(),
    });

    (
        Publisher {
            shared: Arc::clone(&shared),
        },
        Listen { shared },
    )
}

/// The sending side of a broadcast channel. Dropping it closes the channel.
#[derive(Debug)]
pub struct Publisher<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Publisher<T> {
    /// Deliver `value` to every currently attached listener. Never waits on
    /// any of them.
    pub fn publish(&self, value: T) {
        {
            let mut chain = self.shared.chain.lock();
            if chain.closed {
                tracing::warn!("Publish on closed broadcast channel");
                return;
            }
            chain.push(value);
        }
        self.shared.published.notify_waiters();
    }

    /// Signal end of stream. Listeners still receive everything published
    /// before this call.
    pub fn close(&self) {
        self.shared.chain.lock().closed = true;
        self.shared.published.notify_waiters();
    }

    /// Number of listeners currently attached
    pub fn listener_count(&self) -> usize {
        self.shared.chain.lock().listeners()
    }

    /// Number of published values still retained for some listener
    pub fn retained(&self) -> usize {
        self.shared.chain.lock().slots.len()
    }
}

impl<T> Drop for Publisher<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Attaches listeners to a broadcast channel
#[derive(Debug)]
pub struct Listen<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Listen<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone> Listen<T> {
    /// Attach a new listener. It observes every value published from now on,
    /// until the publisher closes or `cancel` fires.
    pub fn listen(&self, cancel: CancellationToken) -> Listener<T> {
        let position = self.shared.chain.lock().attach();
        Listener {
            shared: Arc::clone(&self.shared),
            position: Some(position),
            cancel,
        }
    }
}

/// One reader's view of a broadcast channel
#[derive(Debug)]
pub struct Listener<T> {
    shared: Arc<Shared<T>>,
    /// `None` once detached
    position: Option<Position>,
    cancel: CancellationToken,
}

enum Step<T> {
    Ready(T),
    Finished,
    Waiting,
}

impl<T: Clone> Listener<T> {
    fn poll_chain(&mut self) -> Step<T> {
        let Some(position) = self.position else {
            return Step::Finished;
        };

        let mut chain = self.shared.chain.lock();
        if let Some(value) = chain.get(position).cloned() {
            self.position = Some(chain.advance(position));
            Step::Ready(value)
        } else if chain.closed {
            chain.detach(position);
            self.position = None;
            Step::Finished
        } else {
            Step::Waiting
        }
    }

    /// Return the next value if one has already been published
    pub fn try_recv(&mut self) -> Option<T> {
        match self.poll_chain() {
            Step::Ready(value) => Some(value),
            _ => None,
        }
    }

    /// Wait for the next published value. Returns `None` once the channel is
    /// closed and drained, or as soon as the listener is cancelled.
    pub async fn recv(&mut self) -> Option<T> {
        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();

        loop {
            let published = shared.published.notified();
            tokio::pin!(published);
            // Register before looking at the chain so a publish in between
            // can't be missed
            published.as_mut().enable();

            if cancel.is_cancelled() {
                self.detach();
                return None;
            }

            match self.poll_chain() {
                Step::Ready(value) => return Some(value),
                Step::Finished => return None,
                Step::Waiting => (),
            }

            let cancelled = tokio::select! {
                _ = &mut published => false,
                _ = cancel.cancelled() => true,
            };

            if cancelled {
                self.detach();
                return None;
            }
        }
    }

    /// Convert into a stream of values, ending as [`recv`](Self::recv) does
    pub fn into_stream(self) -> impl Stream<Item = T> {
        futures::stream::unfold(self, |mut listener| async move {
            listener.recv().await.map(|value| (value, listener))
        })
    }
}

impl<T> Listener<T> {
    /// Stop listening and release this listener's place in the chain
    pub fn detach(&mut self) {
        if let Some(position) = self.position.take() {
            self.shared.chain.lock().detach(position);
        }
    }

    pub fn is_attached(&self) -> bool {
        self.position.is_some()
    }
}

impl<T> Drop for Listener<T> {
    fn drop(&mut self) {
        self.detach();
    }
}

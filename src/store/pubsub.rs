use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use tokio::sync::mpsc;

/// A broadcast channel: every value passed to [`PubSub::notify`] is delivered
/// to each subscription that is alive at that moment.
pub struct PubSub<T> {
    listeners: Arc<Mutex<Listeners<T>>>,
}

struct Listeners<T> {
    next_id: usize,
    senders: HashMap<usize, mpsc::UnboundedSender<T>>,
}

impl<T> Default for PubSub<T> {
    fn default() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Listeners {
                next_id: 0,
                senders: HashMap::new(),
            })),
        }
    }
}

impl<T: Clone> PubSub<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut listeners = lock(&self.listeners);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.senders.insert(id, sender);
        Subscription {
            id,
            receiver,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn notify(&self, value: T) {
        let mut listeners = lock(&self.listeners);
        listeners
            .senders
            .retain(|_, sender| sender.send(value.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.listeners).senders.len()
    }
}

fn lock<T>(listeners: &Mutex<Listeners<T>>) -> MutexGuard<'_, Listeners<T>> {
    listeners.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Receiving end of a [`PubSub`]. Dropping it unsubscribes.
pub struct Subscription<T> {
    id: usize,
    receiver: mpsc::UnboundedReceiver<T>,
    listeners: Weak<Mutex<Listeners<T>>>,
}

impl<T> Subscription<T> {
    /// Waits for the next notification; `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    pub fn unsubscribe(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).senders.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn delivers_until_unsubscribed() {
        let pub_sub = PubSub::<String>::new();
        let mut subscription = pub_sub.subscribe();

        pub_sub.notify("first".to_string());
        pub_sub.notify("second".to_string());

        assert_eq!(subscription.try_recv(), Some("first".to_string()));
        assert_eq!(subscription.try_recv(), Some("second".to_string()));

        subscription.unsubscribe();
        assert_eq!(pub_sub.subscriber_count(), 0);
        pub_sub.notify("third".to_string());
    }

    #[test]
    fn only_current_subscribers_receive() {
        let pub_sub = PubSub::<u8>::new();
        let mut early = pub_sub.subscribe();
        pub_sub.notify(1);
        let mut late = pub_sub.subscribe();
        pub_sub.notify(2);

        assert_eq!(early.try_recv(), Some(1));
        assert_eq!(early.try_recv(), Some(2));
        assert_eq!(late.try_recv(), Some(2));
        assert_eq!(late.try_recv(), None);
    }

    #[tokio::test]
    async fn wakes_async_receivers() {
        let pub_sub = PubSub::<&'static str>::new();
        let mut subscription = pub_sub.subscribe();
        let waiter = tokio::spawn(async move { subscription.recv().await });
        tokio::task::yield_now().await;
        pub_sub.notify("done");
        assert_eq!(waiter.await.unwrap(), Some("done"));
    }
}

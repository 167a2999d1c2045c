use crate::backend::Subscription;
use crate::models::containers::ContainerRef;
use tracing::{debug, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribing,
    Subscribed,
    Unsubscribing,
}

impl SubscriptionState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SubscriptionState::Unsubscribed => "unsubscribed",
            SubscriptionState::Subscribing => "subscribing",
            SubscriptionState::Subscribed => "subscribed",
            SubscriptionState::Unsubscribing => "unsubscribing",
        }
    }

    fn can_move_to(self, next: SubscriptionState) -> bool {
        use SubscriptionState::*;
        matches!(
            (self, next),
            (Unsubscribed, Subscribing)
                | (Subscribing, Subscribed)
                | (Subscribing, Unsubscribed)
                | (Subscribed, Unsubscribing)
                | (Unsubscribing, Unsubscribed)
        )
    }
}

/// Owns at most one live subscription and tracks its lifecycle
#[derive(Debug)]
pub struct LiveSubscriber {
    state: SubscriptionState,
    container: Option<ContainerRef>,
    subscription: Option<Subscription>,
}

impl Default for LiveSubscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveSubscriber {
    pub const fn new() -> Self {
        Self {
            state: SubscriptionState::Unsubscribed,
            container: None,
            subscription: None,
        }
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn container(&self) -> Option<ContainerRef> {
        self.container
    }

    pub fn is_subscribed(&self) -> bool {
        self.state == SubscriptionState::Subscribed
    }

    fn transition(&mut self, next: SubscriptionState) -> bool {
        if !self.state.can_move_to(next) {
            warn!(
                from = self.state.as_str(),
                to = next.as_str(),
                "Ignoring invalid subscription transition"
            );
            return false;
        }
        debug!(from = self.state.as_str(), to = next.as_str(), "Subscription transition");
        self.state = next;
        true
    }

    /// Marks a subscription to `container` as being opened
    pub fn begin(&mut self, container: ContainerRef) -> bool {
        if !self.transition(SubscriptionState::Subscribing) {
            return false;
        }
        self.container = Some(container);
        true
    }

    /// Hands over the opened subscription. A subscription for any other
    /// container than the one begun is dropped on the spot.
    pub fn established(&mut self, subscription: Subscription) -> bool {
        if self.state != SubscriptionState::Subscribing
            || self.container != Some(subscription.container())
        {
            warn!(
                container = %subscription.container(),
                state = self.state.as_str(),
                "Dropping unexpected subscription"
            );
            return false;
        }
        self.transition(SubscriptionState::Subscribed);
        self.subscription = Some(subscription);
        true
    }

    /// The subscription could not be opened
    pub fn failed(&mut self) {
        if self.transition(SubscriptionState::Unsubscribed) {
            self.container = None;
        }
    }

    /// Closes the current subscription, if any. Dropping it stops delivery.
    pub fn close(&mut self) {
        match self.state {
            SubscriptionState::Unsubscribed => {}
            SubscriptionState::Subscribing => self.failed(),
            SubscriptionState::Subscribed | SubscriptionState::Unsubscribing => {
                if self.state == SubscriptionState::Subscribed {
                    self.transition(SubscriptionState::Unsubscribing);
                }
                self.subscription = None;
                self.transition(SubscriptionState::Unsubscribed);
                self.container = None;
            }
        }
    }

    /// The stream ended on its own
    pub fn ended(&mut self) {
        self.close();
    }

    pub fn active_mut(&mut self) -> Option<&mut Subscription> {
        match self.state {
            SubscriptionState::Subscribed => self.subscription.as_mut(),
            _ => None,
        }
    }
}

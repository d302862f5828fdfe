use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::models::Route;

/// Router collaborator. Accepts intents, reports nothing back.
pub trait NavigationSink: Send + Sync {
    fn navigate(&self, route: Route);
}

impl<T: NavigationSink + ?Sized> NavigationSink for Arc<T> {
    fn navigate(&self, route: Route) {
        (**self).navigate(route)
    }
}

impl<T: NavigationSink + ?Sized> NavigationSink for Box<T> {
    fn navigate(&self, route: Route) {
        (**self).navigate(route)
    }
}

/// Forwards intents over an unbounded channel to whatever runs the router.
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<Route>,
}

impl ChannelNavigator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Route>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NavigationSink for ChannelNavigator {
    fn navigate(&self, route: Route) {
        debug!(path = route.path(), "Navigation intent");
        if self.tx.send(route).is_err() {
            warn!(path = route.path(), "Navigation receiver closed, dropping intent");
        }
    }
}

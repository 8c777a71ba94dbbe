use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use url::Url;

/// Picks the backend a request is sent to.
pub trait Resolver: Send + Sync {
    /// `None` when no backend can take the request right now.
    fn resolve(&self) -> impl Future<Output = Option<Url>> + Send;
}

/// Any `Fn() -> Option<Url>` resolves, which is how fixed or test targets are injected.
impl<F> Resolver for F
where
    F: Fn() -> Option<Url> + Send + Sync,
{
    async fn resolve(&self) -> Option<Url> {
        self()
    }
}

/// Cycles through a static list of backends.
#[derive(Debug, Default)]
pub struct RoundRobin {
    targets: Vec<Url>,
    next: AtomicUsize,
}

impl RoundRobin {
    pub fn new(targets: Vec<Url>) -> Self {
        Self {
            targets,
            next: AtomicUsize::new(0),
        }
    }
}

impl Resolver for RoundRobin {
    async fn resolve(&self) -> Option<Url> {
        if self.targets.is_empty() {
            return None;
        }

        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.targets.len();
        self.targets.get(index).cloned()
    }
}

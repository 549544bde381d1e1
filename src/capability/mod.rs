mod remote;
mod store;

use std::fmt::{Display, Formatter};

pub use remote::RemoteCapability;
pub use store::{FoodStore, StoreError};

#[cfg(test)]
pub(crate) use store::test_support;

/// Outcome of one favorite-food lookup. Faults never escape as errors; they are
/// folded into `Unavailable` so the chat loop can always branch on this set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityResult {
    Found(String),
    NotFound,
    Unavailable(String),
}

impl Display for CapabilityResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Found(food) => write!(f, "found: {food}"),
            Self::NotFound => write!(f, "not found"),
            Self::Unavailable(reason) => write!(f, "unavailable: {reason}"),
        }
    }
}

pub trait CapabilityProvider {
    /// Looks up `subject` exactly once. `subject` is user-controlled text.
    fn resolve(
        &self,
        subject: &str,
    ) -> impl std::future::Future<Output = CapabilityResult> + Send;
}

/// The provider chosen at startup: a direct datastore call or the stdio resource server.
pub enum CapabilityBackend {
    Local(FoodStore),
    Remote(RemoteCapability),
}

impl CapabilityProvider for CapabilityBackend {
    async fn resolve(&self, subject: &str) -> CapabilityResult {
        match self {
            Self::Local(store) => store.resolve(subject).await,
            Self::Remote(remote) => remote.resolve(subject).await,
        }
    }
}

use async_trait::async_trait;
use tracing::debug;

use crate::contract::{DigitalObject, IndexError, SearchIndex};

/// [`SearchIndex`] implementation with no backing index. Deployments with a
/// real search backend wire their own implementation behind the same trait.
#[derive(Debug, Default)]
pub struct NullIndex;

#[async_trait]
impl SearchIndex for NullIndex {
    async fn persist_and_index(&self, object: DigitalObject) -> Result<(), IndexError> {
        debug!(id = object.id, name = %object.name, "No search backend configured, skipping index refresh");
        Ok(())
    }
}

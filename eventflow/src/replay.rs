//! Rebuilding command results from the persisted acknowledgements.
//!
//! Because exactly one acknowledgement is appended per dispatched command,
//! replaying the acknowledgement stream yields the same result per command id
//! that the original waiters observed.

use crate::errors::EventStoreResult;
use crate::event::acknowledgement_stream;
use crate::event_store::EventStore;
use crate::result::OperationResult;
use crate::types::CommandId;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::warn;

/// Reads every acknowledgement in `store` and maps command id to result.
///
/// If a command was acknowledged more than once the first acknowledgement
/// wins and the duplicate is logged.
pub async fn replay_acknowledgements<S: EventStore>(
    store: &S,
) -> EventStoreResult<HashMap<CommandId, OperationResult<()>>> {
    let stored = store.read_stream(&acknowledgement_stream()).await?;
    let mut results = HashMap::with_capacity(stored.len());

    for ack in stored.iter().filter_map(|stored| stored.acknowledgement()) {
        match results.entry(ack.command_id) {
            Entry::Occupied(_) => {
                warn!(
                    command_id = %ack.command_id,
                    "duplicate acknowledgement ignored during replay"
                );
            }
            Entry::Vacant(slot) => {
                slot.insert(ack.operation_result.clone());
            }
        }
    }

    Ok(results)
}

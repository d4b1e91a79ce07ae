//! Status aggregator — live state of every recorded pull request.

use futures::future::join_all;

use patchfleet_core::{HistoryRecord, PrLiveStatus, PrState, PrStatusOutcome, PrStatusResult};

use crate::error::ForgeError;
use crate::forge::Forge;
use crate::history::HistoryStore;

/// Fetch the live state of every record in `store` (optionally only those
/// recorded under `patch`), concurrently. Results follow history order; a
/// failed fetch is reported on its own entry.
pub async fn collect_status(
    forge: &dyn Forge,
    store: &HistoryStore,
    patch: Option<&str>,
) -> Vec<PrStatusResult> {
    let fetches = store
        .records()
        .iter()
        .filter(|record| patch.map_or(true, |p| record.patch == p))
        .map(|record| async move {
            let outcome = match fetch(forge, record).await {
                Ok(live) => PrStatusOutcome::Live(live),
                Err(e) => {
                    tracing::warn!("status for {} failed: {e}", record.key());
                    PrStatusOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            PrStatusResult {
                key: record.key(),
                record: record.clone(),
                outcome,
            }
        });
    join_all(fetches).await
}

async fn fetch(forge: &dyn Forge, record: &HistoryRecord) -> Result<PrLiveStatus, ForgeError> {
    let (pull, reviews) = futures::try_join!(
        forge.get_pull(&record.repo, record.pr_number),
        forge.count_reviews(&record.repo, record.pr_number),
    )?;
    let state = if pull.merged {
        PrState::Merged
    } else if pull.open {
        PrState::Open
    } else {
        PrState::Closed
    };
    Ok(PrLiveStatus {
        state,
        reviews,
        updated_at: pull.updated_at,
        mergeable: if pull.merged { None } else { pull.mergeable },
    })
}

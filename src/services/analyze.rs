//! Request lifecycle for document analysis.
//!
//! Owns the save → analyze → cleanup sequence. The stored document is
//! removed on every exit path, and an analyzer failure never escapes this
//! module: it is logged and replaced by the fallback report. The only error
//! callers see is a persistence failure.

use std::sync::Arc;

use tracing::{info, warn};

use crate::analyst::{fallback_report, DocumentAnalyzer};
use crate::storage::{DocumentStore, StorageError};

/// Run one analysis to completion and clean up the stored document.
pub async fn run_analysis(
    analyzer: &dyn DocumentAnalyzer,
    store: &DocumentStore,
    query: &str,
    payload: &[u8],
) -> Result<String, StorageError> {
    let path = store.save(payload)?;

    let analysis = match analyzer.analyze(query, &path).await {
        Ok(analysis) => analysis,
        Err(e) => {
            warn!("Analysis failed, switching to fallback mode: {}", e);
            fallback_report(query)
        }
    };

    store.remove(&path);
    Ok(analysis)
}

/// Dispatch one analysis as a fire-and-forget background task.
///
/// Returns as soon as the payload is persisted; the result is only
/// observable in the server logs. Tasks are unbounded: every request spawns
/// one, with no queue depth limit and no back-pressure.
pub fn dispatch_analysis(
    analyzer: Arc<dyn DocumentAnalyzer>,
    store: DocumentStore,
    query: String,
    payload: &[u8],
) -> Result<(), StorageError> {
    let path = store.save(payload)?;

    tokio::spawn(async move {
        match analyzer.analyze(&query, &path).await {
            Ok(analysis) => {
                info!("Background analysis complete for {}", path.display());
                info!("Analysis result:\n{}", analysis);
            }
            Err(e) => {
                warn!(
                    "Background analysis failed for {}, switching to fallback mode: {}",
                    path.display(),
                    e
                );
                info!("Fallback result:\n{}", fallback_report(&query));
            }
        }
        store.remove(&path);
    });

    Ok(())
}

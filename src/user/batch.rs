use crate::connection::handle::AdminCommandRunner;
use crate::shared::logging;
use crate::user::model::{Identity, UserSpec};
use crate::user::reconciler::{ReconcileError, UserReconciler};
use futures::future::join_all;
use serde::Serialize;
use std::future::Future;
use std::time::Instant;

pub const MAX_CONCURRENT_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyAction {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    pub identity: Identity,
    pub action: ApplyAction,
}

/// Result for one resource of a batch, tagged with the resource it concerns
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub identity: Identity,
    pub result: Result<ApplyOutcome, ReconcileError>,
}

impl BatchResult {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Drives many resources through the reconciler with bounded concurrency.
///
/// This is the routing layer the reconciler leaves to its caller: `apply`
/// checks existence first and picks `update` or `create` accordingly.
pub struct BatchReconciler<R> {
    reconciler: UserReconciler<R>,
    pub max_concurrent: usize,
}

impl<R: AdminCommandRunner> BatchReconciler<R> {
    pub fn new(reconciler: UserReconciler<R>, max_concurrent: usize) -> Self {
        Self {
            reconciler,
            max_concurrent: max_concurrent.clamp(1, MAX_CONCURRENT_LIMIT),
        }
    }

    pub fn reconciler(&self) -> &UserReconciler<R> {
        &self.reconciler
    }

    /// Converge one resource: update it when present, create it otherwise
    pub async fn apply_one(&self, spec: &UserSpec) -> Result<ApplyOutcome, ReconcileError> {
        if self.reconciler.exists(spec).await? {
            let identity = self.reconciler.update(spec).await?;
            Ok(ApplyOutcome {
                identity,
                action: ApplyAction::Updated,
            })
        } else {
            let identity = self.reconciler.create(spec).await?;
            Ok(ApplyOutcome {
                identity,
                action: ApplyAction::Created,
            })
        }
    }

    pub async fn destroy_one(&self, spec: &UserSpec) -> Result<ApplyOutcome, ReconcileError> {
        self.reconciler.delete(spec).await?;
        Ok(ApplyOutcome {
            identity: spec.identity(),
            action: ApplyAction::Deleted,
        })
    }

    /// Apply every spec; results come back in input order and one failure
    /// does not stop the others.
    pub async fn apply(&self, specs: &[UserSpec]) -> Vec<BatchResult> {
        self.run_chunked("apply", specs, |spec| self.apply_one(spec))
            .await
    }

    pub async fn destroy(&self, specs: &[UserSpec]) -> Vec<BatchResult> {
        self.run_chunked("destroy", specs, |spec| self.destroy_one(spec))
            .await
    }

    async fn run_chunked<'a, F, Fut>(
        &'a self,
        operation: &str,
        specs: &'a [UserSpec],
        run: F,
    ) -> Vec<BatchResult>
    where
        F: Fn(&'a UserSpec) -> Fut,
        Fut: Future<Output = Result<ApplyOutcome, ReconcileError>>,
    {
        let start_time = Instant::now();
        let total_count = specs.len();

        logging::info(&format!(
            "Starting {} for {} users with max {} concurrent operations",
            operation, total_count, self.max_concurrent
        ));

        let chunk_count = total_count.div_ceil(self.max_concurrent);
        let mut all_results = Vec::with_capacity(total_count);

        for (chunk_index, chunk) in specs.chunks(self.max_concurrent).enumerate() {
            logging::debug(&format!(
                "Processing chunk {}/{} with {} users",
                chunk_index + 1,
                chunk_count,
                chunk.len()
            ));

            let futures: Vec<_> = chunk
                .iter()
                .map(|spec| {
                    let pending = run(spec);
                    async move {
                        let identity = spec.identity();
                        let result = pending.await;
                        if let Err(e) = &result {
                            logging::debug(&format!(
                                "Failed to {} {}: {}",
                                operation, identity, e
                            ));
                        }
                        BatchResult { identity, result }
                    }
                })
                .collect();

            all_results.extend(join_all(futures).await);
        }

        let success_count = all_results.iter().filter(|r| r.is_ok()).count();
        logging::info(&format!(
            "{} completed: {}/{} successful in {:?}",
            operation,
            success_count,
            total_count,
            start_time.elapsed()
        ));

        all_results
    }
}

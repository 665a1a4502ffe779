//! Background optimization jobs.
//!
//! Jobs run on the tokio runtime, one task each. Every job owns a
//! [`CancellationToken`]; cancelling it makes outstanding remote solves
//! give up and the affected clusters fall back to heuristic routes.

use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::console;
use crate::depot::Geocoder;
use crate::error::OptimizeError;
use crate::orchestrator::{OptimizationResult, OptimizeRequest, RouteOrchestrator};
use crate::tour_planning::SolverTransport;

/// Object-safe view of an orchestrator, so services and handlers need no generics.
pub trait RoutePlanner: Send + Sync {
    fn plan(
        &self,
        request: OptimizeRequest,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<OptimizationResult, OptimizeError>>;
}

impl<T, G> RoutePlanner for RouteOrchestrator<T, G>
where
    T: SolverTransport,
    G: Geocoder,
{
    fn plan(
        &self,
        request: OptimizeRequest,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<OptimizationResult, OptimizeError>> {
        Box::pin(async move { self.optimize(&request, &cancel).await })
    }
}

/// Status of an optimization job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Optimization in progress.
    Solving,
    /// Routes available (possibly degraded).
    Completed,
    /// Rejected: no vehicles, no routable stops or an invalid shift.
    Failed,
    /// Cancelled before completion.
    Cancelled,
}

impl JobStatus {
    /// Returns the status as a SCREAMING_SNAKE_CASE string for API responses.
    ///
    /// ```
    /// use route_optimizer::service::JobStatus;
    ///
    /// assert_eq!(JobStatus::Solving.as_str(), "SOLVING");
    /// assert_eq!(JobStatus::Cancelled.as_str(), "CANCELLED");
    /// ```
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Solving => "SOLVING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

/// An optimization job with its current state.
pub struct OptimizationJob {
    /// Unique job identifier.
    pub id: String,
    /// Display name from the request.
    pub name: String,
    pub status: JobStatus,
    /// Result once the job completes.
    pub result: Option<OptimizationResult>,
    /// Failure message when the job failed.
    pub error: Option<String>,
    cancel: CancellationToken,
}

impl OptimizationJob {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            status: JobStatus::Solving,
            result: None,
            error: None,
            cancel: CancellationToken::new(),
        }
    }
}

/// Manages optimization jobs.
pub struct OptimizationService {
    planner: Arc<dyn RoutePlanner>,
    jobs: RwLock<HashMap<String, Arc<RwLock<OptimizationJob>>>>,
}

impl OptimizationService {
    pub fn new(planner: Arc<dyn RoutePlanner>) -> Self {
        Self {
            planner,
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a new job. Solving does not start until [`start`](Self::start).
    pub fn create_job(&self, id: String, name: String) -> Arc<RwLock<OptimizationJob>> {
        let job = Arc::new(RwLock::new(OptimizationJob::new(id.clone(), name)));
        self.jobs.write().insert(id, job.clone());
        job
    }

    /// Gets a job by ID.
    pub fn get_job(&self, id: &str) -> Option<Arc<RwLock<OptimizationJob>>> {
        self.jobs.read().get(id).cloned()
    }

    /// Lists all job IDs.
    pub fn list_jobs(&self) -> Vec<String> {
        self.jobs.read().keys().cloned().collect()
    }

    /// Removes a job by ID.
    pub fn remove_job(&self, id: &str) -> Option<Arc<RwLock<OptimizationJob>>> {
        self.jobs.write().remove(id)
    }

    /// Starts optimizing a job in the background.
    pub fn start(&self, job: Arc<RwLock<OptimizationJob>>, request: OptimizeRequest) {
        let planner = self.planner.clone();
        let (job_id, cancel) = {
            let guard = job.read();
            (guard.id.clone(), guard.cancel.clone())
        };

        tokio::spawn(async move {
            console::print_optimization_started(&job_id, request.stops.len(), request.vehicles.len());
            let started = Instant::now();
            let outcome = planner.plan(request, cancel.clone()).await;

            let mut guard = job.write();
            match outcome {
                Ok(result) => {
                    for cluster in &result.clusters {
                        console::print_cluster_outcome(cluster);
                    }
                    console::print_optimization_ended(started.elapsed(), &result);
                    guard.status = if cancel.is_cancelled() {
                        JobStatus::Cancelled
                    } else {
                        JobStatus::Completed
                    };
                    guard.result = Some(result);
                }
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "Optimization failed");
                    guard.status = JobStatus::Failed;
                    guard.error = Some(e.to_string());
                }
            }
            info!(job_id = %job_id, status = guard.status.as_str(), "Job finished");
        });
    }

    /// Cancels a job. Returns false when the job does not exist or already finished.
    pub fn cancel(&self, id: &str) -> bool {
        let Some(job) = self.get_job(id) else {
            return false;
        };
        let mut guard = job.write();
        if guard.status != JobStatus::Solving {
            return false;
        }
        guard.cancel.cancel();
        guard.status = JobStatus::Cancelled;
        info!(job_id = %id, "Job cancelled");
        true
    }

    /// Optimizes in the caller's task, without registering a job.
    pub async fn optimize_now(&self, request: OptimizeRequest) -> Result<OptimizationResult, OptimizeError> {
        let started = Instant::now();
        let result = self.planner.plan(request, CancellationToken::new()).await?;
        console::print_optimization_ended(started.elapsed(), &result);
        Ok(result)
    }
}

//! Remote tour-planning client.
//!
//! Submits a [`ProblemDocument`] to the solver service and waits for the
//! answer. The service either replies with a solution straight away or
//! accepts the problem and hands back an id, which is then polled at a
//! fixed interval until the solution is ready, the solve fails, the
//! timeout elapses or the caller cancels.
//!
//! HTTP lives behind [`SolverTransport`] so the polling and extraction
//! logic can be driven by an in-memory transport in tests.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::Credentials;
use crate::domain::{distance_km, Coord, Solution, Tour, UnassignedJob, UnassignedReason};
use crate::error::SolverError;
use crate::problem::ProblemDocument;

/// Default service base URL.
pub const DEFAULT_BASE_URL: &str = "https://tourplanning.hereapi.com/v3";

/// Default delay between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Solution stops further than this from the submitted place are logged.
const DRIFT_WARN_KM: f64 = 0.05;

/// Activity ids that mark the depot rather than a job.
const NON_JOB_ACTIVITIES: [&str; 4] = ["departure", "arrival", "break", "reload"];

/// Raw response from the solver service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    /// `Location` header, if any.
    pub location: Option<String>,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            location: None,
            body: body.into(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Wire access to the solver service.
pub trait SolverTransport: Send + Sync {
    /// Creates a problem (`POST /problems`).
    fn submit(&self, problem: &ProblemDocument) -> impl Future<Output = Result<TransportResponse, SolverError>> + Send;

    /// Reads problem status (`GET /problems/{id}`).
    fn fetch_status(&self, problem_id: &str) -> impl Future<Output = Result<TransportResponse, SolverError>> + Send;

    /// Reads the finished solution (`GET /problems/{id}/solution`).
    fn fetch_solution(&self, problem_id: &str) -> impl Future<Output = Result<TransportResponse, SolverError>> + Send;
}

/// [`SolverTransport`] over HTTP with reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Client with the timeouts used for solver calls.
    pub fn default_client() -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("route-optimizer/", env!("CARGO_PKG_VERSION")))
            .build()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    async fn read(response: reqwest::Response) -> Result<TransportResponse, SolverError> {
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;
        Ok(TransportResponse { status, location, body })
    }

    async fn get(&self, url: String) -> Result<TransportResponse, SolverError> {
        let request = self.credentials.apply(self.client.get(url)).await?;
        Self::read(request.send().await?).await
    }
}

impl SolverTransport for HttpTransport {
    async fn submit(&self, problem: &ProblemDocument) -> Result<TransportResponse, SolverError> {
        let url = format!("{}/problems", self.base_url);
        let request = self.credentials.apply(self.client.post(url)).await?;
        Self::read(request.json(problem).send().await?).await
    }

    async fn fetch_status(&self, problem_id: &str) -> Result<TransportResponse, SolverError> {
        self.get(format!("{}/problems/{}", self.base_url, problem_id)).await
    }

    async fn fetch_solution(&self, problem_id: &str) -> Result<TransportResponse, SolverError> {
        self.get(format!("{}/problems/{}/solution", self.base_url, problem_id)).await
    }
}

// ============================================================================
// Solution wire format
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSolution {
    #[serde(default)]
    tours: Vec<WireTour>,
    #[serde(default)]
    unassigned: Vec<WireUnassigned>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTour {
    vehicle_id: String,
    type_id: Option<String>,
    #[serde(default)]
    stops: Vec<WireStop>,
    statistic: Option<WireStatistic>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireStop {
    #[serde(rename = "type")]
    kind: Option<String>,
    location: Option<Coord>,
    #[serde(default)]
    activities: Vec<WireActivity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireActivity {
    job_id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    location: Option<Coord>,
}

#[derive(Debug, Deserialize)]
struct WireStatistic {
    /// Meters.
    distance: Option<f64>,
    /// Seconds.
    duration: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUnassigned {
    job_id: String,
    #[serde(default)]
    reasons: Vec<UnassignedReason>,
}

/// Vehicle type id for a concrete solver vehicle id (`{type}_{n}` → `{type}`).
///
/// ```
/// use route_optimizer::tour_planning::vehicle_type_id;
///
/// assert_eq!(vehicle_type_id("driver-3_1", None), "driver-3");
/// assert_eq!(vehicle_type_id("driver_a_2", None), "driver_a");
/// assert_eq!(vehicle_type_id("van", None), "van");
/// assert_eq!(vehicle_type_id("x_1", Some("truck_7")), "truck_7");
/// ```
pub fn vehicle_type_id(vehicle_id: &str, type_id: Option<&str>) -> String {
    if let Some(type_id) = type_id.filter(|t| !t.is_empty()) {
        return type_id.to_string();
    }
    match vehicle_id.rsplit_once('_') {
        Some((base, n)) if !base.is_empty() && !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => {
            base.to_string()
        }
        _ => vehicle_id.to_string(),
    }
}

/// Problem id from the body (`id`, `problemId`, `statusId`) or a `Location` header.
fn problem_id(body: &Value, location: Option<&str>) -> Option<String> {
    for key in ["id", "problemId", "statusId"] {
        if let Some(id) = body.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()) {
            return Some(id.to_string());
        }
    }
    let location = location?;
    let start = location.find("/problems/")? + "/problems/".len();
    let id: String = location[start..]
        .chars()
        .take_while(|c| !matches!(c, '/' | '?' | '#'))
        .collect();
    (!id.is_empty()).then_some(id)
}

fn looks_like_solution(body: &Value) -> bool {
    body.get("tours").is_some_and(Value::is_array)
        || body.get("unassigned").is_some_and(Value::is_array)
        || body.get("statistic").is_some_and(|s| !s.is_null())
}

fn parse_body(response: &TransportResponse) -> Value {
    if response.body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&response.body).unwrap_or(Value::Null)
}

fn status_of(body: &Value) -> String {
    body.get("status")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Converts a raw solution body into tours and unassigned jobs.
///
/// Depot stops and departure/arrival activities are skipped. Stops that
/// drifted more than 50 m from the submitted place are logged.
fn extract_solution(body: Value, places: &HashMap<String, Coord>) -> Result<Solution, SolverError> {
    let wire: WireSolution =
        serde_json::from_value(body).map_err(|e| SolverError::Protocol(format!("solution body: {}", e)))?;

    let mut tours = Vec::with_capacity(wire.tours.len());
    for tour in wire.tours {
        let mut stop_ids = Vec::new();
        for stop in &tour.stops {
            if stop.kind.as_deref() == Some("depot") {
                continue;
            }
            for activity in &stop.activities {
                let Some(job_id) = activity.job_id.as_deref() else {
                    continue;
                };
                let kind = activity.kind.as_deref().unwrap_or("");
                if NON_JOB_ACTIVITIES.contains(&job_id) || NON_JOB_ACTIVITIES.contains(&kind) {
                    continue;
                }
                if let (Some(place), Some(at)) = (places.get(job_id), activity.location.or(stop.location)) {
                    let drift = distance_km(*place, at);
                    if drift > DRIFT_WARN_KM {
                        warn!(job_id, drift_km = drift, "Solution stop drifted from submitted place");
                    }
                }
                stop_ids.push(job_id.to_string());
            }
        }

        let statistic = tour.statistic.as_ref();
        tours.push(Tour {
            vehicle_id: vehicle_type_id(&tour.vehicle_id, tour.type_id.as_deref()),
            stop_ids,
            distance_km: statistic.and_then(|s| s.distance).map(|m| m / 1000.0),
            duration_secs: statistic.and_then(|s| s.duration),
        });
    }

    let unassigned: Vec<UnassignedJob> = wire
        .unassigned
        .into_iter()
        .map(|u| UnassignedJob {
            job_id: u.job_id,
            reasons: u.reasons,
        })
        .collect();

    for job in &unassigned {
        warn!(job_id = %job.job_id, reasons = %job.reason_codes(), "Job unassigned by solver");
    }

    Ok(Solution { tours, unassigned })
}

/// Client for the remote tour-planning service.
pub struct TourPlanningClient<T> {
    transport: T,
    poll_interval: Duration,
}

impl<T: SolverTransport> TourPlanningClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Solves a problem remotely.
    ///
    /// Time windows the document's policy does not allow are stripped and
    /// shifts are validated before anything is sent. Fails with
    /// [`SolverError::Timeout`] when no solution arrives within `timeout`
    /// and with [`SolverError::Cancelled`] when `cancel` fires first.
    pub async fn solve(
        &self,
        problem: &ProblemDocument,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Solution, SolverError> {
        let mut problem = problem.clone();
        problem.strip_time_windows();
        problem.check_shifts()?;

        let places = problem.job_places();
        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(SolverError::Cancelled),
            result = tokio::time::timeout(timeout, self.submit_and_wait(&problem)) => match result {
                Ok(body) => body?,
                Err(_) => {
                    warn!(timeout_secs = timeout.as_secs(), "Solver timed out");
                    return Err(SolverError::Timeout { seconds: timeout.as_secs() });
                }
            },
        };

        let solution = extract_solution(body, &places)?;
        info!(
            tours = solution.tours.len(),
            unassigned = solution.unassigned.len(),
            "Remote solve completed"
        );
        Ok(solution)
    }

    async fn submit_and_wait(&self, problem: &ProblemDocument) -> Result<Value, SolverError> {
        info!(
            jobs = problem.job_count(),
            vehicles = problem.fleet.types.len(),
            "Submitting problem"
        );
        let response = self.transport.submit(problem).await?;
        if !response.is_success() {
            warn!(status = response.status, "Problem submission rejected");
            return Err(SolverError::Http {
                status: response.status,
                body: response.body,
            });
        }

        let body = parse_body(&response);
        if response.status == 200 && looks_like_solution(&body) {
            info!("Received immediate solution");
            return Ok(body);
        }

        let id = problem_id(&body, response.location.as_deref()).ok_or_else(|| {
            SolverError::Protocol("accepted without problem id or solution".to_string())
        })?;
        info!(problem_id = %id, "Problem accepted, polling");
        self.poll(&id).await
    }

    async fn poll(&self, problem_id: &str) -> Result<Value, SolverError> {
        let mut polls = 0u32;
        loop {
            polls += 1;
            let response = self.transport.fetch_status(problem_id).await?;
            if !response.is_success() {
                return Err(SolverError::Http {
                    status: response.status,
                    body: response.body,
                });
            }

            let body = parse_body(&response);
            if body.get("tours").is_some_and(Value::is_array) {
                debug!(problem_id, polls, "Solution embedded in status");
                return Ok(body);
            }

            let status = status_of(&body);
            match status.as_str() {
                "ready" | "success" => {
                    debug!(problem_id, polls, "Solution ready");
                    return self.fetch_solution(problem_id).await;
                }
                "failed" | "failure" | "timeout" => {
                    warn!(problem_id, status = %status, "Solver reported failure");
                    return Err(SolverError::Failed { status });
                }
                _ => {
                    debug!(problem_id, polls, status = %status, "Solution pending");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn fetch_solution(&self, problem_id: &str) -> Result<Value, SolverError> {
        let response = self.transport.fetch_solution(problem_id).await?;
        if !response.is_success() {
            return Err(SolverError::Http {
                status: response.status,
                body: response.body,
            });
        }
        match parse_body(&response) {
            Value::Null => Err(SolverError::Protocol("empty solution body".to_string())),
            body => Ok(body),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{Stop, VehicleConfig};
    use crate::problem::{build_problem, ProblemOptions};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type SubmitFn = dyn Fn(&ProblemDocument) -> Result<TransportResponse, SolverError> + Send + Sync;

    /// In-memory transport. Submissions are answered by a closure; status
    /// polls are served from a queue and report `pending` once it runs dry.
    pub(crate) struct MockTransport {
        on_submit: Box<SubmitFn>,
        statuses: Mutex<VecDeque<TransportResponse>>,
        solution: Mutex<Option<TransportResponse>>,
        pub submitted: Mutex<Vec<ProblemDocument>>,
        pub status_calls: AtomicUsize,
    }

    impl MockTransport {
        pub fn new<F>(on_submit: F) -> Self
        where
            F: Fn(&ProblemDocument) -> Result<TransportResponse, SolverError> + Send + Sync + 'static,
        {
            Self {
                on_submit: Box::new(on_submit),
                statuses: Mutex::new(VecDeque::new()),
                solution: Mutex::new(None),
                submitted: Mutex::new(Vec::new()),
                status_calls: AtomicUsize::new(0),
            }
        }

        /// Always replies with the given status and body.
        pub fn fixed(status: u16, body: &str) -> Self {
            let body = body.to_string();
            Self::new(move |_| Ok(TransportResponse::new(status, body.clone())))
        }

        /// Replies with an immediate solution visiting every job on the first vehicle,
        /// except `unassigned`, which are reported as capacity failures.
        pub fn solving_all_but(unassigned: &'static [&'static str]) -> Self {
            Self::new(move |problem| {
                let vehicle = problem.fleet.types[0].id.clone();
                Ok(TransportResponse::new(200, solution_json(problem, &vehicle, unassigned).to_string()))
            })
        }

        pub fn with_statuses(self, statuses: Vec<TransportResponse>) -> Self {
            *self.statuses.lock() = statuses.into();
            self
        }

        pub fn with_solution(self, solution: TransportResponse) -> Self {
            *self.solution.lock() = Some(solution);
            self
        }
    }

    /// Solution body placing every job except `unassigned` on `vehicle`, wrapped in depot stops.
    pub(crate) fn solution_json(problem: &ProblemDocument, vehicle: &str, unassigned: &[&str]) -> Value {
        let places = problem.job_places();
        let mut stops = vec![json!({
            "type": "depot",
            "location": problem.fleet.types[0].shifts[0].start.location,
            "activities": [ { "jobId": "departure", "type": "departure" } ]
        })];
        for id in problem.job_ids() {
            if unassigned.contains(&id.as_str()) {
                continue;
            }
            stops.push(json!({
                "type": "job",
                "location": places[&id],
                "activities": [ { "jobId": id, "type": "delivery" } ]
            }));
        }
        json!({
            "statistic": { "cost": 1.0, "distance": 12000, "duration": 3600 },
            "tours": [ {
                "vehicleId": format!("{}_1", vehicle),
                "typeId": vehicle,
                "stops": stops,
                "statistic": { "distance": 12000, "duration": 3600 }
            } ],
            "unassigned": unassigned.iter().map(|id| json!({
                "jobId": id,
                "reasons": [ { "code": "CAPACITY_CONSTRAINT", "description": "cannot be assigned due to capacity" } ]
            })).collect::<Vec<_>>()
        })
    }

    impl SolverTransport for MockTransport {
        async fn submit(&self, problem: &ProblemDocument) -> Result<TransportResponse, SolverError> {
            self.submitted.lock().push(problem.clone());
            (self.on_submit)(problem)
        }

        async fn fetch_status(&self, _problem_id: &str) -> Result<TransportResponse, SolverError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let next = self.statuses.lock().pop_front();
            Ok(next.unwrap_or_else(|| TransportResponse::new(200, r#"{"status":"pending"}"#)))
        }

        async fn fetch_solution(&self, _problem_id: &str) -> Result<TransportResponse, SolverError> {
            self.solution
                .lock()
                .clone()
                .ok_or_else(|| SolverError::Protocol("no solution scripted".to_string()))
        }
    }

    fn problem(n: usize) -> ProblemDocument {
        let stops: Vec<Stop> = (0..n)
            .map(|i| Stop::new(format!("job-{}", i), Coord::new(45.40 + i as f64 * 0.002, -75.70)))
            .collect();
        build_problem(&stops, Coord::new(45.40, -75.70), &[VehicleConfig::new("van")], &ProblemOptions::default())
    }

    fn client(transport: MockTransport) -> TourPlanningClient<MockTransport> {
        TourPlanningClient::new(transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_solution() {
        let client = client(MockTransport::solving_all_but(&[]));
        let solution = client
            .solve(&problem(3), Duration::from_secs(90), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(solution.tours.len(), 1);
        assert_eq!(solution.tours[0].vehicle_id, "van");
        assert_eq!(solution.tours[0].stop_ids, vec!["job-0", "job-1", "job-2"]);
        assert_eq!(solution.tours[0].distance_km, Some(12.0));
        assert_eq!(solution.tours[0].duration_secs, Some(3600));
        assert_eq!(client.transport().status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unassigned_surfaced() {
        let client = client(MockTransport::solving_all_but(&["job-1"]));
        let solution = client
            .solve(&problem(3), Duration::from_secs(90), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(solution.tours[0].stop_ids, vec!["job-0", "job-2"]);
        assert_eq!(solution.unassigned.len(), 1);
        assert_eq!(solution.unassigned[0].job_id, "job-1");
        assert_eq!(solution.unassigned[0].reason_codes(), "CAPACITY_CONSTRAINT");
    }

    #[tokio::test(start_paused = true)]
    async fn test_http_error_propagates_status_and_body() {
        let client = client(MockTransport::fixed(500, "internal"));
        let err = client
            .solve(&problem(2), Duration::from_secs(90), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SolverError::Http {
                status: 500,
                body: "internal".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_ready_via_location_header() {
        let doc = problem(2);
        let solution_body = solution_json(&doc, "van", &[]).to_string();
        let transport = MockTransport::new(|_| {
            Ok(TransportResponse::new(202, "").with_location("https://tp.example/v3/problems/abc-123?x=1"))
        })
        .with_statuses(vec![
            TransportResponse::new(200, r#"{"status":"pending"}"#),
            TransportResponse::new(200, r#"{"status":"inProgress"}"#),
            TransportResponse::new(200, r#"{"status":"success"}"#),
        ])
        .with_solution(TransportResponse::new(200, solution_body));

        let client = client(transport);
        let started = tokio::time::Instant::now();
        let solution = client
            .solve(&doc, Duration::from_secs(90), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(solution.tours[0].stop_ids.len(), 2);
        assert_eq!(client.transport().status_calls.load(Ordering::SeqCst), 3);
        // two sleeps between three polls
        let elapsed = started.elapsed();
        assert!(elapsed >= DEFAULT_POLL_INTERVAL * 2 && elapsed < DEFAULT_POLL_INTERVAL * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_body_with_tours_is_solution() {
        let doc = problem(1);
        let mut embedded = solution_json(&doc, "van", &[]);
        embedded["status"] = json!("pending");
        let transport = MockTransport::fixed(202, r#"{"id":"p1","status":"pending"}"#)
            .with_statuses(vec![TransportResponse::new(200, embedded.to_string())]);

        let solution = client(transport)
            .solve(&doc, Duration::from_secs(90), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(solution.tours[0].stop_ids, vec!["job-0"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_never_ready() {
        let client = client(MockTransport::fixed(202, r#"{"id":"slow"}"#));
        let err = client
            .solve(&problem(2), Duration::from_secs(10), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, SolverError::Timeout { seconds: 10 });
        // polls at 0, 1.5, ..., 9.0 seconds
        assert_eq!(client.transport().status_calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_abandons_polling() {
        let client = client(MockTransport::fixed(202, r#"{"problemId":"p"}"#));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            trigger.cancel();
        });

        let err = client
            .solve(&problem(2), Duration::from_secs(90), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, SolverError::Cancelled);
        assert_eq!(client.transport().status_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_status() {
        let transport = MockTransport::fixed(202, r#"{"id":"p"}"#)
            .with_statuses(vec![TransportResponse::new(200, r#"{"status":"failure"}"#)]);
        let err = client(transport)
            .solve(&problem(2), Duration::from_secs(90), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, SolverError::Failed { status: "failure".into() });
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_problem_id_is_protocol_error() {
        let err = client(MockTransport::fixed(202, "{}"))
            .solve(&problem(2), Duration::from_secs(90), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SolverError::Protocol(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stray_windows_stripped_and_short_shift_rejected() {
        let mut doc = problem(1);
        let now = chrono::Utc::now();
        doc.plan.jobs[0].tasks.deliveries[0].places[0].times = Some(vec![[now, now + chrono::Duration::hours(1)]]);

        let client = client(MockTransport::solving_all_but(&[]));
        client
            .solve(&doc, Duration::from_secs(90), &CancellationToken::new())
            .await
            .unwrap();
        let sent = client.transport().submitted.lock()[0].clone();
        assert!(sent.plan.jobs[0].tasks.deliveries[0].places[0].times.is_none());

        let shift = &mut doc.fleet.types[0].shifts[0];
        shift.end.time = shift.start.time + chrono::Duration::minutes(20);
        let err = client
            .solve(&doc, Duration::from_secs(90), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SolverError::InvalidShift { minutes: 20, .. }));
        assert_eq!(client.transport().submitted.lock().len(), 1);
    }

    #[test]
    fn test_problem_id_discovery() {
        assert_eq!(problem_id(&json!({"id": "a"}), None).as_deref(), Some("a"));
        assert_eq!(problem_id(&json!({"statusId": "s"}), None).as_deref(), Some("s"));
        assert_eq!(
            problem_id(&Value::Null, Some("/v3/problems/xyz/status")).as_deref(),
            Some("xyz")
        );
        assert_eq!(problem_id(&Value::Null, Some("/v3/other")), None);
    }

    #[test]
    fn test_extract_skips_depot_and_departure() {
        let body = json!({
            "tours": [ {
                "vehicleId": "v_1",
                "stops": [
                    { "type": "depot", "activities": [ { "jobId": "departure" } ] },
                    { "location": { "lat": 45.0, "lng": -75.0 }, "activities": [ { "jobId": "a" }, { "jobId": "b" } ] },
                    { "activities": [ { "jobId": "arrival", "type": "arrival" } ] }
                ]
            } ]
        });
        let solution = extract_solution(body, &HashMap::new()).unwrap();
        assert_eq!(solution.tours[0].vehicle_id, "v");
        assert_eq!(solution.tours[0].stop_ids, vec!["a", "b"]);
        assert!(solution.unassigned.is_empty());
        assert_eq!(solution.tours[0].distance_km, None);
    }
}

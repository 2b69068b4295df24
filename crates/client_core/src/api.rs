//! External collaborators of the report controller: the remote
//! persistence API, the router's navigation side channel, and the
//! confirmation prompt.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use shared::{
    domain::{CreatedReport, Report, ReportRef},
    error::{ApiError, ErrorCode},
};
use store::{Store, Value};
use tracing::{debug, warn};
use url::Url;

use crate::paths;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Remote report persistence, as seen by the controller.
///
/// All mutating calls are fire-from-local-state: the store is already
/// mutated when they run and is not rolled back on rejection.
#[async_trait]
pub trait ReportsApi: Send + Sync {
    async fn load_report(&self, id: &str) -> Result<Option<Report>, ApiError>;
    async fn add_report(&self, report: &Report) -> Result<CreatedReport, ApiError>;
    async fn save_report(&self, id: &str, report: &Report) -> Result<(), ApiError>;
    async fn delete_report(&self, id: &str) -> Result<(), ApiError>;
    async fn add_star(&self, id: &str) -> Result<(), ApiError>;
    async fn remove_star(&self, id: &str) -> Result<(), ApiError>;
    async fn is_starred(&self, id: &str) -> Result<bool, ApiError>;

    /// Fire-and-forget diagnostic on a report id whose load came back
    /// empty; the result is not consumed locally.
    fn run_health_check_on_report(&self, id: &str);

    /// Synchronous read of the external auth state.
    fn current_user_id(&self) -> Option<String>;
}

/// Fallback used when no backend is wired up; every call errs.
pub struct MissingReportsApi;

#[async_trait]
impl ReportsApi for MissingReportsApi {
    async fn load_report(&self, id: &str) -> Result<Option<Report>, ApiError> {
        Err(ApiError::internal(format!(
            "reports backend unavailable for report {id}"
        )))
    }

    async fn add_report(&self, _report: &Report) -> Result<CreatedReport, ApiError> {
        Err(ApiError::internal("reports backend unavailable"))
    }

    async fn save_report(&self, id: &str, _report: &Report) -> Result<(), ApiError> {
        Err(ApiError::internal(format!(
            "reports backend unavailable for report {id}"
        )))
    }

    async fn delete_report(&self, id: &str) -> Result<(), ApiError> {
        Err(ApiError::internal(format!(
            "reports backend unavailable for report {id}"
        )))
    }

    async fn add_star(&self, id: &str) -> Result<(), ApiError> {
        Err(ApiError::internal(format!(
            "reports backend unavailable for report {id}"
        )))
    }

    async fn remove_star(&self, id: &str) -> Result<(), ApiError> {
        Err(ApiError::internal(format!(
            "reports backend unavailable for report {id}"
        )))
    }

    async fn is_starred(&self, id: &str) -> Result<bool, ApiError> {
        Err(ApiError::internal(format!(
            "reports backend unavailable for report {id}"
        )))
    }

    fn run_health_check_on_report(&self, id: &str) {
        warn!(id, "health check requested but no reports backend is wired up");
    }

    fn current_user_id(&self) -> Option<String> {
        None
    }
}

/// In-process backend useful for demos and scripted sessions. Single-user
/// star model; ids are assigned sequentially.
#[derive(Default)]
pub struct InMemoryReportsApi {
    user_id: Mutex<Option<String>>,
    reports: Mutex<HashMap<String, Report>>,
    stars: Mutex<HashSet<String>>,
    health_checks: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl InMemoryReportsApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        *lock(&self.user_id) = Some(user_id.into());
    }

    pub fn sign_out(&self) {
        *lock(&self.user_id) = None;
    }

    pub fn stored_report(&self, id: &str) -> Option<Report> {
        lock(&self.reports).get(id).cloned()
    }

    pub fn health_checks(&self) -> Vec<String> {
        lock(&self.health_checks).clone()
    }
}

#[async_trait]
impl ReportsApi for InMemoryReportsApi {
    async fn load_report(&self, id: &str) -> Result<Option<Report>, ApiError> {
        Ok(lock(&self.reports).get(id).cloned())
    }

    async fn add_report(&self, report: &Report) -> Result<CreatedReport, ApiError> {
        let id = format!("r{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let mut stored = report.clone();
        stored.id = Some(id.clone());
        lock(&self.reports).insert(id.clone(), stored);
        Ok(CreatedReport { id })
    }

    async fn save_report(&self, id: &str, report: &Report) -> Result<(), ApiError> {
        lock(&self.reports).insert(id.to_string(), report.clone());
        Ok(())
    }

    async fn delete_report(&self, id: &str) -> Result<(), ApiError> {
        lock(&self.reports).remove(id);
        lock(&self.stars).remove(id);
        Ok(())
    }

    async fn add_star(&self, id: &str) -> Result<(), ApiError> {
        lock(&self.stars).insert(id.to_string());
        Ok(())
    }

    async fn remove_star(&self, id: &str) -> Result<(), ApiError> {
        lock(&self.stars).remove(id);
        Ok(())
    }

    async fn is_starred(&self, id: &str) -> Result<bool, ApiError> {
        Ok(lock(&self.stars).contains(id))
    }

    fn run_health_check_on_report(&self, id: &str) {
        lock(&self.health_checks).push(id.to_string());
    }

    fn current_user_id(&self) -> Option<String> {
        lock(&self.user_id).clone()
    }
}

#[derive(Debug, Deserialize)]
struct StarStatus {
    starred: bool,
}

/// REST-backed persistence client.
pub struct RestReportsApi {
    http: Client,
    base_url: String,
    user_id: Mutex<Option<String>>,
}

impl RestReportsApi {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            user_id: Mutex::new(None),
        }
    }

    /// Records the signed-in user; the backend authenticates separately.
    pub fn set_current_user(&self, user_id: Option<String>) {
        *lock(&self.user_id) = user_id;
    }

    fn report_url(&self, id: &str) -> String {
        format!("{}/reports/{id}", self.base_url)
    }
}

fn status_error(status: StatusCode, context: &str) -> ApiError {
    let code = match status {
        StatusCode::UNAUTHORIZED => ErrorCode::Unauthorized,
        StatusCode::FORBIDDEN => ErrorCode::Forbidden,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        s if s.is_client_error() => ErrorCode::Validation,
        _ => ErrorCode::Internal,
    };
    ApiError::new(code, format!("{context}: http status {status}"))
}

fn transport(err: reqwest::Error) -> ApiError {
    ApiError::transport(err.to_string())
}

#[async_trait]
impl ReportsApi for RestReportsApi {
    async fn load_report(&self, id: &str) -> Result<Option<Report>, ApiError> {
        let response = self
            .http
            .get(self.report_url(id))
            .send()
            .await
            .map_err(transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(response.status(), "load report"));
        }
        let report = response.json::<Report>().await.map_err(transport)?;
        Ok(Some(report))
    }

    async fn add_report(&self, report: &Report) -> Result<CreatedReport, ApiError> {
        let response = self
            .http
            .post(format!("{}/reports", self.base_url))
            .json(report)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(status_error(response.status(), "add report"));
        }
        response.json::<CreatedReport>().await.map_err(transport)
    }

    async fn save_report(&self, id: &str, report: &Report) -> Result<(), ApiError> {
        let response = self
            .http
            .put(self.report_url(id))
            .json(report)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(status_error(response.status(), "save report"));
        }
        Ok(())
    }

    async fn delete_report(&self, id: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .delete(self.report_url(id))
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(status_error(response.status(), "delete report"));
        }
        Ok(())
    }

    async fn add_star(&self, id: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .put(format!("{}/star", self.report_url(id)))
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(status_error(response.status(), "add star"));
        }
        Ok(())
    }

    async fn remove_star(&self, id: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .delete(format!("{}/star", self.report_url(id)))
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(status_error(response.status(), "remove star"));
        }
        Ok(())
    }

    async fn is_starred(&self, id: &str) -> Result<bool, ApiError> {
        let response = self
            .http
            .get(format!("{}/star", self.report_url(id)))
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(status_error(response.status(), "star status"));
        }
        let status = response.json::<StarStatus>().await.map_err(transport)?;
        Ok(status.starred)
    }

    fn run_health_check_on_report(&self, id: &str) {
        let http = self.http.clone();
        let url = format!("{}/health-check", self.report_url(id));
        let id = id.to_string();
        tokio::spawn(async move {
            if let Err(err) = http.post(url).send().await {
                warn!(id = %id, error = %err, "report health check request failed");
            }
        });
    }

    fn current_user_id(&self) -> Option<String> {
        lock(&self.user_id).clone()
    }
}

/// Interpreter of the controller's URL change requests.
///
/// `replace` swaps the current history entry (after create, after delete);
/// `push` adds one (after copy).
pub trait Navigator: Send + Sync {
    fn replace(&self, url: &str);
    fn push(&self, url: &str);
}

/// Router stand-in that resolves `~/{id}` URLs straight into the store's
/// route path. Push and replace only differ in history bookkeeping, which
/// does not exist here.
pub struct LocalNavigator {
    store: Store,
}

impl LocalNavigator {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    fn apply(&self, url: &str) {
        let route_id = url.trim_start_matches('~').trim_matches('/');
        debug!(url, route_id, "navigating");
        if route_id.is_empty() {
            // Listing root; the report route is gone.
            self.store.delete(&paths::route_id());
        } else {
            self.store.set(&paths::route_id(), Value::from(route_id));
        }
    }
}

impl Navigator for LocalNavigator {
    fn replace(&self, url: &str) {
        self.apply(url);
    }

    fn push(&self, url: &str) {
        self.apply(url);
    }
}

/// Interactive yes/no confirmation, answered by the surrounding UI.
#[async_trait]
pub trait ConfirmPrompt: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
}

/// Prompt that always answers the same way; demos and scripted sessions.
pub struct AutoConfirm(pub bool);

#[async_trait]
impl ConfirmPrompt for AutoConfirm {
    async fn confirm(&self, _message: &str) -> bool {
        self.0
    }
}

/// Convenience for route bootstrap: points the store at a report route
/// before a controller is activated for it.
pub fn enter_route(store: &Store, route: &ReportRef) {
    store.set(&paths::route_id(), Value::from(route.as_route_id()));
}

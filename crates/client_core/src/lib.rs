//! Report page controller.
//!
//! Owns the lifecycle of one report route: loading or synthesizing the
//! report, arming the autosave and pin-synchronization triggers, and
//! exposing the operations the surrounding view layer calls (save,
//! delete, copy, star, section commands). All state lives in the shared
//! reactive [`Store`]; the controller and its triggers are the only
//! writers of the `page` and `report` sub-trees.
//!
//! Remote persistence, navigation, and confirmation dialogs stay behind
//! the trait seams in [`api`]. In-flight remote calls are never
//! cancelled; their continuations check the controller's scope token and
//! drop their writes if the scope was torn down in the meantime.

use std::sync::Arc;

use anyhow::{Context, Result};
use shared::domain::{Report, ReportRef};
use store::{Scope, ScopeToken, Store, Value};
use tracing::{debug, info, warn};

pub mod api;
pub mod paths;
pub mod pins;
mod sections;

pub use api::{
    enter_route, AutoConfirm, ConfirmPrompt, InMemoryReportsApi, LocalNavigator,
    MissingReportsApi, Navigator, ReportsApi, RestReportsApi,
};

pub struct ReportController {
    store: Store,
    scope: Scope,
    api: Arc<dyn ReportsApi>,
    navigator: Arc<dyn Navigator>,
    prompt: Arc<dyn ConfirmPrompt>,
}

impl ReportController {
    pub fn new(
        store: Store,
        api: Arc<dyn ReportsApi>,
        navigator: Arc<dyn Navigator>,
        prompt: Arc<dyn ConfirmPrompt>,
    ) -> Self {
        let scope = Scope::new(&store);
        Self {
            store,
            scope,
            api,
            navigator,
            prompt,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn prompt(&self) -> &Arc<dyn ConfirmPrompt> {
        &self.prompt
    }

    /// Tears down every computable and trigger this controller
    /// registered; continuations of still-pending remote calls will see
    /// an inactive token and drop their writes. Idempotent.
    pub fn deactivate(&self) {
        self.scope.deactivate();
    }

    /// Route entry: registers the `editable` derivation and kicks off
    /// report loading for the current route id.
    pub fn activate(&self) {
        self.scope.add_computable(
            paths::editable(),
            vec![paths::user(), paths::report(), paths::route_id()],
            |deps| {
                let (user, report, route) = (&deps[0], &deps[1], &deps[2]);
                if route.as_str() == Some(ReportRef::NEW_ROUTE_ID) {
                    return Value::Bool(true);
                }
                let uid = user.get_or_null("uid");
                let owner = report.get_or_null("userId");
                Value::Bool(matches!(
                    (uid.as_str(), owner.as_str()),
                    (Some(u), Some(o)) if u == o
                ))
            },
        );
        self.load_report();
    }

    fn load_report(&self) {
        match current_route(&self.store) {
            ReportRef::Existing(id) => self.load_existing(id),
            ReportRef::New => self.synthesize_draft(),
        }
        pins::register(&self.scope);
    }

    fn load_existing(&self, id: String) {
        info!(id = %id, "loading report");
        if self.store.get(&paths::report()).is_null() {
            self.store.set(&paths::status(), Value::from("loading"));
        }

        let store = self.store.clone();
        let api = Arc::clone(&self.api);
        let navigator = Arc::clone(&self.navigator);
        let scope = self.scope.clone();
        let token = self.scope.token();
        let report_id = id.clone();
        tokio::spawn(async move {
            let loaded = api.load_report(&report_id).await;
            if !token.is_active() {
                return;
            }
            match loaded {
                Ok(Some(report)) => {
                    if let Err(err) = store.set_typed(&paths::report(), &report) {
                        warn!(id = %report_id, error = %err, "loaded report is malformed");
                        return;
                    }
                }
                Ok(None) => {
                    // Distinguish "not found" from a backend inconsistency
                    // out of band; locally we fall back to a marker.
                    info!(id = %report_id, "report load came back empty");
                    api.run_health_check_on_report(&report_id);
                    store.set(&paths::report(), not_found_report());
                }
                Err(err) => {
                    // Rejected loads surface through the embedding
                    // layer's generic failure path; local state stays.
                    warn!(id = %report_id, error = %err, "report load rejected");
                    return;
                }
            }
            store.delete(&paths::status());
            arm_auto_save(&scope, &api, &navigator);
        });

        // The user identity may arrive after the route does; re-check
        // star status as soon as it shows up.
        let api = Arc::clone(&self.api);
        let token = self.scope.token();
        self.scope.add_trigger(
            "star",
            vec![paths::user()],
            move |store, _| {
                if api.current_user_id().is_none() {
                    return;
                }
                let api = Arc::clone(&api);
                let store = store.clone();
                let token = token.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    match api.is_starred(&id).await {
                        Ok(starred) if token.is_active() => {
                            store.set(&paths::starred(), Value::Bool(starred));
                        }
                        Ok(_) => {}
                        Err(err) => warn!(id = %id, error = %err, "star status lookup failed"),
                    }
                });
            },
            true,
        );
    }

    /// Builds the draft for the "new" route: base fields, then any
    /// clipboard snapshot on top, identity always reset to this session.
    /// Consumes the clipboard and seeds one initial map section.
    fn synthesize_draft(&self) {
        let clipboard = self.store.get(&paths::clipboard_report());
        let mut draft = Value::object([
            ("title", Value::from("New Report")),
            ("sections", Value::empty_array()),
            ("public", Value::Bool(false)),
        ]);
        if let Some(copied) = clipboard.as_object() {
            debug!("draft seeded from clipboard snapshot");
            for (field, value) in copied.iter() {
                draft = draft.with_field(field.clone(), value.clone());
            }
        }
        draft = draft
            .with_field("userId", Value::from(self.api.current_user_id()))
            .with_field("id", Value::Null);

        let needs_seed = draft
            .get("sections")
            .and_then(|s| s.as_array().map(|items| items.is_empty()))
            .unwrap_or(true);
        self.store.set(&paths::report(), draft);
        self.store.delete(&paths::clipboard_report());
        // Fresh drafts start with one map section; a clipboard snapshot
        // brings its own sections along.
        if needs_seed {
            self.add_map();
        }
    }

    /// Persists the current report: create for drafts (followed by a URL
    /// replace onto the assigned id), update otherwise.
    pub async fn save_report(&self) -> Result<()> {
        persist(&self.store, &self.api, &self.navigator, &self.scope.token()).await
    }

    /// Deletes the persisted report and navigates to the listing root;
    /// a no-op for drafts.
    pub async fn delete_report(&self) -> Result<()> {
        let ReportRef::Existing(id) = current_route(&self.store) else {
            return Ok(());
        };
        self.api.delete_report(&id).await?;
        info!(id = %id, "report deleted");
        if self.scope.token().is_active() {
            self.navigator.replace("~/");
        }
        Ok(())
    }

    /// Snapshots the report into the clipboard and navigates to the
    /// "new" route, whose draft synthesis consumes the snapshot.
    pub fn copy_report(&self) {
        let report = self.store.get(&paths::report());
        self.store.set(&paths::clipboard_report(), report);
        self.navigator.push("~/new");
    }

    pub async fn star_report(&self) -> Result<()> {
        let ReportRef::Existing(id) = current_route(&self.store) else {
            return Ok(());
        };
        self.api.add_star(&id).await?;
        if self.scope.token().is_active() {
            self.store.set(&paths::starred(), Value::Bool(true));
        }
        Ok(())
    }

    pub async fn unstar_report(&self) -> Result<()> {
        let ReportRef::Existing(id) = current_route(&self.store) else {
            return Ok(());
        };
        self.api.remove_star(&id).await?;
        if self.scope.token().is_active() {
            self.store.set(&paths::starred(), Value::Bool(false));
        }
        Ok(())
    }

    /// Flips the report between public and private.
    pub fn toggle_lock(&self) {
        self.store.toggle(&paths::report_public());
    }

    /// Opens the header editor: copies title/description into the
    /// transient header state and the defaults into their working copy.
    pub fn edit_header(&self) {
        let report = self.store.get(&paths::report());
        self.store.set(
            &paths::header(),
            Value::object([
                ("title", report.get_or_null("title")),
                ("description", report.get_or_null("description")),
                ("edit", Value::Bool(true)),
            ]),
        );
        self.store
            .set(&paths::defaults(), report.get_or_null("defaults"));
    }
}

fn current_route(store: &Store) -> ReportRef {
    match store.get(&paths::route_id()).as_str() {
        Some(id) => ReportRef::parse(id),
        // No route id yet; treat as a draft rather than fetching nothing.
        None => ReportRef::New,
    }
}

/// Marker stored when a load resolves empty, so the page renders a
/// "not found" state instead of spinning forever.
fn not_found_report() -> Value {
    Value::object([("notFound", Value::Bool(true))])
}

async fn persist(
    store: &Store,
    api: &Arc<dyn ReportsApi>,
    navigator: &Arc<dyn Navigator>,
    token: &ScopeToken,
) -> Result<()> {
    let report: Report = store
        .get_typed(&paths::report())
        .context("report state is not a valid report")?
        .context("no report loaded")?;
    match current_route(store) {
        ReportRef::New => {
            let created = api.add_report(&report).await?;
            info!(id = %created.id, "draft created");
            if token.is_active() {
                navigator.replace(&format!("~/{}", created.id));
            }
        }
        ReportRef::Existing(id) => {
            api.save_report(&id, &report).await?;
        }
    }
    Ok(())
}

/// Write-through autosave: every report mutation issues its own save for
/// the owning user. No debounce or coalescing; the remote store is
/// last-write-wins and tolerates out-of-order completion.
fn arm_auto_save(scope: &Scope, api: &Arc<dyn ReportsApi>, navigator: &Arc<dyn Navigator>) {
    let api = Arc::clone(api);
    let navigator = Arc::clone(navigator);
    let token = scope.token();
    scope.add_trigger(
        "autoSave",
        vec![paths::report()],
        move |store, args| {
            let owner = args[0].get_or_null("userId");
            let Some(user) = api.current_user_id() else {
                return;
            };
            if owner.as_str() != Some(user.as_str()) {
                return;
            }
            let store = store.clone();
            let api = Arc::clone(&api);
            let navigator = Arc::clone(&navigator);
            let token = token.clone();
            tokio::spawn(async move {
                if let Err(err) = persist(&store, &api, &navigator, &token).await {
                    warn!(error = %err, "autosave failed");
                }
            });
        },
        false,
    );
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

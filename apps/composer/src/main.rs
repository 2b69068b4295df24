use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use client_core::{
    enter_route, paths, AutoConfirm, ConfirmPrompt, InMemoryReportsApi, LocalNavigator, Navigator,
    ReportController, ReportsApi, RestReportsApi,
};
use shared::domain::ReportRef;
use store::{Store, Value};
use tracing::info;
use url::Url;

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
struct Args {
    /// Reports backend base URL; when omitted the session runs against
    /// an in-process backend.
    #[arg(long)]
    backend_url: Option<String>,
    /// User id to act as.
    #[arg(long)]
    user: Option<String>,
    /// Report route to open: a report id, or "new" for a fresh draft.
    #[arg(long, default_value = "new")]
    route: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(url) = args.backend_url {
        settings.backend_url = Some(url);
    }
    if let Some(user) = args.user {
        settings.user_id = user;
    }

    let api: Arc<dyn ReportsApi> = match &settings.backend_url {
        Some(raw) => {
            let api = RestReportsApi::new(Url::parse(raw)?);
            api.set_current_user(Some(settings.user_id.clone()));
            Arc::new(api)
        }
        None => {
            let api = InMemoryReportsApi::new();
            api.sign_in(settings.user_id.clone());
            Arc::new(api)
        }
    };

    let store = Store::new();
    store.set(
        &paths::user(),
        Value::object([("uid", Value::from(settings.user_id.clone()))]),
    );
    let navigator: Arc<dyn Navigator> = Arc::new(LocalNavigator::new(store.clone()));
    let prompt: Arc<dyn ConfirmPrompt> = Arc::new(AutoConfirm(true));

    enter_route(&store, &ReportRef::parse(&args.route));
    let page = ReportController::new(store.clone(), Arc::clone(&api), navigator, prompt);
    page.activate();
    tokio::time::sleep(Duration::from_millis(200)).await;
    info!(user = %settings.user_id, route = %args.route, "session mounted");

    // Scripted walkthrough: set report-wide defaults, add a section that
    // seeds from them, pin a field, then move the defaults and let the
    // pinned field follow.
    store.set(
        &paths::report_defaults(),
        Value::object([
            ("topic", Value::from("energy")),
            ("region", Value::from("Asia")),
            ("fromYear", Value::Int(2000)),
            ("toYear", Value::Int(2020)),
        ]),
    );
    page.add_line_graph();

    store.set(
        &paths::report_sections().join("0").join("pins").join("region"),
        Value::Bool(true),
    );
    store.set(&paths::report_defaults().join("region"), Value::from("Europe"));

    let sections = store.get(&paths::report_sections());
    if let Some(first) = sections.as_array().and_then(|items| items.first()) {
        println!(
            "pinned region after defaults change: {}",
            first.get_or_null("region").to_json()
        );
    }

    page.save_report().await?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    println!("route: {}", store.get(&paths::route_id()).to_json());
    println!(
        "{}",
        serde_json::to_string_pretty(&store.get(&paths::report()).to_json())?
    );

    page.deactivate();
    Ok(())
}

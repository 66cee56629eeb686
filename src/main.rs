//! Headless demo: maps a small application, drives a few navigations and
//! prints what the router did.

use std::sync::Arc;

use clap::Parser;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::File;

use waypoint::core::config;
use waypoint::core::route::RouteSpec;
use waypoint::screen::history::MemoryHistory;
use waypoint::screen::view::{RecordingTitleSink, ViewHost};
use waypoint::{RouteTarget, Router, RouterBuilder, UnknownRoutePolicy};

mod demo_screens {
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use waypoint::core::router::Router;
    use waypoint::screen::screen::{GuardError, GuardOutcome};
    use waypoint::{ActivationParams, Screen};

    /// A plain page with no guards.
    pub struct Page {
        id: String,
    }

    impl Page {
        pub fn new(id: impl Into<String>) -> Arc<Self> {
            Arc::new(Self { id: id.into() })
        }
    }

    #[async_trait]
    impl Screen for Page {
        fn id(&self) -> &str {
            &self.id
        }
    }

    /// A detail page that records the ids it was activated with.
    pub struct CustomerDetail {
        seen: Mutex<Vec<String>>,
    }

    impl CustomerDetail {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
            })
        }

        pub fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Screen for CustomerDetail {
        fn id(&self) -> &str {
            "customer-detail"
        }

        async fn activate(&self, params: &ActivationParams) -> Result<GuardOutcome, GuardError> {
            if let Some(Some(id)) = params.positional.first() {
                self.seen.lock().unwrap().push(id.clone());
            }
            Ok(GuardOutcome::Allow)
        }

        fn can_reuse_for(&self, _params: &ActivationParams) -> Option<bool> {
            // Param-only changes re-run activate without recomposing.
            Some(true)
        }
    }

    /// A shell hosting a nested router.
    pub struct Shell {
        child: Mutex<Option<Arc<Router>>>,
    }

    impl Shell {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                child: Mutex::new(None),
            })
        }

        pub fn set_child(&self, router: Arc<Router>) {
            *self.child.lock().unwrap() = Some(router);
        }
    }

    #[async_trait]
    impl Screen for Shell {
        fn id(&self) -> &str {
            "shell"
        }

        fn child_router(&self) -> Option<Arc<Router>> {
            self.child.lock().unwrap().clone()
        }
    }
}

#[derive(Parser)]
#[command(name = "waypoint", about = "Screen navigation coordinator demo")]
struct Args {
    /// Application title appended to screen titles
    #[arg(short, long)]
    title: Option<String>,

    /// Log level override (error, warn, info, debug, trace)
    #[arg(short, long)]
    log_level: Option<String>,
}

/// Feeds triggered history fragments back into the router until quiet.
async fn pump(router: &Arc<Router>, history: &Arc<MemoryHistory>) {
    loop {
        let triggered = history.take_triggered();
        if triggered.is_empty() {
            break;
        }
        for fragment in triggered {
            router.load_url(&fragment).await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    let file_config = config::load_config()?;
    let resolved = config::resolve(
        &file_config,
        args.title.as_deref(),
        args.log_level.as_deref(),
    );

    // Initialize file logger - writes to waypoint.log in current directory
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    let level = resolved
        .log_level
        .parse()
        .unwrap_or(LevelFilter::Info);
    if let Ok(log_file) = File::create("waypoint.log") {
        let _ = WriteLogger::init(level, log_config, log_file);
    }

    log::info!("Waypoint demo starting");

    let history = Arc::new(MemoryHistory::new());
    let titles = Arc::new(RecordingTitleSink::new());
    let mut builder = RouterBuilder::from_config(
        Arc::clone(&history) as Arc<dyn waypoint::screen::History>,
        &resolved,
    )
    .title_sink(Arc::clone(&titles) as Arc<dyn waypoint::screen::TitleSink>);
    if resolved.app_title.is_none() {
        builder = builder.app_title("Waypoint Demo");
    }
    let router = builder.build(Arc::new(ViewHost::new("application")));

    // Route table: a home page, a parameterized detail page and a shell
    // with a nested router.
    let home = demo_screens::Page::new("home");
    let detail = demo_screens::CustomerDetail::new();
    let shell = demo_screens::Shell::new();

    router.map(
        RouteSpec::with_routes(["", "home"])
            .title("Home")
            .target(RouteTarget::Screen(home))
            .visible(),
    )?;
    router.map(
        RouteSpec::new("customer/:id")
            .title("Customer")
            .target(RouteTarget::Screen(Arc::clone(&detail) as Arc<dyn waypoint::Screen>)),
    )?;
    router.map(
        RouteSpec::new("shell")
            .title("Shell")
            .target(RouteTarget::Screen(Arc::clone(&shell) as Arc<dyn waypoint::Screen>))
            .with_children()
            .visible(),
    )?;
    router.map_unknown_routes(UnknownRoutePolicy::RedirectTo("home".to_string()));
    router.build_navigation_model(resolved.default_nav_order);

    // Nested routes match against the fragment tail after "shell/".
    let child = router.create_child_router(Arc::new(ViewHost::new("shell-content")));
    child.map(
        RouteSpec::new("inbox")
            .title("Inbox")
            .target(RouteTarget::Screen(demo_screens::Page::new("inbox"))),
    )?;
    shell.set_child(child);

    // Drive a few navigations the way a fragment source would.
    for fragment in [
        "home",
        "customer/42?tab=info",
        "customer/7",
        "shell/inbox",
        "no/such/route",
    ] {
        router.navigate(fragment, Default::default());
        pump(&router, &history).await;
    }

    println!("History records:");
    for record in history.records() {
        println!("  {:?} (trigger: {})", record.fragment, record.options.trigger);
    }
    println!("Titles seen: {:?}", titles.titles());
    println!("Customer ids activated: {:?}", detail.seen());
    if let Some(instruction) = router.active_instruction() {
        println!(
            "Final instruction: {}",
            serde_json::to_string_pretty(&instruction.params)?
        );
    }

    Ok(())
}

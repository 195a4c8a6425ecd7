use std::collections::HashSet;

use clap::Parser;
use diary_config::Settings;
use diary_models::{AdvisorId, Notification, NotificationId};
use diary_notify::{
    Banner, CenterHandle, ConnectionState, NotificationCenter, Session, ViewState, Visibility,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Watch an advisor's diary notifications as they arrive.
///
/// Commands on stdin: `r` reconnect, `h`/`v` hide/show, `m <id>` mark read,
/// `d` dismiss banner, `q` quit.
#[derive(Debug, Parser)]
#[command(name = "diary-notify", version)]
struct Args {
    /// Advisor whose notifications are streamed.
    #[arg(long)]
    advisor_id: Option<u64>,
    /// Backend base URL, e.g. http://localhost:8080
    #[arg(long)]
    base_url: Option<String>,
    /// Bearer token sent with every request.
    #[arg(long)]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diary_notify=debug,diary_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut settings = Settings::load()?;
    if let Some(base_url) = args.base_url {
        settings.api.base_url = base_url;
    }
    if args.advisor_id.is_some() {
        settings.api.advisor_id = args.advisor_id;
    }
    if args.token.is_some() {
        settings.api.token = args.token;
    }

    let Some(advisor_id) = settings.api.advisor_id.and_then(AdvisorId::new) else {
        anyhow::bail!("an advisor id is required (--advisor-id or DIARY__API__ADVISOR_ID)");
    };
    info!(%advisor_id, base_url = %settings.api.base_url, "Watching notifications");

    let session = Session::new(settings)?;
    let center = NotificationCenter::new(session).mount();
    let mut view = center.subscribe();
    let mut printer = Printer::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = view.borrow_and_update().clone();
                printer.render(&snapshot);
            }
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !run_command(&center, line.trim()).await {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    center.unmount().await;
    Ok(())
}

/// Returns false when the user asked to quit.
async fn run_command(center: &CenterHandle, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    let result = match (parts.next(), parts.next()) {
        (Some("q"), _) => return false,
        (Some("r"), _) => center.force_reconnect(),
        (Some("h"), _) => center.set_visibility(Visibility::Hidden),
        (Some("v"), _) => center.set_visibility(Visibility::Visible),
        (Some("d"), _) => center.dismiss_banner(),
        (Some("m"), Some(id)) => match id.parse::<u64>() {
            Ok(id) => center.mark_read(NotificationId(id)).await,
            Err(_) => {
                println!("usage: m <notification id>");
                Ok(())
            }
        },
        (None, _) => Ok(()),
        _ => {
            println!("commands: r reconnect, h hide, v show, m <id> mark read, d dismiss, q quit");
            Ok(())
        }
    };
    if let Err(e) = result {
        warn!(%e, "Command failed");
    }
    true
}

#[derive(Default)]
struct Printer {
    seen: HashSet<NotificationId>,
    connection: Option<ConnectionState>,
    banner: Option<Banner>,
    unread: Option<usize>,
    hydrated: bool,
    load_error: bool,
}

impl Printer {
    fn render(&mut self, view: &ViewState) {
        if self.connection != Some(view.connection) {
            println!("[{:?}] {:?}", view.indicator, view.connection);
            self.connection = Some(view.connection);
        }
        if self.banner != view.banner {
            if let Some(banner) = &view.banner {
                println!("! {}", banner.message());
            }
            self.banner = view.banner.clone();
        }
        let load_error = view.shows_full_page_error();
        if load_error && !self.load_error {
            println!("! could not load notifications");
        }
        self.load_error = load_error;

        let first = !self.hydrated;
        // Oldest first so the newest ends up at the bottom of the terminal.
        for n in view.notifications.iter().rev() {
            if self.seen.insert(n.id) {
                print_notification(n, first);
            }
        }
        if !view.notifications.is_empty() {
            self.hydrated = true;
        }
        if self.unread != Some(view.unread) {
            println!("  {} unread", view.unread);
            self.unread = Some(view.unread);
        }
    }
}

fn print_notification(n: &Notification, hydrating: bool) {
    let marker = if n.is_read { ' ' } else { '*' };
    let prefix = if hydrating { "" } else { "new " };
    println!(
        "{marker} {prefix}#{} {} [{}] {} {}",
        n.id,
        n.created_at.format("%Y-%m-%d %H:%M"),
        n.kind,
        n.title,
        n.data.diary_date.as_deref().unwrap_or("")
    );
}

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ticketdw", about = "Support ticket metrics warehouse CLI")]
struct Cli {
    /// Database path (default: ~/.ticketdw/ticketdw.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a HubSpot ticket export into the snapshot tables
    Import {
        /// Tickets export (JSON)
        tickets: String,
        /// Pipelines export, used to find closed stages
        #[arg(long)]
        pipelines: Option<String>,
        /// Owners export
        #[arg(long)]
        owners: Option<String>,
        /// Ticket property holding the category
        #[arg(long, default_value = ticketdw::ingest::hubspot::DEFAULT_CATEGORY_PROP)]
        category_property: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rebuild the weekly metrics table
    Rollup {
        /// Number of complete weeks to rebuild (default: config weeks_back)
        #[arg(long)]
        weeks_back: Option<u32>,
        /// Evaluate as of this instant (RFC 3339) instead of now
        #[arg(long)]
        now: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ad hoc report for one period from the live snapshot
    Report {
        /// Period: last-week, this-week, last-month, 2025-W05, 2025-01, 30d, 2025-01-01..2025-02-01
        #[arg(long, default_value = "last-week")]
        period: String,
        /// Only tickets in this category
        #[arg(long)]
        category: Option<String>,
        /// Only tickets owned by this agent (display name)
        #[arg(long)]
        agent: Option<String>,
        #[arg(long)]
        now: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Week-by-week trend from the stored rollup
    Trend {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        agent: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Business hours between two instants
    Hours {
        /// Start instant (RFC 3339)
        start: String,
        /// End instant (RFC 3339)
        end: String,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show warehouse status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

fn parse_now(now: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    match now {
        Some(s) => parse_arg_instant(s),
        None => Ok(Utc::now()),
    }
}

fn parse_arg_instant(s: &str) -> anyhow::Result<DateTime<Utc>> {
    ticketdw::date_util::parse_instant(s)
        .ok_or_else(|| anyhow::anyhow!("invalid instant '{s}', expected RFC 3339 (e.g. 2025-01-06T09:00:00Z)"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => ticketdw::Database::open_at(path).await?,
        None => ticketdw::Database::open().await?,
    };
    let dw = ticketdw::TicketDW::new(db);

    match cli.command {
        Commands::Import {
            tickets,
            pipelines,
            owners,
            category_property,
            json,
        } => {
            let options = ticketdw::ImportOptions {
                pipelines_path: pipelines.map(Into::into),
                owners_path: owners.map(Into::into),
                category_property,
                ..ticketdw::ImportOptions::new(tickets)
            };
            let report = dw.import(&options).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_import_report(&report);
            }
        }
        Commands::Rollup { weeks_back, now, json } => {
            let now = parse_now(now.as_deref())?;
            let report = dw.run_rollup(now, weeks_back).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_rollup_report(&report);
            }
        }
        Commands::Report {
            period,
            category,
            agent,
            now,
            json,
        } => {
            let now = parse_now(now.as_deref())?;
            let p = ticketdw::Period::parse(&period)?;
            let filter = ticketdw::TicketFilter::new(category, agent);
            let report = dw.period_report(&p, &filter, now).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_period_report(&report);
            }
        }
        Commands::Trend { category, agent, json } => {
            let filter = ticketdw::TicketFilter::new(category, agent);
            let trend = dw.weekly_trend(&filter).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&trend)?);
            } else {
                print_trend(&trend);
            }
        }
        Commands::Hours { start, end } => {
            let start = parse_arg_instant(&start)?;
            let end = parse_arg_instant(&end)?;
            let hours = dw.business_hours(start, end).await?;
            println!("{hours:.2}");
        }
        Commands::Config { action } => {
            handle_config(&dw, action).await?;
        }
        Commands::Status { json } => {
            let status = dw.status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }

    Ok(())
}

async fn handle_config(dw: &ticketdw::TicketDW, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match dw.config_get(&key).await? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            dw.config_set(&key, &value).await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items = dw.config_list().await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
            let config = dw.engine_config().await?;
            println!(
                "Effective: {} {}-{}, {} weeks back",
                config.timezone.name(),
                config.work_start.format("%H:%M"),
                config.work_end.format("%H:%M"),
                config.weeks_back
            );
        }
    }
    Ok(())
}

fn fmt_hours(h: Option<f64>) -> String {
    h.map_or_else(|| "-".to_string(), |h| format!("{h:.1}h"))
}

fn print_import_report(report: &ticketdw::ImportReport) {
    println!("Import");
    println!("  Tickets:        {}", report.tickets_loaded);
    println!("  Closed:         {}", report.tickets_closed);
    println!("  Closed stages:  {}", report.closed_stages);
    println!("  No created_at:  {}", report.tickets_missing_created);
    match report.owners_loaded {
        Some(n) => println!("  Owners:         {n}"),
        None => println!("  Owners:         unchanged"),
    }
}

fn print_rollup_report(report: &ticketdw::RollupReport) {
    println!("Rollup #{} as of {}", report.job_id, report.as_of.to_rfc3339());
    println!("  Weeks:         {}", report.weeks_back);
    if let Some(first) = report.first_week {
        println!("  First week:    {first}");
    }
    println!("  Tickets:       {}", report.tickets);
    println!("  No created_at: {}", report.tickets_missing_created);
    println!("  Rows written:  {}", report.rows_written);
}

fn print_period_report(r: &ticketdw::PeriodReport) {
    println!(
        "Ticket Report: {} ({} .. {})",
        r.period_key,
        r.window.start.to_rfc3339(),
        r.window.end.to_rfc3339()
    );
    println!("  Opened:  {}", r.opened);
    println!("  Closed:  {}", r.closed);
    println!("  Backlog: {}", r.backlog);
    println!("  Resolution (business hours):");
    println!("    Median: {}", fmt_hours(r.resolution.median));
    println!("    P90:    {}", fmt_hours(r.resolution.p90));

    if !r.categories.is_empty() {
        println!("\n  {:<30} {:>7} {:>7} {:>8}", "Category", "Opened", "Closed", "Backlog");
        for c in &r.categories {
            println!("  {:<30} {:>7} {:>7} {:>8}", c.category, c.opened, c.closed, c.backlog);
        }
    }

    if !r.agents.is_empty() {
        println!(
            "\n  {:<30} {:>7} {:>8} {:>8} {:>8}",
            "Agent", "Closed", "Median", "P90", "Backlog"
        );
        for a in &r.agents {
            println!(
                "  {:<30} {:>7} {:>8} {:>8} {:>8}",
                a.owner_name,
                a.closed,
                fmt_hours(a.median_resolution_bh),
                fmt_hours(a.p90_resolution_bh),
                a.assigned_backlog
            );
        }
    }
}

fn print_trend(points: &[ticketdw::TrendPoint]) {
    if points.is_empty() {
        println!("No weekly metrics. Run 'ticketdw rollup' first.");
        return;
    }
    println!(
        "{:<12} {:>7} {:>7} {:>8} {:>8} {:>8}",
        "Week", "Opened", "Closed", "Backlog", "Median", "P90"
    );
    for p in points {
        println!(
            "{:<12} {:>7} {:>7} {:>8} {:>8} {:>8}",
            p.week_start.to_string(),
            p.opened,
            p.closed,
            p.backlog,
            fmt_hours(p.median_bh),
            fmt_hours(p.p90_bh)
        );
    }
}

fn print_status(s: &ticketdw::WarehouseStatus) {
    println!("Warehouse Status");
    println!("  Tickets:      {}", s.tickets);
    println!("  Owners:       {}", s.owners);
    println!("  Weekly rows:  {}", s.weekly_rows);
    println!(
        "  Last import:  {}",
        s.last_import.as_deref().unwrap_or("never")
    );
    println!(
        "  Last rollup:  {}",
        s.last_rollup.as_deref().unwrap_or("never")
    );
}

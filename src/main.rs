use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

use shift_reflect::clock::SystemClock;
use shift_reflect::config::{self, Config};
use shift_reflect::date_index::{date_range, short_label, DateIndex};
use shift_reflect::db::{self, SqliteSheetStore, StatusLabels, StoredReflection};
use shift_reflect::directory::MemberDirectory;
use shift_reflect::lock::LockGate;
use shift_reflect::model::{Member, Submission, WishStatus};
use shift_reflect::reflect::{ReflectionOrchestrator, RunSummary};
use shift_reflect::share::ShareGate;
use shift_reflect::store::SheetStore;
use shift_reflect::timegrid::TimeGrid;
use shift_reflect::worktime::{weekly_totals, WorkSpan};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reflect checked submissions into the daily grids
    Reflect,
    /// Lock and check every submitted member
    CheckAll,
    /// Lock a member's submission
    Lock { member: String },
    /// Unlock a member's submission
    Unlock { member: String },
    /// Add a member at the end of the roster
    AddMember {
        name: String,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        sheet_ref: Option<String>,
    },
    /// Remove a member and their data
    DeleteMember { member: String },
    /// Add schedule dates from..=to
    AddDates {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long)]
        weekdays_only: bool,
    },
    /// Record what a member entered for one date
    Submit {
        member: String,
        date: NaiveDate,
        #[arg(long, value_enum, default_value_t = Wish::Available)]
        wish: Wish,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long, default_value = "")]
        note: String,
    },
    /// Mark a date's schedule finished (or reopen it with --undo)
    Complete {
        date: NaiveDate,
        #[arg(long)]
        undo: bool,
    },
    /// Share every completed date that has not been shared yet
    Share,
    /// Clear checks, reflections and per-date flags for the next term
    ResetTerm,
    /// Print the reflected grid for one date
    Show { date: NaiveDate },
    /// Print a member's weekly reflected hours
    Weekly { member: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Wish {
    Available,
    Unavailable,
}

impl From<Wish> for WishStatus {
    fn from(value: Wish) -> Self {
        match value {
            Wish::Available => WishStatus::Available,
            Wish::Unavailable => WishStatus::Unavailable,
        }
    }
}

struct App {
    cfg: Config,
    sheet: Arc<SqliteSheetStore>,
    directory: MemberDirectory,
}

impl App {
    async fn open(cfg: Config) -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.database_url());
        let pool = db::init_pool(&database_url).await?;
        db::run_migrations(&pool).await?;

        let sheet = Arc::new(SqliteSheetStore::new(
            pool,
            StatusLabels::new(cfg.labels.clone()),
        ));
        let store: Arc<dyn SheetStore> = sheet.clone();
        let directory = MemberDirectory::new(store, Arc::new(SystemClock), cfg.cache_freshness());
        Ok(Self {
            cfg,
            sheet,
            directory,
        })
    }

    fn store(&self) -> Arc<dyn SheetStore> {
        self.sheet.clone()
    }

    async fn resolve(&mut self, key: &str) -> Result<Member> {
        self.directory.load(false).await?;
        self.directory
            .resolve(key)
            .cloned()
            .ok_or_else(|| anyhow!("no member with id or name {key:?}"))
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("loading {}", args.config.display()))?;
    cfg.ensure_dirs()?;

    let mut app = App::open(cfg).await?;
    run(&mut app, args.command).await
}

async fn run(app: &mut App, command: Command) -> Result<ExitCode> {
    match command {
        Command::Reflect => {
            let orchestrator = ReflectionOrchestrator::new(
                app.store(),
                app.cfg.window_parser(),
                app.cfg.grid_builder()?,
                app.cfg.schedule.batch_cap,
            );
            let summary = orchestrator.run_once(&mut app.directory).await?;
            print_run_summary(&summary);
            return Ok(if summary.failed.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }
        Command::CheckAll => {
            let gate = LockGate::new(app.store());
            let summary = gate.check_all_submitted(&mut app.directory).await?;
            if summary.is_empty() {
                println!("no submitted members awaiting check");
            }
            for id in &summary.checked {
                println!("checked {id}");
            }
            for f in &summary.failed {
                println!("FAILED {} ({}): {}", f.member_name, f.member_id, f.reason);
            }
            if !summary.failed.is_empty() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Lock { member } => {
            let member = app.resolve(&member).await?;
            LockGate::new(app.store()).lock(&member.id).await?;
            println!("locked {} ({})", member.name, member.id);
        }
        Command::Unlock { member } => {
            let member = app.resolve(&member).await?;
            LockGate::new(app.store()).unlock(&member.id).await?;
            println!("unlocked {} ({})", member.name, member.id);
        }
        Command::AddMember {
            name,
            display_name,
            sheet_ref,
        } => {
            let id = db::insert_member(
                app.sheet.pool(),
                app.sheet.labels(),
                &name,
                display_name.as_deref().unwrap_or(&name),
                sheet_ref.as_deref(),
            )
            .await?;
            info!(%id, %name, "member added");
            println!("{id}");
        }
        Command::DeleteMember { member } => {
            let member = app.resolve(&member).await?;
            if !db::delete_member(app.sheet.pool(), &member.id).await? {
                return Err(anyhow!("member {} vanished before delete", member.id));
            }
            println!("deleted {} ({})", member.name, member.id);
        }
        Command::AddDates {
            from,
            to,
            weekdays_only,
        } => {
            let dates = date_range(from, to, weekdays_only);
            if dates.is_empty() {
                warn!(%from, %to, "empty date range");
            }
            let added = db::insert_dates(app.sheet.pool(), app.sheet.labels(), &dates).await?;
            println!("added {added} of {} dates", dates.len());
        }
        Command::Submit {
            member,
            date,
            wish,
            start,
            end,
            note,
        } => {
            let member = app.resolve(&member).await?;
            if app.sheet.is_locked(&member.id).await? {
                return Err(anyhow!("{} is locked; unlock before editing", member.name));
            }
            let submission = Submission {
                wish_status: wish.into(),
                raw_start: start,
                raw_end: end,
                note,
            };
            db::record_submission(
                app.sheet.pool(),
                app.sheet.labels(),
                &member.id,
                date,
                &submission,
            )
            .await?;
            println!("recorded {} for {}", date, member.name);
        }
        Command::Complete { date, undo } => {
            ShareGate::new(app.store()).set_complete(date, !undo).await?;
            let state = if undo { "reopened" } else { "completed" };
            println!("{state} {} ({date})", short_label(date));
        }
        Command::Share => {
            let summary = ShareGate::new(app.store()).share_completed().await?;
            if summary.is_empty() {
                println!("no completed dates waiting to be shared");
            }
            for date in &summary.shared {
                println!("shared {} ({date})", short_label(*date));
            }
            for f in &summary.failed {
                println!("FAILED {} ({}): {}", short_label(f.date), f.date, f.reason);
            }
            if !summary.failed.is_empty() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::ResetTerm => {
            let (members, dates) = db::reset_term(app.sheet.pool(), app.sheet.labels()).await?;
            println!("reset {members} members and {dates} dates");
        }
        Command::Show { date } => {
            let grid = app.cfg.time_grid()?;
            let rows = app.sheet.read_reflections(date).await?;
            print_day(&grid, date, &rows);
        }
        Command::Weekly { member } => {
            let member = app.resolve(&member).await?;
            let grid = app.cfg.time_grid()?;
            let dates = DateIndex::build(app.sheet.read_date_list().await?);
            let mut spans = Vec::with_capacity(dates.len());
            for date in dates.iter() {
                let rows = app.sheet.read_reflections(date).await?;
                let span = rows
                    .iter()
                    .find(|r| r.member_id == member.id)
                    .and_then(|r| span_of(&grid, r));
                spans.push(span);
            }
            let totals = weekly_totals(&dates, |d| dates.order_of(d).and_then(|i| spans[i]));
            println!("{} ({})", member.display_name, member.id);
            for (week, total) in totals.iter().enumerate() {
                println!(
                    "  week {}: {} days, {}",
                    week + 1,
                    total.days,
                    total.duration_label()
                );
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn span_of(grid: &TimeGrid, row: &StoredReflection) -> Option<WorkSpan> {
    let available: Vec<bool> = row.slots.iter().map(|s| s.is_available()).collect();
    WorkSpan::from_slots(grid, &available)
}

fn print_run_summary(summary: &RunSummary) {
    println!(
        "eligible {} | reflected {} | records {} | deferred {} | failed members {}",
        summary.eligible,
        summary.processed,
        summary.records_written,
        summary.deferred,
        summary.failed_members()
    );
    for f in &summary.failed {
        let at = f
            .date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "status".to_string());
        println!("FAILED {} ({}) @ {}: {}", f.member_name, f.member_id, at, f.reason);
    }
    if summary.deferred > 0 {
        println!("{} members left for the next run", summary.deferred);
    }
}

fn print_day(grid: &TimeGrid, date: NaiveDate, rows: &[StoredReflection]) {
    println!("{} ({})", short_label(date), date);
    if rows.is_empty() {
        println!("  nothing reflected");
        return;
    }
    let width = rows
        .iter()
        .map(|r| r.display_name.chars().count())
        .max()
        .unwrap_or(0);
    let labels = grid.labels();
    println!(
        "  {:width$}  {}  {}",
        "",
        labels.first().map(String::as_str).unwrap_or(""),
        labels.last().map(String::as_str).unwrap_or("")
    );
    for row in rows {
        let cells: String = row.slots.iter().map(|s| s.as_char()).collect();
        let span = span_of(grid, row)
            .map(|s| format!("{}-{} ({})", s.start_label(), s.end_label(), s.duration_label()))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:width$}  {}  [{} / {}] {}  {}",
            row.display_name, cells, row.start_label, row.end_label, span, row.note
        );
    }
}

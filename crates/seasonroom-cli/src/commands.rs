use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};

use seasonroom_client::dto::active_reservations;
use seasonroom_client::validate::guest_info;
use seasonroom_client::{ApiClient, FileTokenStore, GuestInfo, ReservationSession, TokenPair};
use seasonroom_core::calendar::{format_iso_date, parse_iso_date};
use seasonroom_core::config::Config;
use seasonroom_core::flow::DayState;
use seasonroom_core::occupancy::ratio;
use seasonroom_core::{
    Availability, CalendarDate, Capacity, Clock, CrewId, FlowEvent, MonthBounds,
    OccupancyTier, ReservationStatus, YearMonth,
};

use crate::cli::Invocation;
use crate::render::{DayMark, Renderer};

pub struct AppContext {
    pub cfg: Config,
    pub client: Arc<ApiClient>,
    pub clock: Arc<dyn Clock>,
    pub token_store: Arc<FileTokenStore>,
    pub renderer: Renderer,
}

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "calendar",
        "reserve",
        "cancel",
        "teach",
        "stats",
        "occupancy",
        "me",
        "reservations",
        "login",
        "logout",
        "config",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(ctx, inv), fields(command = %inv.command))]
pub async fn dispatch(ctx: &AppContext, inv: Invocation) -> anyhow::Result<()> {
    debug!(args = ?inv.command_args, "dispatching command");
    let args = inv.command_args.as_slice();

    match inv.command.as_str() {
        "calendar" => cmd_calendar(ctx, args).await,
        "reserve" => cmd_reserve(ctx, args).await,
        "cancel" => cmd_cancel(ctx, args).await,
        "teach" => cmd_teach(ctx, args).await,
        "stats" => cmd_stats(ctx, args).await,
        "occupancy" => cmd_occupancy(ctx, args).await,
        "me" => cmd_me(ctx).await,
        "reservations" => cmd_reservations(ctx).await,
        "login" => cmd_login(ctx, args),
        "logout" => cmd_logout(ctx),
        "config" => cmd_config(&ctx.cfg),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

async fn crew_of_user(ctx: &AppContext) -> anyhow::Result<CrewId> {
    let user = ctx.client.me().await.context("failed to load current user")?;
    let crew = user
        .crew
        .ok_or_else(|| anyhow!("{} has not joined a crew yet", user.name))?;
    debug!(crew_id = crew.crew_id, crew = %crew.crew_name, "resolved crew");
    Ok(crew.crew_id)
}

async fn open_session(ctx: &AppContext) -> anyhow::Result<ReservationSession<Arc<ApiClient>>> {
    let crew_id = crew_of_user(ctx).await?;
    let mut session = ReservationSession::new(Arc::clone(&ctx.client), Arc::clone(&ctx.clock), crew_id);
    session
        .load_settings()
        .await
        .context("failed to load crew settings")?;
    Ok(session)
}

/// The month named in `args`, or the current one, kept inside the season.
fn month_arg(ctx: &AppContext, args: &[String]) -> anyhow::Result<YearMonth> {
    let bounds = ctx.cfg.season_bounds()?;
    match args.first() {
        Some(raw) => {
            let month: YearMonth = raw.parse()?;
            ensure_in_season(&bounds, month)?;
            Ok(month)
        }
        None => Ok(bounds.clamp(YearMonth::of(ctx.clock.today()))),
    }
}

fn ensure_in_season(bounds: &MonthBounds, month: YearMonth) -> anyhow::Result<()> {
    if bounds.clamp(month) != month {
        return Err(anyhow!(
            "{month} is outside the season ({} to {})",
            bounds.start,
            bounds.end
        ));
    }
    Ok(())
}

fn one_date(args: &[String], command: &str) -> anyhow::Result<CalendarDate> {
    match args {
        [raw] => parse_iso_date(raw),
        _ => Err(anyhow!("{command} expects exactly one YYYY-MM-DD date")),
    }
}

fn day_mark(state: DayState, availability: Availability) -> DayMark {
    match state {
        DayState::Reserved {
            status: ReservationStatus::Confirmed,
            teaching: true,
        } => DayMark::Teaching,
        DayState::Reserved {
            status: ReservationStatus::Confirmed,
            ..
        } => DayMark::Confirmed,
        DayState::Reserved { .. } => DayMark::Pending,
        DayState::Selected | DayState::Submitting | DayState::CancelConfirming => {
            DayMark::Selected
        }
        DayState::None => match availability {
            Availability::Past => DayMark::Past,
            a if a.is_available() => DayMark::Open,
            _ => DayMark::Closed,
        },
    }
}

fn report_events(renderer: &Renderer, events: Vec<FlowEvent>) {
    for event in events {
        match event {
            FlowEvent::CommandFailed {
                command,
                dates,
                message,
            } => {
                let dates: Vec<_> = dates.into_iter().map(format_iso_date).collect();
                eprintln!(
                    "{} {command} failed for {}: {message}",
                    renderer.paint("!", "31"),
                    dates.join(", ")
                );
            }
            FlowEvent::DataIntegrityWarning { date, count } => {
                eprintln!(
                    "{} {count} active reservations reported for {date}; showing the first",
                    renderer.paint("!", "33")
                );
            }
            FlowEvent::TeachingReverted { date, teaching } => {
                eprintln!("teaching on {date} reverted to {teaching}");
            }
            other => debug!(event = ?other, "flow event"),
        }
    }
}

#[instrument(skip(ctx, args))]
async fn cmd_calendar(ctx: &AppContext, args: &[String]) -> anyhow::Result<()> {
    info!("command calendar");
    let month = month_arg(ctx, args)?;
    let mut session = open_session(ctx).await?;
    session.show_month(month).await?;

    let window = session.window();
    let board = session.board();
    let lines = ctx
        .renderer
        .month_lines(month, |date| day_mark(board.day_state(date), window.evaluate(date)));
    ctx.renderer.print_lines(&lines)?;

    println!();
    println!("C confirmed  T teaching  P pending  + open for booking");
    println!("confirmed reservations this season: {}", board.usage_count());
    match (window.next_week_open, window.opens_at) {
        (true, _) => println!("next week is open for booking"),
        (false, Some(at)) => println!("next week opens {}", at.format("%a %Y-%m-%d %H:%M")),
        (false, None) => println!("next week has no opening time configured"),
    }

    let bounds = ctx.cfg.season_bounds()?;
    let prev = bounds.prev(month).map(|m| m.to_string()).unwrap_or_else(|| "-".to_string());
    let next = bounds.next(month).map(|m| m.to_string()).unwrap_or_else(|| "-".to_string());
    println!("prev {prev}  next {next}");

    report_events(&ctx.renderer, session.drain_events());
    Ok(())
}

struct ReserveArgs {
    dates: Vec<CalendarDate>,
    guest: Option<GuestInfo>,
}

fn parse_reserve_args(args: &[String]) -> anyhow::Result<ReserveArgs> {
    let mut dates = Vec::new();
    let mut guest = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--guest" {
            let (Some(name), Some(phone)) = (iter.next(), iter.next()) else {
                return Err(anyhow!("--guest expects NAME and PHONE"));
            };
            guest = Some(guest_info(name, phone)?);
            continue;
        }
        dates.push(parse_iso_date(arg)?);
    }
    if dates.is_empty() {
        return Err(anyhow!("reserve expects at least one YYYY-MM-DD date"));
    }
    dates.sort_unstable();
    dates.dedup();
    Ok(ReserveArgs { dates, guest })
}

#[instrument(skip(ctx, args))]
async fn cmd_reserve(ctx: &AppContext, args: &[String]) -> anyhow::Result<()> {
    info!("command reserve");
    let parsed = parse_reserve_args(args)?;
    let mut session = open_session(ctx).await?;

    let mut months: Vec<YearMonth> = parsed.dates.iter().map(|d| YearMonth::of(*d)).collect();
    months.dedup();
    for month in months {
        session.show_month(month).await?;
        for date in parsed.dates.iter().filter(|d| month.contains(**d)) {
            session
                .toggle_select(*date)
                .with_context(|| format!("cannot select {date}"))?;
        }
    }

    let result = session.submit(parsed.guest.as_ref()).await;
    report_events(&ctx.renderer, session.drain_events());
    let report = result?;

    let rejected: Vec<_> = report.rejected.iter().map(|r| r.date).collect();
    for date in parsed.dates.iter().filter(|d| !rejected.contains(d)) {
        let label = match session.board().day_state(*date) {
            DayState::Reserved {
                status: ReservationStatus::Confirmed,
                ..
            } => ctx.renderer.paint("confirmed", "32"),
            _ => ctx.renderer.paint("requested", "33"),
        };
        println!("{date}  {label}");
    }
    for rejection in &report.rejected {
        println!("{}  {}", rejection.date, ctx.renderer.paint(&rejection.reason, "31"));
    }
    if let Some(guest) = &parsed.guest {
        println!("guest: {} ({})", guest.name, guest.phone_number);
    }
    if !report.rejected.is_empty() {
        return Err(anyhow!("{} of {} dates were not reserved", report.rejected.len(), parsed.dates.len()));
    }
    Ok(())
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

#[instrument(skip(ctx, args))]
async fn cmd_cancel(ctx: &AppContext, args: &[String]) -> anyhow::Result<()> {
    info!("command cancel");
    let assume_yes = args.iter().any(|a| a == "--yes" || a == "-y");
    let rest: Vec<String> = args
        .iter()
        .filter(|a| *a != "--yes" && *a != "-y")
        .cloned()
        .collect();
    let date = one_date(&rest, "cancel")?;

    let mut session = open_session(ctx).await?;
    session.show_month(YearMonth::of(date)).await?;
    session.request_cancel(date)?;

    if !assume_yes && !confirm(&format!("Cancel your reservation on {date}?"))? {
        session.dismiss_cancel();
        println!("kept reservation on {date}");
        return Ok(());
    }

    let result = session.confirm_cancel().await;
    report_events(&ctx.renderer, session.drain_events());
    result?;
    println!("cancelled reservation on {date}");
    Ok(())
}

#[instrument(skip(ctx, args))]
async fn cmd_teach(ctx: &AppContext, args: &[String]) -> anyhow::Result<()> {
    info!("command teach");
    let date = one_date(args, "teach")?;
    let mut session = open_session(ctx).await?;
    session.show_month(YearMonth::of(date)).await?;

    let result = session.toggle_teaching(date).await;
    report_events(&ctx.renderer, session.drain_events());
    if result? {
        println!("applied to teach on {date}");
    } else {
        println!("withdrew teaching on {date}");
    }
    Ok(())
}

#[instrument(skip(ctx, args))]
async fn cmd_stats(ctx: &AppContext, args: &[String]) -> anyhow::Result<()> {
    info!("command stats");
    let date = one_date(args, "stats")?;
    let session = open_session(ctx).await?;
    let (summary, tier) = session
        .day_occupancy(date)
        .await
        .with_context(|| format!("failed to load occupancy for {date}"))?;
    let detail = ctx
        .client
        .reservation_detail(session.crew_id(), date)
        .await
        .with_context(|| format!("failed to load reservations for {date}"))?;
    let code = match tier {
        OccupancyTier::Low => "32",
        OccupancyTier::Medium => "33",
        OccupancyTier::High => "31",
    };
    let limit = match summary.capacity {
        Capacity::Limited(cap) => cap.to_string(),
        Capacity::Unlimited => "unlimited".to_string(),
    };
    println!(
        "{}  booked {}/{}  waiting {}  {} ({:.0}%)",
        format_iso_date(date),
        summary.booked,
        limit,
        detail.waiting_count,
        ctx.renderer.paint(&tier.to_string(), code),
        ratio(summary.booked, summary.capacity) * 100.0
    );

    if !detail.member_list.is_empty() {
        println!();
        ctx.renderer.print_members(&detail.member_list)?;
    }
    if !detail.waiting_member_list.is_empty() {
        println!();
        println!("waiting list");
        ctx.renderer.print_members(&detail.waiting_member_list)?;
    }
    Ok(())
}

#[instrument(skip(ctx, args))]
async fn cmd_occupancy(ctx: &AppContext, args: &[String]) -> anyhow::Result<()> {
    info!("command occupancy");
    let month = month_arg(ctx, args)?;
    let crew_id = crew_of_user(ctx).await?;
    let calendar = ctx
        .client
        .crew_calendar(crew_id, month)
        .await
        .context("failed to load crew calendar")?;

    let tiers: std::collections::BTreeMap<_, _> = calendar
        .calendar
        .iter()
        .map(|day| (day.date, day.occupancy_status))
        .collect();
    let lines = ctx.renderer.month_lines(month, |date| {
        tiers
            .get(&date)
            .map(|tier| DayMark::Tier(*tier))
            .unwrap_or(DayMark::Closed)
    });
    ctx.renderer.print_lines(&lines)?;
    println!();
    println!("L under 40%  M under 80%  H 80% or more");
    Ok(())
}

async fn cmd_me(ctx: &AppContext) -> anyhow::Result<()> {
    let user = ctx.client.me().await?;
    ctx.renderer.print_user(&user)
}

async fn cmd_reservations(ctx: &AppContext) -> anyhow::Result<()> {
    let rows = ctx.client.my_reservations().await?;
    let mut reservations = active_reservations(&rows);
    reservations.sort_by_key(|r| r.date);
    if reservations.is_empty() {
        println!("no active reservations");
        return Ok(());
    }
    ctx.renderer.print_reservations(&reservations)
}

fn cmd_login(ctx: &AppContext, args: &[String]) -> anyhow::Result<()> {
    let [access, refresh] = args else {
        return Err(anyhow!("login expects ACCESS_TOKEN REFRESH_TOKEN"));
    };
    ctx.client.login(&TokenPair::new(access.as_str(), refresh.as_str()))?;
    println!("session stored in {}", ctx.token_store.path().display());
    Ok(())
}

fn cmd_logout(ctx: &AppContext) -> anyhow::Result<()> {
    ctx.client.logout()?;
    println!("logged out");
    Ok(())
}

fn cmd_config(cfg: &Config) -> anyhow::Result<()> {
    for (k, v) in cfg.iter() {
        println!("{k}={v}");
    }
    for file in &cfg.loaded_files {
        debug!(file = %file.display(), "rc file in effect");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "Commands: calendar [YYYY-MM], reserve DATE... [--guest NAME PHONE], cancel DATE [--yes], \
         teach DATE, stats DATE, occupancy [YYYY-MM], me, reservations, \
         login ACCESS REFRESH, logout, config, help, version"
    );
    if let Err(err) = io::stdout().flush() {
        warn!(error = %err, "failed flushing help output");
    }
    Ok(())
}

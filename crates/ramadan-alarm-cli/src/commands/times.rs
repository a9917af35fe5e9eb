use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::Args;
use ramadan_alarm_core::{
    next_prayer, prayer_days, Config, Coordinates, EventTimeProvider, OccurrenceResolver,
    SchedulerPolicy,
};
use serde_json::json;

use super::{coordinates, format_local, Context};

#[derive(Args)]
pub struct TimesArgs {
    /// Number of days to show
    #[arg(long, default_value = "7")]
    days: u32,
    /// First day (YYYY-MM-DD, default: today)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Show every prayer of each day instead of sehri and iftar
    #[arg(long, conflicts_with = "next")]
    all: bool,
    /// Show only the next prayer after now
    #[arg(long)]
    next: bool,
    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn hm(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M").to_string()
}

pub fn run(ctx: &Context, args: TimesArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let provider = ctx.provider()?;
    let coords = coordinates(&config)?;
    let from = args.from.unwrap_or_else(|| Local::now().date_naive());

    if args.next {
        return show_next(coords, provider.as_ref(), args.json);
    }
    if args.all {
        return show_all(from, &args, coords, provider.as_ref());
    }

    let resolver = OccurrenceResolver::with_sehri_offset(SchedulerPolicy::from(&config).sehri_offset);
    let days = resolver.upcoming_times(from, args.days, coords, provider.as_ref())?;

    if args.json {
        let rows: Vec<_> = days
            .iter()
            .map(|d| {
                json!({
                    "date": d.date,
                    "sehri": hm(d.sehri),
                    "iftar": hm(d.iftar),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{:<16} {:>6} {:>6}", "Date", "Sehri", "Iftar");
    for d in &days {
        println!(
            "{:<16} {:>6} {:>6}",
            d.date.format("%a %Y-%m-%d").to_string(),
            hm(d.sehri),
            hm(d.iftar),
        );
    }
    Ok(())
}

fn show_all(
    from: NaiveDate,
    args: &TimesArgs,
    coords: Coordinates,
    provider: &dyn EventTimeProvider,
) -> Result<(), Box<dyn std::error::Error>> {
    let days = prayer_days(from, args.days, coords, provider)?;

    if args.json {
        let rows: Vec<_> = days
            .iter()
            .map(|d| {
                let prayers: Vec<_> = d
                    .prayers
                    .iter()
                    .map(|p| json!({ "name": p.name, "time": hm(p.at) }))
                    .collect();
                json!({ "date": d.date, "prayers": prayers })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for d in &days {
        println!("{}", d.date.format("%A, %B %-d"));
        for p in &d.prayers {
            println!("  {:<10} {}", p.name, hm(p.at));
        }
    }
    Ok(())
}

fn show_next(
    coords: Coordinates,
    provider: &dyn EventTimeProvider,
    as_json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let next = next_prayer(&Local::now(), coords, provider)?;

    if as_json {
        let row = next.map(|p| json!({ "name": p.name, "at": p.at }));
        println!("{}", serde_json::to_string_pretty(&row)?);
        return Ok(());
    }

    match next {
        Some(p) => println!("Next prayer: {} at {}", p.name, format_local(p.at)),
        None => println!("No upcoming prayer"),
    }
    Ok(())
}

#![deny(warnings, clippy::all, clippy::pedantic, clippy::nursery)]

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use endoclient::config::Config;
use endoclient::types::parse_wire_time;
use endoclient::{SessionClient, Sport, cli, utils};
use std::path::PathBuf;

#[macro_use]
extern crate endoclient;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    utils::init_logging(cli.verbose, cli.quiet);

    let cfg = Config::load(cli.config.as_deref())?;
    dlog!(
        "config api={} legacy={}",
        cfg.api.base_url,
        cfg.legacy.base_url
    );

    if matches!(cli.cmd, cli::Cmd::Sports) {
        for s in Sport::all() {
            println!("{}\t{}", s.code(), s.name());
        }
        return Ok(());
    }

    let (email, password) = cfg.credentials()?;
    let mut api = SessionClient::new(&cfg).context("Building HTTP client")?;
    api.login(email, password).context("Logging in")?;

    match cli.cmd {
        cli::Cmd::Sports => {}
        cli::Cmd::List {
            limit,
            sport,
            after,
            before,
        } => {
            let list = match (after, before) {
                (Some(a), Some(b)) => {
                    let (a, b) = (parse_cli_time(&a)?, parse_cli_time(&b)?);
                    api.workouts().by_dates(a, b, limit)?
                }
                _ => {
                    let limit = limit.to_string();
                    let sport = sport.map(|s| s.to_string());
                    let mut filters = vec![("limit", limit.as_str())];
                    if let Some(s) = sport.as_deref() {
                        filters.push(("sport", s));
                    }
                    api.workouts().filter(&filters)?
                }
            };

            if list.is_empty() {
                tracing::info!("no workouts found");
            }
            for w in &list {
                println!("{w}\t{}", utils::format_duration(w.duration()));
            }
        }
        cli::Cmd::ExportGpx { id, output } => {
            let w = api
                .workouts()
                .get(&id)
                .with_context(|| format!("Fetching workout {id}"))?;
            let path = output.unwrap_or_else(|| PathBuf::from(format!("{id}.gpx")));
            w.save_gpx(&path)
                .with_context(|| format!("Writing {}", path.display()))?;
            tracing::info!(workout = %w, path = %path.display(), "exported gpx");
        }
        cli::Cmd::Resport { from, to, dry_run } => {
            let target = Sport::from_code(to)?;
            let from_code = from.to_string();
            let list = api.workouts().filter(&[("sport", from_code.as_str())])?;

            let mut changed = 0usize;
            for mut w in list {
                if i64::from(w.sport().code()) != from {
                    continue;
                }
                w.set_sport(to)?;
                if dry_run {
                    println!("would update {w}");
                } else {
                    let id = api.workouts().save(&w)?;
                    println!("updated {id} -> {target}");
                }
                changed += 1;
            }
            tracing::info!(changed, dry_run, "resport done");
        }
        cli::Cmd::Create {
            sport,
            start,
            minutes,
            distance,
            calories,
        } => {
            let sport = Sport::from_code(sport)?;
            let start = parse_cli_time(&start)?;
            let id = api.workouts().create(
                sport,
                start,
                minutes_to_secs(minutes)?,
                distance,
                calories,
            )?;
            println!("{id}");
        }
        cli::Cmd::LogWeight { kg, at } => {
            let at = match at {
                Some(s) => parse_cli_time(&s)?,
                None => Utc::now(),
            };
            api.legacy_api()?.log_weight(kg, at)?;
            tracing::info!(kg, at = %at, "weight logged");
        }
    }

    Ok(())
}

fn minutes_to_secs(minutes: u64) -> Result<u64> {
    let Some(secs) = minutes.checked_mul(60) else {
        bail!("--minutes {minutes} is too large");
    };
    Ok(secs)
}

fn parse_cli_time(s: &str) -> Result<DateTime<Utc>> {
    if let Some(t) = parse_wire_time(s) {
        return Ok(t);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        && let Some(t) = d.and_hms_opt(0, 0, 0)
    {
        return Ok(t.and_utc());
    }
    bail!("Unrecognised time {s:?}; use RFC 3339 or YYYY-MM-DD")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_minutes_to_secs() {
        assert_eq!(minutes_to_secs(45).unwrap(), 2700);
        assert!(minutes_to_secs(u64::MAX).is_err());
        assert!(minutes_to_secs(u64::MAX / 60 + 1).is_err());
    }

    #[test]
    fn test_parse_cli_time_accepts_plain_date() {
        let t = parse_cli_time("2021-06-01").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap());
        assert!(parse_cli_time("June 1st").is_err());
    }
}

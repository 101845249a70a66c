use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{Duration, Utc};
use chrono_tz::Tz;

use crate::model::{parse_instant, BusinessHours, Window};

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Los_Angeles;
pub const DEFAULT_OPEN_HOUR: u32 = 8;
pub const DEFAULT_CLOSE_HOUR: u32 = 17;
/// Default materialization span when no window is configured: today through
/// the close four days out (a business week).
const DEFAULT_WINDOW_DAYS: i64 = 4;

/// Everything the engine needs, assembled up front and passed in explicitly.
/// The core never reads process-global state.
#[derive(Debug, Clone)]
pub struct Config {
    /// Agent id → ICS file backing that agent's calendar.
    pub roster: HashMap<String, PathBuf>,
    pub timezone: Tz,
    pub business_hours: BusinessHours,
    pub window: Window,
}

impl Config {
    /// Build from `FREEBUSY_*` environment variables:
    /// `FREEBUSY_CALENDAR_DIR` (required; every `*.ics` file becomes an
    /// agent named by its file stem), `FREEBUSY_TZ`, `FREEBUSY_OPEN_HOUR`,
    /// `FREEBUSY_CLOSE_HOUR`, `FREEBUSY_WINDOW_START`, `FREEBUSY_WINDOW_END`.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let calendar_dir =
            std::env::var("FREEBUSY_CALENDAR_DIR").unwrap_or_else(|_| "./calendars".into());
        let timezone = match std::env::var("FREEBUSY_TZ") {
            Ok(id) => Tz::from_str(&id).map_err(|_| format!("unknown timezone '{id}'"))?,
            Err(_) => DEFAULT_TIMEZONE,
        };
        let open_hour = env_u32("FREEBUSY_OPEN_HOUR", DEFAULT_OPEN_HOUR);
        let close_hour = env_u32("FREEBUSY_CLOSE_HOUR", DEFAULT_CLOSE_HOUR);
        if open_hour >= close_hour || close_hour > 23 {
            return Err(format!("invalid business hours {open_hour}..{close_hour}").into());
        }
        let business_hours = BusinessHours::new(open_hour, close_hour);

        let window = match (
            std::env::var("FREEBUSY_WINDOW_START").ok(),
            std::env::var("FREEBUSY_WINDOW_END").ok(),
        ) {
            (Some(s), Some(e)) => {
                let start = parse_instant(&s, timezone)
                    .ok_or_else(|| format!("unparseable FREEBUSY_WINDOW_START '{s}'"))?;
                let end = parse_instant(&e, timezone)
                    .ok_or_else(|| format!("unparseable FREEBUSY_WINDOW_END '{e}'"))?;
                if start > end {
                    return Err("FREEBUSY_WINDOW_START is after FREEBUSY_WINDOW_END".into());
                }
                Window::new(start, end)
            }
            _ => default_window(timezone, business_hours)?,
        };

        let roster = scan_calendar_dir(Path::new(&calendar_dir))?;
        Ok(Self {
            roster,
            timezone,
            business_hours,
            window,
        })
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn default_window(
    tz: Tz,
    hours: BusinessHours,
) -> Result<Window, Box<dyn std::error::Error>> {
    let today = Utc::now().with_timezone(&tz).date_naive();
    let last = today + Duration::days(DEFAULT_WINDOW_DAYS);
    let start = hours
        .open_on(today, tz)
        .ok_or("could not resolve business-day open in configured timezone")?;
    let end = hours
        .close_on(last, tz)
        .ok_or("could not resolve business-day close in configured timezone")?;
    Ok(Window::new(start, end))
}

fn scan_calendar_dir(dir: &Path) -> Result<HashMap<String, PathBuf>, Box<dyn std::error::Error>> {
    let mut roster = HashMap::new();
    for entry in std::fs::read_dir(dir)
        .map_err(|e| format!("reading calendar dir {}: {e}", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().is_none_or(|ext| ext != "ics") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            roster.insert(stem.to_string(), path.clone());
        }
    }
    Ok(roster)
}

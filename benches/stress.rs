use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::TimeZone;
use chrono_tz::Tz;

use freebusy::config::Config;
use freebusy::engine::{AvailabilityTable, Engine};
use freebusy::model::{BusinessHours, CalendarEvent, Window, Zoned};
use freebusy::source::FixtureSource;

const TZ: Tz = chrono_tz::America::Los_Angeles;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

fn at(day: u32, hour: u32, min: u32) -> Zoned {
    TZ.with_ymd_and_hms(2024, 12, day, hour, min, 0).unwrap()
}

/// One business week of meetings per agent. Meeting starts are staggered by
/// agent index so no two calendars are identical, which keeps coordination
/// from degenerating into a trivial intersection.
fn build_calendar(agent_idx: usize, meetings_per_day: usize) -> Vec<CalendarEvent> {
    let mut events = Vec::with_capacity(5 * meetings_per_day);
    for day in 2..=6 {
        for m in 0..meetings_per_day {
            let start_min = (agent_idx * 7 + m * 90) as i64 % 480;
            let start = at(day, 8, 0) + chrono::Duration::minutes(start_min);
            let end = start + chrono::Duration::minutes(30);
            events.push(CalendarEvent {
                name: format!("meeting-{day}-{m}"),
                start,
                end,
                description: None,
                location: None,
            });
        }
    }
    events
}

fn setup(n_agents: usize, meetings_per_day: usize) -> (Engine, Vec<String>) {
    let mut source = FixtureSource::new();
    let mut agents = Vec::with_capacity(n_agents);
    for i in 0..n_agents {
        let name = format!("agent{i:03}");
        source = source.with_agent(&name, build_calendar(i, meetings_per_day));
        agents.push(name);
    }

    let config = Config {
        roster: HashMap::new(),
        timezone: TZ,
        business_hours: BusinessHours::new(8, 17),
        window: Window::new(at(2, 8, 0), at(6, 17, 0)),
    };
    println!(
        "  created {n_agents} agents, {} events each",
        5 * meetings_per_day
    );
    (Engine::new(config, Arc::new(source)), agents)
}

fn phase1_table_builds(agents: &[String], meetings_per_day: usize) {
    let n = 500;
    let window = Window::new(at(2, 8, 0), at(6, 17, 0));
    let hours = BusinessHours::new(8, 17);

    let mut event_lists = HashMap::new();
    for (i, agent) in agents.iter().enumerate() {
        let mut events = build_calendar(i, meetings_per_day);
        freebusy::source::sort_events(&mut events);
        event_lists.insert(agent.clone(), events);
    }

    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();
    for _ in 0..n {
        let t = Instant::now();
        let table = AvailabilityTable::build(&event_lists, window, hours).unwrap();
        latencies.push(t.elapsed());
        std::hint::black_box(table);
    }
    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!(
        "  {n} full-roster builds in {:.2}s = {ops:.0} builds/sec",
        elapsed.as_secs_f64()
    );
    print_latency("table build", &mut latencies);
}

fn phase2_point_checks(engine: &Engine, agents: &[String]) {
    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();
    for i in 0..n {
        let agent = &agents[i % agents.len()];
        let day = 2 + (i % 5) as u32;
        let when = at(day, 8, 0) + chrono::Duration::minutes((i % 540) as i64);
        let t = Instant::now();
        engine.point_check(agent, when, 15).unwrap();
        latencies.push(t.elapsed());
    }
    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!(
        "  {n} point checks in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
    print_latency("point check", &mut latencies);
}

fn phase3_range_queries(engine: &Engine, agents: &[String]) {
    let n = 1000;
    let mut latencies = Vec::with_capacity(n);
    let mut slots = 0usize;
    let start = Instant::now();
    for i in 0..n {
        let agent = &agents[i % agents.len()];
        let t = Instant::now();
        let found = engine
            .range_query(agent, at(2, 8, 0), at(6, 17, 0), 30)
            .unwrap();
        latencies.push(t.elapsed());
        slots += found.len();
    }
    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!(
        "  {n} week-wide range queries in {:.2}s = {ops:.0} ops/sec ({} slots/query avg)",
        elapsed.as_secs_f64(),
        slots / n
    );
    print_latency("range query", &mut latencies);
}

fn phase4_coordination(engine: &Engine, agents: &[String]) {
    let n = 200;
    let group: Vec<String> = agents.iter().take(8).cloned().collect();
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();
    for _ in 0..n {
        let t = Instant::now();
        engine
            .coordinate(&group, at(2, 8, 0), at(6, 17, 0), 30)
            .unwrap();
        latencies.push(t.elapsed());
    }
    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!(
        "  {n} eight-agent coordinations in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
    print_latency("coordination", &mut latencies);
}

fn main() {
    let n_agents: usize = std::env::var("FREEBUSY_BENCH_AGENTS")
        .unwrap_or_else(|_| "20".into())
        .parse()
        .expect("invalid FREEBUSY_BENCH_AGENTS");
    let meetings_per_day: usize = std::env::var("FREEBUSY_BENCH_MEETINGS")
        .unwrap_or_else(|_| "5".into())
        .parse()
        .expect("invalid FREEBUSY_BENCH_MEETINGS");

    println!("=== freebusy stress benchmark ===");
    println!("agents: {n_agents}, meetings/day: {meetings_per_day}\n");

    println!("[setup]");
    let (engine, agents) = setup(n_agents, meetings_per_day);

    println!("\n[phase 1] table build throughput");
    phase1_table_builds(&agents, meetings_per_day);

    println!("\n[phase 2] point-check latency");
    phase2_point_checks(&engine, &agents);

    println!("\n[phase 3] range-query latency");
    phase3_range_queries(&engine, &agents);

    println!("\n[phase 4] multi-agent coordination");
    phase4_coordination(&engine, &agents);

    println!("\n=== benchmark complete ===");
}

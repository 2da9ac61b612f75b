use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use clap::Parser;
use garbage_collection::{
    Aggregator, CalendarEvent, EngineSnapshot, GarbageCollectionConfig, ServiceCommand,
    load_config_from_json, load_dates_from_csv, save_config_to_json, save_events_to_csv,
};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cli", about = "Interactive garbage collection schedule console")]
struct Args {
    /// JSON configuration with the schedules to load
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fixed reference time (YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS]); defaults to the local clock
    #[arg(long, value_parser = parse_now)]
    now: Option<NaiveDateTime>,

    /// Override the configured throttle window
    #[arg(long)]
    throttle_secs: Option<i64>,
}

fn parse_now(input: &str) -> Result<NaiveDateTime, String> {
    let input = input.trim();
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(value) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(value);
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("invalid reference time '{input}'"))
}

fn parse_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()
}

fn render_text_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (ci, cell) in row.iter().enumerate() {
            if cell.len() > widths[ci] {
                widths[ci] = cell.len();
            }
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&render_row(&widths, headers.iter().copied()));
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    for row in rows {
        out.push_str(&render_row(&widths, row.iter().map(String::as_str)));
        out.push('\n');
    }
    out.push_str(&sep);
    out.push('\n');
    out
}

fn render_row<'a>(widths: &[usize], cells: impl Iterator<Item = &'a str>) -> String {
    let mut line = String::from("|");
    for (ci, cell) in cells.enumerate() {
        line.push(' ');
        line.push_str(cell);
        line.push_str(&" ".repeat(widths[ci].saturating_sub(cell.len())));
        line.push_str(" |");
    }
    line
}

fn render_schedules(snapshots: &[EngineSnapshot]) -> String {
    let rows: Vec<Vec<String>> = snapshots
        .iter()
        .map(|s| {
            vec![
                s.id.clone(),
                s.title.clone(),
                s.frequency.clone(),
                s.next_date.map(|d| d.to_string()).unwrap_or_default(),
                s.days.map(|d| d.to_string()).unwrap_or_default(),
                s.state.code().to_string(),
                s.label.clone(),
                s.error.clone().unwrap_or_default(),
            ]
        })
        .collect();
    render_text_table(
        &["id", "title", "frequency", "next_date", "days", "state", "label", "error"],
        &rows,
    )
}

fn render_events(events: &[CalendarEvent]) -> String {
    let rows: Vec<Vec<String>> = events
        .iter()
        .map(|e| vec![e.date.to_string(), e.id.clone(), e.title.clone()])
        .collect();
    render_text_table(&["date", "id", "title"], &rows)
}

fn print_help() {
    println!(
        "Commands:\n  help                               Show this help\n  show                               Show every schedule\n  add <id> <YYYY-MM-DD>              Add a manual collection date\n  remove <id> <YYYY-MM-DD>           Remove a collection date\n  update <id>                        Recompute one schedule now\n  refresh                            Throttled recompute of every schedule\n  next                               Show the soonest collection\n  events [start] [end]               List collections in a window (default 365 days)\n  export <path> [start] [end]        Write the event list as CSV\n  exclude <id> <csv_path>            Exclude the dates in a CSV 'date' column\n  now [YYYY-MM-DDTHH:MM[:SS]]        Show or set the reference time\n  load <json_path>                   Replace schedules from a JSON config\n  save <json_path>                   Write the current schedules as JSON config\n  quit|exit                          Exit"
    );
}

struct Session {
    aggregator: Aggregator,
    throttle_seconds: i64,
    fixed_now: Option<NaiveDateTime>,
    throttle_override: Option<i64>,
}

impl Session {
    fn now(&self) -> NaiveDateTime {
        self.fixed_now
            .unwrap_or_else(|| Local::now().naive_local())
    }

    fn install(&mut self, mut config: GarbageCollectionConfig) -> Result<(), String> {
        if let Some(secs) = self.throttle_override {
            config.throttle_seconds = secs;
        }
        let aggregator = config.build_aggregator().map_err(|e| e.to_string())?;
        self.throttle_seconds = config.throttle_seconds;
        self.aggregator = aggregator;
        self.report_errors(self.aggregator.refresh_all(self.now()));
        Ok(())
    }

    fn report_errors(&self, errors: Vec<garbage_collection::ScheduleError>) {
        for err in errors {
            println!("Error: {}", err);
        }
    }

    fn window(&self, start: Option<&str>, end: Option<&str>) -> Result<(NaiveDate, NaiveDate), String> {
        let start = match start {
            Some(s) => parse_date(s).ok_or("Invalid start date (YYYY-MM-DD)")?,
            None => self.now().date(),
        };
        let end = match end {
            Some(s) => parse_date(s).ok_or("Invalid end date (YYYY-MM-DD)")?,
            None => start + Duration::days(365),
        };
        Ok((start, end))
    }

    fn dispatch(&self, command: ServiceCommand) {
        let id = command.entity_id().to_string();
        match self.aggregator.dispatch(command, self.now()) {
            Ok(_) => {
                if let Some(engine) = self.aggregator.get(&id) {
                    let snapshot = engine.lock().snapshot();
                    println!("{}", render_schedules(&[snapshot]));
                }
            }
            Err(e) => println!("Error: {}", e),
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("garbage_collection=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut session = Session {
        aggregator: Aggregator::new(),
        throttle_seconds: GarbageCollectionConfig::default().throttle_seconds,
        fixed_now: args.now,
        throttle_override: args.throttle_secs,
    };

    if let Some(path) = &args.config {
        match load_config_from_json(path).map_err(|e| e.to_string()) {
            Ok(config) => {
                if let Err(e) = session.install(config) {
                    println!("Error loading config: {}", e);
                }
            }
            Err(e) => println!("Error loading config: {}", e),
        }
    }

    println!("Garbage Collection (CLI) - type 'help' for commands\n");
    println!("{}", render_schedules(&session.aggregator.snapshot()));

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "show" => println!("{}", render_schedules(&session.aggregator.snapshot())),
            "add" | "remove" => match (parts.next(), parts.next()) {
                (Some(id), Some(date_s)) => {
                    let Some(date) = parse_date(date_s) else {
                        println!("Invalid date (YYYY-MM-DD)");
                        continue;
                    };
                    let entity_id = id.to_string();
                    let command = if cmd == "add" {
                        ServiceCommand::AddDate { entity_id, date }
                    } else {
                        ServiceCommand::RemoveDate { entity_id, date }
                    };
                    session.dispatch(command);
                }
                _ => println!("Usage: {} <id> <YYYY-MM-DD>", cmd),
            },
            "update" => match parts.next() {
                Some(id) => session.dispatch(ServiceCommand::UpdateState {
                    entity_id: id.to_string(),
                }),
                None => println!("Usage: update <id>"),
            },
            "refresh" => {
                let errors = session.aggregator.refresh_all(session.now());
                session.report_errors(errors);
                println!("{}", render_schedules(&session.aggregator.snapshot()));
            }
            "next" => match session.aggregator.soonest() {
                Some(event) => println!("Next collection: {} {} on {}", event.id, event.title, event.date),
                None => println!("No collection scheduled."),
            },
            "events" => match session.window(parts.next(), parts.next()) {
                Ok((start, end)) => {
                    println!("{}", render_events(&session.aggregator.list_events(start, end)))
                }
                Err(e) => println!("{}", e),
            },
            "export" => {
                let Some(path) = parts.next() else {
                    println!("Usage: export <path> [start] [end]");
                    continue;
                };
                match session.window(parts.next(), parts.next()) {
                    Ok((start, end)) => {
                        let events = session.aggregator.list_events(start, end);
                        match save_events_to_csv(&events, path) {
                            Ok(()) => println!("Exported {} events to {}", events.len(), path),
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    Err(e) => println!("{}", e),
                }
            }
            "exclude" => match (parts.next(), parts.next()) {
                (Some(id), Some(path)) => {
                    let Some(engine) = session.aggregator.get(id) else {
                        println!("Error: unknown entity {}", id);
                        continue;
                    };
                    match load_dates_from_csv(path) {
                        Ok(dates) => {
                            let count = dates.len();
                            let result = engine.lock().exclude_dates(dates, session.now());
                            match result {
                                Ok(_) => {
                                    println!("Excluded {} dates for {}.", count, id);
                                    println!("{}", render_schedules(&[engine.lock().snapshot()]));
                                }
                                Err(e) => println!("Error: {}", e),
                            }
                        }
                        Err(e) => println!("Error: {}", e),
                    }
                }
                _ => println!("Usage: exclude <id> <csv_path>"),
            },
            "now" => match parts.next() {
                Some(value) => match parse_now(value) {
                    Ok(now) => {
                        session.fixed_now = Some(now);
                        println!("Reference time set to {}", now);
                    }
                    Err(e) => println!("{}", e),
                },
                None => println!("Reference time: {}", session.now()),
            },
            "load" => match parts.next() {
                Some(path) => {
                    let loaded = load_config_from_json(path)
                        .map_err(|e| e.to_string())
                        .and_then(|config| session.install(config));
                    match loaded {
                        Ok(()) => {
                            println!("Schedules loaded from {}", path);
                            println!("{}", render_schedules(&session.aggregator.snapshot()));
                        }
                        Err(e) => println!("Error: {}", e),
                    }
                }
                None => println!("Usage: load <json_path>"),
            },
            "save" => match parts.next() {
                Some(path) => {
                    let config =
                        GarbageCollectionConfig::from_aggregator(&session.aggregator, session.throttle_seconds);
                    match save_config_to_json(&config, path) {
                        Ok(()) => println!("Schedules saved to {}", path),
                        Err(e) => println!("Error: {}", e),
                    }
                }
                None => println!("Usage: save <json_path>"),
            },
            _ => println!("Unknown command. Type 'help'."),
        }
    }
}

use chrono::{DateTime, Local, Utc};

use weather_monitor_core::{FetchErrorKind, Lookup, LookupError, NetworkSnapshot, Source, SourceObserver};

fn local_time(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string())
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

pub fn print_sources(sources: &[Source]) {
    println!("{:<3} {:<14} {:<18} {:<8} {:<9} CHECKED", "", "NAME", "LABEL", "PRIORITY", "STATUS");
    for source in sources {
        let mark = if source.is_active() { "*" } else { "" };
        println!(
            "{:<3} {:<14} {:<18} {:<8} {:<9} {}",
            mark,
            source.name(),
            source.label(),
            source.priority(),
            source.status(),
            local_time(source.last_checked()),
        );
    }
}

pub fn print_snapshot(snapshot: &NetworkSnapshot) {
    let latency = match (snapshot.latency, snapshot.latency_grade()) {
        (Some(latency), Some(grade)) => format!("{} ms ({grade})", latency.as_millis()),
        _ => "n/a".to_string(),
    };

    println!("Updated:  {}", local_time(snapshot.updated_at));
    println!("Internet: {}", if snapshot.is_connected() { "connected" } else { "disconnected" });
    println!("Latency:  {latency}");
    println!("IPv6:     {}", yes_no(snapshot.ipv6));

    if snapshot.api_servers.is_empty() {
        println!("API servers: not probed yet");
    } else {
        println!("API servers:");
        for (host, reachable) in &snapshot.api_servers {
            println!("  {host:<32} {}", if *reachable { "reachable" } else { "unreachable" });
        }
    }
}

pub fn print_lookup(lookup: &Lookup) {
    println!("{} via {}", lookup.location, lookup.source.label());
    println!();
    println!("{}", lookup.current);

    for reading in &lookup.forecast {
        println!();
        println!("{reading}");
    }
}

/// One-line hint per error category, shown under the error message.
pub fn lookup_hint(err: &LookupError) -> Option<&'static str> {
    let hint = match err {
        LookupError::NoActiveSource => "Pick a source with --source or `weather-monitor configure`.",
        LookupError::InvalidLocation(_) => return None,
        _ => match err.fetch_kind()? {
            FetchErrorKind::AuthFailure => "Run `weather-monitor configure` to update the API key.",
            FetchErrorKind::RateLimited => "Wait a minute before retrying.",
            FetchErrorKind::Timeout | FetchErrorKind::Unreachable | FetchErrorKind::NetworkError => {
                "Run `weather-monitor status` to check connectivity."
            }
            FetchErrorKind::NotFound => "Check the spelling of the city name.",
            FetchErrorKind::ServiceUnavailable | FetchErrorKind::MalformedResponse => {
                "Try another source with --source."
            }
        },
    };
    Some(hint)
}

/// Prints source status transitions while `watch` runs.
#[derive(Debug, Default)]
pub struct StatusPrinter;

impl SourceObserver for StatusPrinter {
    fn on_source_changed(&self, source: &Source) {
        println!("Active source: {}", source.label());
    }

    fn on_source_status_changed(&self, source: &Source) {
        println!("[{}] {source}", local_time(source.last_checked()));
    }
}

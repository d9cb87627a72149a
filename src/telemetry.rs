use crate::error::Result;
use chrono::{SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::fmt::{self as stdfmt};
use std::sync::Mutex;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::field::{Field, Visit};
use tracing::Event;
use tracing::Subscriber;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::{
    self as fmt_subscriber, format::Writer, FmtContext, FormatEvent, FormatFields,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

const SERVICE_NAME: &str = "wellknown-ready";
const DEFAULT_FILTER: &str = "wellknown_ready=info,info";
const PROBE_DURATION_BUCKETS: [f64; 9] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0];

/// Replicas tracked in the probe registry; the least recently probed is evicted past this.
pub const MAX_TRACKED_REPLICAS: usize = 64;

/// Fields printed right after `msg` when present, ahead of the sorted rest.
const LEADING_FIELDS: [&str; 2] = ["event", "replica"];

pub fn init_tracing() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stdout = std::io::stdout;
    let stderr = std::io::stderr;

    let writer = stdout
        .with_max_level(tracing::Level::INFO)
        .or_else(stderr.with_min_level(tracing::Level::WARN));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .event_format(KeyValueFormatter::new())
        .fmt_fields(fmt_subscriber::format::DefaultFields::new())
        .with_writer(writer)
        .try_init()
        .map_err(|err| crate::err!("failed to initialise tracing subscriber: {err}"))
}

/// One `key=value` line per event.
pub struct KeyValueFormatter {
    service_name: &'static str,
}

impl KeyValueFormatter {
    pub const fn new() -> Self {
        Self {
            service_name: SERVICE_NAME,
        }
    }
}

impl Default for KeyValueFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, N> FormatEvent<S, N> for KeyValueFormatter
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let metadata = event.metadata();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let message = visitor
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());

        let mut leading: Vec<(String, String)> = Vec::new();
        let mut rest: Vec<(String, String)> = Vec::new();
        for (key, value) in visitor.fields {
            if LEADING_FIELDS.contains(&key.as_str()) {
                leading.push((key, value));
            } else {
                rest.push((key, value));
            }
        }
        leading.sort_by_key(|(key, _)| LEADING_FIELDS.iter().position(|name| *name == key.as_str()));
        rest.sort_by(|(lhs, _), (rhs, _)| lhs.cmp(rhs));

        let mut line = String::new();
        push_field(&mut line, "ts", &timestamp);
        push_field(&mut line, "level", metadata.level().as_str());
        push_field(&mut line, "service", self.service_name);
        push_field(&mut line, "component", metadata.target());

        if let Some(span_path) = current_span_path(ctx) {
            push_field(&mut line, "span", &span_path);
        }

        push_field(&mut line, "msg", &message);

        for (key, value) in leading.into_iter().chain(rest) {
            push_field(&mut line, &key, &value);
        }

        writer.write_str(&line)?;
        writer.write_char('\n')
    }
}

fn current_span_path<S, N>(ctx: &FmtContext<'_, S, N>) -> Option<String>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    let span = ctx.lookup_current()?;
    let names: Vec<&str> = span.scope().from_root().map(|s| s.name()).collect();
    if names.is_empty() {
        None
    } else {
        Some(names.join("."))
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Vec<(String, String)>,
}

impl FieldVisitor {
    fn record_field(&mut self, field: &Field, value: String) {
        match field.name() {
            "" => {}
            "message" => self.message = Some(value),
            name => self.fields.push((name.to_string(), value)),
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_field(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn stdfmt::Debug) {
        self.record_field(field, format!("{value:?}"));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_field(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_field(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_field(field, value.to_string());
    }
}

fn encode_field_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\\' | '=' | '\''));

    if !needs_quotes {
        return value.to_string();
    }

    let mut encoded = String::with_capacity(value.len() + 2);
    encoded.push('"');
    for ch in value.chars() {
        match ch {
            '"' => encoded.push_str("\\\""),
            '\\' => encoded.push_str("\\\\"),
            '\n' => encoded.push_str("\\n"),
            '\r' => encoded.push_str("\\r"),
            '\t' => encoded.push_str("\\t"),
            _ => encoded.push(ch),
        }
    }
    encoded.push('"');
    encoded
}

fn push_field(buffer: &mut String, key: &str, value: &str) {
    if !buffer.is_empty() {
        buffer.push(' ');
    }
    buffer.push_str(key);
    buffer.push('=');
    buffer.push_str(&encode_field_value(value));
}

/// Process-wide counters for reconciliation ticks and replica probes.
#[derive(Default)]
pub struct RuntimeCounters {
    ticks: Mutex<BTreeMap<String, u64>>,
    probes: Mutex<ProbeRegistry>,
    probe_durations: Mutex<ProbeDurationBuckets>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeCountersSnapshot {
    pub ticks: Vec<TickOutcomeSnapshot>,
    pub probes: Vec<ProbeOutcomeSnapshot>,
    pub probe_durations: ProbeDurationSnapshot,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickOutcomeSnapshot {
    pub outcome: String,
    pub total: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeOutcomeSnapshot {
    pub replica: String,
    pub success: u64,
    pub failure: u64,
    pub failures_by_kind: Vec<(String, u64)>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProbeDurationSnapshot {
    pub buckets: Vec<(f64, u64)>,
    pub sum: f64,
    pub count: u64,
}

#[derive(Clone, Debug, Default)]
struct ProbeOutcomeEntry {
    success: u64,
    failure: u64,
    failure_kinds: BTreeMap<String, u64>,
    last_seen: u64,
}

/// Per-replica probe outcomes. Replica addresses churn with API server
/// rollouts, so the map is capped at [`MAX_TRACKED_REPLICAS`].
#[derive(Default)]
struct ProbeRegistry {
    entries: BTreeMap<String, ProbeOutcomeEntry>,
    sequence: u64,
}

impl ProbeRegistry {
    fn touch(&mut self, replica: &str) -> &mut ProbeOutcomeEntry {
        self.sequence = self.sequence.wrapping_add(1);
        if !self.entries.contains_key(replica) && self.entries.len() >= MAX_TRACKED_REPLICAS {
            let stale = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(key, _)| key.clone());
            if let Some(stale) = stale {
                self.entries.remove(&stale);
            }
        }
        let entry = self.entries.entry(replica.to_string()).or_default();
        entry.last_seen = self.sequence;
        entry
    }
}

#[derive(Default)]
struct ProbeDurationBuckets {
    counts: [u64; PROBE_DURATION_BUCKETS.len()],
    sum: f64,
    total: u64,
}

impl ProbeDurationBuckets {
    fn observe(&mut self, duration_secs: f64) {
        if let Some(idx) = PROBE_DURATION_BUCKETS
            .iter()
            .position(|boundary| duration_secs <= *boundary)
        {
            self.counts[idx] += 1;
        }
        self.sum += duration_secs;
        self.total += 1;
    }

    fn snapshot(&self) -> ProbeDurationSnapshot {
        let mut cumulative = 0;
        let buckets = PROBE_DURATION_BUCKETS
            .iter()
            .zip(self.counts.iter())
            .map(|(boundary, count)| {
                cumulative += count;
                (*boundary, cumulative)
            })
            .collect();
        ProbeDurationSnapshot {
            buckets,
            sum: self.sum,
            count: self.total,
        }
    }
}

static RUNTIME_COUNTERS: OnceLock<RuntimeCounters> = OnceLock::new();

pub fn runtime_counters() -> &'static RuntimeCounters {
    RUNTIME_COUNTERS.get_or_init(RuntimeCounters::default)
}

impl RuntimeCounters {
    pub fn record_tick(&self, outcome: &str) {
        let mut guard = self.ticks.lock().expect("tick registry poisoned");
        let counter = guard.entry(outcome.to_string()).or_insert(0);
        *counter = counter.saturating_add(1);
    }

    pub fn record_probe_success(&self, replica: &str, elapsed: Duration) {
        let mut guard = self.probes.lock().expect("probe registry poisoned");
        let entry = guard.touch(replica);
        entry.success = entry.success.saturating_add(1);
        drop(guard);
        self.observe_duration(elapsed);
    }

    pub fn record_probe_failure(&self, replica: &str, kind: &str, elapsed: Duration) {
        let mut guard = self.probes.lock().expect("probe registry poisoned");
        let entry = guard.touch(replica);
        entry.failure = entry.failure.saturating_add(1);
        *entry.failure_kinds.entry(kind.to_string()).or_insert(0) += 1;
        drop(guard);
        self.observe_duration(elapsed);
    }

    fn observe_duration(&self, elapsed: Duration) {
        let mut guard = self
            .probe_durations
            .lock()
            .expect("probe duration histogram poisoned");
        guard.observe(elapsed.as_secs_f64());
    }

    pub fn snapshot(&self) -> RuntimeCountersSnapshot {
        let ticks = self
            .ticks
            .lock()
            .expect("tick registry poisoned")
            .iter()
            .map(|(outcome, total)| TickOutcomeSnapshot {
                outcome: outcome.clone(),
                total: *total,
            })
            .collect();

        let probes = self
            .probes
            .lock()
            .expect("probe registry poisoned")
            .entries
            .iter()
            .map(|(replica, entry)| ProbeOutcomeSnapshot {
                replica: replica.clone(),
                success: entry.success,
                failure: entry.failure,
                failures_by_kind: entry
                    .failure_kinds
                    .iter()
                    .map(|(kind, count)| (kind.clone(), *count))
                    .collect(),
            })
            .collect();

        let probe_durations = self
            .probe_durations
            .lock()
            .expect("probe duration histogram poisoned")
            .snapshot();

        RuntimeCountersSnapshot {
            ticks,
            probes,
            probe_durations,
        }
    }
}

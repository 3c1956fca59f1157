use std::fmt::{self, Write as _};

use serde_json::Value;
use tracing::{Event, Span, Subscriber};
use tracing_subscriber::fmt::format::{Format, Json, JsonFields, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Environment;
use crate::context;

pub fn init_logging(env: &Environment) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Default log levels based on environment
        match env {
            Environment::Dev => "call_context=debug,tower_http=debug,info".into(),
            Environment::Staging => "call_context=debug,tower_http=info,info".into(),
            Environment::Prod => "call_context=info,tower_http=info,warn".into(),
        }
    });

    // JSON in production so request_id/session_id/user_id land as fields
    if matches!(env, Environment::Prod) {
        tracing_subscriber::registry()
            .with(filter)
            .with(json_layer(std::io::stdout))
            .init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(!env.is_dev())
            .with_file(env.is_dev())
            .with_line_number(env.is_dev())
            .pretty()
            .map_event_format(CallContextFormat::text);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }

    tracing::info!("Logging initialized for {:?} environment", env);
}

pub type JsonLayer<S, W> =
    tracing_subscriber::fmt::Layer<S, JsonFields, CallContextFormat<Format<Json>>, W>;

/// The production JSON layer, writing to `writer`.
pub fn json_layer<S, W>(writer: W) -> JsonLayer<S, W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_target(true)
        .with_thread_ids(true)
        .map_event_format(CallContextFormat::json)
        .with_writer(writer)
}

/// Log span marking a call's boundaries. The identifiers are not recorded on
/// it; [`CallContextFormat`] stamps them from the call context instead.
pub fn call_span() -> Span {
    tracing::info_span!("call")
}

/// Event formatter that attaches `request_id`, and `session_id`/`user_id`
/// when present, to every line.
///
/// The identifiers are read from the call context bound when the event is
/// emitted, whatever spans the event sits under. Once a call has finished its
/// context is empty, so later lines carry nothing.
#[derive(Debug, Clone)]
pub struct CallContextFormat<E> {
    inner: E,
    json: bool,
}

impl<E> CallContextFormat<E> {
    /// Wrap a formatter that writes one JSON object per line.
    pub fn json(inner: E) -> Self {
        Self { inner, json: true }
    }

    /// Wrap a human-readable formatter; the ids are written as a
    /// `key=value` prefix.
    pub fn text(inner: E) -> Self {
        Self { inner, json: false }
    }
}

impl<S, N, E> FormatEvent<S, N> for CallContextFormat<E>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    E: FormatEvent<S, N>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let Some(ids) = context::current_identifiers() else {
            return self.inner.format_event(ctx, writer, event);
        };

        if !self.json {
            for (key, value) in ids.fields() {
                write!(writer, "{key}={value} ")?;
            }
            return self.inner.format_event(ctx, writer, event);
        }

        let mut line = String::new();
        self.inner.format_event(ctx, Writer::new(&mut line), event)?;
        match line.strip_prefix('{') {
            Some(rest) => {
                writer.write_char('{')?;
                for (key, value) in ids.fields() {
                    write!(writer, "\"{key}\":{},", Value::from(value))?;
                }
                writer.write_str(rest)
            }
            None => writer.write_str(&line),
        }
    }
}

use crate::config::*;
use tracing::{Metadata, Subscriber};
use tracing_core::LevelFilter;
use tracing_subscriber::{filter::filter_fn, prelude::*, registry::LookupSpan, Layer};

use std::{io::Error as IoError, path::Path};

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Whether an entry with the given level and module prefixes accepts `metadata`
fn entry_accepts(level: LevelFilter, modules: &[String], metadata: &Metadata<'_>) -> bool {
    if metadata.level() > &level {
        return false;
    }
    if modules.is_empty() {
        return true;
    }
    metadata
        .module_path()
        .map_or(true, |module| modules.iter().any(|m| module.starts_with(m.as_str())))
}

fn build_target<S>(conf: LogEntry, dir: &Path) -> Result<BoxedLayer<S>, IoError>
where
    S: Subscriber + Send + Sync,
    for<'span> S: LookupSpan<'span>,
{
    let layer = match &conf.target {
        LogTarget::File { filename } => {
            std::fs::create_dir_all(dir)?;
            tracing_subscriber::fmt::layer()
                .with_writer(tracing_appender::rolling::daily(dir, filename))
                .with_ansi(false)
                .boxed()
        }
        LogTarget::Builtin(BuiltinLogTarget::Stdout) => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stdout)
            .boxed(),
        LogTarget::Builtin(BuiltinLogTarget::Stderr) => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let level = conf.level.map_or(LevelFilter::TRACE, LevelFilter::from);
    let modules = conf.modules;
    let filter = filter_fn(move |metadata| entry_accepts(level, &modules, metadata));

    Ok(layer.with_filter(filter).boxed())
}

/// Build a subscriber with one layer per configured log target
pub fn build_subscriber(conf: LoggingConfig) -> Result<impl Subscriber, IoError> {
    let layers = conf
        .targets
        .into_iter()
        .map(|target| build_target(target, &conf.dir))
        .collect::<Result<Vec<_>, _>>()?;

    // Permissive by default; the per-target filters do the real selection.
    // This one only quietens noisy modules everywhere.
    let filter = tracing_subscriber::filter::Targets::new()
        .with_default(LevelFilter::from(conf.default_level.unwrap_or(LogLevel::Trace)))
        .with_targets(
            conf.module_levels
                .into_iter()
                .map(|(module, level)| (module, LevelFilter::from(level))),
        );

    Ok(tracing_subscriber::registry().with(filter).with(layers))
}

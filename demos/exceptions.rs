//! Tour of the exception engine.
//!
//! This example demonstrates:
//! 1. Throwing with `throw!()` and asserting with `thrif!()`
//! 2. Selecting catch clauses by code
//! 3. Rethrowing with a new code and a note
//! 4. Finally steps that run on every path
//! 5. Carrying a typed error as the exception payload
//!
//! Run with `RUST_LOG`-style verbosity by editing the subscriber below; region
//! steps are logged at `trace` level.

use vtry::{
    exception::{self, TraceEntry},
    prelude::*,
};

const PARSE_ERROR: i32 = 22;
const CONFIG_ERROR: i32 = 40;

#[derive(Debug, thiserror::Error)]
enum ConfigError {
    #[error("missing key {0:?}")]
    MissingKey(&'static str),
    #[error("value {value} for {key:?} is out of range")]
    OutOfRange { key: &'static str, value: i64 },
}

fn parse_number(text: &str) -> vtry::Result<i64> {
    match text.trim().parse() {
        Ok(value) => Ok(value),
        Err(error) => throw!(PARSE_ERROR, "cannot parse {text:?}: {error}"),
    }
}

fn config_error(error: ConfigError) -> exception::Thrown {
    exception::throw(
        TraceEntry::new(CONFIG_ERROR)
            .with_message(&error)
            .with_extra(error),
    )
}

fn lookup(config: &[(&'static str, &str)], key: &'static str) -> vtry::Result<i64> {
    let Some((_, text)) = config.iter().find(|(name, _)| *name == key) else {
        return Err(config_error(ConfigError::MissingKey(key)));
    };
    Try::run(|| parse_number(text))
        .catch(PARSE_ERROR, |_| rethrow!(CONFIG_ERROR, "while reading {key:?}"))
        .end()
}

fn worker_count(config: &[(&'static str, &str)]) -> vtry::Result<i64> {
    let workers = lookup(config, "workers")?;
    if !(1..=64).contains(&workers) {
        return Err(config_error(ConfigError::OutOfRange {
            key: "workers",
            value: workers,
        }));
    }
    thrif!(workers % 2 != 0, "worker pools come in pairs");
    Ok(workers)
}

fn report(label: &str, config: &[(&'static str, &str)]) {
    let workers = Try::run(|| worker_count(config))
        .catch(CONFIG_ERROR, |exception| {
            println!("{label}: configuration problem (code {})", exception.code());
            exception::walk_trace(|index, entry| {
                if let Some(error) = entry.downcast_extra::<ConfigError>() {
                    println!("  typed payload: {error:?}");
                }
                println!("  #{index}: {}", entry.message());
            });
            Ok(0)
        })
        .catch_all(|exception| {
            println!("{label}: rejected: {}", exception.message());
            Ok(0)
        })
        .finally(|| {
            println!("{label}: done");
            Ok(())
        })
        .end();

    match workers {
        Ok(0) => {}
        Ok(workers) => println!("{label}: starting {workers} workers"),
        Err(thrown) => println!("{label}: still failing with code {}", thrown.code()),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    report("good", &[("workers", "8")]);
    report("typo", &[("workers", "eight")]);
    report("missing", &[("threads", "8")]);
    report("huge", &[("workers", "1000")]);
    report("odd", &[("workers", "7")]);
}

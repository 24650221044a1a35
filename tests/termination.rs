//! Process termination, observed through a termination handler that panics
//! instead of exiting.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Once,
};

use vtry::{
    exception::{InternalError, Termination, TraceEntry, Try, rethrow, throw},
    hooks::{Hooks, termination::TerminationHandler},
};

struct Terminated {
    status: i32,
    report: String,
}

struct PanicOnTermination;

impl TerminationHandler for PanicOnTermination {
    fn terminate(&self, termination: &Termination) -> ! {
        std::panic::panic_any(Terminated {
            status: termination.exit_status(),
            report: termination.to_string(),
        })
    }
}

fn terminated(f: impl FnOnce()) -> Terminated {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        Hooks::new()
            .termination_handler(PanicOnTermination)
            .tag("termination-tests")
            .install()
            .expect("hooks are installed once");
    });

    let payload = catch_unwind(AssertUnwindSafe(f)).expect_err("the process should terminate");
    *payload
        .downcast::<Terminated>()
        .expect("termination handler payload")
}

#[test]
fn test_throw_outside_region() {
    let terminated = terminated(|| {
        let _ = throw(TraceEntry::new(5).with_message("nobody listens"));
    });
    assert_eq!(terminated.status, 205);
    assert!(
        terminated
            .report
            .starts_with("Uncaught exception (code 5) - terminating. Tag: termination-tests\n")
    );
    assert!(terminated.report.contains("nobody listens"));
}

#[test]
fn test_escaping_outermost_region() {
    let terminated = terminated(|| {
        let _ = Try::run(|| -> vtry::Result<()> { vtry::throw!(70, "escaped") })
            .catch(71, |_| Ok(()))
            .end();
    });
    assert_eq!(terminated.status, 254);
    assert!(terminated.report.contains("rethrown by region end"));
}

#[test]
fn test_uncatchable_reaches_top() {
    let mut caught = Vec::new();
    let terminated = terminated(|| {
        let _ = Try::run(|| {
            Try::run(|| -> vtry::Result<()> {
                Err(throw(TraceEntry::new(9).mark_uncatchable()))
            })
            .catch_all(|_| {
                caught.push("inner");
                Ok(())
            })
            .end()
        })
        .catch_all(|_| {
            caught.push("outer");
            Ok(())
        })
        .end();
    });
    assert_eq!(caught, ["inner", "outer"]);
    assert_eq!(terminated.status, 209);
    assert!(terminated.report.contains("UNCATCHABLE rethrown by region end"));
}

#[test]
fn test_rethrow_outside_catch() {
    let terminated = terminated(|| {
        let _ = rethrow(TraceEntry::new(0));
    });
    assert_eq!(terminated.status, InternalError::IllegalRethrow.exit_status());
    assert!(terminated.report.starts_with("vtry assertion error: "));
}

#[test]
fn test_rethrow_from_finally() {
    let terminated = terminated(|| {
        let _ = Try::run(|| -> vtry::Result<()> { vtry::throw!(3) })
            .catch_all(|_| Ok(()))
            .finally(|| Err(rethrow(TraceEntry::new(0))))
            .end();
    });
    assert_eq!(terminated.status, 252);
}

#[test]
fn test_too_many_regions() {
    fn nest(depth: usize) -> vtry::Result<usize> {
        Try::run(|| nest(depth + 1)).end()
    }

    let terminated = terminated(|| {
        let _ = nest(0);
    });
    assert_eq!(terminated.status, InternalError::TooManyRegions.exit_status());
    assert!(terminated.report.contains("too many nested regions"));
}

#[test]
fn test_region_dropped_without_end() {
    let terminated = terminated(|| {
        drop(Try::run(|| Ok(())));
    });
    assert_eq!(terminated.status, InternalError::UnbalancedEnd.exit_status());
}

#[test]
fn test_outer_step_while_inner_open() {
    let terminated = terminated(|| {
        let outer = Try::run(|| Ok(1));
        let inner = Try::run(|| Ok(2));
        let _ = outer.catch_all(|_| Ok(0));
        let _ = inner.end();
    });
    assert_eq!(terminated.status, InternalError::OutsideRegion.exit_status());
}

#[test]
fn test_outer_end_while_inner_open() {
    let terminated = terminated(|| {
        let outer = Try::run(|| Ok(1));
        let _inner = Try::run(|| Ok(2));
        let _ = outer.end();
    });
    assert_eq!(terminated.status, InternalError::UnbalancedEnd.exit_status());
}

#[test]
fn test_engine_usable_after_termination() {
    let _ = terminated(|| {
        let _ = Try::run(|| Ok(())).finally(|| Err(rethrow(TraceEntry::new(0)))).end();
    });
    let value = Try::run(|| -> vtry::Result<i32> { vtry::throw!(4) })
        .catch(4, |_| Ok(4))
        .end();
    assert_eq!(value.ok(), Some(4));
}

//! Integration tests for protected regions.
//!
//! The `case` tests cover every combination of a body that throws or not, a
//! catch clause that is absent, runs, or throws, and a finally step that is
//! absent, runs, or throws. Each records the steps that ran: `t` body, `c`
//! catch clause, `f` finally step, `!` enclosing catch clause.

use vtry::{
    exception::{
        self, MAX_TRACE, TraceEntry, Try, add_trace_entry, current_exception, walk_trace,
    },
    rethrow, thrif, throw,
};

fn fail() -> vtry::Result<()> {
    throw!(0)
}

#[test]
fn test_case000() {
    let mut trace = String::new();
    Try::run(|| {
        trace.push('t');
        Ok(())
    })
    .end()
    .unwrap();
    assert_eq!(trace, "t");
}

#[test]
fn test_case000f() {
    let mut trace = String::new();
    Try::run(|| {
        trace.push('t');
        Ok(())
    })
    .finally(|| {
        trace.push('f');
        Ok(())
    })
    .end()
    .unwrap();
    assert_eq!(trace, "tf");
}

#[test]
fn test_case000_finally_throws() {
    let mut trace = String::new();
    Try::run(|| {
        Try::run(|| {
            trace.push('t');
            Ok(())
        })
        .finally(|| {
            trace.push('f');
            fail()
        })
        .end()
    })
    .catch_all(|_| {
        trace.push('!');
        Ok(())
    })
    .end()
    .unwrap();
    assert_eq!(trace, "tf!");
}

#[test]
fn test_case010() {
    let mut trace = String::new();
    Try::run(|| {
        trace.push('t');
        Ok(())
    })
    .catch_all(|_| panic!("nothing to catch"))
    .end()
    .unwrap();
    assert_eq!(trace, "t");
}

#[test]
fn test_case010f() {
    let mut trace = String::new();
    Try::run(|| {
        trace.push('t');
        Ok(())
    })
    .catch_all(|_| panic!("nothing to catch"))
    .finally(|| {
        trace.push('f');
        Ok(())
    })
    .end()
    .unwrap();
    assert_eq!(trace, "tf");
}

#[test]
fn test_case010_finally_throws() {
    let mut trace = String::new();
    Try::run(|| {
        Try::run(|| {
            trace.push('t');
            Ok(())
        })
        .catch_all(|_| panic!("nothing to catch"))
        .finally(|| {
            trace.push('f');
            fail()
        })
        .end()
    })
    .catch_all(|_| {
        trace.push('!');
        Ok(())
    })
    .end()
    .unwrap();
    assert_eq!(trace, "tf!");
}

#[test]
fn test_case100() {
    let mut trace = String::new();
    Try::run(|| {
        Try::run(|| {
            trace.push('t');
            fail()
        })
        .end()
    })
    .catch_all(|_| {
        trace.push('!');
        Ok(())
    })
    .end()
    .unwrap();
    assert_eq!(trace, "t!");
}

#[test]
fn test_case100f() {
    let mut trace = String::new();
    Try::run(|| {
        Try::run(|| {
            trace.push('t');
            fail()
        })
        .finally(|| {
            trace.push('f');
            Ok(())
        })
        .end()
    })
    .catch_all(|_| {
        trace.push('!');
        Ok(())
    })
    .end()
    .unwrap();
    assert_eq!(trace, "tf!");
}

#[test]
fn test_case100_finally_throws() {
    let mut trace = String::new();
    Try::run(|| {
        Try::run(|| {
            trace.push('t');
            fail()
        })
        .finally(|| {
            trace.push('f');
            fail()
        })
        .end()
    })
    .catch_all(|_| {
        trace.push('!');
        Ok(())
    })
    .end()
    .unwrap();
    assert_eq!(trace, "tf!");
}

#[test]
fn test_case110() {
    let mut trace = String::new();
    Try::run(|| {
        trace.push('t');
        fail()
    })
    .catch_all(|_| {
        trace.push('c');
        Ok(())
    })
    .end()
    .unwrap();
    assert_eq!(trace, "tc");
}

#[test]
fn test_case110f() {
    let mut trace = String::new();
    Try::run(|| {
        trace.push('t');
        fail()
    })
    .catch_all(|_| {
        trace.push('c');
        Ok(())
    })
    .finally(|| {
        trace.push('f');
        Ok(())
    })
    .end()
    .unwrap();
    assert_eq!(trace, "tcf");
}

#[test]
fn test_case110_finally_throws() {
    let mut trace = String::new();
    Try::run(|| {
        Try::run(|| {
            trace.push('t');
            fail()
        })
        .catch_all(|_| {
            trace.push('c');
            Ok(())
        })
        .finally(|| {
            trace.push('f');
            fail()
        })
        .end()
    })
    .catch_all(|_| {
        trace.push('!');
        Ok(())
    })
    .end()
    .unwrap();
    assert_eq!(trace, "tcf!");
}

#[test]
fn test_case111() {
    let mut trace = String::new();
    Try::run(|| {
        Try::run(|| {
            trace.push('t');
            fail()
        })
        .catch_all(|_| {
            trace.push('c');
            fail()
        })
        .end()
    })
    .catch_all(|_| {
        trace.push('!');
        Ok(())
    })
    .end()
    .unwrap();
    assert_eq!(trace, "tc!");
}

#[test]
fn test_case111f() {
    let mut trace = String::new();
    Try::run(|| {
        Try::run(|| {
            trace.push('t');
            fail()
        })
        .catch_all(|_| {
            trace.push('c');
            fail()
        })
        .finally(|| {
            trace.push('f');
            Ok(())
        })
        .end()
    })
    .catch_all(|_| {
        trace.push('!');
        Ok(())
    })
    .end()
    .unwrap();
    assert_eq!(trace, "tcf!");
}

#[test]
fn test_case111_finally_throws() {
    let mut trace = String::new();
    Try::run(|| {
        Try::run(|| {
            trace.push('t');
            fail()
        })
        .catch_all(|_| {
            trace.push('c');
            fail()
        })
        .finally(|| {
            trace.push('f');
            fail()
        })
        .end()
    })
    .catch_all(|_| {
        trace.push('!');
        Ok(())
    })
    .end()
    .unwrap();
    assert_eq!(trace, "tcf!");
}

#[test]
fn test_finally_failure_replaces_pending_code() {
    let code = Try::run(|| {
        Try::run(|| -> vtry::Result<()> { throw!(3, "first") })
            .finally(|| throw!(4, "second"))
            .end()
            .map(|()| 0)
    })
    .catch_all(|exception| {
        assert_eq!(exception.message(), "second");
        Ok(exception.code())
    })
    .end();
    assert_eq!(code.ok(), Some(4));
}

#[test]
fn test_codes_select_clauses() {
    let mut visited = Vec::new();
    let value = Try::run(|| -> vtry::Result<&'static str> { throw!(12, "twelve") })
        .catch(11, |_| {
            visited.push(11);
            Ok("eleven")
        })
        .catch(12, |exception| {
            visited.push(12);
            assert_eq!(exception.code(), 12);
            Ok("twelve")
        })
        .catch(12, |_| {
            visited.push(-12);
            Ok("again")
        })
        .end();
    assert_eq!(value.ok(), Some("twelve"));
    assert_eq!(visited, [12]);
    assert!(current_exception().is_none());
}

#[test]
fn test_unmatched_code_propagates() {
    let value = Try::run(|| {
        Try::run(|| -> vtry::Result<i32> { throw!(40) })
            .catch(41, |_| Ok(41))
            .end()
    })
    .catch(40, |exception| {
        let mut entries = Vec::new();
        walk_trace(|_, entry| entries.push((entry.code(), entry.message().to_owned())));
        assert_eq!(
            entries,
            [(40, String::new()), (40, "rethrown by region end".to_owned())]
        );
        Ok(exception.code())
    })
    .end();
    assert_eq!(value.ok(), Some(40));
}

#[test]
fn test_rethrow_with_new_code() {
    let value = Try::run(|| {
        Try::run(|| -> vtry::Result<i32> { throw!(5, "io") })
            .catch(5, |_| rethrow!(6, "while reading config"))
            .end()
    })
    .catch(6, |exception| {
        assert_eq!(exception.message(), "io");
        Ok(exception.code())
    })
    .end();
    assert_eq!(value.ok(), Some(6));
}

#[test]
fn test_rethrow_keeps_claimed_code() {
    let value = Try::run(|| {
        Try::run(|| -> vtry::Result<usize> { throw!(8) })
            .catch_all(|_| rethrow!())
            .end()
    })
    .catch(8, |_| Ok(exception::walk_trace(|_, _| {})))
    .end();
    assert_eq!(value.ok(), Some(3));
}

#[test]
fn test_new_throw_clears_uncatchable() {
    let value = Try::run(|| {
        Try::run(|| -> vtry::Result<()> {
            Err(exception::throw(TraceEntry::new(9).mark_uncatchable()))
        })
        .catch_all(|_| throw!(10, "replaced"))
        .end()
    })
    .catch(10, |exception| {
        assert_eq!(exception.message(), "replaced");
        Ok(())
    })
    .end();
    assert!(value.is_ok());
}

#[test]
fn test_thrif() {
    fn check(count: i32) -> vtry::Result<i32> {
        thrif!(count < 0);
        thrif!(count > 8, "max 8 pieces");
        Ok(count)
    }

    let messages: Vec<String> = [-1, 9, 3]
        .into_iter()
        .map(|count| {
            Try::run(|| check(count).map(|count| count.to_string()))
                .catch(1, |exception| Ok(exception.message().to_owned()))
                .end()
                .unwrap()
        })
        .collect();
    assert_eq!(
        messages,
        [
            "Assertion error: count < 0",
            "Assertion error: count > 8; max 8 pieces",
            "3"
        ]
    );
}

#[test]
fn test_trace_is_capped() {
    for index in 0..MAX_TRACE + 5 {
        let recorded = add_trace_entry(TraceEntry::new(1).with_message(index));
        assert_eq!(recorded, index < MAX_TRACE);
    }
    assert_eq!(walk_trace(|_, _| {}), MAX_TRACE);
}

#[test]
fn test_messages_are_truncated() {
    let value = Try::run(|| -> vtry::Result<usize> { throw!(2, "{}", "x".repeat(500)) })
        .catch(2, |exception| Ok(exception.message().chars().count()))
        .end();
    assert_eq!(value.ok(), Some(exception::MAX_TRACE_STRING - 1));
}

#[test]
fn test_extra_payload() {
    Try::run(|| -> vtry::Result<()> {
        Err(exception::throw(
            TraceEntry::new(17).with_extra(vec![1_u8, 2, 3]),
        ))
    })
    .catch(17, |_| {
        let mut payload = None;
        walk_trace(|_, entry| {
            if let Some(bytes) = entry.downcast_extra::<Vec<u8>>() {
                payload = Some(bytes.clone());
            }
        });
        assert_eq!(payload, Some(vec![1, 2, 3]));
        Ok(())
    })
    .end()
    .unwrap();
}

#[test]
fn test_regions_on_threads_are_independent() {
    let handles: Vec<_> = (1..=4)
        .map(|code| {
            std::thread::spawn(move || {
                Try::run(|| -> vtry::Result<i32> { throw!(code, "thread {code}") })
                    .catch(code, |exception| {
                        assert_eq!(exception.message(), format!("thread {code}"));
                        Ok(code)
                    })
                    .end()
                    .ok()
            })
        })
        .collect();
    let codes: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    assert_eq!(codes, [Some(1), Some(2), Some(3), Some(4)]);
}

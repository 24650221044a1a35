/// Throws an exception and returns it from the enclosing function.
///
/// `throw!(code)` throws with an empty message; with more arguments, they are
/// formatted like [`format!()`] into the entry's message. The entry is
/// located at the macro call, or at the caller of an enclosing
/// `#[track_caller]` function.
///
/// This is equivalent to writing
/// `return Err(throw(TraceEntry::new(code).with_message(format_args!(...))));`
///
/// [`format!()`]: std::format
///
/// # Examples
///
/// ```
/// use vtry::{exception::Try, throw};
///
/// fn checked_div(a: i32, b: i32) -> vtry::Result<i32> {
///     if b == 0 {
///         throw!(33, "cannot divide {} by zero", a);
///     }
///     Ok(a / b)
/// }
///
/// let value = Try::run(|| checked_div(4, 0))
///     .catch(33, |_| Ok(i32::MAX))
///     .end();
/// assert_eq!(value.ok(), Some(i32::MAX));
/// ```
#[macro_export]
macro_rules! throw {
    ($code:expr $(,)?) => {
        return $crate::__private::Err($crate::exception::throw(
            $crate::exception::TraceEntry::new($code),
        ))
    };
    ($code:expr, $($arg:tt)+) => {
        return $crate::__private::Err($crate::exception::throw(
            $crate::exception::TraceEntry::new($code)
                .with_message($crate::__private::format_args!($($arg)+)),
        ))
    };
}

/// Rethrows the exception claimed by the enclosing catch clause and returns
/// it from the clause.
///
/// `rethrow!()` keeps the claimed code; `rethrow!(code, ...)` replaces it and
/// formats a message like [`throw!`].
///
/// ```
/// use vtry::{exception::Try, rethrow, throw};
///
/// let outer = Try::run(|| {
///     Try::run(|| -> vtry::Result<()> { throw!(3, "low level") })
///         .catch_all(|_| rethrow!(0, "while loading"))
///         .end()
/// })
/// .catch(3, |exception| {
///     assert_eq!(exception.message(), "low level");
///     Ok(())
/// })
/// .end();
/// assert!(outer.is_ok());
/// ```
#[macro_export]
macro_rules! rethrow {
    () => {
        return $crate::__private::Err($crate::exception::rethrow(
            $crate::exception::TraceEntry::new(0),
        ))
    };
    ($code:expr $(,)?) => {
        return $crate::__private::Err($crate::exception::rethrow(
            $crate::exception::TraceEntry::new($code),
        ))
    };
    ($code:expr, $($arg:tt)+) => {
        return $crate::__private::Err($crate::exception::rethrow(
            $crate::exception::TraceEntry::new($code)
                .with_message($crate::__private::format_args!($($arg)+)),
        ))
    };
}

/// Throws with [`GENERIC_CODE`] when a condition does not hold.
///
/// The message is `"Assertion error: <condition>"`, followed by `"; "` and a
/// formatted note when one is given.
///
/// [`GENERIC_CODE`]: crate::exception::GENERIC_CODE
///
/// ```
/// use vtry::{exception::Try, thrif};
///
/// fn cut(pieces: i32) -> vtry::Result<i32> {
///     thrif!(pieces > 8, "at most 8 pieces, got {pieces}");
///     Ok(pieces)
/// }
///
/// let message = Try::run(|| cut(9).map(|pieces| pieces.to_string()))
///     .catch_all(|exception| Ok(exception.message().to_owned()))
///     .end();
/// assert_eq!(
///     message.ok().as_deref(),
///     Some("Assertion error: pieces > 8; at most 8 pieces, got 9")
/// );
/// ```
#[macro_export]
macro_rules! thrif {
    ($condition:expr $(,)?) => {
        if $condition {
            $crate::throw!(
                $crate::exception::GENERIC_CODE,
                "Assertion error: {}",
                $crate::__private::stringify!($condition)
            );
        }
    };
    ($condition:expr, $($arg:tt)+) => {
        if $condition {
            $crate::throw!(
                $crate::exception::GENERIC_CODE,
                "Assertion error: {}; {}",
                $crate::__private::stringify!($condition),
                $crate::__private::format_args!($($arg)+)
            );
        }
    };
}

/// Declares that a class extends some of its ancestors, enabling free
/// upcasts to them.
///
/// Each relation is checked at compile time: the class's parent must itself
/// be declared to extend the ancestor (or be it).
///
/// ```
/// # use vtry::{class::{Instance, ClassBuilder}, object::{Object, RefCounted}};
/// # #[repr(C)] pub struct Token { base: RefCounted }
/// # unsafe impl Instance for Token {
/// #     type Parent = RefCounted;
/// #     type Params = ();
/// #     const NAME: &'static str = "Token";
/// # }
/// vtry::extends!(Token: RefCounted, Object);
/// ```
#[macro_export]
macro_rules! extends {
    ($class:ty : $($ancestor:ty),+ $(,)?) => {
        $(
            const _: fn() = || {
                fn parent_extends<P: $crate::class::Extends<A>, A: $crate::class::Instance>() {}
                parent_extends::<<$class as $crate::class::Instance>::Parent, $ancestor>();
            };
            // SAFETY: the parent extends the ancestor, checked above.
            unsafe impl $crate::class::Extends<$ancestor> for $class {}
        )+
    };
}

//! Convenience macros for calls and handler failures.

/// Build [`CallArgs`](crate::CallArgs) from `name => value` pairs
///
/// # Examples:
/// ```text
/// // No arguments
/// call_args!()
///
/// // Any serializable value
/// call_args! { "_id" => 7, "tags" => vec!["a", "b"] }
/// ```
#[macro_export]
macro_rules! call_args {
    () => {
        $crate::CallArgs::new()
    };
    ($($name:expr_2021 => $value:expr_2021),+ $(,)?) => {
        $crate::CallArgs::new()$(.arg($name, $value))+
    };
}

/// Create a declared handler failure with a status, message and optional code
///
/// # Usage:
/// ```text
/// // Status and message
/// handler_error!(404, "no such item")
///
/// // With an application error code
/// handler_error!(409, "version conflict", "stale_write")
/// ```
#[macro_export]
macro_rules! handler_error {
    ($status:expr_2021, $message:expr_2021, $code:expr_2021) => {
        $crate::HandlerError::declared($status, $message).with_code($code)
    };
    ($status:expr_2021, $message:expr_2021) => {
        $crate::HandlerError::declared($status, $message)
    };
}

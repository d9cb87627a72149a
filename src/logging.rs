//! Helper macros enforcing consistent log fields for per-replica events.
//!
//! Every probe log carries `replica` (and optionally `url`) so a failing
//! backend can be picked out of the controller's output.

/// Log an event for one replica plus any extra fields.
#[macro_export]
macro_rules! replica_event {
    ($level:ident, $event:expr, replica = $replica:expr, url = $url:expr $(, $field:ident = $value:expr )* $(,)?) => {
        tracing::$level!(
            event = $event,
            replica = %$replica,
            url = %$url,
            $($field = %$value,)*
        )
    };
    ($level:ident, $event:expr, replica = $replica:expr $(, $field:ident = $value:expr )* $(,)?) => {
        tracing::$level!(
            event = $event,
            replica = %$replica,
            $($field = %$value,)*
        )
    };
}

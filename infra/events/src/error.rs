//! # Event Bus Errors

use std::borrow::Cow;

/// A specialized error enum for bus configuration failures.
#[derive(Debug, thiserror::Error)]
pub enum EventsError {
    /// Requested channel capacity is unusable.
    #[error("Invalid capacity{}: {message}", format_context(.context))]
    InvalidCapacity { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

pub(crate) fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

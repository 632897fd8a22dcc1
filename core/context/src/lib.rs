//! The [`Context`] is a general purpose immutable container to carry scoped values around.
//!
//! Session and access operations receive a [`Context`] to access operation scoped values.
//!
//! Contexts are organised into a tree structure:
//!
//! - A root context represents the general process wide scope.
//! - Derived contexts represents a narrower scope within their parent with additional
//!   or updated information attached to them.
//!
//! For example: once the session gate resolves who is using the application it derives
//! a context for the principal so every log line emitted afterwards carries the principal ID.
use opentelemetry_api::trace::TraceContextExt;
use opentelemetry_api::trace::TraceId;
use opentelemetry_api::Context as OtelContext;
use slog::Logger;
use slog::OwnedKV;
use slog::SendSyncRefUnwindSafeKV;

/// The [`Context`] is a general purpose container to carry scoped values around.
///
/// Refer to the [crate level docs](crate) for details.
#[derive(Clone, Debug)]
pub struct Context {
    /// Logger with contextual attributes attached to it.
    pub logger: Logger,

    /// ID of the principal the operation is performed for, once known.
    ///
    /// The initial value of `None` indicates the principal was not resolved (yet).
    pub principal: Option<String>,
}

impl Context {
    /// Derive a new [`Context`] by making changes to the current one.
    pub fn derive(&self) -> ContextBuilder {
        ContextBuilder {
            logger: self.logger.clone(),
            principal: self.principal.clone(),
        }
    }

    /// Derive a new [`Context`] by making changes to the current one using the provided callback.
    pub fn derive_with<F>(&self, callback: F) -> Context
    where
        F: FnOnce(ContextBuilder) -> ContextBuilder,
    {
        let builder = callback(self.derive());
        builder.build()
    }

    /// Initialise a new root context with no values attached.
    pub fn root(logger: Logger) -> ContextBuilder {
        ContextBuilder {
            logger,
            principal: None,
        }
    }
}

/// A builder for root and derived contexts.
pub struct ContextBuilder {
    logger: Logger,
    principal: Option<String>,
}

impl ContextBuilder {
    /// Finalise the build process and return a new [`Context`].
    pub fn build(self) -> Context {
        Context {
            logger: self.logger,
            principal: self.principal,
        }
    }

    /// Decorate the [`Context`]'s logger with the trace ID of the current OpenTelemetry span.
    pub fn log_trace(self) -> Self {
        let context = OtelContext::current();
        let span = context.span();
        let trace_id = span.span_context().trace_id();
        if trace_id == TraceId::INVALID {
            self
        } else {
            let trace_id = trace_id.to_string();
            self.log_values(slog::o!("trace_id" => trace_id))
        }
    }

    /// Update the [`Context`] logger to attach new log key/pair values.
    pub fn log_values<T>(mut self, entries: OwnedKV<T>) -> Self
    where
        T: SendSyncRefUnwindSafeKV + 'static,
    {
        self.logger = self.logger.new(entries);
        self
    }

    /// Scope the context to an identified principal.
    ///
    /// The principal ID is also attached to the logger as the `principal` attribute.
    pub fn principal<S>(mut self, id: S) -> Self
    where
        S: Into<String>,
    {
        let id = id.into();
        self.logger = self.logger.new(slog::o!("principal" => id.clone()));
        self.principal = Some(id);
        self
    }
}

#[cfg(any(test, feature = "test-fixture"))]
impl Context {
    /// Create an empty context useful for test.
    pub fn fixture() -> Context {
        let logger = Logger::root(slog::Discard, slog::o!());
        Context {
            logger,
            principal: None,
        }
    }
}

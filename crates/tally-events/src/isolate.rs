//! # Handler isolation.
//!
//! [`Isolation::isolate`] turns a fallible async handler body into a bus
//! [`Handler`] that always resolves to `()`. Any `Err` returned by the body,
//! and any panic raised while running it, is:
//!
//! 1. passed to the [`ErrorLogger`] once,
//! 2. passed to the [`ExceptionReporter`] once,
//! 3. dropped. Nothing reaches the bus, the publisher, or other handlers.
//!
//! Failures of the logger or reporter themselves are not contained.

use std::borrow::Cow;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;

use crate::bus::Handler;
use crate::error::{HandlerFailure, HandlerPanic};
use crate::event::Event;

/// Logging collaborator for contained failures.
pub trait ErrorLogger: Send + Sync {
    /// Records a failure. Fire-and-forget.
    fn error(&self, failure: &HandlerFailure);
}

/// Exception-reporting collaborator for contained failures.
pub trait ExceptionReporter: Send + Sync {
    /// Forwards a failure to the exception sink. Fire-and-forget.
    fn capture_exception(&self, failure: &HandlerFailure);
}

/// Logs contained failures through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ErrorLogger for TracingLogger {
    fn error(&self, failure: &HandlerFailure) {
        tracing::error!(
            handler = %failure.handler,
            event = %failure.event,
            error = %failure.source,
            "event handler failed"
        );
    }
}

/// Reports contained failures, with their full source chain, on the
/// `exceptions` log target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ExceptionReporter for TracingReporter {
    fn capture_exception(&self, failure: &HandlerFailure) {
        let mut chain = vec![failure.source.to_string()];
        let mut cause = failure.source.source();
        while let Some(err) = cause {
            chain.push(err.to_string());
            cause = err.source();
        }
        tracing::error!(
            target: "exceptions",
            handler = %failure.handler,
            event = %failure.event,
            chain = %chain.join(": "),
            "captured exception"
        );
    }
}

/// The error-containment boundary around bus handlers.
#[derive(Clone)]
pub struct Isolation {
    logger: Arc<dyn ErrorLogger>,
    reporter: Arc<dyn ExceptionReporter>,
}

impl Default for Isolation {
    fn default() -> Self {
        Self::new(Arc::new(TracingLogger), Arc::new(TracingReporter))
    }
}

impl Isolation {
    /// Creates an isolation boundary reporting to the given collaborators.
    pub fn new(logger: Arc<dyn ErrorLogger>, reporter: Arc<dyn ExceptionReporter>) -> Self {
        Self { logger, reporter }
    }

    /// Wraps a fallible handler body into a bus handler that never fails.
    pub fn isolate<F, Fut, E>(&self, name: impl Into<Cow<'static, str>>, body: F) -> Handler
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let body = Arc::new(body);
        let name: Cow<'static, str> = name.into();
        let isolation = self.clone();

        Arc::new(move |event: Arc<Event>| {
            let body = Arc::clone(&body);
            let name = name.clone();
            let isolation = isolation.clone();

            async move {
                let kind = event.kind();
                // Calling the body inside the guarded future catches panics
                // raised before its first await as well.
                let outcome = AssertUnwindSafe(async move { (*body)(event).await })
                    .catch_unwind()
                    .await;

                let source: Box<dyn std::error::Error + Send + Sync> = match outcome {
                    Ok(Ok(())) => return,
                    Ok(Err(err)) => Box::new(err),
                    Err(payload) => Box::new(HandlerPanic::from_payload(payload)),
                };

                isolation.contain(&HandlerFailure {
                    handler: name,
                    event: kind,
                    source,
                });
            }
            .boxed()
        })
    }

    fn contain(&self, failure: &HandlerFailure) {
        self.logger.error(failure);
        self.reporter.capture_exception(failure);
    }
}

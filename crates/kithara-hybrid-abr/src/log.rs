//! Injectable logging for ABR decisions.
//!
//! All diagnostics go through `tracing`. An [`AbrLogger`] decides *where*
//! they end up: the caller's current subscriber, a dedicated [`Dispatch`],
//! a plain callback, or nowhere at all.

use std::{
    fmt::{self, Write as _},
    sync::Arc,
};

use tracing::{
    Dispatch, Event, Level, Metadata, Subscriber,
    field::{Field, Visit},
    span,
};

use crate::config::LogToggles;

/// Logging capability handed to every ABR component at construction.
///
/// Cheap to clone; clones share the same destination.
#[derive(Clone, Default)]
pub struct AbrLogger {
    dispatch: Option<Dispatch>,
    toggles: LogToggles,
}

impl fmt::Debug for AbrLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbrLogger")
            .field("dispatch", &self.dispatch.as_ref().map(|_| "Dispatch"))
            .field("toggles", &self.toggles)
            .finish()
    }
}

impl AbrLogger {
    /// Emit into whatever subscriber is current for the calling thread.
    pub fn inherit() -> Self {
        Self::default()
    }

    /// Drop every event.
    pub fn disabled() -> Self {
        Self {
            dispatch: Some(Dispatch::none()),
            toggles: LogToggles::none(),
        }
    }

    /// Route events into `dispatch` regardless of the thread's default.
    pub fn with_dispatch(dispatch: Dispatch) -> Self {
        Self {
            dispatch: Some(dispatch),
            toggles: LogToggles::default(),
        }
    }

    /// Render each event as a single line and hand it to `callback`.
    ///
    /// Fields other than the message are appended as ` name=value`.
    pub fn from_fn<F>(callback: F) -> Self
    where
        F: Fn(Level, &str) + Send + Sync + 'static,
    {
        Self::with_dispatch(Dispatch::new(CallbackSubscriber {
            callback: Arc::new(callback),
        }))
    }

    /// Restrict output to the enabled levels.
    pub fn with_toggles(mut self, toggles: LogToggles) -> Self {
        self.toggles = toggles;
        self
    }

    pub fn toggles(&self) -> LogToggles {
        self.toggles
    }

    pub fn is_enabled(&self, level: Level) -> bool {
        match level {
            Level::ERROR => self.toggles.error,
            Level::WARN => self.toggles.warn,
            Level::INFO => self.toggles.info,
            _ => self.toggles.trace,
        }
    }

    /// Run `f` with this logger's destination installed.
    pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}

/// `tracing::event!` routed through an [`AbrLogger`] and its level toggles.
macro_rules! abr_log {
    ($logger:expr, $level:ident, $($arg:tt)+) => {{
        let logger: &$crate::log::AbrLogger = &$logger;
        if logger.is_enabled(::tracing::Level::$level) {
            logger.in_scope(|| ::tracing::event!(::tracing::Level::$level, $($arg)+));
        }
    }};
}

pub(crate) use abr_log;

type Callback = Arc<dyn Fn(Level, &str) + Send + Sync>;

struct CallbackSubscriber {
    callback: Callback,
}

impl Subscriber for CallbackSubscriber {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn new_span(&self, _span: &span::Attributes<'_>) -> span::Id {
        span::Id::from_u64(1)
    }

    fn record(&self, _span: &span::Id, _values: &span::Record<'_>) {}

    fn record_follows_from(&self, _span: &span::Id, _follows: &span::Id) {}

    fn event(&self, event: &Event<'_>) {
        let mut line = LineVisitor::default();
        event.record(&mut line);
        (self.callback)(*event.metadata().level(), &line.finish());
    }

    fn enter(&self, _span: &span::Id) {}

    fn exit(&self, _span: &span::Id) {}
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self) -> String {
        let mut line = self.message;
        line.push_str(&self.fields);
        line
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={value}", field.name());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={value:?}", field.name());
        }
    }
}

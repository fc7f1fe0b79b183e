use std::borrow::Cow;
use std::fmt;

use super::run::Flow;
use crate::grammar::ast::{Command, Part, Program};

/// A command handler.
///
/// Receives the running program, the host context, and the command being
/// executed, and tells the engine where to go next.
pub type Handler<C> =
    Box<dyn for<'s> Fn(&Program<'s>, &mut C, &Command<'s>) -> Flow + Send + Sync>;

/// A predicate over command names.
pub type Router = Box<dyn Fn(&Part<'_>) -> bool + Send + Sync>;

/// How a route recognises its commands.
pub enum Matcher {
    /// Byte-for-byte equality with the command name.
    Exact(Cow<'static, str>),
    /// An arbitrary predicate over the command name.
    Predicate(Router),
}

impl Matcher {
    /// True when the command name satisfies this matcher.
    pub fn matches(&self, name: &Part<'_>) -> bool {
        match self {
            Matcher::Exact(exact) => name.as_bytes() == exact.as_bytes(),
            Matcher::Predicate(router) => router(name),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Exact(name) => f.debug_tuple("Exact").field(name).finish(),
            Matcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Lifecycle state of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Matches normally.
    #[default]
    Active,
    /// Matches, but each use logs a warning.
    Deprecated,
    /// Never matches; resolution continues with the next route.
    Removed,
}

/// One entry of a [`Language`] dispatch table.
pub struct Route<C> {
    matcher: Matcher,
    lifecycle: Lifecycle,
    handler: Handler<C>,
}

impl<C> Route<C> {
    /// Route matching one exact command name.
    pub fn exact<F>(name: impl Into<Cow<'static, str>>, handler: F) -> Self
    where
        F: for<'s> Fn(&Program<'s>, &mut C, &Command<'s>) -> Flow + Send + Sync + 'static,
    {
        Self {
            matcher: Matcher::Exact(name.into()),
            lifecycle: Lifecycle::Active,
            handler: Box::new(handler),
        }
    }

    /// Route matching every command name accepted by `router`.
    pub fn predicate<P, F>(router: P, handler: F) -> Self
    where
        P: Fn(&Part<'_>) -> bool + Send + Sync + 'static,
        F: for<'s> Fn(&Program<'s>, &mut C, &Command<'s>) -> Flow + Send + Sync + 'static,
    {
        Self {
            matcher: Matcher::Predicate(Box::new(router)),
            lifecycle: Lifecycle::Active,
            handler: Box::new(handler),
        }
    }

    /// Mark the route deprecated (builder pattern).
    pub fn deprecated(mut self) -> Self {
        self.lifecycle = Lifecycle::Deprecated;
        self
    }

    /// Mark the route removed (builder pattern).
    pub fn removed(mut self) -> Self {
        self.lifecycle = Lifecycle::Removed;
        self
    }

    /// The route's matcher.
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// The route's lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// The route's handler.
    pub fn handler(&self) -> &Handler<C> {
        &self.handler
    }

    /// True when the route takes part in resolution and accepts `name`.
    pub fn accepts(&self, name: &Part<'_>) -> bool {
        self.lifecycle != Lifecycle::Removed && self.matcher.matches(name)
    }
}

impl<C> fmt::Debug for Route<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("matcher", &self.matcher)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

/// Outcome of looking a command up in a [`Language`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Index of the first route that accepted the command.
    Route(usize),
    /// No route matched; the fallback handler applies.
    Fallback,
    /// No route matched and there is no fallback.
    Unknown,
}

/// A command vocabulary: an ordered route table plus an optional fallback.
///
/// `C` is the host context type threaded through every handler. A language
/// is never modified by the engine and can be shared between threads running
/// separate programs.
///
/// ```
/// use pl2b_core::{Flow, Language, Route};
///
/// let lang: Language<Vec<String>> = Language::new("log")
///     .info("collects messages")
///     .route(Route::exact("log", |p, out: &mut Vec<String>, cmd| {
///         out.extend(cmd.args().iter().map(|a| a.to_string()));
///         Flow::next(p, cmd)
///     }));
/// assert_eq!(lang.routes().len(), 1);
/// ```
pub struct Language<C> {
    name: Cow<'static, str>,
    info: Option<Cow<'static, str>>,
    routes: Vec<Route<C>>,
    fallback: Option<Handler<C>>,
}

impl<C> Language<C> {
    /// An empty language with no routes and no fallback.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            info: None,
            routes: Vec::new(),
            fallback: None,
        }
    }

    /// Attach a human-readable description (builder pattern).
    pub fn info(mut self, info: impl Into<Cow<'static, str>>) -> Self {
        self.info = Some(info.into());
        self
    }

    /// Append a route. Routes are tried in insertion order.
    pub fn route(mut self, route: Route<C>) -> Self {
        self.routes.push(route);
        self
    }

    /// Set the handler used when no route matches.
    pub fn fallback<F>(mut self, handler: F) -> Self
    where
        F: for<'s> Fn(&Program<'s>, &mut C, &Command<'s>) -> Flow + Send + Sync + 'static,
    {
        self.fallback = Some(Box::new(handler));
        self
    }

    /// Language name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Language description, if any.
    pub fn description(&self) -> Option<&str> {
        self.info.as_deref()
    }

    /// The route table, in resolution order.
    pub fn routes(&self) -> &[Route<C>] {
        &self.routes
    }

    /// The fallback handler, if any.
    pub fn fallback_handler(&self) -> Option<&Handler<C>> {
        self.fallback.as_ref()
    }

    /// Find the handler for a command: first accepting route, then fallback.
    pub fn resolve(&self, cmd: &Command<'_>) -> Resolution {
        let name = cmd.name();
        if let Some(index) = self.routes.iter().position(|r| r.accepts(name)) {
            Resolution::Route(index)
        } else if self.fallback.is_some() {
            Resolution::Fallback
        } else {
            Resolution::Unknown
        }
    }
}

impl<C> fmt::Debug for Language<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Language")
            .field("name", &self.name)
            .field("info", &self.info)
            .field("routes", &self.routes)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::parser::parse;

    fn noop<'s>(_: &Program<'s>, _: &mut (), _: &Command<'s>) -> Flow {
        Flow::Halt
    }

    fn lookup(lang: &Language<()>, src: &str) -> Resolution {
        let p = parse(src, 8).unwrap();
        lang.resolve(p.get(p.head().unwrap()).unwrap())
    }

    #[test]
    fn first_matching_route_wins() {
        let lang = Language::new("t")
            .route(Route::predicate(|n: &Part<'_>| n.as_bytes().starts_with(b"x"), noop))
            .route(Route::exact("xy", noop));
        assert_eq!(lookup(&lang, "xy"), Resolution::Route(0));
        assert_eq!(lookup(&lang, "y"), Resolution::Unknown);
    }

    #[test]
    fn removed_routes_are_skipped() {
        let lang = Language::new("t")
            .route(Route::exact("a", noop).removed())
            .route(Route::exact("a", noop).deprecated());
        assert_eq!(lookup(&lang, "a"), Resolution::Route(1));
        assert_eq!(lang.routes()[1].lifecycle(), Lifecycle::Deprecated);
    }

    #[test]
    fn fallback_applies_when_nothing_matches() {
        let lang = Language::new("t").route(Route::exact("a", noop)).fallback(noop);
        assert_eq!(lookup(&lang, "b"), Resolution::Fallback);
        assert_eq!(lookup(&lang, "a"), Resolution::Route(0));
    }

    #[test]
    fn exact_match_is_byte_equality() {
        let lang = Language::new("t").route(Route::exact("Set", noop));
        assert_eq!(lookup(&lang, "set"), Resolution::Unknown);
        assert_eq!(lookup(&lang, "\"Set\""), Resolution::Route(0));
    }

    #[test]
    fn metadata_and_debug() {
        let lang = Language::new("demo").info("example").route(Route::exact("a", noop));
        assert_eq!(lang.name(), "demo");
        assert_eq!(lang.description(), Some("example"));
        let dbg = format!("{lang:?}");
        assert!(dbg.contains("Exact(\"a\")"), "{dbg}");
    }
}

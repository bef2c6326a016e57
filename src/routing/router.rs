//! Route table and middleware composition.
//!
//! # Responsibilities
//! - Register handlers for a method and path
//! - Compose global and group middleware around each handler
//! - Translate handler errors through one centralized error handler
//! - Produce the axum router served by the HTTP server
//!
//! # Design Decisions
//! - Middleware is an ordered list of wrapping functions, outer first, folded
//!   into one handler per route when `build` runs
//! - Groups only extend the middleware list; they are not routers themselves
//! - Immutable after `build` (thread-safe without locks)
//! - Errors are translated directly around the handler, so outer middleware
//!   (access log, metrics) observes the final status
//! - Innermost middleware (panic recovery) sits inside group middleware, so
//!   the access log sees a recovered panic as a 500

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::routing::{MethodFilter, MethodRouter};
use futures_util::future::{BoxFuture, FutureExt};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use crate::observability::MetricsSet;
use crate::routing::context::RequestContext;
use crate::routing::error::{translate_error, ErrorHandler, HandlerError};

/// Request extension marking requests served by the fallback handler.
#[derive(Debug, Clone, Copy)]
pub struct Unmatched;

/// Future returned by handlers and middleware.
pub type HandlerFuture = BoxFuture<'static, Result<Response, HandlerError>>;

/// A request handler receiving the resolved context.
pub type Handler = Arc<dyn Fn(RequestContext, Request<Body>) -> HandlerFuture + Send + Sync>;

/// Wraps a handler into another handler.
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// Box an async function or closure as a `Handler`.
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(RequestContext, Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
{
    Arc::new(move |ctx: RequestContext, req: Request<Body>| f(ctx, req).boxed())
}

/// Box a wrapping function as a `Middleware`.
pub fn middleware_fn<F>(f: F) -> Middleware
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Apply `chain` (outer first) around `handler`.
pub fn compose(chain: &[Middleware], handler: Handler) -> Handler {
    chain
        .iter()
        .rev()
        .fold(handler, |next, middleware| middleware(next))
}

struct Target {
    handler: Handler,
    chain: Vec<Middleware>,
}

struct RouteEntry {
    method: MethodFilter,
    path: String,
    target: Target,
}

/// Routes and fallback collected by a builder or a group.
#[derive(Default)]
struct RouteTable {
    routes: Vec<RouteEntry>,
    fallback: Option<Target>,
}

impl RouteTable {
    fn route(&mut self, method: MethodFilter, path: String, handler: Handler) {
        self.routes.push(RouteEntry {
            method,
            path,
            target: Target {
                handler,
                chain: Vec::new(),
            },
        });
    }

    fn fallback(&mut self, handler: Handler) {
        self.fallback = Some(Target {
            handler,
            chain: Vec::new(),
        });
    }

    /// Take over the entries of a finished group, prefixing its middleware.
    fn absorb(&mut self, group: Group) {
        let Group { middleware, table } = group;
        let prefixed = |mut target: Target| {
            let mut chain = middleware.clone();
            chain.append(&mut target.chain);
            target.chain = chain;
            target
        };

        for mut entry in table.routes {
            entry.target = prefixed(entry.target);
            self.routes.push(entry);
        }
        if let Some(fallback) = table.fallback {
            self.fallback = Some(prefixed(fallback));
        }
    }
}

/// Builder for the application router.
pub struct RouterBuilder {
    global: Vec<Middleware>,
    innermost: Vec<Middleware>,
    table: RouteTable,
    error_handler: ErrorHandler,
    metrics: Arc<MetricsSet>,
}

impl RouterBuilder {
    /// New builder with the default error handler.
    pub fn new(metrics: Arc<MetricsSet>) -> Self {
        Self {
            global: Vec::new(),
            innermost: Vec::new(),
            table: RouteTable::default(),
            error_handler: Arc::new(translate_error),
            metrics,
        }
    }

    /// Append global middleware. Runs for every route, outside group middleware.
    pub fn with(&mut self, middleware: Middleware) -> &mut Self {
        self.global.push(middleware);
        self
    }

    /// Append middleware applied directly around every handler, inside group middleware.
    pub fn wrap_handlers(&mut self, middleware: Middleware) -> &mut Self {
        self.innermost.push(middleware);
        self
    }

    /// Replace the centralized error handler.
    pub fn error_handler(&mut self, handler: ErrorHandler) -> &mut Self {
        self.error_handler = handler;
        self
    }

    pub fn route(&mut self, method: MethodFilter, path: impl Into<String>, handler: Handler) -> &mut Self {
        self.table.route(method, path.into(), handler);
        self
    }

    /// Handler for unmatched paths and methods.
    pub fn fallback(&mut self, handler: Handler) -> &mut Self {
        self.table.fallback(handler);
        self
    }

    /// Register routes sharing additional middleware.
    pub fn group(&mut self, build: impl FnOnce(&mut Group)) -> &mut Self {
        let mut group = Group::default();
        build(&mut group);
        self.table.absorb(group);
        self
    }

    /// Freeze the route table into an axum router.
    pub fn build(self) -> axum::Router {
        let dispatch = Arc::new(Dispatch {
            error_handler: self.error_handler,
            metrics: self.metrics,
        });
        let layers = Layers {
            global: self.global,
            innermost: self.innermost,
        };

        let fallback = self
            .table
            .fallback
            .map(|target| Endpoint::new(&layers, target, dispatch.clone()).unmatched());

        let mut by_path: BTreeMap<String, MethodRouter> = BTreeMap::new();
        for entry in self.table.routes {
            let endpoint = Endpoint::new(&layers, entry.target, dispatch.clone());
            let method_router = by_path.remove(&entry.path).unwrap_or_default();
            by_path.insert(entry.path, method_router.on(entry.method, endpoint.into_handler()));
        }

        let mut router = axum::Router::new();
        for (path, mut method_router) in by_path {
            if let Some(fallback) = &fallback {
                method_router = method_router.fallback(fallback.clone().into_handler());
            }
            tracing::debug!(path = %path, "Route registered");
            router = router.route(&path, method_router);
        }
        if let Some(fallback) = fallback {
            router = router.fallback(fallback.into_handler());
        }
        router
    }
}

/// A scope of routes sharing extra middleware.
///
/// Group middleware applies to every route of the group regardless of the
/// order of registration.
#[derive(Default)]
pub struct Group {
    middleware: Vec<Middleware>,
    table: RouteTable,
}

impl Group {
    /// Append middleware for this group (and nested groups).
    pub fn with(&mut self, middleware: Middleware) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    pub fn route(&mut self, method: MethodFilter, path: impl Into<String>, handler: Handler) -> &mut Self {
        self.table.route(method, path.into(), handler);
        self
    }

    pub fn fallback(&mut self, handler: Handler) -> &mut Self {
        self.table.fallback(handler);
        self
    }

    pub fn group(&mut self, build: impl FnOnce(&mut Group)) -> &mut Self {
        let mut nested = Group::default();
        build(&mut nested);
        self.table.absorb(nested);
        self
    }
}

/// Middleware shared by every endpoint, around and inside the group chain.
struct Layers {
    global: Vec<Middleware>,
    innermost: Vec<Middleware>,
}

/// Shared error path of every endpoint.
struct Dispatch {
    error_handler: ErrorHandler,
    metrics: Arc<MetricsSet>,
}

impl Dispatch {
    fn handle_error(&self, ctx: &RequestContext, err: &HandlerError) -> Response {
        self.metrics.record_error(&ctx.host);
        (self.error_handler)(ctx, err)
    }
}

/// A fully composed route handler.
#[derive(Clone)]
struct Endpoint {
    handler: Handler,
    dispatch: Arc<Dispatch>,
    unmatched: bool,
}

impl Endpoint {
    fn new(layers: &Layers, target: Target, dispatch: Arc<Dispatch>) -> Self {
        let chain: Vec<Middleware> = layers
            .global
            .iter()
            .chain(target.chain.iter())
            .chain(layers.innermost.iter())
            .cloned()
            .collect();
        let inner = translate_errors(target.handler, dispatch.clone());
        Self {
            handler: compose(&chain, inner),
            dispatch,
            unmatched: false,
        }
    }

    fn unmatched(mut self) -> Self {
        self.unmatched = true;
        self
    }

    async fn call(self, mut req: Request<Body>) -> Response {
        if self.unmatched {
            req.extensions_mut().insert(Unmatched);
        }
        let ctx = RequestContext::from_request(&req);
        match (self.handler)(ctx.clone(), req).await {
            Ok(response) => response,
            // raised by middleware, the handler's own errors are already translated
            Err(err) => self.dispatch.handle_error(&ctx, &err),
        }
    }

    fn into_handler(self) -> impl Fn(Request<Body>) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static {
        move |req: Request<Body>| self.clone().call(req).boxed()
    }
}

fn translate_errors(handler: Handler, dispatch: Arc<Dispatch>) -> Handler {
    handler_fn(move |ctx, req| {
        let future = handler(ctx.clone(), req);
        let dispatch = dispatch.clone();
        async move {
            match future.await {
                Ok(response) => Ok(response),
                Err(err) => Ok(dispatch.handle_error(&ctx, &err)),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::middleware::recover;
    use crate::observability::metrics::{sample, ERRORS};
    use axum::http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tower::ServiceExt;

    type Trace = Arc<Mutex<Vec<String>>>;

    fn tracing_middleware(trace: Trace, name: &'static str) -> Middleware {
        middleware_fn(move |next| {
            let trace = trace.clone();
            handler_fn(move |ctx, req| {
                trace.lock().unwrap().push(name.to_string());
                next(ctx, req)
            })
        })
    }

    fn tracing_handler(trace: Trace, name: &'static str) -> Handler {
        handler_fn(move |_ctx, _req| {
            let trace = trace.clone();
            async move {
                trace.lock().unwrap().push(name.to_string());
                Ok(Response::new(Body::from(name)))
            }
        })
    }

    fn failing_handler(err: fn() -> HandlerError) -> Handler {
        handler_fn(move |_ctx, _req| async move { Err(err()) })
    }

    async fn get(router: &axum::Router, uri: &str) -> (StatusCode, String) {
        send(router, "GET", uri).await
    }

    async fn send(router: &axum::Router, method: &str, uri: &str) -> (StatusCode, String) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("Host", "detector.example")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn metrics() -> Arc<MetricsSet> {
        Arc::new(MetricsSet::new().unwrap())
    }

    #[tokio::test]
    async fn test_group_middleware_runs_before_handler() {
        let trace = Trace::default();
        let mut builder = RouterBuilder::new(metrics());
        builder.with(tracing_middleware(trace.clone(), "global"));
        builder.group(|g| {
            // registered before the middleware, still wrapped
            g.route(MethodFilter::GET, "/inside", tracing_handler(trace.clone(), "handler"));
            g.with(tracing_middleware(trace.clone(), "group"));
        });
        builder.route(MethodFilter::GET, "/outside", tracing_handler(trace.clone(), "outside"));
        let router = builder.build();

        for _ in 0..2 {
            assert_eq!(get(&router, "/inside").await, (StatusCode::OK, "handler".to_string()));
        }
        assert_eq!(get(&router, "/outside").await.0, StatusCode::OK);

        assert_eq!(
            *trace.lock().unwrap(),
            vec!["global", "group", "handler", "global", "group", "handler", "global", "outside"]
        );
    }

    #[tokio::test]
    async fn test_nested_groups_compose_outer_to_inner() {
        let trace = Trace::default();
        let mut builder = RouterBuilder::new(metrics());
        builder.group(|outer| {
            outer.with(tracing_middleware(trace.clone(), "outer"));
            outer.group(|inner| {
                inner.with(tracing_middleware(trace.clone(), "inner"));
                inner.route(MethodFilter::GET, "/nested", tracing_handler(trace.clone(), "handler"));
            });
        });
        let router = builder.build();

        get(&router, "/nested").await;
        assert_eq!(*trace.lock().unwrap(), vec!["outer", "inner", "handler"]);
    }

    #[tokio::test]
    async fn test_error_handler_invoked_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let metrics = metrics();
        let mut builder = RouterBuilder::new(metrics.clone());
        let counter = calls.clone();
        builder.error_handler(Arc::new(move |ctx: &RequestContext, err: &HandlerError| {
            counter.fetch_add(1, Ordering::SeqCst);
            translate_error(ctx, err)
        }));
        builder.route(
            MethodFilter::GET,
            "/teapot",
            failing_handler(|| HandlerError::http(StatusCode::IM_A_TEAPOT, "short and stout")),
        );
        builder.route(
            MethodFilter::GET,
            "/boom",
            failing_handler(|| HandlerError::internal("boom")),
        );
        let router = builder.build();

        assert_eq!(get(&router, "/teapot").await, (StatusCode::IM_A_TEAPOT, String::new()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            sample(&metrics.render(), ERRORS, &["host=\"detector.example\""]),
            Some(1.0)
        );

        assert_eq!(
            get(&router, "/boom").await,
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            sample(&metrics.render(), ERRORS, &["host=\"detector.example\""]),
            Some(2.0)
        );
    }

    #[tokio::test]
    async fn test_middleware_observes_translated_error() {
        let seen = Arc::new(Mutex::new(None));
        let observed = seen.clone();
        let observer = middleware_fn(move |next| {
            let observed = observed.clone();
            handler_fn(move |ctx, req| {
                let next = next.clone();
                let observed = observed.clone();
                async move {
                    let result = next(ctx, req).await;
                    *observed.lock().unwrap() = result.as_ref().ok().map(|r| r.status());
                    result
                }
            })
        });

        let mut builder = RouterBuilder::new(metrics());
        builder.with(observer);
        builder.route(MethodFilter::GET, "/boom", failing_handler(|| HandlerError::internal("boom")));
        let router = builder.build();

        get(&router, "/boom").await;
        assert_eq!(*seen.lock().unwrap(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    fn status_observer(seen: Arc<Mutex<Option<StatusCode>>>) -> Middleware {
        middleware_fn(move |next| {
            let seen = seen.clone();
            handler_fn(move |ctx, req| {
                let next = next.clone();
                let seen = seen.clone();
                async move {
                    let result = next(ctx, req).await;
                    *seen.lock().unwrap() = result.as_ref().ok().map(|r| r.status());
                    result
                }
            })
        })
    }

    #[tokio::test]
    async fn test_group_middleware_observes_recovered_panic() {
        let seen = Arc::new(Mutex::new(None));
        let trace = Trace::default();
        let mut builder = RouterBuilder::new(metrics());
        builder.with(tracing_middleware(trace.clone(), "global"));
        builder.wrap_handlers(recover());
        builder.group(|g| {
            g.with(status_observer(seen.clone()));
            g.with(tracing_middleware(trace.clone(), "group"));
            g.route(
                MethodFilter::GET,
                "/panic",
                handler_fn(|_ctx, _req| async move {
                    if true {
                        panic!("handler exploded");
                    }
                    Ok(Response::new(Body::empty()))
                }),
            );
        });
        let router = builder.build();

        assert_eq!(
            get(&router, "/panic").await,
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        );
        assert_eq!(*seen.lock().unwrap(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(*trace.lock().unwrap(), vec!["global", "group"]);
    }

    #[tokio::test]
    async fn test_middleware_error_is_translated() {
        let metrics = metrics();
        let mut builder = RouterBuilder::new(metrics.clone());
        builder.with(middleware_fn(|_next| {
            handler_fn(|_ctx, _req| async { Err(HandlerError::http(StatusCode::BAD_GATEWAY, "upstream")) })
        }));
        builder.route(MethodFilter::GET, "/", handler_fn(|_, _| async { Ok(Response::new(Body::empty())) }));
        let router = builder.build();

        assert_eq!(get(&router, "/").await.0, StatusCode::BAD_GATEWAY);
        assert_eq!(sample(&metrics.render(), ERRORS, &[]), Some(1.0));
    }

    #[tokio::test]
    async fn test_fallback_for_unknown_path_and_method() {
        let trace = Trace::default();
        let mut builder = RouterBuilder::new(metrics());
        builder.route(MethodFilter::GET, "/image", tracing_handler(trace.clone(), "image"));
        builder.group(|g| {
            g.with(tracing_middleware(trace.clone(), "group"));
            g.fallback(tracing_handler(trace.clone(), "fallback"));
        });
        let router = builder.build();

        assert_eq!(get(&router, "/nope").await, (StatusCode::OK, "fallback".to_string()));
        assert_eq!(send(&router, "POST", "/image").await, (StatusCode::OK, "fallback".to_string()));
        assert_eq!(get(&router, "/image").await, (StatusCode::OK, "image".to_string()));
        assert_eq!(
            *trace.lock().unwrap(),
            vec!["group", "fallback", "group", "fallback", "image"]
        );
    }

    #[tokio::test]
    async fn test_fallback_requests_are_marked() {
        let echo_mark = || {
            handler_fn(|_ctx, req: Request<Body>| async move {
                let marked = req.extensions().get::<Unmatched>().is_some();
                Ok(Response::new(Body::from(marked.to_string())))
            })
        };
        let mut builder = RouterBuilder::new(metrics());
        builder.route(MethodFilter::GET, "/image", echo_mark());
        builder.fallback(echo_mark());
        let router = builder.build();

        assert_eq!(get(&router, "/image").await.1, "false");
        assert_eq!(get(&router, "/nope").await.1, "true");
        assert_eq!(send(&router, "POST", "/image").await.1, "true");
    }

    #[tokio::test]
    async fn test_context_is_threaded_through_chain() {
        let mut builder = RouterBuilder::new(metrics());
        builder.with(middleware_fn(|next| {
            handler_fn(move |mut ctx, req| {
                ctx.host = format!("resolved-{}", ctx.host);
                next(ctx, req)
            })
        }));
        builder.route(
            MethodFilter::GET,
            "/host",
            handler_fn(|ctx, _req| async move { Ok(Response::new(Body::from(ctx.host))) }),
        );
        let router = builder.build();

        assert_eq!(
            get(&router, "/host").await,
            (StatusCode::OK, "resolved-detector.example".to_string())
        );
    }

    #[tokio::test]
    async fn test_methods_share_a_path() {
        let trace = Trace::default();
        let mut builder = RouterBuilder::new(metrics());
        builder.route(MethodFilter::GET, "/thing", tracing_handler(trace.clone(), "get"));
        builder.route(MethodFilter::POST, "/thing", tracing_handler(trace.clone(), "post"));
        let router = builder.build();

        assert_eq!(get(&router, "/thing").await.1, "get");
        assert_eq!(send(&router, "POST", "/thing").await.1, "post");
    }
}

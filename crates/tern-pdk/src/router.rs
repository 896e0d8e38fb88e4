//! HTTP route table.
//!
//! Two-level lookup (method, then exact path) over handlers registered once
//! at build time. The table is never mutated afterwards, so concurrent
//! dispatch reads it without locking.

use std::collections::HashMap;

use futures::future::BoxFuture;

use crate::context::HttpContext;

/// Boxed async route handler: context in, answered context out.
pub type RouteHandler = Box<dyn Fn(HttpContext) -> BoxFuture<'static, HttpContext> + Send + Sync>;

/// The plugin's HTTP routes below its server-side mount point.
#[derive(Default)]
pub struct Router {
    get: HashMap<String, RouteHandler>,
    post: HashMap<String, RouteHandler>,
}

impl Router {
    /// Register a handler for GET requests on `path`.
    pub fn get<H>(&mut self, path: impl Into<String>, handler: H)
    where
        H: Fn(HttpContext) -> BoxFuture<'static, HttpContext> + Send + Sync + 'static,
    {
        self.get.insert(path.into(), Box::new(handler));
    }

    /// Register a handler for POST requests on `path`.
    pub fn post<H>(&mut self, path: impl Into<String>, handler: H)
    where
        H: Fn(HttpContext) -> BoxFuture<'static, HttpContext> + Send + Sync + 'static,
    {
        self.post.insert(path.into(), Box::new(handler));
    }

    fn lookup(&self, method: &str, path: &str) -> Option<&RouteHandler> {
        if method.eq_ignore_ascii_case("GET") {
            self.get.get(path)
        } else if method.eq_ignore_ascii_case("POST") {
            self.post.get(path)
        } else {
            None
        }
    }

    /// Resolve and run the handler, or answer the generic not-found.
    pub(crate) async fn dispatch(&self, mut ctx: HttpContext) -> HttpContext {
        match self.lookup(&ctx.request().method, &ctx.request().path) {
            Some(handler) => handler(ctx).await,
            None => {
                ctx.not_found();
                ctx
            }
        }
    }
}

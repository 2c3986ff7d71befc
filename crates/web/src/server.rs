//! The server: one listener, one connection task per peer, and the
//! request-to-page pipeline in between.
//!
//! [`Server`] implements the transport crate's `Handler`, so the connection
//! layer hands it one parsed head and a borrowed body per exchange. The
//! pipeline is: negotiate the response coding, resolve a route (flat tier,
//! template tree, then raced fallbacks), consume the body if the route asked
//! for one, negotiate the representation, render, compress, respond.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::{Method, Response, StatusCode};
use landing_http::connection::Connection;
use landing_http::handler::Handler;
use landing_http::ingest::{IngestConfig, ingest_body};
use landing_http::negotiate::{select_accept, select_encoding};
use landing_http::protocol::{BodySource, HttpError, RequestHead};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::encoding;
use crate::handler::{PageHandler, PageResponse, RenderContext};
use crate::router::{FallbackRoutes, RootRouter, Route};

const TEXT_HTML: &str = "text/html; charset=utf-8";

const NOT_FOUND_PAGE: &str = "<!doctype html>\
<html><head><title>404</title></head>\
<body><h1>404</h1><p>There is no such page.</p></body></html>";

pub struct ServerBuilder {
    address: Option<String>,
    router: Option<RootRouter>,
    fallbacks: FallbackRoutes,
    not_found: Option<Arc<dyn PageHandler>>,
    ingest: IngestConfig,
    log_level: Level,
}

impl ServerBuilder {
    fn new() -> Self {
        Self {
            address: None,
            router: None,
            fallbacks: FallbackRoutes::new(),
            not_found: None,
            ingest: IngestConfig::default(),
            log_level: Level::INFO,
        }
    }

    /// The address to listen on, e.g. `"127.0.0.1:8080"`.
    pub fn bind(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn router(mut self, router: RootRouter) -> Self {
        self.router = Some(router);
        self
    }

    /// Candidates raced when no registered route matches.
    pub fn fallbacks(mut self, fallbacks: FallbackRoutes) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    /// The page rendered when nothing matches at all. Without one, a plain
    /// built-in 404 page is served.
    pub fn not_found(mut self, handler: impl PageHandler + 'static) -> Self {
        self.not_found = Some(Arc::new(handler));
        self
    }

    /// Body ingestion limits and strategies for routes that consume one.
    pub fn ingest(mut self, config: IngestConfig) -> Self {
        self.ingest = config;
        self
    }

    pub fn log_level(mut self, level: Level) -> Self {
        self.log_level = level;
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        Ok(Server {
            address: self.address.ok_or(ServerBuildError::MissingAddress)?,
            router: self.router.ok_or(ServerBuildError::MissingRouter)?,
            fallbacks: self.fallbacks,
            not_found: self.not_found,
            ingest: self.ingest,
            log_level: self.log_level,
        })
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("router must be set")]
    MissingRouter,
    #[error("address must be set")]
    MissingAddress,
}

pub struct Server {
    address: String,
    router: RootRouter,
    fallbacks: FallbackRoutes,
    not_found: Option<Arc<dyn PageHandler>>,
    ingest: IngestConfig,
    log_level: Level,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Binds and serves until the process ends.
    pub async fn start(self) {
        let subscriber = FmtSubscriber::builder().with_max_level(self.log_level).finish();
        tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

        let listener = match TcpListener::bind(self.address.as_str()).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(cause = %e, address = %self.address, "bind failed");
                return;
            }
        };
        info!(address = %self.address, "listening");
        for (shape, doc) in self.router.routes() {
            debug!(route = shape, summary = %doc.summary, "registered");
        }

        let server = Arc::new(self);
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let handler = Arc::clone(&server);
            tokio::spawn(async move {
                let (reader, writer) = stream.into_split();
                match Connection::new(reader, writer).serve(handler).await {
                    Ok(()) => debug!(%peer, "connection closed"),
                    Err(e) => warn!(cause = %e, %peer, "connection ended with an error"),
                }
            });
        }
    }

    /// Runs one request through routing, ingestion and rendering.
    async fn respond(&self, head: RequestHead, body: BodySource<'_>) -> Result<Response<Bytes>, HttpError> {
        let Some(coding) = select_encoding(&head.accept_encoding()?) else {
            return Err(HttpError::NotAcceptable);
        };
        let elide_body = head.method() == Method::HEAD;

        let page = if let Some(resolved) = self.router.resolve(head.method(), head.target()) {
            self.render_route(resolved.route, resolved.params, head, body).await?
        } else if let Some(handler) = self.fallbacks.resolve(head.uri().path()).await {
            let ctx = RenderContext::new(Arc::new(head), Vec::new(), None, TEXT_HTML);
            handler.render(ctx).await?
        } else {
            let ctx = RenderContext::new(Arc::new(head), Vec::new(), None, TEXT_HTML);
            match &self.not_found {
                Some(custom) => custom.render(ctx).await?,
                None => PageResponse::html(NOT_FOUND_PAGE).with_status(StatusCode::NOT_FOUND),
            }
        };

        let (status, media_type, bytes) = page.into_parts();
        let mut response = Response::new(bytes);
        *response.status_mut() = status;
        let content_type = match HeaderValue::from_str(&media_type) {
            Ok(value) => value,
            Err(e) => return Err(HttpError::server(format!("unusable content type {media_type:?}: {e}"))),
        };
        response.headers_mut().insert(header::CONTENT_TYPE, content_type);

        encoding::apply(&mut response, coding)?;

        if elide_body {
            let full = response.body().len();
            response.headers_mut().insert(header::CONTENT_LENGTH, HeaderValue::from(full));
            *response.body_mut() = Bytes::new();
        }
        Ok(response)
    }

    /// The registered-route arm: check the declared consumes list, ingest
    /// when asked, pick a representation from the produces list, render.
    async fn render_route(
        &self,
        route: &Route,
        params: Vec<(String, String)>,
        head: RequestHead,
        body: BodySource<'_>,
    ) -> Result<PageResponse, HttpError> {
        let ingested = if let Some(accepts) = &route.consumes {
            if let Some(content_type) = head.content_type()? {
                let candidate = content_type.as_range();
                if !accepts.iter().any(|range| range.matches(&candidate)) {
                    debug!(content_type = %content_type, "route cannot consume this media type");
                    return Err(HttpError::NotAcceptable);
                }
            }
            let cancel = CancellationToken::new();
            Some(ingest_body(body, &head, &self.ingest, &cancel).await?)
        } else {
            None
        };

        let accept = head.accept()?;
        let Some(picked) = select_accept(&accept, &route.produces) else {
            return Err(HttpError::NotAcceptable);
        };
        let media_type = picked.to_string();

        let ctx = RenderContext::new(Arc::new(head), params, ingested, media_type);
        route.handler.render(ctx).await
    }
}

#[async_trait]
impl Handler for Server {
    async fn call(&self, head: RequestHead, body: BodySource<'_>) -> Result<Response<Bytes>, HttpError> {
        self.respond(head, body).await
    }
}

//! Pages that live in a store instead of the route table: an existence
//! probe claims the path, the matching handler renders it, and a POST
//! route publishes new ones.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use landing_http::grammar::MediaRange;
use landing_http::protocol::HttpError;
use landing_web::router::{RouteProbe, post};
use landing_web::{FallbackRoutes, PageHandler, PageResponse, RenderContext, RootRouter, Server, page_fn};
use serde::Deserialize;
use tokio::sync::RwLock;

type Store = Arc<RwLock<HashMap<String, String>>>;

#[derive(Deserialize)]
struct NewPage {
    path: String,
    markup: String,
}

struct StoredPages {
    store: Store,
}

#[async_trait]
impl RouteProbe for StoredPages {
    async fn exists(&self, path: &str) -> bool {
        self.store.read().await.contains_key(path)
    }
}

struct RenderStored {
    store: Store,
}

#[async_trait]
impl PageHandler for RenderStored {
    async fn render(&self, ctx: RenderContext) -> Result<PageResponse, HttpError> {
        let path = ctx.head().uri().path().to_owned();
        match self.store.read().await.get(&path) {
            Some(markup) => Ok(PageResponse::html(markup.clone())),
            None => Err(HttpError::server(format!("page {path} vanished between probe and render"))),
        }
    }
}

// curl -v -H 'Content-Type: application/json; charset=utf-8' \
//      -d '{"path":"/notes/hello","markup":"<h1>hello</h1>"}' http://127.0.0.1:8080/pages
// curl -v http://127.0.0.1:8080/notes/hello
#[tokio::main]
async fn main() {
    let store: Store = Arc::new(RwLock::new(HashMap::from([(
        "/welcome".to_owned(),
        "<h1>welcome</h1><p>this page came from the store</p>".to_owned(),
    )])));

    let publish_store = Arc::clone(&store);
    let publish = page_fn(move |ctx: RenderContext| {
        let store = Arc::clone(&publish_store);
        async move {
            let page: NewPage = match ctx.body() {
                Some(body) => body.json()?,
                None => return Err(HttpError::bad_request("publishing needs a body")),
            };
            store.write().await.insert(page.path.clone(), page.markup);
            Ok(PageResponse::html(format!("<p>published {}</p>", page.path)))
        }
    });

    let router = RootRouter::new().route(
        &[],
        post("/pages", publish)
            .consumes(vec![MediaRange::of("application", "json")])
            .describe("publish a page into the store", &["authoring"]),
    );

    let fallbacks = FallbackRoutes::new()
        .route(StoredPages { store: Arc::clone(&store) }, RenderStored { store: Arc::clone(&store) });

    let not_found = page_fn(|_ctx| async {
        Ok(PageResponse::html("<h1>404</h1><p>nothing here, try /welcome</p>")
            .with_status(StatusCode::NOT_FOUND))
    });

    Server::builder()
        .bind("127.0.0.1:8080")
        .router(router)
        .fallbacks(fallbacks)
        .not_found(not_found)
        .build()
        .unwrap()
        .start()
        .await;
}

use landing_http::grammar::MediaRange;
use landing_web::router::{ParamKind, PathTemplate, get};
use landing_web::{PageResponse, RenderContext, RootRouter, Server, page_fn};
use serde::Serialize;

#[derive(Serialize)]
struct Stats {
    launches: u32,
    visits: u64,
}

// curl -v http://127.0.0.1:8080/
async fn home(_ctx: RenderContext) -> Result<PageResponse, landing_http::protocol::HttpError> {
    Ok(PageResponse::html("<h1>launchpad</h1><p>everything ships from here</p>"))
}

// curl -v http://127.0.0.1:8080/pricing
async fn pricing(_ctx: RenderContext) -> Result<PageResponse, landing_http::protocol::HttpError> {
    Ok(PageResponse::html("<h1>pricing</h1><ul><li>free</li><li>team</li></ul>"))
}

// curl -v http://127.0.0.1:8080/launch/42?tab=log
async fn launch(ctx: RenderContext) -> Result<PageResponse, landing_http::protocol::HttpError> {
    let id = ctx.param("id").unwrap_or("0");
    Ok(PageResponse::html(format!("<h1>launch #{id}</h1>")))
}

// curl -v -H 'Accept: application/json' http://127.0.0.1:8080/stats
async fn stats(ctx: RenderContext) -> Result<PageResponse, landing_http::protocol::HttpError> {
    let current = Stats { launches: 12, visits: 34817 };
    if ctx.media_type().starts_with("application/json") {
        PageResponse::json(&current)
    } else {
        Ok(PageResponse::html(format!(
            "<h1>stats</h1><p>{} launches, {} visits</p>",
            current.launches, current.visits
        )))
    }
}

#[tokio::main]
async fn main() {
    let router = RootRouter::new()
        .route(&[], get("/", page_fn(home)).describe("landing page", &["site"]))
        .route(&[], get("/pricing", page_fn(pricing)).describe("plans and prices", &["site"]))
        .route(
            &["launch"],
            get(PathTemplate::new().param("id", ParamKind::Uint32).allow_query(), page_fn(launch))
                .describe("one launch, by numeric id", &["launches"]),
        )
        .route(
            &[],
            get("/stats", page_fn(stats))
                .produces(vec![MediaRange::of("text", "html"), MediaRange::of("application", "json")])
                .describe("site counters, as a page or as json", &["site"]),
        );

    Server::builder()
        .bind("127.0.0.1:8080")
        .router(router)
        .build()
        .unwrap()
        .start()
        .await;
}

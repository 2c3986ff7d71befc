//! High-level serving for content sites: typed routing with raced
//! fallbacks, negotiated representations, body ingestion and response
//! compression, all on top of `landing-http`.

mod encoding;
mod handler;
mod server;

pub mod router;

pub use handler::PageFn;
pub use handler::PageHandler;
pub use handler::PageResponse;
pub use handler::RenderContext;
pub use handler::page_fn;
pub use router::FallbackRoutes;
pub use router::ParamKind;
pub use router::PathTemplate;
pub use router::RootRouter;
pub use router::Route;
pub use router::RouteDoc;
pub use router::RouteProbe;
pub use server::Server;
pub use server::ServerBuildError;
pub use server::ServerBuilder;

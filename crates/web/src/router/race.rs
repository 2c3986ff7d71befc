//! Raced fallback resolution.
//!
//! When neither routing tier knows a URL, every fallback candidate probes
//! for it concurrently. The first probe to answer yes wins, and the race
//! cancels everyone else. Probes that answer in the same poll sweep are
//! settled deterministically: the earliest-registered candidate wins.

use std::future::Future;
use std::sync::Arc;
use std::task::Poll;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::handler::PageHandler;

/// One candidate in an existence race: a token to call it off and the
/// probing future itself.
pub struct ExistenceCheck {
    token: CancellationToken,
    future: BoxFuture<'static, bool>,
}

impl ExistenceCheck {
    pub fn new(token: CancellationToken, future: impl Future<Output = bool> + Send + 'static) -> Self {
        Self { token, future: Box::pin(future) }
    }
}

/// Drives every check concurrently and returns the index of the first to
/// resolve `true`, cancelling the ones still pending. Checks that resolve
/// `false` simply drop out. When several resolve `true` in the same poll
/// sweep, the lowest index wins. All-false is `None`.
pub async fn first_existing(checks: Vec<ExistenceCheck>) -> Option<usize> {
    let mut slots: Vec<Option<ExistenceCheck>> = checks.into_iter().map(Some).collect();
    let mut live = slots.len();

    let winner = std::future::poll_fn(|cx| {
        for (index, slot) in slots.iter_mut().enumerate() {
            let Some(check) = slot else { continue };
            match check.future.as_mut().poll(cx) {
                Poll::Ready(true) => return Poll::Ready(Some(index)),
                Poll::Ready(false) => {
                    *slot = None;
                    live -= 1;
                }
                Poll::Pending => {}
            }
        }
        if live == 0 { Poll::Ready(None) } else { Poll::Pending }
    })
    .await?;

    for (index, slot) in slots.iter().enumerate() {
        if index == winner {
            continue;
        }
        if let Some(check) = slot {
            check.token.cancel();
        }
    }
    Some(winner)
}

/// Asks a backing store whether it can produce a page for `path`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RouteProbe: Send + Sync {
    async fn exists(&self, path: &str) -> bool;
}

struct FallbackRoute {
    probe: Arc<dyn RouteProbe>,
    handler: Arc<dyn PageHandler>,
}

/// The candidates raced after both routing tiers miss, in registration
/// order.
#[derive(Default)]
pub struct FallbackRoutes {
    candidates: Vec<FallbackRoute>,
}

impl FallbackRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a candidate. Registration order doubles as the race's
    /// tie-break order.
    pub fn route(mut self, probe: impl RouteProbe + 'static, handler: impl PageHandler + 'static) -> Self {
        self.candidates.push(FallbackRoute { probe: Arc::new(probe), handler: Arc::new(handler) });
        self
    }

    /// Races every probe against `path` and hands back the winning
    /// candidate's handler.
    pub async fn resolve(&self, path: &str) -> Option<&Arc<dyn PageHandler>> {
        let checks = self
            .candidates
            .iter()
            .map(|candidate| {
                let token = CancellationToken::new();
                let watch = token.clone();
                let probe = Arc::clone(&candidate.probe);
                let path = path.to_owned();
                ExistenceCheck::new(token, async move {
                    tokio::select! {
                        () = watch.cancelled() => false,
                        exists = probe.exists(&path) => exists,
                    }
                })
            })
            .collect();
        let winner = first_existing(checks).await?;
        self.candidates.get(winner).map(|candidate| &candidate.handler)
    }
}

#[cfg(test)]
mod tests {
    use std::future::ready;
    use std::time::Duration;

    use futures::FutureExt;
    use http::{Method, Request, StatusCode};
    use tokio::time::sleep;

    use super::*;
    use crate::handler::{PageResponse, RenderContext, page_fn};

    #[tokio::test]
    async fn simultaneous_trues_go_to_the_earliest_registered() {
        let checks = vec![
            ExistenceCheck::new(CancellationToken::new(), ready(true)),
            ExistenceCheck::new(CancellationToken::new(), ready(true)),
        ];
        assert_eq!(first_existing(checks).await, Some(0));
    }

    #[tokio::test]
    async fn pending_losers_observe_cancellation() {
        let loser = CancellationToken::new();
        let winner = CancellationToken::new();
        let watch = loser.clone();
        let checks = vec![
            ExistenceCheck::new(loser.clone(), watch.cancelled_owned().map(|()| false)),
            ExistenceCheck::new(winner.clone(), ready(true)),
        ];
        assert_eq!(first_existing(checks).await, Some(1));
        assert!(loser.is_cancelled());
        assert!(!winner.is_cancelled(), "the winner keeps running");
    }

    #[tokio::test]
    async fn all_false_is_none() {
        let checks = vec![
            ExistenceCheck::new(CancellationToken::new(), ready(false)),
            ExistenceCheck::new(CancellationToken::new(), ready(false)),
        ];
        assert_eq!(first_existing(checks).await, None);
        assert_eq!(first_existing(Vec::new()).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn a_slow_yes_beats_any_number_of_fast_nos() {
        let checks = vec![
            ExistenceCheck::new(CancellationToken::new(), ready(false)),
            ExistenceCheck::new(CancellationToken::new(), async {
                sleep(Duration::from_millis(10)).await;
                true
            }),
            ExistenceCheck::new(CancellationToken::new(), ready(false)),
        ];
        assert_eq!(first_existing(checks).await, Some(1));
    }

    fn page_stub(label: &'static str) -> impl PageHandler {
        page_fn(move |_ctx| async move { Ok(PageResponse::new(StatusCode::OK, "text/html", label)) })
    }

    fn render_ctx() -> RenderContext {
        let head = Request::builder().method(Method::GET).uri("/blog/first-post").body(()).unwrap().into();
        RenderContext::new(Arc::new(head), Vec::new(), None, "text/html")
    }

    #[tokio::test]
    async fn fallback_resolution_races_the_probes() {
        let mut missing = MockRouteProbe::new();
        missing.expect_exists().returning(|_path| false);
        let mut published = MockRouteProbe::new();
        published.expect_exists().withf(|path| path == "/blog/first-post").returning(|_path| true);

        let fallbacks = FallbackRoutes::new()
            .route(missing, page_stub("archive"))
            .route(published, page_stub("blog"));

        let handler = fallbacks.resolve("/blog/first-post").await.expect("the published probe says yes");
        let page = handler.render(render_ctx()).await.unwrap();
        assert_eq!(page.bytes().as_ref(), b"blog");
    }

    #[tokio::test]
    async fn no_probe_claiming_the_path_means_none() {
        let mut first = MockRouteProbe::new();
        first.expect_exists().returning(|_path| false);
        let mut second = MockRouteProbe::new();
        second.expect_exists().returning(|_path| false);

        let fallbacks = FallbackRoutes::new().route(first, page_stub("a")).route(second, page_stub("b"));
        assert!(fallbacks.resolve("/nowhere").await.is_none());
    }

    #[tokio::test]
    async fn earlier_registration_wins_a_double_claim() {
        let mut first = MockRouteProbe::new();
        first.expect_exists().returning(|_path| true);
        let mut second = MockRouteProbe::new();
        second.expect_exists().returning(|_path| true);

        let fallbacks = FallbackRoutes::new().route(first, page_stub("first")).route(second, page_stub("second"));
        let handler = fallbacks.resolve("/shared").await.unwrap();
        let page = handler.render(render_ctx()).await.unwrap();
        assert_eq!(page.bytes().as_ref(), b"first");
    }
}

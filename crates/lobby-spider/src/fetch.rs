use crate::error::{Result, SpiderError};
use crate::http::*;
use crate::rate_limit::RateLimiter;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::ClientBuilder;
use std::time::Duration;
use tracing::{debug, error, trace};

/// Attempts per request before giving up.
pub const MAX_ATTEMPTS: u32 = 5;

/// Pause after each failed attempt.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Status, final url (after redirects) and body of a single GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub url: String,
    pub body: String,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The raw GET underneath the fetcher; [`ApiClient`] in production, scripted replies in tests.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn get(&self, url: &str) -> anyhow::Result<Reply>;
}

// transport
// ----------------------------------------------------------------------------

/// Authenticated reqwest client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: HttpClient,
}

impl ApiClient {
    /// Build a client sending `Authorization: Token <token>` and `Accept: application/json`
    /// with every request.
    pub fn new(token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Token {token}")).map_err(|err| {
            error!("failed to build Authorization header, error({err})");
            SpiderError::Config(format!("invalid API token: {err}"))
        })?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = ClientBuilder::new()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| {
                error!("failed to build reqwest client, error({err})");
                SpiderError::Config(format!("failed to build HTTP client: {err}"))
            })?;

        Ok(Self { client })
    }
}

impl Transport for ApiClient {
    async fn get(&self, url: &str) -> anyhow::Result<Reply> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text().await?;
        Ok(Reply { status, url, body })
    }
}

// fetcher
// ----------------------------------------------------------------------------

/// Rate-limited GET with bounded retries and status specific handling.
///
/// - 404 is "no data": `Ok("")` straight away, no retry;
/// - 401 is re-issued once against the final (redirected) url;
/// - anything else that isn't 2xx, or a transport failure, costs one attempt and a pause.
#[derive(Debug)]
pub struct HttpFetcher<T: Transport> {
    transport: T,
    limiter: RateLimiter,
    max_attempts: u32,
    retry_delay: Duration,
}

impl<T: Transport> HttpFetcher<T> {
    pub fn new(transport: T, limiter: RateLimiter) -> Self {
        Self {
            transport,
            limiter,
            max_attempts: MAX_ATTEMPTS,
            retry_delay: RETRY_DELAY,
        }
    }

    pub fn with_retries(mut self, max_attempts: u32, retry_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn fetch(&mut self, url: &str) -> Result<String> {
        for attempt in 1..=self.max_attempts {
            self.limiter.acquire().await;
            trace!("GET {url} (attempt {attempt}/{})", self.max_attempts);

            match self.attempt(url).await {
                Ok(body) => {
                    debug!("GET {url} succeeded, {} bytes", body.len());
                    return Ok(body);
                }
                Err(SpiderError::NotFound { url }) => {
                    error!("files not found at url: {url}");
                    return Ok(String::new());
                }
                Err(err) => {
                    error!(
                        "GET {url} failed (retry {attempt}/{}), error({err})",
                        self.max_attempts
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }

        Err(SpiderError::RetriesExhausted {
            attempts: self.max_attempts,
        })
    }

    async fn attempt(&self, url: &str) -> Result<String> {
        let mut reply = self
            .transport
            .get(url)
            .await
            .map_err(SpiderError::Transport)?;

        if reply.status == 404 {
            return Err(SpiderError::NotFound {
                url: url.to_string(),
            });
        }

        // credentials get dropped across some redirects; ask the final location directly
        if reply.status == 401 {
            debug!("401 from {url}, re-issuing request to {}", reply.url);
            reply = self
                .transport
                .get(&reply.url)
                .await
                .map_err(SpiderError::Transport)?;
            if reply.status == 401 {
                return Err(SpiderError::Unauthorized { url: reply.url });
            }
        }

        if !reply.is_success() {
            return Err(SpiderError::Status {
                status: reply.status,
                url: reply.url,
            });
        }

        Ok(reply.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use tokio::time::Instant;

    /// Replies handed out in order; every requested url is recorded.
    #[derive(Default)]
    struct Scripted {
        replies: RefCell<VecDeque<anyhow::Result<Reply>>>,
        requested: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<anyhow::Result<Reply>>) -> Self {
            Self {
                replies: RefCell::new(replies.into()),
                requested: RefCell::default(),
            }
        }
    }

    impl Transport for Scripted {
        async fn get(&self, url: &str) -> anyhow::Result<Reply> {
            self.requested.borrow_mut().push(url.to_string());
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("script exhausted")))
        }
    }

    fn reply(status: u16, body: &str) -> anyhow::Result<Reply> {
        Ok(Reply {
            status,
            url: "https://api.test/live/lobbying".to_string(),
            body: body.to_string(),
        })
    }

    fn fetcher(replies: Vec<anyhow::Result<Reply>>) -> HttpFetcher<Scripted> {
        HttpFetcher::new(Scripted::new(replies), RateLimiter::quiver())
    }

    #[tokio::test(start_paused = true)]
    async fn four_failures_then_success() {
        let mut fetcher = fetcher(vec![
            reply(500, ""),
            Err(anyhow::anyhow!("connection reset")),
            reply(502, ""),
            reply(429, ""),
            reply(200, "[]"),
        ]);

        let start = Instant::now();
        let body = fetcher.fetch("https://api.test/live/lobbying").await.unwrap();
        assert_eq!(body, "[]");
        assert_eq!(start.elapsed(), 4 * RETRY_DELAY);
        assert_eq!(fetcher.transport().requested.borrow().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn five_failures_exhaust_retries() {
        let mut fetcher = fetcher(vec![
            reply(500, ""),
            reply(500, ""),
            reply(500, ""),
            reply(500, ""),
            reply(500, ""),
            reply(200, "never reached"),
        ]);

        let err = fetcher.fetch("https://api.test/live/lobbying").await.unwrap_err();
        assert!(matches!(err, SpiderError::RetriesExhausted { attempts: 5 }));
        assert_eq!(fetcher.transport().requested.borrow().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_empty_without_retry() {
        let mut fetcher = fetcher(vec![reply(404, "missing"), reply(200, "[]")]);

        let start = Instant::now();
        let body = fetcher.fetch("https://api.test/live/lobbying").await.unwrap();
        assert!(body.is_empty());
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(fetcher.transport().requested.borrow().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_is_reissued_to_final_url() {
        let redirected = Reply {
            status: 401,
            url: "https://redirected.test/live/lobbying".to_string(),
            body: String::new(),
        };
        let mut fetcher = fetcher(vec![Ok(redirected), reply(200, "[{}]")]);

        let start = Instant::now();
        let body = fetcher.fetch("https://api.test/live/lobbying").await.unwrap();
        assert_eq!(body, "[{}]");
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(
            *fetcher.transport().requested.borrow(),
            vec![
                "https://api.test/live/lobbying".to_string(),
                "https://redirected.test/live/lobbying".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reissue_costs_one_attempt() {
        let mut fetcher = fetcher(vec![
            reply(401, ""),
            reply(401, ""),
            reply(200, "ok"),
        ]);

        let start = Instant::now();
        let body = fetcher.fetch("https://api.test/live/lobbying").await.unwrap();
        assert_eq!(body, "ok");
        assert_eq!(start.elapsed(), RETRY_DELAY);
        assert_eq!(fetcher.transport().requested.borrow().len(), 3);
    }

    #[test]
    fn api_client_rejects_unprintable_token() {
        assert!(ApiClient::new("key").is_ok());
        assert!(matches!(
            ApiClient::new("bad\ntoken"),
            Err(SpiderError::Config(_))
        ));
    }
}

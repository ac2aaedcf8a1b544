use std::{sync::Arc, thread, time::Duration};

use reqwest::{
    StatusCode,
    blocking::Client,
    header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue},
};

use crate::{CoreLog, config::HttpSettings, error::SourceError};

/// Outcome of one failed attempt.
#[derive(Debug)]
pub(crate) enum Failure {
    /// Worth retrying: timeouts, connection resets, 5xx, 429.
    Transient(String),
    Fatal(String),
}

/// Blocking HTTP client shared by the upstream sources. Every request carries a timeout
/// and goes through [`with_retry`].
pub struct HttpFetcher {
    client: Client,
    attempts: u32,
    backoff: Duration,
}

impl HttpFetcher {
    pub fn new(settings: &HttpSettings) -> Result<Self, SourceError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| SourceError::Unavailable {
                origin: "http client".into(),
                attempts: 0,
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            attempts: settings.attempts.max(1),
            backoff: Duration::from_millis(settings.backoff_ms),
        })
    }

    pub fn get_bytes(
        &self,
        origin: &str,
        url: &str,
        logger: &Arc<dyn CoreLog>,
    ) -> Result<Vec<u8>, SourceError> {
        logger.debug(&format!("[{origin}] GET {url}"));
        with_retry(origin, self.attempts, self.backoff, logger, thread::sleep, |_| {
            let resp = self.client.get(url).send().map_err(classify)?;
            let status = resp.status();
            if !status.is_success() {
                let msg = format!("HTTP {status} from {url}");
                return Err(if is_transient_status(status) {
                    Failure::Transient(msg)
                } else {
                    Failure::Fatal(msg)
                });
            }
            resp.bytes().map(|b| b.to_vec()).map_err(classify)
        })
    }

    pub fn get_text(
        &self,
        origin: &str,
        url: &str,
        logger: &Arc<dyn CoreLog>,
    ) -> Result<String, SourceError> {
        let bytes = self.get_bytes(origin, url, logger)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn classify(e: reqwest::Error) -> Failure {
    if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
        Failure::Transient(e.to_string())
    } else {
        Failure::Fatal(e.to_string())
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

/// Run `op` up to `attempts` times, sleeping `backoff`, `2*backoff`, ... between transient
/// failures. A fatal failure or the last transient one becomes `SourceError::Unavailable`.
pub(crate) fn with_retry<T>(
    origin: &str,
    attempts: u32,
    backoff: Duration,
    logger: &Arc<dyn CoreLog>,
    sleep: impl Fn(Duration),
    mut op: impl FnMut(u32) -> Result<T, Failure>,
) -> Result<T, SourceError> {
    let attempts = attempts.max(1);
    let mut delay = backoff;
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(v) => {
                if attempt > 1 {
                    logger.debug(&format!("[{origin}] succeeded on attempt {attempt}"));
                }
                return Ok(v);
            }
            Err(Failure::Fatal(reason)) => {
                return Err(SourceError::Unavailable {
                    origin: origin.to_string(),
                    attempts: attempt,
                    reason,
                });
            }
            Err(Failure::Transient(reason)) if attempt >= attempts => {
                return Err(SourceError::Unavailable {
                    origin: origin.to_string(),
                    attempts: attempt,
                    reason,
                });
            }
            Err(Failure::Transient(reason)) => {
                logger.warn(&format!(
                    "[{origin}] attempt {attempt}/{attempts} failed: {reason}; retrying in {delay:?}"
                ));
                sleep(delay);
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::core_log::NoopLog;

    fn log() -> Arc<dyn CoreLog> {
        Arc::new(NoopLog)
    }

    #[test]
    fn transient_failures_back_off_then_succeed() {
        let slept = RefCell::new(Vec::new());
        let res = with_retry(
            "wiki",
            3,
            Duration::from_millis(100),
            &log(),
            |d| slept.borrow_mut().push(d),
            |attempt| {
                if attempt < 3 {
                    Err(Failure::Transient("timeout".into()))
                } else {
                    Ok(attempt)
                }
            },
        );
        assert_eq!(res.unwrap(), 3);
        assert_eq!(
            *slept.borrow(),
            [Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[test]
    fn gives_up_after_the_last_attempt() {
        let mut calls = 0;
        let err = with_retry("icons", 3, Duration::ZERO, &log(), |_| {}, |_| {
            calls += 1;
            Err::<(), _>(Failure::Transient("HTTP 503".into()))
        })
        .unwrap_err();
        assert_eq!(calls, 3);
        match err {
            SourceError::Unavailable {
                origin, attempts, ..
            } => {
                assert_eq!(origin, "icons");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn fatal_failures_are_not_retried() {
        let mut calls = 0;
        let err = with_retry("wiki", 3, Duration::ZERO, &log(), |_| {}, |_| {
            calls += 1;
            Err::<(), _>(Failure::Fatal("HTTP 404".into()))
        })
        .unwrap_err();
        assert_eq!(calls, 1);
        assert!(err.to_string().contains("HTTP 404"));
    }
}

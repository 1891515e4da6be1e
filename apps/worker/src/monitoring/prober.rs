use std::error::Error as StdError;

use tracing::debug;
use url::Url;

use super::types::Outcome;
use crate::checks::Check;

/// Performs a single probe of a check's target.
///
/// Implementations must always return exactly one [`Outcome`]; failures to
/// reach the target are outcomes, not errors.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, check: &Check) -> Outcome;
}

/// HTTP/HTTPS prober
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(user_agent: &str, use_system_proxy: bool) -> Result<Self, reqwest::Error> {
        // Redirects are reported as-is: a 301 is the response code
        let mut builder = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none());

        if !use_system_proxy {
            builder = builder.no_proxy();
        }

        Ok(Self { client: builder.build()? })
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, check: &Check) -> Outcome {
        let url = match resolve_target(check) {
            Ok(url) => url,
            Err(detail) => return Outcome::network(detail),
        };

        debug!(check_id = %check.id, method = check.method.as_str(), %url, "Probing");

        let request = self.client.request(check.method.into(), url).send();

        // Response, transport error and deadline race here; select! completes
        // exactly one branch and drops the others, so a late event can never
        // produce a second outcome for the same probe.
        tokio::select! {
            result = request => match result {
                Ok(response) => Outcome::response(response.status().as_u16()),
                Err(e) if e.is_timeout() => Outcome::timeout(),
                Err(e) => Outcome::network(error_chain(&e)),
            },
            () = tokio::time::sleep(check.timeout()) => Outcome::timeout(),
        }
    }
}

/// Build `protocol://url` and make sure it names a host
pub fn resolve_target(check: &Check) -> Result<Url, String> {
    let target = check.target();
    let url = Url::parse(&target).map_err(|e| format!("Invalid URL {target:?}: {e}"))?;

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(format!("URL {target:?} has no hostname")),
    }
}

/// Flatten an error and its sources into one line
fn error_chain(error: &dyn StdError) -> String {
    let mut detail = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}

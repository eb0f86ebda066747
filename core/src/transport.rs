//! Executes an `HttpRequest` over the network.
//!
//! The only module that performs I/O. The response body is read chunk by
//! chunk into a fresh `Utf8Decoder`, so nothing is shared between requests.

use tracing::{error, info};

use crate::decode::Utf8Decoder;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};

pub(crate) async fn execute(
    http: &reqwest::Client,
    request: HttpRequest,
    debug: bool,
) -> Result<HttpResponse, ApiError> {
    let mut builder = http.request(request.method.into(), request.url.as_str());
    for (name, value) in &request.headers {
        // reqwest sets content-length from the body it actually sends.
        if name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = request.body {
        builder = builder.body(body);
    }

    let mut response = builder
        .send()
        .await
        .map_err(|e| transport_failure(e, debug))?;

    let status = response.status().as_u16();
    let headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .map(|(name, value)| {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            (name.as_str().to_string(), value)
        })
        .collect();

    if debug {
        info!(status, "mailchimp response status");
        info!(?headers, "mailchimp response headers");
        info!(?response, "mailchimp response");
    }

    let mut decoder = Utf8Decoder::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| transport_failure(e, debug))?
    {
        decoder.write(&chunk);
    }

    Ok(HttpResponse {
        status,
        headers,
        body: decoder.finish(),
    })
}

fn transport_failure(err: reqwest::Error, debug: bool) -> ApiError {
    if debug {
        error!(error = %err, "mailchimp request failed");
    }
    ApiError::Transport(err)
}

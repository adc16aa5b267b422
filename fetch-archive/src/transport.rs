//! Getting archive bytes off the network.
//!
//! The pipeline only needs a content length (for progress) and a stream of chunks, so the HTTP
//! client sits behind the small [`Transport`] trait. [`HttpTransport`] is the real one; tests and
//! embedders can supply their own.

use std::io::Read;
use std::time::Duration;

use crate::error::Result;

/// Size of the reads used to chunk a streamed body.
pub const CHUNK_SIZE: usize = 256 * 1024;

/// The body of a successful response.
pub struct Response {
    /// What the server advertised. Only ever used as a progress total.
    pub content_length: Option<u64>,
    /// The body, in order. An `Err` ends the transfer.
    pub body: Box<dyn Iterator<Item = std::io::Result<Vec<u8>>> + Send>,
}

impl Response {
    /// Stream `reader` in [`CHUNK_SIZE`] pieces.
    pub fn from_reader<R: Read + Send + 'static>(content_length: Option<u64>, mut reader: R) -> Self {
        let mut done = false;
        let body = std::iter::from_fn(move || {
            if done {
                return None;
            }
            let mut buffer = vec![0u8; CHUNK_SIZE];
            loop {
                match reader.read(&mut buffer) {
                    Ok(0) => {
                        done = true;
                        return None;
                    }
                    Ok(n) => {
                        buffer.truncate(n);
                        return Some(Ok(buffer));
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        done = true;
                        return Some(Err(e));
                    }
                }
            }
        });
        Self {
            content_length,
            body: Box::new(body),
        }
    }

    /// A body made of pre-split chunks.
    pub fn from_chunks<I>(content_length: Option<u64>, chunks: I) -> Self
    where
        I: IntoIterator<Item = std::io::Result<Vec<u8>>>,
        I::IntoIter: Send + 'static,
    {
        Self {
            content_length,
            body: Box::new(chunks.into_iter()),
        }
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Something that can GET a URL.
pub trait Transport {
    /// Start a GET for `url`. `timeout` bounds each stall: connecting, waiting for the response
    /// head, and waiting for the next piece of the body. It is not a deadline for the whole
    /// transfer, so a slow but live download runs to completion. Non-success statuses are errors.
    fn get(&self, url: &str, timeout: Duration) -> Result<Response>;
}

/// [`Transport`] over a blocking `reqwest` client.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    user_agent: String,
}

#[cfg(feature = "http")]
impl Default for HttpTransport {
    fn default() -> Self {
        Self {
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[cfg(feature = "http")]
impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send a different `User-Agent` header.
    pub fn with_user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[cfg(feature = "http")]
impl Transport for HttpTransport {
    fn get(&self, url: &str, timeout: Duration) -> Result<Response> {
        use crate::error::Error;

        let client = reqwest::blocking::Client::builder()
            .user_agent(&self.user_agent)
            .connect_timeout(timeout)
            // Applied per read by the blocking client, not to the transfer as a whole
            .timeout(timeout)
            .build()
            .map_err(|e| Error::network(url, e))?;
        let response = client.get(url).send().map_err(|e| Error::network(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let content_length = response.content_length();
        tracing::debug!("GET {url}: {status}, length {content_length:?}");
        Ok(Response::from_reader(content_length, response))
    }
}

use crate::error::FetchError;

/// Largest body either endpoint is expected to return.
pub const MAX_BODY_BYTES: usize = 32 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpRequest<'a> {
    pub url: &'a str,
    pub verify_certificates: bool,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Blocking GET transport. Timeouts are the transport's business.
pub trait HttpPort {
    fn get(&mut self, request: &HttpRequest<'_>) -> Result<HttpResponse, FetchError>;
}

/// Only a plain 200 counts as success.
pub fn expect_ok(response: HttpResponse) -> Result<String, FetchError> {
    if response.status != 200 {
        return Err(FetchError::Protocol(response.status));
    }
    if response.body.len() > MAX_BODY_BYTES {
        return Err(FetchError::Parse(format!(
            "response too large ({} bytes)",
            response.body.len()
        )));
    }
    Ok(response.body)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;

    use super::*;

    /// Replays canned responses in order and records every URL requested.
    #[derive(Debug, Default)]
    pub(crate) struct FakeHttp {
        pub responses: VecDeque<Result<HttpResponse, FetchError>>,
        pub requested: Vec<(String, bool, u64)>,
    }

    impl FakeHttp {
        pub fn push_ok(&mut self, body: &str) {
            self.responses.push_back(Ok(HttpResponse {
                status: 200,
                body: body.to_string(),
            }));
        }

        pub fn push_status(&mut self, status: u16) {
            self.responses.push_back(Ok(HttpResponse {
                status,
                body: String::new(),
            }));
        }

        pub fn push_err(&mut self, err: FetchError) {
            self.responses.push_back(Err(err));
        }
    }

    impl HttpPort for FakeHttp {
        fn get(&mut self, request: &HttpRequest<'_>) -> Result<HttpResponse, FetchError> {
            self.requested
                .push((
                    request.url.to_string(),
                    request.verify_certificates,
                    request.timeout_ms,
                ));
            self.responses
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Transport("no route".to_string())))
        }
    }

    #[test]
    fn non_200_is_protocol_failure() {
        let response = HttpResponse {
            status: 500,
            body: "{}".to_string(),
        };

        assert_eq!(expect_ok(response), Err(FetchError::Protocol(500)));
    }

    #[test]
    fn oversized_body_is_rejected() {
        let response = HttpResponse {
            status: 200,
            body: "x".repeat(MAX_BODY_BYTES + 1),
        };

        assert!(matches!(expect_ok(response), Err(FetchError::Parse(_))));
    }
}

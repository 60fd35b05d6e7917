//! Static header names and an insertion helper for server-added headers.

use hyper::header::{HeaderName, HeaderValue};
use hyper::Response;

/// Simulated latency applied to a served mock, in milliseconds.
pub static X_MOCKAPI_LATENCY_MS: HeaderName = HeaderName::from_static("x-mockapi-latency-ms");

pub static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

pub trait MockHeadersExt {
    /// Insert a header with a static name and dynamic string value.
    /// Returns false if the value couldn't be converted to a valid header value.
    fn set_header_value(&mut self, name: &HeaderName, value: &str) -> bool;
}

impl<B> MockHeadersExt for Response<B> {
    fn set_header_value(&mut self, name: &HeaderName, value: &str) -> bool {
        match HeaderValue::from_str(value) {
            Ok(header_value) => {
                self.headers_mut().insert(name.clone(), header_value);
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_header_value_numeric() {
        let mut response = Response::new(());
        assert!(response.set_header_value(&X_MOCKAPI_LATENCY_MS, &250u64.to_string()));
        assert_eq!(response.headers().get(&X_MOCKAPI_LATENCY_MS).unwrap(), "250");
    }

    #[test]
    fn test_set_header_value_invalid() {
        let mut response = Response::new(());
        assert!(!response.set_header_value(&X_MOCKAPI_LATENCY_MS, "bad\nvalue"));
        assert!(response.headers().is_empty());
    }
}

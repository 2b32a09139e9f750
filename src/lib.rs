//! Throwaway HTTP server for tests. Point the HTTP client under test at a
//! [`MockService`], let it send its request, then assert on what the service
//! received:
//!
//! ```no_run
//! # async fn example() {
//! use testservice::MockService;
//!
//! let service = MockService::new();
//! service.set_response_body("pong");
//! service.set_response_code(201).unwrap();
//!
//! // Drive the client under test against `service.url("/ping")` here.
//!
//! service.assert_received_method("GET");
//! service.assert_received_path("/ping");
//! # }
//! ```
//!
//! Only the most recent request is kept and every request gets the same
//! configured response, so this is meant for one interaction per test.

mod assert;
mod config;
mod error;
mod http;
mod server;
mod service;

pub use assert::Mismatch;
pub use config::Config;
pub use error::Error;
pub use self::http::{request::CapturedRequest, response::ResponseBody};
pub use server::MockService;

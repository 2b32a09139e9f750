//! Request snapshots and canned responses exchanged with the HTTP client
//! under test.

pub(crate) mod body;
pub(crate) mod request;
pub(crate) mod response;

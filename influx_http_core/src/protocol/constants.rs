/**
 * Wire-level constants shared by every request the transport builds.
 */

/// Path for queries, administrative commands and `CREATE DATABASE`.
pub const QUERY_PATH: &str = "/query";

/// Path for line-protocol writes.
pub const WRITE_PATH: &str = "/write";

/// Content type of a line-protocol write body.
pub const LINE_PROTOCOL_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// User agent sent with every request.
/// Derived at compile time from the `influx_http_core` package version.
pub const USER_AGENT: &str = concat!("influx-http-rust/", env!("CARGO_PKG_VERSION"));

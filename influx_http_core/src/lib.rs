/*!
 * InfluxDB HTTP transport — the internal engine.
 *
 * This crate turns queries, commands and line-protocol writes into HTTP
 * requests against one endpoint, and runs the background reaper that
 * observes fire-and-forget writes. End users should depend on the
 * `influx_http` crate instead, which re-exports everything.
 *
 * # Module structure
 *
 * - `protocol/` — where we talk to: endpoint parsing, paths, constants
 * - `transport/` — how we deliver: HTTP client seam, executor, dispatch
 *   pool, write queue, reaper thread
 * - `client` — the `Transport` facade and its `Options`
 * - `error` — error taxonomy shared by every path
 *
 * # Threads
 *
 * Synchronous calls run on the caller's thread. The first `send_async`
 * starts a small fixed pool of dispatch workers that put writes on the
 * wire, and in asynchronous mode each transport also owns one reaper
 * thread. The library never installs a `tracing` subscriber; diagnostics
 * go wherever the application routes them.
 */

mod client;
mod error;
mod protocol;
mod transport;

#[cfg(test)]
mod mock;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use client::{Options, Transport};
pub use error::{Error, RequestOutcome, Result, TransportCode};
pub use protocol::constants::{QUERY_PATH, USER_AGENT, WRITE_PATH};
pub use protocol::endpoint::Endpoint;
pub use transport::{
    ClientSettings, DrainPolicy, ErrorObserver, HttpClient, HttpRequest, HttpResponse, Method,
    Proxy, ProxyAuth, UreqClient,
};

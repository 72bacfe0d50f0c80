/**
 * Transport layer — HTTP delivery, request execution, async write reaping.
 *
 * Everything related to *how* requests reach the server:
 * - `http` — `HttpClient` seam and the ureq-based implementation
 * - `executor` — request building and outcome classification
 * - `dispatch` — worker pool putting asynchronous writes on the wire
 * - `queue` — in-flight write handles and their FIFO
 * - `reaper` — background thread resolving queued writes
 */

pub mod dispatch;
pub mod executor;
pub mod http;
pub mod queue;
pub mod reaper;

pub use dispatch::{Dispatcher, DEFAULT_DISPATCH_WORKERS};
pub use executor::Executor;
pub use http::{
    ClientSettings, HttpClient, HttpRequest, HttpResponse, Method, Proxy, ProxyAuth, UreqClient,
};
pub use queue::{PendingWrite, WriteQueue};
pub use reaper::{DrainPolicy, ErrorObserver, Reaper, ReaperConfig};

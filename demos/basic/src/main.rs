/**
 * Minimal walkthrough of the transport against a local server.
 *
 * Start an InfluxDB 1.x (or compatible) server on localhost:8086, then run:
 *
 *   cargo run -p influx_http_demo
 *   cargo run -p influx_http_demo -- --async          # fire-and-forget writes
 *   RUST_LOG=influx_http_core=debug cargo run -p influx_http_demo -- --async
 */
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

const URL: &str = "http://localhost:8086/?db=demo";

fn main() -> influx_http::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let use_async = std::env::args().any(|a| a == "--async");

    let transport = if use_async {
        influx_http::connect(influx_http::Config {
            on_write_error: Some(Arc::new(|err: &influx_http::Error| {
                println!("[demo] asynchronous write failed: {err}");
            })),
            ..influx_http::Config::asynchronous(URL)
        })?
    } else {
        influx_http::connect(URL)?
    };

    transport.create_database()?;
    println!("[demo] Database ready");

    if use_async {
        for n in 0..10 {
            transport.send_async(format!("demo,mode=async value={n}i"));
        }
        println!("[demo] Queued 10 writes, {} unobserved", transport.pending_writes());

        /*
         * Give the reaper a few intervals to observe the outcomes before the
         * transport is dropped and abandons whatever is left.
         */
        std::thread::sleep(Duration::from_millis(500));
    } else {
        transport.send("demo,mode=sync value=1i")?;
        println!("[demo] Wrote one point");
    }

    let body = transport.query("SELECT * FROM demo")?;
    println!("[demo] {body}");

    Ok(())
}

//! Memoized calls against a local JSON cache file.
//!
//! Run twice to see the second run answer from `demo_cache.json`:
//!   RUST_LOG=llm_cache=debug cargo run --example local_demo

use bytes::Bytes;
use futures::StreamExt;
use llm_cache::{CallArgs, CallOptions, FileStore, MemoCache};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Stand-in for a slow completion endpoint.
async fn complete(args: CallArgs) -> anyhow::Result<String> {
    tokio::time::sleep(Duration::from_millis(800)).await;
    let prompt = args.get_str("prompt").unwrap_or_default();
    Ok(format!("You said: {prompt}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cache = MemoCache::with_store(FileStore::open("demo_cache.json").await?);
    let options = CallOptions::new()
        .exclude("timeout")
        .with_retries(vec![Duration::from_millis(200), Duration::from_millis(500)]);

    println!("DEMO FOR LOCAL CACHE");
    println!("------------------------");
    for timeout in [40, 90] {
        let args = CallArgs::new()
            .with("model", "gpt-4")?
            .with("prompt", "Hello, how are you?")?
            .with("temperature", 0.8)?
            .with("timeout", timeout)?;
        let start = Instant::now();
        let reply: String = cache.call("complete", args, &options, complete).await?;
        println!("{reply} ({:.2}s)", start.elapsed().as_secs_f64());
    }

    println!("\nDEMO FOR LOCAL CACHE WITH STREAMING");
    println!("---------------------------------------");
    // first attempt drops mid-stream; the retry completes
    let attempts = Arc::new(AtomicU32::new(0));
    for _ in 0..2 {
        let args = CallArgs::new()
            .with("model", "gpt-4")?
            .with("prompt", "Count to three")?;
        let attempts = attempts.clone();
        let mut stream = cache.stream_call("complete_stream", args, &options, move |_args| {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            let mut chunks: Vec<Result<Bytes, std::io::Error>> =
                vec![Ok(Bytes::from("one ")), Ok(Bytes::from("two "))];
            if attempt == 0 {
                chunks.push(Err(std::io::Error::other("connection reset")));
            } else {
                chunks.push(Ok(Bytes::from("three")));
            }
            futures::stream::iter(chunks)
        })?;
        let start = Instant::now();
        while let Some(chunk) = stream.next().await {
            print!("{}", String::from_utf8_lossy(&chunk?));
        }
        println!(" ({:.2}s)", start.elapsed().as_secs_f64());
    }
    println!("{:?}", cache.stats());
    Ok(())
}

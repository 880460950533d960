use bytes::Bytes;
use futures::StreamExt;
use llm_cache::{
    CallArgs, CallOptions, DocumentEncoding, DocumentStore, FileStore, KvStore, MemoCache,
    MemoryCollection, NullStore,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Never;

impl std::fmt::Display for Never {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("never")
    }
}

impl std::error::Error for Never {}

fn args(prompt: &str) -> CallArgs {
    CallArgs::new()
        .with("model", "gpt-4")
        .unwrap()
        .with("prompt", prompt)
        .unwrap()
}

async fn counted_call(cache: &MemoCache, prompt: &str, calls: &Arc<AtomicU32>) -> String {
    let options = CallOptions::new().without_retries();
    let calls = calls.clone();
    cache
        .call("complete", args(prompt), &options, move |args| {
            calls.fetch_add(1, Ordering::SeqCst);
            let reply = format!("re: {}", args.get_str("prompt").unwrap_or_default());
            async move { Ok::<_, Never>(reply) }
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn file_cache_survives_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let calls = Arc::new(AtomicU32::new(0));

    {
        let cache = MemoCache::with_store(FileStore::open(&path).await.unwrap());
        assert_eq!(counted_call(&cache, "hello", &calls).await, "re: hello");
        assert_eq!(counted_call(&cache, "bye", &calls).await, "re: bye");
    }

    let store = FileStore::open(&path).await.unwrap();
    assert_eq!(store.keys().await.unwrap().len(), 2);
    let cache = MemoCache::with_store(store);
    assert_eq!(counted_call(&cache, "hello", &calls).await, "re: hello");
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // records are stored as structured JSON, not as strings
    let text = std::fs::read_to_string(&path).unwrap();
    let file: serde_json::Value = serde_json::from_str(&text).unwrap();
    let record = file.as_object().unwrap().values().next().unwrap();
    assert!(record["cache_params"].is_object());
}

#[tokio::test]
async fn file_cache_hits_for_long_float_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let options = CallOptions::new().without_retries();
    let calls = Arc::new(AtomicU32::new(0));

    for _ in 0..2 {
        // each round reopens the file so the record is parsed back from disk
        let cache = MemoCache::with_store(FileStore::open(&path).await.unwrap());
        let c = calls.clone();
        let args = CallArgs::new().with("top_p", 0.9719863718547629).unwrap();
        let reply: String = cache
            .call("complete", args, &options, move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, Never>("ok".to_string()) }
            })
            .await
            .unwrap();
        assert_eq!(reply, "ok");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn file_cache_replays_streams() {
    let dir = tempfile::tempdir().unwrap();
    let cache = MemoCache::with_store(FileStore::open(dir.path().join("s.json")).await.unwrap());
    let options = CallOptions::new().without_retries();
    let calls = Arc::new(AtomicU32::new(0));

    for _ in 0..2 {
        let c = calls.clone();
        let chunks: Vec<Bytes> = cache
            .stream_call("story", args("once"), &options, move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                futures::stream::iter(vec![
                    Ok::<_, Never>(Bytes::from("once ")),
                    Ok(Bytes::from("upon ")),
                    Ok(Bytes::from("a time")),
                ])
            })
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.concat(), b"once upon a time");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn document_store_structured_and_string_encodings() {
    for encoding in [
        DocumentEncoding::Structured,
        DocumentEncoding::JsonString {
            field: "payload".to_string(),
        },
    ] {
        let collection = Arc::new(MemoryCollection::new());
        let store = DocumentStore::new(collection.clone()).with_encoding(encoding.clone());
        let cache = MemoCache::with_store(store);
        let calls = Arc::new(AtomicU32::new(0));

        assert_eq!(counted_call(&cache, "hi", &calls).await, "re: hi");
        assert_eq!(counted_call(&cache, "hi", &calls).await, "re: hi");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.backend_name(), "document");

        let key = llm_cache::generate_key("complete", &args("hi").cache_params(&Default::default()));
        let document = collection.document(key.as_str()).unwrap();
        match encoding {
            DocumentEncoding::Structured => {
                assert_eq!(document["response"], "re: hi");
                assert_eq!(document["cache_params"]["prompt"], "hi");
            }
            DocumentEncoding::JsonString { field } => {
                assert!(document[&field].is_string());
                assert_eq!(document.len(), 1);
            }
        }
    }
}

#[tokio::test]
async fn null_store_never_hits() {
    let cache = MemoCache::with_store(NullStore::new());
    let calls = Arc::new(AtomicU32::new(0));
    counted_call(&cache, "a", &calls).await;
    counted_call(&cache, "a", &calls).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.stats().hits, 0);
    assert!(cache.store().get(&"anything".into()).await.unwrap().is_none());
}

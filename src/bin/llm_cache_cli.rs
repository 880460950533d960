//! llm-cache CLI: compute cache keys and inspect file-backed caches.
//!
//! Usage:
//!   llm-cache-cli key <function> <params-json>   Print the cache key for a call
//!   llm-cache-cli get <file> <key>               Print the record stored under a key
//!   llm-cache-cli keys <file>                    List the keys in a cache file

use llm_cache::{generate_key, CacheKey, CacheParams, FileStore, KvStore};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        return ExitCode::FAILURE;
    }

    let result = match args[1].as_str() {
        "key" => cmd_key(&args[2..]),
        "get" => cmd_get(&args[2..]).await,
        "keys" => cmd_keys(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("llm-cache-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    println!(
        r#"llm-cache-cli — inspect memoized call caches

USAGE:
    llm-cache-cli <COMMAND> [ARGS]

COMMANDS:
    key <function> <params-json>    Print the cache key for a function id and its cache params
    get <file> <key>                Print the record stored under <key> in a cache file
    keys <file>                     List the keys stored in a cache file
    version                         Show version information
    help                            Show this help message

ENVIRONMENT:
    RUST_LOG                        Log filter (e.g. llm_cache=debug)"#
    );
}

fn cmd_key(args: &[String]) -> anyhow::Result<()> {
    let [function, params] = args else {
        anyhow::bail!("usage: llm-cache-cli key <function> <params-json>");
    };
    let params: CacheParams = serde_json::from_str(params)
        .map_err(|e| anyhow::anyhow!("params must be a JSON object: {e}"))?;
    println!("{}", generate_key(function, &params));
    Ok(())
}

async fn cmd_get(args: &[String]) -> anyhow::Result<()> {
    let [file, key] = args else {
        anyhow::bail!("usage: llm-cache-cli get <file> <key>");
    };
    let store = open_existing(file).await?;
    match store.get(&CacheKey::from(key.as_str())).await? {
        Some(raw) => {
            let record: serde_json::Value = serde_json::from_str(&raw)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        None => anyhow::bail!("no record stored under {key}"),
    }
}

async fn cmd_keys(args: &[String]) -> anyhow::Result<()> {
    let [file] = args else {
        anyhow::bail!("usage: llm-cache-cli keys <file>");
    };
    let store = open_existing(file).await?;
    for key in store.keys().await? {
        println!("{key}");
    }
    Ok(())
}

async fn open_existing(file: &str) -> anyhow::Result<FileStore> {
    if !std::path::Path::new(file).exists() {
        anyhow::bail!("cache file not found: {file}");
    }
    Ok(FileStore::open(file).await?)
}

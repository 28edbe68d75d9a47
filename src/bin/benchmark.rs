//! Latency and throughput benchmarks for a running kvsock server
//!
//! Every operation opens its own connection, so the numbers include connect
//! and teardown cost.

use clap::Parser;
use kvsock::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

type BenchResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Benchmark a kvsock server
#[derive(Parser, Debug)]
#[command(name = "benchmark", about)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8888")]
    addr: String,

    /// Operations per single-client workload
    #[arg(short = 'n', long, default_value_t = 2000)]
    operations: usize,

    /// Operations issued by each client in the concurrent workloads
    #[arg(long, default_value_t = 200)]
    ops_per_client: usize,

    /// Print results as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct BenchmarkResults {
    operation: String,
    total_operations: usize,
    duration_secs: f64,
    ops_per_second: f64,
    avg_latency_ms: f64,
    p95_latency_ms: f64,
    p99_latency_ms: f64,
}

impl BenchmarkResults {
    fn new(operation: String, duration: Duration, latencies: &mut [Duration]) -> Self {
        latencies.sort();

        let total_operations = latencies.len();
        let ops_per_second = total_operations as f64 / duration.as_secs_f64();
        let avg_latency_ms = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().map(|d| d.as_secs_f64() * 1000.0).sum::<f64>() / total_operations as f64
        };

        let p95_index = (total_operations as f64 * 0.95) as usize;
        let p99_index = (total_operations as f64 * 0.99) as usize;

        let p95_latency_ms = latencies.get(p95_index).unwrap_or(&Duration::ZERO).as_secs_f64() * 1000.0;
        let p99_latency_ms = latencies.get(p99_index).unwrap_or(&Duration::ZERO).as_secs_f64() * 1000.0;

        Self {
            operation,
            total_operations,
            duration_secs: duration.as_secs_f64(),
            ops_per_second,
            avg_latency_ms,
            p95_latency_ms,
            p99_latency_ms,
        }
    }

    fn print(&self) {
        println!("=== {} Benchmark Results ===", self.operation);
        println!("Total operations: {}", self.total_operations);
        println!("Duration: {:.2}s", self.duration_secs);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
        println!("Average latency: {:.2}ms", self.avg_latency_ms);
        println!("P95 latency: {:.2}ms", self.p95_latency_ms);
        println!("P99 latency: {:.2}ms", self.p99_latency_ms);
        println!();
    }
}

#[tokio::main]
async fn main() -> BenchResult<()> {
    let args = Args::parse();
    let client = Client::new(args.addr.clone());

    if !args.json {
        println!("kvsock Performance Benchmarks");
        println!("Server: {}", client.addr());
        println!();
    }

    let mut ready = false;
    for _ in 0..50 {
        if client.ping().await.is_ok() {
            ready = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    if !ready {
        return Err(format!("server at {} is not accepting connections", client.addr()).into());
    }

    let mut results = vec![
        benchmark_set_operations(&client, args.operations).await?,
        benchmark_get_operations(&client, args.operations).await?,
        benchmark_mixed_workload(&client, args.operations).await?,
    ];
    for num_clients in [10, 50, 100] {
        results.push(benchmark_concurrent_operations(&client, num_clients, args.ops_per_client).await?);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        results.iter().for_each(BenchmarkResults::print);
    }

    Ok(())
}

async fn benchmark_set_operations(client: &Client, num_operations: usize) -> BenchResult<BenchmarkResults> {
    let mut latencies = Vec::with_capacity(num_operations);
    let start = Instant::now();

    for i in 0..num_operations {
        let key = format!("bench_key_{}", i);
        let value = format!("bench_value_{}", i);

        let op_start = Instant::now();
        client.set(&key, &value).await?;
        latencies.push(op_start.elapsed());
    }

    Ok(BenchmarkResults::new("SET".to_string(), start.elapsed(), &mut latencies))
}

async fn benchmark_get_operations(client: &Client, num_operations: usize) -> BenchResult<BenchmarkResults> {
    for i in 0..num_operations {
        let key = format!("get_bench_key_{}", i);
        let value = format!("get_bench_value_{}", i);
        client.set(&key, &value).await?;
    }

    let mut latencies = Vec::with_capacity(num_operations);
    let start = Instant::now();

    for i in 0..num_operations {
        let key = format!("get_bench_key_{}", i);

        let op_start = Instant::now();
        let _value = client.get(&key).await?;
        latencies.push(op_start.elapsed());
    }

    Ok(BenchmarkResults::new("GET".to_string(), start.elapsed(), &mut latencies))
}

async fn benchmark_mixed_workload(client: &Client, num_operations: usize) -> BenchResult<BenchmarkResults> {
    let mut latencies = Vec::with_capacity(num_operations);
    let start = Instant::now();

    for i in 0..num_operations {
        let key = format!("mixed_key_{}", i % 1000);
        let op_start = Instant::now();

        match i % 10 {
            // 70% GET, 20% SET, 10% DELETE
            0..=6 => {
                let _value = client.get(&key).await?;
            }
            7..=8 => {
                let value = format!("mixed_value_{}", i);
                client.set(&key, &value).await?;
            }
            _ => client.delete(&key).await?,
        }

        latencies.push(op_start.elapsed());
    }

    Ok(BenchmarkResults::new("Mixed Workload".to_string(), start.elapsed(), &mut latencies))
}

async fn benchmark_concurrent_operations(
    client: &Client,
    num_clients: usize,
    ops_per_client: usize,
) -> BenchResult<BenchmarkResults> {
    let semaphore = Arc::new(Semaphore::new(num_clients));
    let mut handles = Vec::new();
    let mut all_latencies = Vec::new();

    let start = Instant::now();

    for client_id in 0..num_clients {
        let semaphore = Arc::clone(&semaphore);
        let client = client.clone();

        let handle = tokio::spawn(async move {
            let _permit = semaphore.acquire().await.map_err(|e| e.to_string())?;
            let mut latencies = Vec::with_capacity(ops_per_client);

            for i in 0..ops_per_client {
                let key = format!("concurrent_key_{}_{}", client_id, i);
                let value = format!("concurrent_value_{}_{}", client_id, i);

                let op_start = Instant::now();
                client
                    .set(&key, &value)
                    .await
                    .map_err(|e| format!("Set error: {}", e))?;
                latencies.push(op_start.elapsed());
            }

            Ok::<Vec<Duration>, String>(latencies)
        });

        handles.push(handle);
    }

    for handle in handles {
        let latencies = handle.await??;
        all_latencies.extend(latencies);
    }

    Ok(BenchmarkResults::new(
        format!("Concurrent ({} clients)", num_clients),
        start.elapsed(),
        &mut all_latencies,
    ))
}

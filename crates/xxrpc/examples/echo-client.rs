//! Calls the echo server from several threads, one connection each.
//!
//! Run `cargo run --example echo-server` first, then:
//!   cargo run --example echo-client [ADDR] [THREADS] [CALLS]

use std::thread;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use xxrpc::Client;

#[derive(Serialize)]
struct SayHelloReq<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct SayHelloResp {
    message: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| "127.0.0.1:8888".to_string());
    let threads: usize = args.next().map(|s| s.parse()).transpose()?.unwrap_or(4);
    let calls: usize = args.next().map(|s| s.parse()).transpose()?.unwrap_or(1000);

    let mut client = Client::dial(&addr)?;
    let reply: SayHelloResp = client.call_decode("Echo.SayHello", &SayHelloReq { message: "world" })?;
    println!("Echo.SayHello -> {}", reply.message);

    let miss = client.call("Echo.Nope", &())?;
    println!("Echo.Nope -> error: {}", miss.error);
    client.close()?;

    // One client per thread: a connection carries one call at a time.
    let started = Instant::now();
    let workers: Vec<_> = (0..threads)
        .map(|worker| {
            let addr = addr.clone();
            thread::spawn(move || -> Result<usize, xxrpc::RpcError> {
                let mut client = Client::dial(&addr)?;
                let mut ok = 0;
                for call in 0..calls {
                    let msg = format!("w{worker}-{call}");
                    let reply: String = client.call_decode("Echo.Say", &msg)?;
                    if reply == msg.to_uppercase() {
                        ok += 1;
                    }
                }
                client.close()?;
                Ok(ok)
            })
        })
        .collect();

    let mut total = 0;
    for worker in workers {
        match worker.join() {
            Ok(result) => total += result?,
            Err(_) => return Err("worker thread panicked".into()),
        }
    }

    let elapsed = started.elapsed();
    println!(
        "{total} calls in {:.2?} ({:.0} calls/s)",
        elapsed,
        total as f64 / elapsed.as_secs_f64()
    );
    Ok(())
}

//! Receive an RTP PCM stream and print level and session statistics.
//!
//! Usage:
//!   cargo run --release --example pcm_receiver -- [URL] [SECONDS]
//!
//! Arguments:
//!   [1] Source URL (default: rtp://239.1.2.3:5004?out=2)
//!   [2] Run time in seconds (default: 10)
//!
//! Set RUST_LOG=info (or debug) to see session notices.

use std::time::{Duration, Instant};

use rtp_pcm_source::{OutputBuffers, Source, SourceConfig};

const BLOCK: usize = 4800;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let url = args.get(1).map(String::as_str).unwrap_or("rtp://239.1.2.3:5004?out=2");
    let seconds: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10);

    let config = match SourceConfig::parse(url) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Bad URL: {}", e);
            std::process::exit(1);
        }
    };
    let channels = config.output_channels as usize;

    let mut source = match Source::open(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open source: {}", e);
            std::process::exit(1);
        }
    };
    println!("Listening on {} ({:?})", url, source.layout());

    let mut left = vec![0.0f32; BLOCK];
    let mut right = vec![0.0f32; BLOCK];
    let deadline = Instant::now() + Duration::from_secs(seconds);
    let mut last_report = Instant::now();
    let mut peak = 0.0f32;

    while Instant::now() < deadline {
        let n = {
            let mut both: [&mut [f32]; 2] = [&mut left, &mut right];
            let bufs = &mut both[..channels];
            match source.produce(BLOCK, &mut OutputBuffers::Float(bufs)) {
                Ok(n) => n,
                Err(e) => {
                    eprintln!("Receive failed: {}", e);
                    break;
                }
            }
        };
        peak = left[..n].iter().fold(peak, |p, s| p.max(s.abs()));

        if last_report.elapsed() >= Duration::from_secs(1) {
            let stats = source.handle().stats();
            match source.handle().session() {
                Some(s) => println!(
                    "ssrc={:#010x} {} {}Hz ch={} pkts={} drops={} dupes={} peak={:.3}",
                    s.ssrc, s.format_name, s.sample_rate, s.channels, s.packets, s.drops, s.dupes, peak
                ),
                None => println!("waiting... received={} rejected={}", stats.packets_received, stats.unknown_payload),
            }
            peak = 0.0;
            last_report = Instant::now();
        }
    }

    println!("{:#?}", source.handle().stats());
}

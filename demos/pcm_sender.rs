//! Send a sine tone as a 48 kHz mono RTP stream (payload type 11).
//!
//! Usage:
//!   cargo run --release --example pcm_sender -- [DEST] [SECONDS] [FREQ]
//!
//! Arguments:
//!   [1] Destination address (default: 239.1.2.3:5004)
//!   [2] Run time in seconds (default: 10)
//!   [3] Tone frequency in Hz (default: 1000)

use std::net::UdpSocket;
use std::thread;
use std::time::{Duration, Instant};

use rtp_pcm_source::{PayloadFormat, RtpHeader};

/// 5 ms at 48 kHz
const FRAMES_PER_PACKET: usize = 240;
const PAYLOAD_TYPE: u8 = 11;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let dest = args.get(1).map(String::as_str).unwrap_or("239.1.2.3:5004");
    let seconds: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10);
    let freq: f32 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(1000.0);

    let format = match PayloadFormat::from_pt(PAYLOAD_TYPE) {
        Some(f) => f,
        None => {
            eprintln!("payload type {} missing from the table", PAYLOAD_TYPE);
            std::process::exit(1);
        }
    };
    let socket = match UdpSocket::bind("0.0.0.0:0") {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to bind: {}", e);
            std::process::exit(1);
        }
    };
    let _ = socket.set_multicast_ttl_v4(1);

    let mut header = RtpHeader {
        version: 2,
        payload_type: PAYLOAD_TYPE,
        ssrc: std::process::id() | 1,
        marker: true,
        ..Default::default()
    };
    let mut packet = vec![0u8; 12 + FRAMES_PER_PACKET * format.frame_bytes()];
    let step = 2.0 * std::f32::consts::PI * freq / format.sample_rate as f32;
    let mut phase = 0.0f32;

    let interval = Duration::from_micros(1_000_000 * FRAMES_PER_PACKET as u64 / format.sample_rate as u64);
    let start = Instant::now();
    let mut next = start;
    let mut sent = 0u64;

    println!("Sending {} Hz to {} as {} (ssrc {:#010x})", freq, dest, format.name, header.ssrc);

    while start.elapsed() < Duration::from_secs(seconds) {
        let offset = header.encode(&mut packet);
        for frame in packet[offset..].chunks_exact_mut(2) {
            let sample = (phase.sin() * 0.5 * 32767.0) as i16;
            frame.copy_from_slice(&sample.to_be_bytes());
            phase = (phase + step) % (2.0 * std::f32::consts::PI);
        }

        if let Err(e) = socket.send_to(&packet, dest) {
            eprintln!("Send failed: {}", e);
            break;
        }
        sent += 1;

        header.marker = false;
        header.sequence = header.sequence.wrapping_add(1);
        header.timestamp = header.timestamp.wrapping_add(FRAMES_PER_PACKET as u32);

        next += interval;
        if let Some(wait) = next.checked_duration_since(Instant::now()) {
            thread::sleep(wait);
        }
    }

    println!("Sent {} packets", sent);
}

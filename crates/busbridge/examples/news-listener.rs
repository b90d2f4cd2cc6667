//! Multicast subscription — two handlers on one address.
//!
//! Run with:
//!   cargo run --example news-listener -- 127.0.0.1 7000
//!
//! Then publish to `news.uk.sport` from anywhere on the bus. Ctrl-C (or the
//! bridge going away) ends the program.

use std::sync::mpsc;

use busbridge::{EventBusClient, Headers};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port: u16 = args.next().as_deref().unwrap_or("7000").parse()?;

    let client = EventBusClient::new()?;
    let (done_tx, done_rx) = mpsc::channel();
    client.set_error_handler(move |err| {
        eprintln!("bridge error: {err}");
        if err.is_disconnected() {
            let _ = done_tx.send(());
        }
    });
    client.connect(&host, port)?;

    client.register("news.uk.sport", None, Headers::new(), |message| {
        println!("[headline] {}", message.body());
    })?;
    let archiver = client.register("news.uk.sport", Some("archiver"), Headers::new(), |message| {
        eprintln!("[archive] {} bytes", message.body().to_string().len());
    })?;
    eprintln!(
        "{} handlers on news.uk.sport (archiver id: {archiver})",
        client.registration_count("news.uk.sport")
    );

    let _ = done_rx.recv();
    Ok(())
}

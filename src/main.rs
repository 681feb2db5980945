use framegen::config;
use framegen::machine::{Element, StreamMachine};
use framegen::stats::{self, Stats};
use framegen::utils;
use framegen::worker::run_port;
mod cmd;

use std::error::Error;
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::bounded;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = cmd::Args::parse();

    let result = match args.command {
        cmd::Command::Run {
            config,
            queue_size,
            report_period,
        } => run(&config, queue_size, report_period),
        cmd::Command::Show { config, frames } => show(&config, frames),
    };
    if let Err(e) = result {
        log::error!("{e}");
        process::exit(1);
    }
}

fn show(path: &str, frames: usize) -> Result<(), Box<dyn Error>> {
    let config = config::load_config(Path::new(path))?;
    for port in config.ports.iter() {
        for stream in port.streams.iter() {
            log::info!("Port \"{}\", {}", port.name, stream.describe());
            let mut machine = StreamMachine::prepare(stream)?;
            for i in 0..frames {
                match machine.next_frame() {
                    Some(frame) => log::info!(
                        "Frame {i} ({} bytes)\n{}",
                        frame.len(),
                        utils::hex_dump(frame)
                    ),
                    None => break,
                }
            }
        }
    }
    Ok(())
}

fn run(path: &str, queue_size: usize, report_period: u64) -> Result<(), Box<dyn Error>> {
    let config = config::load_config(Path::new(path))?;
    let stats = Arc::new(Stats::new(config.stream_count() as u64));

    // Handle ctrl+C
    let s = Arc::clone(&stats);
    ctrlc::set_handler(move || {
        if !s.should_stop() {
            log::warn!("Ending the generation, please wait");
            s.stop_early();
        } else {
            log::warn!("Ending immediately");
            process::abort();
        }
    })?;

    let mut gen_threads = vec![];
    for port in config.ports {
        let (tx, rx) = bounded::<Element>(queue_size.max(1));

        let stats_sink = Arc::clone(&stats);
        let builder = thread::Builder::new().name(format!("Sink-{}", port.name));
        gen_threads.push(builder.spawn(move || {
            for e in rx {
                stats_sink.element_sent(&e);
            }
        })?);

        let stats_port = Arc::clone(&stats);
        let builder = thread::Builder::new().name(format!("Port-{}", port.name));
        gen_threads.push(builder.spawn(move || run_port(port, tx, stats_port))?);
    }

    let monitoring = {
        let stats = Arc::clone(&stats);
        let builder = thread::Builder::new().name("Monitoring".into());
        builder.spawn(move || stats::run(stats, Duration::from_secs(report_period)))?
    };

    // Wait for the generation threads to end
    for thread in gen_threads {
        if thread.join().is_err() {
            log::error!("A generation thread panicked");
        }
    }
    stats.stop_early();
    if monitoring.join().is_err() {
        log::error!("The monitoring thread panicked");
    }
    Ok(())
}

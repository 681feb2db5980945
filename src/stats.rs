use crate::machine::Element;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub struct Stats {
    pub start_time: Instant,
    pub frames_counter: AtomicU64,
    pub elements_counter: AtomicU64,
    pub bytes_counter: AtomicU64,
    pub streams_done: AtomicU64,
    pub early_stop: AtomicBool,
    pub streams_target: u64,
}

impl Default for Stats {
    fn default() -> Self {
        Stats::new(0)
    }
}

impl Stats {
    pub fn new(streams_target: u64) -> Self {
        Stats {
            start_time: Instant::now(),
            frames_counter: AtomicU64::new(0),
            elements_counter: AtomicU64::new(0),
            bytes_counter: AtomicU64::new(0),
            streams_done: AtomicU64::new(0),
            early_stop: AtomicBool::new(false),
            streams_target,
        }
    }

    pub fn element_sent(&self, e: &Element) {
        self.elements_counter.fetch_add(1, Ordering::Relaxed);
        self.bytes_counter
            .fetch_add(e.len as u64, Ordering::Relaxed);
        if e.last {
            self.frames_counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn stream_done(&self) {
        self.streams_done.fetch_add(1, Ordering::Relaxed);
    }

    pub fn should_stop(&self) -> bool {
        self.early_stop.load(Ordering::Relaxed)
            || (self.streams_target > 0
                && self.streams_done.load(Ordering::Relaxed) >= self.streams_target)
    }

    pub fn stop_early(&self) {
        self.early_stop.store(true, Ordering::Relaxed);
    }

    fn log(&self) {
        let fc = self.frames_counter.load(Ordering::Relaxed);
        let bc = self.bytes_counter.load(Ordering::Relaxed);
        let elapsed = self.start_time.elapsed().as_secs_f64().max(1e-3);
        let throughput = 8. * (bc as f64) / elapsed / 1_000_000.;
        if throughput < 1. {
            log::info!("{fc} frames generated ({:.2} kbps)", throughput * 1000.);
        } else if throughput < 1000. {
            log::info!("{fc} frames generated ({:.2} Mbps)", throughput);
        } else {
            log::info!("{fc} frames generated ({:.2} Gbps)", throughput / 1000.);
        }
    }
}

/// Log the generation throughput regularly until the generation stops.
pub fn run(stats: Arc<Stats>, period: Duration) {
    let tick = Duration::from_millis(100);
    let mut last = Instant::now();
    while !stats.should_stop() {
        thread::sleep(tick);
        if last.elapsed() >= period {
            stats.log();
            last = Instant::now();
        }
    }
    stats.log();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::ELEMENT_SIZE;

    #[test]
    fn test_counters() {
        let stats = Stats::new(1);
        let e = Element {
            stream: 0,
            frame: 0,
            index: 0,
            data: [0; ELEMENT_SIZE],
            len: 10,
            last: true,
        };
        stats.element_sent(&e);
        assert_eq!(stats.frames_counter.load(Ordering::Relaxed), 1);
        assert_eq!(stats.bytes_counter.load(Ordering::Relaxed), 10);
        assert!(!stats.should_stop());
        stats.stream_done();
        assert!(stats.should_stop());
    }
}

use crate::config::Port;
use crate::machine::{Element, PullStatus, StreamMachine};
use crate::stats::Stats;

use std::sync::Arc;

use crossbeam_channel::Sender;

/// Play the streams of a port one after the other. The free room of the transmit queue is the
/// space offered to the stream machine, and at least one element is always offered.
pub fn run_port(port: Port, tx: Sender<Element>, stats: Arc<Stats>) {
    log::info!(
        "Port \"{}\" starts with {} stream(s)",
        port.name,
        port.streams.len()
    );
    let capacity = tx.capacity().unwrap_or(1);
    let mut out = Vec::with_capacity(capacity);
    for stream in port.streams.iter() {
        let mut machine = match StreamMachine::prepare(stream) {
            Ok(m) => m,
            Err(e) => {
                log::error!("{e}");
                stats.stream_done();
                continue;
            }
        };
        log::debug!("Stream {} timing: {:?}", stream.id(), machine.timing());
        loop {
            if stats.should_stop() {
                log::trace!("Port \"{}\" stops", port.name);
                return;
            }
            // with a full queue, one element is pulled and the send below blocks until room frees up
            let space = capacity.saturating_sub(tx.len()).max(1);
            let status = machine.pull(space, &mut out);
            for e in out.drain(..) {
                if tx.send(e).is_err() {
                    return;
                }
            }
            if status == PullStatus::Done {
                log::info!(
                    "Stream \"{}\" sent {} frame(s)",
                    stream.name(),
                    machine.frames_done()
                );
                stats.stream_done();
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::HeaderType;
    use crate::header::Header;
    use crate::policy::GenSpec;
    use crate::stream::{Property, Stream};

    use std::thread;
    use std::time::Duration;

    use crossbeam_channel::bounded;

    fn port(streams: u32) -> Port {
        let streams = (0..streams)
            .map(|id| {
                let mut s = Stream::new(id, format!("s{id}"));
                s.attach_header(Header::build(HeaderType::Ethernet));
                s.set_property(Property::FrameLen(GenSpec::Fixed { value: 100 }))
                    .unwrap();
                s.set_property(Property::BurstSize(5)).unwrap();
                s.bootstrap().unwrap();
                s
            })
            .collect();
        Port {
            id: 0,
            name: "test".to_string(),
            streams,
        }
    }

    #[test]
    fn test_slow_sink_gets_every_element() {
        let (tx, rx) = bounded::<Element>(1);
        let stats = Arc::new(Stats::new(2));
        let s = Arc::clone(&stats);
        let worker = thread::spawn(move || run_port(port(2), tx, s));
        let mut received = vec![];
        for e in rx {
            thread::sleep(Duration::from_millis(1));
            received.push((e.stream, e.frame, e.index));
        }
        worker.join().unwrap();
        // two streams of five frames, two elements each
        assert_eq!(received.len(), 20);
        assert_eq!(received[0], (0, 0, 0));
        assert_eq!(received[19], (1, 4, 1));
        assert!(stats.should_stop());
    }

    #[test]
    fn test_stop_request_ends_the_port() {
        let (tx, rx) = bounded::<Element>(4);
        let stats = Arc::new(Stats::new(2));
        stats.stop_early();
        run_port(port(2), tx, Arc::clone(&stats));
        assert_eq!(rx.iter().count(), 0);
    }
}

//! Frame and burst state machine: turns a bootstrapped stream into fixed-size transmit elements,
//! never producing more than the consumer has room for.

use crate::error::ConfigError;
use crate::payload::Payloads;
use crate::splice;
use crate::stream::{ActiveField, AutoLength, Stream, Timing};

/// Size of a transmit element in bytes
pub const ELEMENT_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    /// The next frame has to be mutated before being sent
    NewFrame,
    /// Elements of the current frame remain to be sent
    Transmit,
    /// The whole burst was sent
    Done,
}

/// One slice of a frame handed to the transmit path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub stream: u32,
    /// Frame number in the burst
    pub frame: u64,
    /// Position of the element in its frame
    pub index: usize,
    pub data: [u8; ELEMENT_SIZE],
    /// Meaningful bytes of `data`
    pub len: usize,
    /// Last element of its frame
    pub last: bool,
}

impl Element {
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullStatus {
    /// The burst is not over
    More,
    /// The burst is over, nothing more will be produced
    Done,
}

/// Per-stream generation state, cloned from a bootstrapped stream
#[derive(Debug, Clone)]
pub struct StreamMachine {
    stream: u32,
    state: MachineState,
    frame: Vec<u8>,
    frame_len: usize,
    header_len: usize,
    /// Elements of the current frame, and how many were already sent
    elements: usize,
    sent: usize,
    frames_done: u64,
    burst_size: u64,
    active: Vec<ActiveField>,
    udfs: Vec<ActiveField>,
    auto_lengths: Vec<AutoLength>,
    sizes: Vec<usize>,
    repeat_sizes: bool,
    next_size: usize,
    payloads: Payloads,
    timing: Timing,
}

impl StreamMachine {
    /// Copy the generation state of a bootstrapped stream and reset the counters.
    pub fn prepare(stream: &Stream) -> Result<Self, ConfigError> {
        let b = stream.bootstrapped()?;
        log::debug!(
            "Stream {} prepared for a burst of {} frame(s)",
            stream.id(),
            stream.properties().burst_size
        );
        Ok(StreamMachine {
            stream: stream.id(),
            state: MachineState::NewFrame,
            frame: b.principal.clone(),
            frame_len: 0,
            header_len: b.header_len,
            elements: 0,
            sent: 0,
            frames_done: 0,
            burst_size: stream.properties().burst_size,
            active: b.active.clone(),
            udfs: b.udfs.clone(),
            auto_lengths: b.auto_lengths.clone(),
            sizes: b.sizes.clone(),
            repeat_sizes: b.repeat_sizes,
            next_size: 0,
            payloads: b.payloads.clone(),
            timing: stream.properties().timing,
        })
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn stream_id(&self) -> u32 {
        self.stream
    }

    /// Frames fully handed out so far
    pub fn frames_done(&self) -> u64 {
        self.frames_done
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Number of fields still changing from frame to frame, user-defined fields excluded
    pub fn mutable_fields(&self) -> usize {
        self.active.len()
    }

    /// Produce at most `space_available` elements into `out`.
    ///
    /// A frame interrupted by a lack of space is resumed by the next call, at the element where it
    /// stopped.
    pub fn pull(&mut self, space_available: usize, out: &mut Vec<Element>) -> PullStatus {
        let mut space = space_available;
        loop {
            match self.state {
                MachineState::Done => return PullStatus::Done,
                _ if space == 0 => return PullStatus::More,
                MachineState::NewFrame => self.mutate(),
                MachineState::Transmit => {
                    out.push(self.element(self.sent));
                    self.sent += 1;
                    space -= 1;
                    if self.sent == self.elements {
                        self.finish_frame();
                    }
                }
            }
        }
    }

    /// Whole-frame variant of [`StreamMachine::pull`]. The frame being transmitted, if any, is
    /// returned whole and counted as done, whatever elements were already pulled from it.
    pub fn next_frame(&mut self) -> Option<&[u8]> {
        match self.state {
            MachineState::Done => return None,
            MachineState::NewFrame => self.mutate(),
            MachineState::Transmit => (),
        }
        self.finish_frame();
        Some(&self.frame[..self.frame_len])
    }

    /// Build the next frame in place: advance every mutable field, then refresh the payload, the
    /// length fields and the user-defined fields.
    fn mutate(&mut self) {
        let size = self.sizes[self.next_size];
        if self.next_size + 1 < self.sizes.len() {
            self.next_size += 1;
        } else if self.repeat_sizes {
            self.next_size = 0;
        }

        let frame = &mut self.frame;
        self.active.retain_mut(|f| {
            let draw = f.state.next();
            splice::splice_wide(frame, f.offset, f.bit_len, draw.value());
            if draw.is_exhausted() {
                log::trace!("{} exhausted, keeps value {:#x}", f.name, draw.value());
            }
            !draw.is_exhausted()
        });

        let payload = self.payloads.for_frame(self.frames_done);
        self.frame[self.header_len..size].copy_from_slice(&payload[..size - self.header_len]);
        for auto in self.auto_lengths.iter() {
            auto.write(&mut self.frame, size);
        }
        for udf in self.udfs.iter_mut() {
            if !udf.exhausted {
                let draw = udf.state.next();
                udf.last = draw.value();
                udf.exhausted = draw.is_exhausted();
            }
            splice::splice_wide(&mut self.frame, udf.offset, udf.bit_len, udf.last);
        }

        self.frame_len = size;
        self.elements = size.div_ceil(ELEMENT_SIZE);
        self.sent = 0;
        self.state = MachineState::Transmit;
        log::trace!(
            "Stream {} frame {}: {} bytes",
            self.stream,
            self.frames_done,
            size
        );
    }

    fn element(&self, index: usize) -> Element {
        let start = index * ELEMENT_SIZE;
        let end = (start + ELEMENT_SIZE).min(self.frame_len);
        let mut data = [0; ELEMENT_SIZE];
        data[..end - start].copy_from_slice(&self.frame[start..end]);
        Element {
            stream: self.stream,
            frame: self.frames_done,
            index,
            data,
            len: end - start,
            last: index + 1 == self.elements,
        }
    }

    fn finish_frame(&mut self) {
        self.frames_done += 1;
        self.sent = self.elements;
        if self.frames_done >= self.burst_size {
            log::debug!("Stream {} done after {} frame(s)", self.stream, self.frames_done);
            self.state = MachineState::Done;
        } else {
            self.state = MachineState::NewFrame;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldId, HeaderType};
    use crate::header::Header;
    use crate::policy::GenSpec;
    use crate::stream::Property;

    fn sizes(frame_len: GenSpec<u64>, burst: u64) -> Vec<usize> {
        let mut s = Stream::new(1, "sizes");
        s.attach_header(Header::build(HeaderType::Ethernet));
        s.set_property(Property::FrameLen(frame_len)).unwrap();
        s.set_property(Property::BurstSize(burst)).unwrap();
        s.bootstrap().unwrap();
        let mut m = StreamMachine::prepare(&s).unwrap();
        let mut out = vec![];
        while let Some(frame) = m.next_frame() {
            out.push(frame.len());
        }
        out
    }

    fn stream(frame_len: u64, burst: u64) -> Stream {
        let mut s = Stream::new(7, "test");
        s.attach_header(
            Header::build(HeaderType::Ethernet)
                .with(
                    FieldId::EtherType,
                    GenSpec::Increment {
                        start: 0x1000,
                        step: 1,
                        count: 3,
                        repeat: false,
                    },
                )
                .unwrap(),
        );
        s.set_property(Property::FrameLen(GenSpec::Fixed { value: frame_len }))
            .unwrap();
        s.set_property(Property::BurstSize(burst)).unwrap();
        s.bootstrap().unwrap();
        s
    }

    #[test]
    fn test_not_bootstrapped() {
        let s = Stream::new(3, "raw");
        assert_eq!(
            StreamMachine::prepare(&s).err(),
            Some(ConfigError::NotBootstrapped(3))
        );
    }

    #[test]
    fn test_elements_of_a_frame() {
        let s = stream(150, 1);
        let mut m = StreamMachine::prepare(&s).unwrap();
        let mut out = vec![];
        assert_eq!(m.pull(10, &mut out), PullStatus::Done);
        assert_eq!(out.len(), 3);
        assert_eq!(
            out.iter().map(|e| e.len).collect::<Vec<_>>(),
            vec![64, 64, 22]
        );
        assert!(out[2].last && !out[1].last);
        assert_eq!(m.state(), MachineState::Done);
        assert_eq!(m.pull(10, &mut out), PullStatus::Done);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_pull_respects_space() {
        let s = stream(150, 4);
        let mut m = StreamMachine::prepare(&s).unwrap();
        let mut out = vec![];
        assert_eq!(m.pull(0, &mut out), PullStatus::More);
        assert!(out.is_empty());
        assert_eq!(m.pull(2, &mut out), PullStatus::More);
        assert_eq!(out.len(), 2);
        assert_eq!(m.state(), MachineState::Transmit);
        // resumes on the third element of the first frame
        assert_eq!(m.pull(1, &mut out), PullStatus::More);
        assert_eq!((out[2].frame, out[2].index), (0, 2));
        while m.pull(5, &mut out) == PullStatus::More {}
        assert_eq!(out.len(), 12);
        assert_eq!(m.frames_done(), 4);
    }

    #[test]
    fn test_frame_sizes_follow_repeat() {
        let increment = |repeat| GenSpec::Increment {
            start: 64,
            step: 64,
            count: 3,
            repeat,
        };
        assert_eq!(sizes(increment(false), 6), vec![64, 128, 192, 192, 192, 192]);
        assert_eq!(sizes(increment(true), 6), vec![64, 128, 192, 64, 128, 192]);
        let list = |repeat| GenSpec::ValueList {
            values: vec![64, 100],
            repeat,
        };
        assert_eq!(sizes(list(false), 4), vec![64, 100, 100, 100]);
        assert_eq!(sizes(list(true), 4), vec![64, 100, 64, 100]);
    }

    #[test]
    fn test_next_frame_mid_transmit() {
        let s = stream(150, 2);
        let mut m = StreamMachine::prepare(&s).unwrap();
        let mut out = vec![];
        m.pull(1, &mut out);
        assert_eq!(m.state(), MachineState::Transmit);
        // the partly pulled frame comes back whole
        assert_eq!(m.next_frame().map(|f| f.len()), Some(150));
        assert_eq!(m.frames_done(), 1);
        assert_eq!(m.state(), MachineState::NewFrame);
    }

    #[test]
    fn test_mutation_and_pruning() {
        let s = stream(64, 5);
        let mut m = StreamMachine::prepare(&s).unwrap();
        let mut types = vec![];
        while let Some(frame) = m.next_frame() {
            types.push(u16::from_be_bytes([frame[12], frame[13]]));
        }
        assert_eq!(types, vec![0x1000, 0x1001, 0x1002, 0x1002, 0x1002]);
        assert_eq!(m.mutable_fields(), 0);
    }
}

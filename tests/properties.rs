use framegen::splice::{extract, mask, splice};
use framegen::{FieldId, GenSpec, Header, HeaderType, Property, PullStatus, Stream, StreamMachine};
use proptest::prelude::*;

proptest! {
    #[test]
    fn splice_then_extract(
        mut buf in proptest::collection::vec(any::<u8>(), 10..24),
        offset in 0usize..16,
        len in 0usize..=64,
        value in any::<u64>(),
    ) {
        prop_assume!(offset + len <= buf.len() * 8);
        let before = buf.clone();
        splice(&mut buf, offset, len, value);
        prop_assert_eq!(extract(&buf, offset, len), value & mask(len));
        // bits outside of the field are untouched
        for pos in (0..buf.len() * 8).filter(|p| *p < offset || *p >= offset + len) {
            prop_assert_eq!(extract(&buf, pos, 1), extract(&before, pos, 1));
        }
    }

    #[test]
    fn pull_never_exceeds_space(
        spaces in proptest::collection::vec(0usize..5, 1..200),
        frame_len in 60u64..300,
        burst in 1u64..6,
    ) {
        let mut stream = Stream::new(0, "prop");
        stream.attach_header(
            Header::build(HeaderType::Ethernet)
                .with(FieldId::EtherType, GenSpec::<u64>::Random { seed: 2 })
                .unwrap(),
        );
        stream.set_property(Property::FrameLen(GenSpec::Fixed { value: frame_len })).unwrap();
        stream.set_property(Property::BurstSize(burst)).unwrap();
        stream.bootstrap().unwrap();
        let mut machine = StreamMachine::prepare(&stream).unwrap();
        let per_frame = (frame_len as usize).div_ceil(64);
        let mut out = vec![];
        let mut done = false;
        for space in spaces {
            let before = out.len();
            let status = machine.pull(space, &mut out);
            prop_assert!(out.len() - before <= space);
            if status == PullStatus::Done {
                done = true;
                break;
            }
        }
        prop_assert!(out.len() <= per_frame * burst as usize);
        if done {
            prop_assert_eq!(out.len(), per_frame * burst as usize);
            prop_assert_eq!(machine.frames_done(), burst);
        }
    }
}

use framegen::config::{import_config, Format};
use framegen::{
    ConfigError, Element, Error, FieldId, GenSpec, Header, HeaderType, Property, PullStatus, Stream,
    StreamMachine,
};

use pnet_packet::ethernet::{EtherTypes, EthernetPacket};
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::tcp::{TcpFlags, TcpPacket};
use pnet_packet::udp::UdpPacket;
use pnet_packet::vlan::VlanPacket;
use pnet_packet::Packet;
use std::net::Ipv4Addr;

const SAMPLE: &str = include_str!("../demos/streams.toml");

fn frames(stream: &Stream, count: usize) -> Result<Vec<Vec<u8>>, Box<dyn std::error::Error>> {
    let mut machine = StreamMachine::prepare(stream)?;
    let mut out = vec![];
    while out.len() < count {
        match machine.next_frame() {
            Some(f) => out.push(f.to_vec()),
            None => break,
        }
    }
    Ok(out)
}

#[test]
fn mac_address_is_spliced_at_offset_zero() -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = Stream::new(0, "mac");
    stream.attach_header(
        Header::build(HeaderType::Ethernet).with(FieldId::EthDest, "AA:BB:CC:DD:EE:FF")?,
    );
    stream.bootstrap()?;
    let frame = &frames(&stream, 1)?[0];
    assert_eq!(&frame[..6], &[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    Ok(())
}

#[test]
fn udp_frames_decode() -> Result<(), Box<dyn std::error::Error>> {
    let config = import_config(SAMPLE, Format::Toml)?;
    let stream = &config.ports[0].streams[0];
    let produced = frames(stream, 10)?;
    assert_eq!(produced.len(), 10);
    for (i, frame) in produced.iter().enumerate() {
        // sizes cycle through 64, 128, ..., 512
        assert_eq!(frame.len(), 64 * (i % 8 + 1));
        let eth = EthernetPacket::new(frame).ok_or("ethernet")?;
        assert_eq!(eth.get_ethertype(), EtherTypes::Ipv4);
        assert_eq!(&frame[6..12], &[2, 0, 0, 0, 0, 1]);
        let ip = Ipv4Packet::new(eth.payload()).ok_or("ipv4")?;
        assert_eq!(ip.get_version(), 4);
        assert_eq!(ip.get_header_length(), 5);
        assert_eq!(ip.get_ttl(), 64);
        assert_eq!(ip.get_total_length() as usize, frame.len() - 14);
        assert_eq!(ip.get_next_level_protocol(), IpNextHeaderProtocols::Udp);
        assert_eq!(ip.get_source(), Ipv4Addr::new(10, 0, 0, 1 + i as u8));
        assert_eq!(ip.get_destination(), Ipv4Addr::new(10, 0, 1, 1));
        let udp = UdpPacket::new(ip.payload()).ok_or("udp")?;
        assert_eq!(udp.get_destination(), [53, 123, 161][i % 3]);
        assert!(udp.get_source() >= 1024);
        assert_eq!(udp.get_length() as usize, frame.len() - 34);
    }
    Ok(())
}

#[test]
fn tagged_tcp_frames_decode() -> Result<(), Box<dyn std::error::Error>> {
    let config = import_config(SAMPLE, Format::Toml)?;
    let stream = &config.ports[1].streams[0];
    let produced = frames(stream, 100)?;
    // the burst is 20 frames long
    assert_eq!(produced.len(), 20);
    for (i, frame) in produced.iter().enumerate() {
        assert!([64, 594, 1518].contains(&frame.len()));
        let eth = EthernetPacket::new(frame).ok_or("ethernet")?;
        assert_eq!(eth.get_ethertype(), EtherTypes::Vlan);
        let vlan = VlanPacket::new(eth.payload()).ok_or("vlan")?;
        assert_eq!(vlan.get_vlan_identifier(), [10, 20][i % 2]);
        assert_eq!(vlan.get_priority_code_point().0, 5);
        assert_eq!(vlan.get_ethertype(), EtherTypes::Ipv4);
        let ip = Ipv4Packet::new(vlan.payload()).ok_or("ipv4")?;
        assert_eq!(ip.get_next_level_protocol(), IpNextHeaderProtocols::Tcp);
        assert_eq!(ip.get_total_length() as usize, frame.len() - 18);
        let tcp = TcpPacket::new(ip.payload()).ok_or("tcp")?;
        assert_eq!(tcp.get_destination(), 443);
        assert_eq!(tcp.get_data_offset(), 5);
        assert_ne!(tcp.get_flags() & TcpFlags::SYN, 0);
        assert_eq!(tcp.get_flags() & TcpFlags::ACK, 0);
        // marker right after the headers
        assert_eq!(&frame[58..62], &(1 + i as u32).to_be_bytes());
    }
    Ok(())
}

fn elements(stream: &Stream, space: usize) -> Result<Vec<Element>, Box<dyn std::error::Error>> {
    let mut machine = StreamMachine::prepare(stream)?;
    let mut out = vec![];
    while machine.pull(space, &mut out) == PullStatus::More {}
    Ok(out)
}

#[test]
fn generation_is_deterministic() -> Result<(), Box<dyn std::error::Error>> {
    let a = import_config(SAMPLE, Format::Toml)?;
    let b = import_config(SAMPLE, Format::Toml)?;
    for (pa, pb) in a.ports.iter().zip(b.ports.iter()) {
        for (sa, sb) in pa.streams.iter().zip(pb.streams.iter()) {
            let ea = elements(sa, 3)?;
            assert!(!ea.is_empty());
            assert_eq!(ea, elements(sb, 3)?);
        }
    }
    Ok(())
}

#[test]
fn decrement_stops_after_count() -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = Stream::new(0, "ttl");
    stream.attach_header(Header::build(HeaderType::Ethernet));
    stream.attach_header(Header::build(HeaderType::Ipv4).with(
        FieldId::Ipv4Ttl,
        GenSpec::Decrement {
            start: 1,
            step: 1,
            count: 3,
            repeat: false,
        },
    )?);
    stream.set_property(Property::BurstSize(6))?;
    stream.bootstrap()?;
    let mut machine = StreamMachine::prepare(&stream)?;
    let mut ttls = vec![];
    while let Some(frame) = machine.next_frame() {
        ttls.push(frame[22]);
    }
    assert_eq!(ttls, vec![1, 0, 255, 255, 255, 255]);
    assert_eq!(machine.mutable_fields(), 0);
    Ok(())
}

#[test]
fn increment_stops_after_count() -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = Stream::new(0, "ttl");
    stream.attach_header(Header::build(HeaderType::Ethernet));
    stream.attach_header(Header::build(HeaderType::Ipv4).with(
        FieldId::Ipv4Ttl,
        GenSpec::Increment {
            start: 0,
            step: 1,
            count: 5,
            repeat: false,
        },
    )?);
    stream.set_property(Property::BurstSize(8))?;
    stream.bootstrap()?;
    let ttls: Vec<u8> = frames(&stream, 8)?.iter().map(|f| f[22]).collect();
    assert_eq!(ttls, vec![0, 1, 2, 3, 4, 4, 4, 4]);
    Ok(())
}

#[test]
fn value_list_wraps() -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = Stream::new(0, "tos");
    stream.attach_header(Header::build(HeaderType::Ethernet));
    stream.attach_header(Header::build(HeaderType::Ipv4).with(
        FieldId::Ipv4Tos,
        GenSpec::ValueList {
            values: vec![1, 2, 3],
            repeat: true,
        },
    )?);
    stream.set_property(Property::BurstSize(7))?;
    stream.bootstrap()?;
    let tos: Vec<u8> = frames(&stream, 7)?.iter().map(|f| f[15]).collect();
    assert_eq!(tos, vec![1, 2, 3, 1, 2, 3, 1]);
    Ok(())
}

#[test]
fn misaligned_custom_header_is_rejected() {
    let mut stream = Stream::new(9, "broken");
    stream.attach_header(Header::custom(&[FieldId::TcpSrcPort, FieldId::TcpReserved]));
    assert!(matches!(
        stream.bootstrap(),
        Err(Error::Config(ConfigError::NotByteAligned { .. }))
    ));
    assert!(matches!(
        StreamMachine::prepare(&stream),
        Err(ConfigError::NotBootstrapped(9))
    ));
}

#[test]
fn elements_rebuild_the_frames() -> Result<(), Box<dyn std::error::Error>> {
    let config = import_config(SAMPLE, Format::Toml)?;
    let stream = &config.ports[0].streams[0];
    let expected = frames(stream, 100)?;
    let mut machine = StreamMachine::prepare(stream)?;
    let mut elements = vec![];
    let mut space = 1;
    while machine.pull(space, &mut elements) == PullStatus::More {
        space = space % 7 + 1;
    }
    let mut rebuilt: Vec<Vec<u8>> = vec![];
    let mut current = vec![];
    for e in elements.iter() {
        current.extend_from_slice(e.bytes());
        if e.last {
            rebuilt.push(std::mem::take(&mut current));
        }
    }
    assert!(current.is_empty());
    assert_eq!(rebuilt, expected);
    Ok(())
}

// demos/discovery-dump/main.rs
//
// Reads a captured PPPoE discovery exchange from a pcap file and prints a
// human-readable dump of every discovery tag found in each frame, using the
// same bounds-checked walker (`ng_pppoe::tag`) the driver itself decodes
// PADI/PADO/PADR/PADS packets with.

use std::error::Error;
use std::fs::File;
use std::path::Path;

use clap::Parser;
use pcap_file::pcap::PcapReader;
use pcap_file::DataLink;

const ETHERNET_HEADER_LEN: usize = 14;
const PPPOE_DISCOVERY_HEADER_LEN: usize = 6;
const PPPOE_DISCOVERY_ETHERTYPE: u16 = 0x8863;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the pcap file to read.
    #[arg(short, long)]
    pcap: String,

    /// Show only PPPoE discovery frames (filter out everything else).
    #[arg(short = 'f', long)]
    discovery_only: bool,
}

fn code_name(code: u8) -> &'static str {
    match code {
        0x09 => "PADI",
        0x07 => "PADO",
        0x19 => "PADR",
        0x65 => "PADS",
        0xa7 => "PADT",
        _ => "unknown",
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    if !Path::new(&args.pcap).exists() {
        eprintln!("Error: pcap file '{}' not found", args.pcap);
        std::process::exit(1);
    }

    let file = File::open(&args.pcap)?;
    let mut reader = PcapReader::new(file)?;
    let datalink = reader.header().datalink;
    println!("Reading pcap file: {}", args.pcap);
    println!("Datalink type: {:?}", datalink);
    println!("{}", "=".repeat(60));

    let mut frame_count = 0usize;
    let mut discovery_count = 0usize;

    while let Some(packet) = reader.next_packet() {
        let packet = packet?;
        frame_count += 1;
        let data = packet.data;

        if datalink != DataLink::ETHERNET {
            if !args.discovery_only {
                println!("Packet {}: unsupported datalink type: {:?}", frame_count, datalink);
            }
            continue;
        }
        if data.len() < ETHERNET_HEADER_LEN + PPPOE_DISCOVERY_HEADER_LEN {
            continue;
        }
        let ethertype = u16::from_be_bytes([data[12], data[13]]);
        if ethertype != PPPOE_DISCOVERY_ETHERTYPE {
            if !args.discovery_only {
                println!("Packet {}: non-PPPoE-discovery (EtherType 0x{:04x})", frame_count, ethertype);
            }
            continue;
        }

        discovery_count += 1;
        let header = &data[ETHERNET_HEADER_LEN..ETHERNET_HEADER_LEN + PPPOE_DISCOVERY_HEADER_LEN];
        let code = header[1];
        let session_id = u16::from_be_bytes([header[2], header[3]]);
        let declared_len = u16::from_be_bytes([header[4], header[5]]) as usize;

        println!(
            "Packet {}: {} (session 0x{:04x}, declared length {})",
            frame_count,
            code_name(code),
            session_id,
            declared_len
        );

        let tag_start = ETHERNET_HEADER_LEN + PPPOE_DISCOVERY_HEADER_LEN;
        let tag_end = (tag_start + declared_len).min(data.len());
        let tag_area = &data[tag_start..tag_end];

        if let Some(service) = ng_pppoe::tag::find_tag(tag_area, ng_pppoe::tag::PPPOE_TAG_SERVICE_NAME) {
            println!("  Service-Name: {}", String::from_utf8_lossy(service.value));
        }
        if let Some(ac_name) = ng_pppoe::tag::find_tag(tag_area, ng_pppoe::tag::PPPOE_TAG_AC_NAME) {
            println!("  AC-Name: {}", String::from_utf8_lossy(ac_name.value));
        }
        if let Some(vendor) = ng_pppoe::tag::find_vendor_tag(tag_area, ng_pppoe::tag::DSL_FORUM_VENDOR_ID) {
            let ids = ng_pppoe::tag::parse_dsl_forum_subtlvs(vendor.value);
            println!(
                "  DSL-Forum: circuit-id='{}' remote-id='{}'",
                ids.agent_circuit_id, ids.agent_remote_id
            );
        }
        ng_pppoe::tag::print(tag_area);
    }

    println!("{}", "=".repeat(60));
    println!("{} frames read, {} PPPoE discovery frames", frame_count, discovery_count);
    Ok(())
}

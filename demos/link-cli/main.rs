// demos/link-cli/main.rs
//
// Illustrative CLI front end over the configuration surface (§4.7) and
// state machine (§4.5) of `ng_pppoe::driver::Driver`. There is no real
// netgraph transport in this crate (the kernel side is out of reach from
// userspace Rust, per `ng_pppoe::transport`'s own doc comment), so this demo
// drives the driver against `MockTransport` and prints every kernel-plumbing
// call it would have issued, rather than actually touching a netgraph node.

use std::error::Error;

use clap::{Parser, Subcommand};
use network_interface::{NetworkInterface, NetworkInterfaceConfig};
use ng_pppoe::clock::FakeClock;
use ng_pppoe::driver::Driver;
use ng_pppoe::link::LinkId;
use ng_pppoe::transport::mock::MockTransport;
use ng_pppoe::upper::{DownCause, Originated, UpperHook, UpperLayer};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Parent Ethernet interface to bind the link to.
    #[arg(short, long)]
    interface: String,

    /// Service-Name pattern to request ("*" matches any offer).
    #[arg(short, long, default_value = "*")]
    service: String,

    /// AC-Name to advertise if this link also listens for incoming requests.
    #[arg(long)]
    acname: Option<String>,

    /// PPP-Max-Payload to request; 0 disables the request.
    #[arg(long, default_value_t = 0)]
    max_payload: u16,

    /// MAC address rendering format used in calling/called-number output.
    #[arg(long, default_value = "unformatted")]
    mac_format: String,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Open an outgoing session toward whatever AC answers first.
    Open,
    /// Enable incoming-call matching and wait for a discovery request.
    Listen,
}

/// Upper layer that just narrates every callback; stands in for the
/// embedding PPP daemon's bundle/link management this crate does not own.
struct PrintingUpper;

impl UpperLayer for PrintingUpper {
    fn notify_up(&mut self, link: LinkId) {
        println!("link {}: UP", link.0);
    }
    fn notify_down(&mut self, link: LinkId, cause: DownCause) {
        println!("link {}: DOWN ({})", link.0, cause.as_str());
    }
    fn notify_incoming(&mut self, link: LinkId) {
        println!("link {}: incoming request accepted", link.0);
    }
    fn request_upper_hook(&mut self, link: LinkId) -> UpperHook {
        UpperHook {
            path: "mpd-bundle:".to_string(),
            hook: format!("link{}", link.0),
        }
    }
    fn instantiate(&mut self, template: LinkId) -> LinkId {
        println!("link {}: cloning template for a new incoming call", template.0);
        template
    }
    fn originated(&self, _link: LinkId) -> Originated {
        Originated::Local
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let interfaces = NetworkInterface::show()?;
    if !interfaces.iter().any(|iface| iface.name == args.interface) {
        eprintln!(
            "warning: '{}' is not among this host's interfaces; continuing against the mock transport anyway",
            args.interface
        );
    }

    let mut driver = Driver::new(std::process::id(), 4096, MockTransport::new(), FakeClock::new(), PrintingUpper);
    let link = driver.add_link(format!("{}-demo", args.interface));
    driver.set_iface(link, &args.interface, None)?;
    driver.set_service(link, &args.service)?;
    if let Some(acname) = &args.acname {
        driver.set_acname(link, acname)?;
    }
    driver.set_max_payload(link, args.max_payload)?;
    driver.set_mac_format(link, &args.mac_format)?;

    match args.action {
        Action::Open => {
            driver.open(link)?;
            println!("{}", driver.stat(link).unwrap());
        }
        Action::Listen => {
            driver.enable_incoming(link)?;
            println!("{}", driver.stat(link).unwrap());
            println!("(listening is now registered on the mock transport; this demo does not block for a real discovery request)");
        }
    }

    for call in &driver.transport.calls {
        println!("transport: {:?}", call);
    }
    Ok(())
}

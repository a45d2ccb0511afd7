//! A line based chat.
//!
//! Binds a raw socket TCP to a local address, then waits for a peer or connects to one. Every
//! line typed is sent, everything received is printed. End the input to close the connection.
//! Raw sockets require `CAP_NET_RAW`. Call example:
//!
//! * `ustack-chat 10.0.0.1 4000 listen`
//! * `ustack-chat 10.0.0.2 4000 connect 10.0.0.1 4000`
use std::io;
use std::sync::Arc;

use log::LevelFilter;
use ustack::layer::tcp::{Interface, Socket};
use ustack::nic::RawSocket;
use ustack::wire::Endpoint;
use ustack_chat::config::{Config, Mode};

fn main() {
    let config = Config::from_args();

    env_logger::Builder::new()
        .filter(None, LevelFilter::Warn)
        .parse_filters(&config.log)
        .init();

    let device = RawSocket::new()
        .expect("Couldn't open raw socket");
    let interface = Arc::new(Interface::new(device, config.tcp()));
    let _service = interface.clone().spawn()
        .expect("Couldn't start interface threads");

    let socket = Arc::new(Socket::new(&interface));
    socket.bind(config.local())
        .expect("Couldn't bind local address");
    println!("[+] Bound to {}", config.local());

    let opened = match config.mode {
        Mode::Listen => {
            println!("[+] Waiting for a peer");
            socket.listen()
        },
        Mode::Connect { host, port } => {
            let remote = Endpoint::new(host.into(), port);
            println!("[+] Connecting to {}", remote);
            socket.connect(remote)
        },
    };
    opened.expect("Couldn't open connection");
    println!("[+] Connected to {}", socket.remote());

    let stdin = io::stdin();
    match ustack_chat::chat(socket, stdin.lock(), io::stdout()) {
        Ok(()) => println!("[+] Done"),
        Err(err) => println!("[-] Connection failed: {}", err),
    }
}

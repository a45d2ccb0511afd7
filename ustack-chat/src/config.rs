use std::net;
use structopt::StructOpt;

use ustack::layer::tcp;
use ustack::time::Duration;
use ustack::wire::Endpoint;

#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "ustack-chat", about = "Line based chat over a user-space TCP")]
pub struct Config {
    /// The local address, must belong to an interface of this host.
    pub host: net::Ipv4Addr,
    pub port: u16,

    #[structopt(long, default_value = "1460")]
    pub mss: usize,
    #[structopt(long = "time-wait-secs", default_value = "60")]
    pub time_wait_secs: u64,
    /// Abort the connection after this many retransmissions of one segment.
    #[structopt(long = "max-retransmissions")]
    pub max_retransmissions: Option<u32>,
    /// Log filter, in the syntax of `RUST_LOG`.
    #[structopt(long, default_value = "warn")]
    pub log: String,

    #[structopt(subcommand)]
    pub mode: Mode,
}

#[derive(Clone, Debug, StructOpt)]
pub enum Mode {
    #[structopt(name = "listen")]
    Listen,

    #[structopt(name = "connect")]
    Connect {
        host: net::Ipv4Addr,
        port: u16,
    },
}

impl Config {
    pub fn from_args() -> Self {
        StructOpt::from_args()
    }

    pub fn local(&self) -> Endpoint {
        Endpoint::new(self.host.into(), self.port)
    }

    pub fn tcp(&self) -> tcp::Config {
        tcp::Config {
            mss: self.mss,
            time_wait: Duration::from_secs(self.time_wait_secs),
            max_retransmissions: self.max_retransmissions,
            ..tcp::Config::default()
        }
    }
}

//! Relays lines between a terminal and one TCP connection.
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;

use ustack::layer::{tcp::Socket, Error};
use ustack::nic::Device;
use ustack::time::Duration;

pub mod config;

/// Wait between attempts to queue a line while the send buffer is full.
const BACKOFF: Duration = Duration::from_millis(10);

/// Send every line of `input` and copy everything received to `output`.
///
/// Closes the sending direction once `input` ends and returns when the peer closed as well.
pub fn chat<D, R, W>(socket: Arc<Socket<D>>, input: R, output: W) -> io::Result<()>
where
    D: Device + Send + Sync + 'static,
    R: BufRead,
    W: Write + Send + 'static,
{
    let reader = {
        let socket = socket.clone();
        thread::Builder::new()
            .name("chat-reader".into())
            .spawn(move || print_received(&*socket, output))?
    };

    let sent = send_lines(&*socket, input);
    let closed = socket.close().map_err(io::Error::from);

    let received = reader.join()
        .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "reader panicked")));
    sent.and(closed).and(received)
}

fn send_lines<D: Device, R: BufRead>(socket: &Socket<D>, mut input: R) -> io::Result<()> {
    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(());
        }

        loop {
            match socket.send(line.as_bytes()) {
                Ok(_) => break,
                Err(Error::Exhausted) => thread::sleep(BACKOFF),
                Err(err) => return Err(err.into()),
            }
        }
    }
}

fn print_received<D: Device, W: Write>(socket: &Socket<D>, mut output: W) -> io::Result<()> {
    let mut buffer = vec![0; 1 << 16];
    loop {
        match socket.receive(&mut buffer)? {
            0 => return Ok(()),
            len => {
                output.write_all(&buffer[..len])?;
                output.flush()?;
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Mutex;

    use ustack::layer::tcp::{Config, Interface, State};
    use ustack::nic::Loopback;
    use ustack::wire::Endpoint;

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn lines_reach_the_peer() {
        let config = Config {
            time_wait: Duration::from_millis(50),
            tick: Duration::from_millis(1),
            ..Config::default()
        };
        let interface = Arc::new(Interface::new(Loopback::new(), config));
        let _service = interface.clone().spawn().unwrap();

        let client_addr: Endpoint = "10.0.0.1:4000".parse().unwrap();
        let server_addr: Endpoint = "10.0.0.2:80".parse().unwrap();

        let server = Arc::new(Socket::new(&interface));
        server.bind(server_addr).unwrap();
        let listener = {
            let server = server.clone();
            thread::spawn(move || server.listen())
        };
        while server.state() != State::Listen {
            thread::sleep(Duration::from_millis(1));
        }

        let client = Arc::new(Socket::new(&interface));
        client.bind(client_addr).unwrap();
        client.connect(server_addr).unwrap();
        listener.join().unwrap().unwrap();

        let sink = Sink::default();
        let talker = {
            let client = client.clone();
            let sink = sink.clone();
            thread::spawn(move || chat(client, Cursor::new("hello\nworld\n"), sink))
        };

        let mut received = Vec::new();
        let mut buffer = [0; 1500];
        loop {
            match server.receive(&mut buffer).unwrap() {
                0 => break,
                len => received.extend_from_slice(&buffer[..len]),
            }
        }
        assert_eq!(received, b"hello\nworld\n");

        server.send(b"bye\n").unwrap();
        server.close().unwrap();
        talker.join().unwrap().unwrap();
        assert_eq!(&sink.0.lock().unwrap()[..], b"bye\n");
    }
}

//! Background threads driving an interface.
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crate::nic::Device;
use crate::time::Instant;

use super::interface::Interface;

/// Handle of the receive and timer threads of an interface.
///
/// Dropping the handle stops both threads and waits for them.
pub struct Service {
    stop: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl<D: Device + Send + Sync + 'static> Interface<D> {
    /// Start receiving and ticking the timers in the background.
    ///
    /// One thread waits on the device and dispatches each datagram, the other polls all
    /// connections every `tick` of the configuration.
    pub fn spawn(self: Arc<Self>) -> io::Result<Service> {
        let stop = Arc::new(AtomicBool::new(false));
        let mut service = Service { stop: stop.clone(), threads: Vec::new() };

        let rx = {
            let interface = self.clone();
            let stop = stop.clone();
            thread::Builder::new()
                .name("ustack-rx".into())
                .spawn(move || receive_loop(&*interface, &stop))?
        };
        service.threads.push(rx);

        let interface = self;
        let timer = thread::Builder::new()
            .name("ustack-timer".into())
            .spawn(move || timer_loop(&*interface, &stop))?;
        service.threads.push(timer);

        Ok(service)
    }
}

fn receive_loop<D: Device>(interface: &Interface<D>, stop: &AtomicBool) {
    let tick = interface.config().tick;
    while !stop.load(Ordering::Relaxed) {
        if let Err(err) = interface.poll(tick) {
            net_warn!("receiving failed: {}", err);
            thread::sleep(tick);
        }
    }
}

fn timer_loop<D: Device>(interface: &Interface<D>, stop: &AtomicBool) {
    let tick = interface.config().tick;
    while !stop.load(Ordering::Relaxed) {
        thread::sleep(tick);
        interface.poll_timers(Instant::now());
    }
}

impl Service {
    /// Stop both threads and wait for them to finish.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        for thread in self.threads.drain(..) {
            if thread.join().is_err() {
                net_warn!("interface thread panicked");
            }
        }
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

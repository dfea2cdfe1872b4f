// Test doubles for the motor layer

use std::collections::VecDeque;
use std::io::{self, Read, Write};

/// In-memory serial port: records writes, serves queued response bytes.
/// Reading past the queue behaves like an unanswered request.
#[derive(Default)]
pub struct MockPort {
    pub written: Vec<u8>,
    incoming: VecDeque<u8>,
}

impl MockPort {
    pub fn queue(&mut self, bytes: &[u8]) {
        self.incoming.extend(bytes);
    }

    /// Queue a well-formed status packet
    pub fn queue_status(&mut self, id: u8, status: u8, params: &[u8]) {
        let length = (params.len() + 2) as u8;
        let mut body = vec![id, length, status];
        body.extend_from_slice(params);
        let sum: u16 = body.iter().map(|&b| b as u16).sum();
        body.push((!sum & 0xFF) as u8);

        self.queue(&[0xFF, 0xFF]);
        self.queue(&body);
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.incoming.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(self.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(self.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

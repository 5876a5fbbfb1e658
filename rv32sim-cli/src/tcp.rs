//! Blocking, non-async [`Connection`] implementation over a plain [`std::net::TcpStream`].

use gdbstub::conn::{Connection, ConnectionExt};
use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream as StdTcpStream;

pub struct TcpStream(pub StdTcpStream);

impl TcpStream {
    pub fn new(stream: StdTcpStream) -> std::io::Result<Self> {
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        Ok(Self(stream))
    }
}

impl Connection for TcpStream {
    type Error = std::io::Error;

    fn write(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.0.write_all(&[byte])
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        self.0.write_all(buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.0.flush()
    }

    fn on_session_start(&mut self) -> Result<(), Self::Error> {
        self.0.set_nodelay(true)
    }
}

impl ConnectionExt for TcpStream {
    fn read(&mut self) -> Result<u8, Self::Error> {
        let mut byte = [0u8; 1];
        self.0.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    /// Peeks for a single pending byte without blocking, so the event loop can interleave
    /// checking for incoming gdb traffic with stepping the core.
    fn peek(&mut self) -> Result<Option<u8>, Self::Error> {
        self.0.set_nonblocking(true)?;
        let mut byte = [0u8; 1];
        let result = match self.0.peek(&mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(error) if error.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        };
        self.0.set_nonblocking(false)?;
        result
    }
}

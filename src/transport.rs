use std::io;

/// Blocking byte stream towards the relay board.
///
/// Opening, configuring and closing the underlying connection is left to the owner of
/// the transport.
pub trait Transport {
    /// Writes the complete buffer.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Reads one line including its terminator.
    ///
    /// An empty result means nothing arrived within the read timeout of the transport,
    /// not necessarily that the stream has ended.
    fn read_line(&mut self) -> io::Result<Vec<u8>>;

    /// Drops everything received but not read yet, e.g. status lines that arrived after
    /// the previous burst ended.
    fn discard_input(&mut self) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write(bytes)
    }

    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        (**self).read_line()
    }

    fn discard_input(&mut self) -> io::Result<()> {
        (**self).discard_input()
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write(bytes)
    }

    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        (**self).read_line()
    }

    fn discard_input(&mut self) -> io::Result<()> {
        (**self).discard_input()
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

// This file is part of run_mount_controller.
//
// Developed for the equatorial mount control system.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use log::{debug, info};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::sleep;
use std::time::Duration;

use crate::error::Result;

// Size of one read from the stream.
const READ_CHUNK_SIZE: usize = 256;

pub struct TcpServer {
    _name: String,
    _listener: TcpListener,
    _reader: Option<BufReader<TcpStream>>,
    _writer: Option<BufWriter<TcpStream>>,
    // Timeout in milliseconds.
    pub timeout: u64,
    // Stop the server.
    _stop: Arc<AtomicBool>,
}

impl TcpServer {
    /// Create a new TcpServer instance.
    ///
    /// # Arguments
    /// * `name` - Name of ther server.
    /// * `host` - A string slice that holds the hostname or IP address.
    /// * `port` - An integer that holds the port number. Put 0 to let the OS
    /// choose the port number.
    /// * `timeout` - Timeout in milliseconds.
    /// * `stop` - An Arc instance that holds the AtomicBool instance to stop
    /// the server.
    ///
    /// # Returns
    /// A TcpServer instance.
    ///
    /// # Errors
    /// Io if the listener can not bind.
    pub fn new(
        name: &str,
        host: &str,
        port: i32,
        timeout: u64,
        stop: &Arc<AtomicBool>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(format!("{}:{}", host, port))?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            _name: String::from(name),

            _listener: listener,
            _reader: None,
            _writer: None,
            timeout: timeout,

            _stop: stop.clone(),
        })
    }

    /// Get the port number.
    ///
    /// # Returns
    /// An integer that holds the port number. If the port number is not
    /// available, return -1.
    pub fn get_port(&self) -> i32 {
        match self._listener.local_addr() {
            Ok(addr) => addr.port() as i32,
            Err(_) => -1,
        }
    }

    /// Accept a connection.
    ///
    /// # Returns
    /// A boolean value. If the connection is accepted, return true. Otherwise,
    /// return false.
    fn accept(&mut self) -> bool {
        if let Ok((stream, peer_addr)) = self._listener.accept() {
            if let Err(error) = self.wrap_stream(stream) {
                info!("{} fails to accept {}: {}.", self._name, peer_addr, error);
                return false;
            }

            info!("{} is connected from {}.", self._name, peer_addr);

            return true;
        };

        false
    }

    /// Wrap the stream to the BufReader and BufWriter.
    ///
    /// # Arguments
    /// * `stream` - Accepted stream.
    ///
    /// # Errors
    /// Io if the stream can not be configured.
    fn wrap_stream(&mut self, stream: TcpStream) -> Result<()> {
        stream.set_nodelay(true)?;
        stream.set_nonblocking(true)?;

        self._reader = Some(BufReader::new(stream.try_clone()?));
        self._writer = Some(BufWriter::new(stream));

        Ok(())
    }

    /// Check if the server is connected.
    ///
    /// # Returns
    /// A boolean value. If the server is connected, return true. Otherwise,
    /// return false.
    fn is_connected(&self) -> bool {
        self._reader.is_some() && self._writer.is_some()
    }

    /// Read the available bytes.
    ///
    /// # Returns
    /// Received bytes. Empty if nothing is available.
    pub fn read_bytes(&mut self) -> Vec<u8> {
        let mut data = Vec::new();
        let mut is_disconnected = false;
        if let Some(stream) = self._reader.as_mut() {
            let mut chunk = [0; READ_CHUNK_SIZE];
            loop {
                match stream.read(&mut chunk) {
                    Ok(0) => {
                        // The client is disconnected.
                        debug!(
                            "{} is disconnected from the client when reading.",
                            self._name
                        );
                        is_disconnected = true;
                        break;
                    }

                    Ok(size) => data.extend_from_slice(&chunk[..size]),

                    Err(error) if error.kind() == ErrorKind::Interrupted => continue,

                    Err(_) => {
                        break;
                    }
                }
            }
        }

        if is_disconnected {
            self.close_stream();
        }

        if !data.is_empty() {
            debug!(
                "{} receives: {}.",
                self._name,
                String::from_utf8_lossy(&data)
            );
        }

        data
    }

    /// Write the bytes and flush.
    ///
    /// # Arguments
    /// * `data` - Bytes to write.
    pub fn write_bytes(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        if let Some(stream) = self._writer.as_mut() {
            // Ignore the possible error. The flush notices the disconnection.
            let _ = stream.write_all(data);
        }

        self.flush();
    }

    /// Flush the stream.
    fn flush(&mut self) {
        if let Some(stream) = self._writer.as_mut() {
            if let Err(error) = stream.flush() {
                match error.kind() {
                    ErrorKind::WouldBlock => {
                        // The operation would block, we can try again later.
                    }
                    _ => {
                        // The client is disconnected.
                        debug!(
                            "{} fails to flush the stream: {}. Disconnecting...",
                            self._name, error
                        );
                        self.close_stream();
                    }
                }
            }
        }
    }

    /// Close the stream.
    fn close_stream(&mut self) {
        info!("{} is disconnected.", self._name);

        // Flush the stream in the writer first before closing the stream.
        if let Some(stream) = self._writer.as_mut() {
            // Ignore the possible error.
            let _ = stream.flush();
        }

        // Shutdown the stream in the reader and writer.
        if let Some(stream) = self._reader.as_ref() {
            // Ignore the possible error.
            let _ = stream.get_ref().shutdown(Shutdown::Both);
        }

        self._reader = None;
        self._writer = None;
    }

    /// Run the server.
    ///
    /// # Arguments
    /// * `callback_periodic` - A periodic callback function that is called
    /// once the server is connected. It takes two mutable references to the
    /// TcpServer and other data.
    /// * `callback_first_time` - An optional callback function that is called
    /// once the server is connected for the first time. It takes two mutable
    /// references to the TcpServer and other data.
    /// * `other` - A mutable reference to the other data that is used in
    /// callback function.
    pub fn run<F1, F2, T>(
        &mut self,
        mut callback_periodic: F1,
        mut callback_first_time: Option<F2>,
        other: &mut T,
    ) where
        F1: FnMut(&mut TcpServer, &mut T),
        F2: FnMut(&mut TcpServer, &mut T),
    {
        info!("{} is running.", self._name);
        while !self._stop.load(Ordering::Relaxed) {
            if self.is_connected() {
                callback_periodic(self, other);
            } else {
                if self.accept() {
                    if let Some(ref mut callback) = callback_first_time {
                        callback(self, other);
                    }
                } else {
                    sleep(Duration::from_millis(self.timeout));
                }
            }
        }

        info!("{} is stopped.", self._name);
    }
}

// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info, warn};

use crate::clock::nanos_now;

/// Identifies one accepted connection for the lifetime of the server.
/// Ids are never reused, so a stale id held across a disconnect can be
/// detected instead of silently addressing a new peer.
pub type ConnId = u64;

const READ_CHUNK: usize = 64 * 1024;

struct Connection {
	stream: TcpStream,
	peer: SocketAddr,
	inbound: Vec<u8>,
	outbound: Vec<u8>,
	dead: bool,
}

impl Connection {
	fn new(stream: TcpStream, peer: SocketAddr) -> Self {
		Self {
			stream,
			peer,
			inbound: Vec::with_capacity(READ_CHUNK),
			outbound: Vec::with_capacity(READ_CHUNK),
			dead: false,
		}
	}

	/// Drain readable bytes into the inbound buffer. Marks the
	/// connection dead on EOF or a hard error.
	fn fill(&mut self) {
		let mut chunk = [0u8; READ_CHUNK];
		loop {
			match self.stream.read(&mut chunk) {
				Ok(0) => {
					self.dead = true;
					return;
				}
				Ok(n) => self.inbound.extend_from_slice(&chunk[..n]),
				Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return,
				Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => {
					debug!(peer = %self.peer, error = %e, "connection read failed");
					self.dead = true;
					return;
				}
			}
		}
	}

	/// Write as much buffered outbound data as the socket accepts.
	fn drain(&mut self) {
		let mut written = 0;
		while written < self.outbound.len() {
			match self.stream.write(&self.outbound[written..]) {
				Ok(0) => {
					self.dead = true;
					break;
				}
				Ok(n) => written += n,
				Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
				Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => {
					debug!(peer = %self.peer, error = %e, "connection write failed");
					self.dead = true;
					break;
				}
			}
		}
		self.outbound.drain(..written);
	}
}

/// Non-blocking TCP listener with per-connection fixed-size framing.
///
/// `poll` accepts new connections, reaps dead ones, reads whatever bytes
/// are available and invokes the per-record callback once per complete
/// frame, passing the receive timestamp taken when the bytes were pulled
/// off the socket. Partial frames are carried in the connection buffer
/// until the rest arrives.
pub struct TcpServer {
	listener: TcpListener,
	frame_len: usize,
	conns: HashMap<ConnId, Connection>,
	next_conn_id: ConnId,
}

impl TcpServer {
	pub fn bind<A: ToSocketAddrs>(addr: A, frame_len: usize) -> io::Result<Self> {
		assert!(frame_len > 0, "frame length must be non-zero");
		let listener = TcpListener::bind(addr)?;
		listener.set_nonblocking(true)?;
		info!(addr = %listener.local_addr()?, "order server listening");
		Ok(Self {
			listener,
			frame_len,
			conns: HashMap::new(),
			next_conn_id: 0,
		})
	}

	pub fn local_addr(&self) -> io::Result<SocketAddr> {
		self.listener.local_addr()
	}

	/// Whether `conn_id` still refers to a live connection.
	pub fn is_connected(&self, conn_id: ConnId) -> bool {
		self.conns.contains_key(&conn_id)
	}

	/// One poll cycle: accept, read, dispatch complete frames.
	///
	/// `on_record` receives `(conn_id, frame_bytes, rx_time_ns)` for each
	/// complete frame, in arrival order per connection.
	pub fn poll(&mut self, on_record: &mut dyn FnMut(ConnId, &[u8], u64)) {
		self.accept_new();

		for (&conn_id, conn) in self.conns.iter_mut() {
			conn.fill();
			let rx_time = nanos_now();

			let mut consumed = 0;
			while conn.inbound.len() - consumed >= self.frame_len {
				on_record(conn_id, &conn.inbound[consumed..consumed + self.frame_len], rx_time);
				consumed += self.frame_len;
			}
			conn.inbound.drain(..consumed);
		}

		self.reap_dead();
	}

	/// Queue `bytes` for transmission on `conn_id`. Returns false if the
	/// connection no longer exists.
	pub fn send(&mut self, conn_id: ConnId, bytes: &[u8]) -> bool {
		match self.conns.get_mut(&conn_id) {
			Some(conn) => {
				conn.outbound.extend_from_slice(bytes);
				true
			}
			None => false,
		}
	}

	/// Flush buffered outbound data on every connection.
	pub fn pump(&mut self) {
		for conn in self.conns.values_mut() {
			conn.drain();
		}
		self.reap_dead();
	}

	fn accept_new(&mut self) {
		loop {
			match self.listener.accept() {
				Ok((stream, peer)) => {
					if let Err(e) = stream.set_nonblocking(true) {
						warn!(%peer, error = %e, "failed to make connection non-blocking");
						continue;
					}
					if let Err(e) = stream.set_nodelay(true) {
						warn!(%peer, error = %e, "failed to set TCP_NODELAY");
					}
					let conn_id = self.next_conn_id;
					self.next_conn_id += 1;
					info!(%peer, conn_id, "accepted connection");
					self.conns.insert(conn_id, Connection::new(stream, peer));
				}
				Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
				Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => {
					warn!(error = %e, "accept failed");
					break;
				}
			}
		}
	}

	fn reap_dead(&mut self) {
		self.conns.retain(|conn_id, conn| {
			if conn.dead {
				info!(conn_id, peer = %conn.peer, "connection closed");
			}
			!conn.dead
		});
	}
}

/// Non-blocking TCP client with the same fixed-size framing discipline
/// as `TcpServer`, used by the trading-side order gateway.
pub struct TcpClient {
	conn: Connection,
	frame_len: usize,
}

impl TcpClient {
	pub fn connect<A: ToSocketAddrs>(addr: A, frame_len: usize) -> io::Result<Self> {
		assert!(frame_len > 0, "frame length must be non-zero");
		let stream = TcpStream::connect(addr)?;
		let peer = stream.peer_addr()?;
		stream.set_nonblocking(true)?;
		stream.set_nodelay(true)?;
		info!(%peer, "connected to order server");
		Ok(Self {
			conn: Connection::new(stream, peer),
			frame_len,
		})
	}

	pub fn is_connected(&self) -> bool {
		!self.conn.dead
	}

	/// Queue `bytes` for transmission; actual writes happen in
	/// `send_and_recv`.
	pub fn send(&mut self, bytes: &[u8]) {
		self.conn.outbound.extend_from_slice(bytes);
	}

	/// Flush outbound data, read available inbound data and dispatch
	/// complete frames.
	pub fn send_and_recv(&mut self, on_record: &mut dyn FnMut(&[u8], u64)) {
		self.conn.drain();
		self.conn.fill();
		let rx_time = nanos_now();

		let mut consumed = 0;
		while self.conn.inbound.len() - consumed >= self.frame_len {
			on_record(&self.conn.inbound[consumed..consumed + self.frame_len], rx_time);
			consumed += self.frame_len;
		}
		self.conn.inbound.drain(..consumed);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_server_client_frame_roundtrip() {
		let mut server = TcpServer::bind("127.0.0.1:0", 4).unwrap();
		let addr = server.local_addr().unwrap();

		let mut client = TcpClient::connect(addr, 4).unwrap();
		client.send(b"abcd");
		client.send(b"ef");
		client.send_and_recv(&mut |_, _| panic!("no inbound traffic expected"));

		// Frames arrive whole; the trailing partial frame stays buffered.
		let mut frames: Vec<Vec<u8>> = Vec::new();
		let mut from_conn = None;
		for _ in 0..50 {
			server.poll(&mut |conn_id, frame, rx_time| {
				assert!(rx_time > 0);
				from_conn = Some(conn_id);
				frames.push(frame.to_vec());
			});
			if !frames.is_empty() {
				break;
			}
			std::thread::sleep(std::time::Duration::from_millis(2));
		}
		assert_eq!(frames, vec![b"abcd".to_vec()]);

		// Complete the partial frame and echo a frame back.
		client.send(b"gh");
		client.send_and_recv(&mut |_, _| {});

		frames.clear();
		for _ in 0..50 {
			server.poll(&mut |_, frame, _| frames.push(frame.to_vec()));
			if !frames.is_empty() {
				break;
			}
			std::thread::sleep(std::time::Duration::from_millis(2));
		}
		assert_eq!(frames, vec![b"efgh".to_vec()]);

		let conn_id = from_conn.unwrap();
		assert!(server.is_connected(conn_id));
		assert!(server.send(conn_id, b"wxyz"));
		server.pump();

		let mut inbound = Vec::new();
		for _ in 0..50 {
			client.send_and_recv(&mut |frame, _| inbound.push(frame.to_vec()));
			if !inbound.is_empty() {
				break;
			}
			std::thread::sleep(std::time::Duration::from_millis(2));
		}
		assert_eq!(inbound, vec![b"wxyz".to_vec()]);
	}

	#[test]
	fn test_dead_connections_are_reaped() {
		let mut server = TcpServer::bind("127.0.0.1:0", 4).unwrap();
		let addr = server.local_addr().unwrap();

		let mut seen = None;
		{
			let client = TcpClient::connect(addr, 4).unwrap();
			for _ in 0..50 {
				server.poll(&mut |conn_id, _, _| seen = Some(conn_id));
				if !server.conns.is_empty() {
					break;
				}
				std::thread::sleep(std::time::Duration::from_millis(2));
			}
			assert!(!server.conns.is_empty());
			drop(client);
		}

		for _ in 0..100 {
			server.poll(&mut |_, _, _| {});
			if server.conns.is_empty() {
				break;
			}
			std::thread::sleep(std::time::Duration::from_millis(2));
		}
		assert!(server.conns.is_empty());
		let _ = seen;
	}
}

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

use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

use tracing::{debug, info};

/// Keep datagrams under a conservative MTU so a single loss costs as few
/// records as possible. Frames are never split across datagrams.
const MAX_DATAGRAM_PAYLOAD: usize = 1400;

/// Buffered UDP multicast sender.
///
/// Records are appended with `buffer` and go out as one datagram per
/// `flush`; `buffer` flushes eagerly when the next record would push the
/// datagram past the MTU budget, so every datagram carries whole frames.
pub struct McastPublisher {
	socket: UdpSocket,
	dest: SocketAddrV4,
	outbound: Vec<u8>,
}

impl McastPublisher {
	pub fn new(group: Ipv4Addr, port: u16) -> io::Result<Self> {
		assert!(group.is_multicast(), "{group} is not a multicast group");
		let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
		// Local consumers (same host) must see our traffic.
		socket.set_multicast_loop_v4(true)?;
		let dest = SocketAddrV4::new(group, port);
		info!(%dest, "multicast publisher ready");
		Ok(Self {
			socket,
			dest,
			outbound: Vec::with_capacity(MAX_DATAGRAM_PAYLOAD),
		})
	}

	/// Append one whole frame to the pending datagram.
	pub fn buffer(&mut self, frame: &[u8]) -> io::Result<()> {
		if !self.outbound.is_empty() && self.outbound.len() + frame.len() > MAX_DATAGRAM_PAYLOAD {
			self.flush()?;
		}
		self.outbound.extend_from_slice(frame);
		Ok(())
	}

	/// Send the pending datagram, if any.
	pub fn flush(&mut self) -> io::Result<()> {
		if self.outbound.is_empty() {
			return Ok(());
		}
		self.socket.send_to(&self.outbound, self.dest)?;
		debug!(bytes = self.outbound.len(), dest = %self.dest, "datagram sent");
		self.outbound.clear();
		Ok(())
	}
}

/// Non-blocking UDP multicast receiver.
///
/// Joins the group on construction and leaves it on drop; the
/// market-data consumer uses exactly that lifecycle to subscribe to the
/// snapshot stream only while it is recovering.
pub struct McastSubscriber {
	socket: UdpSocket,
	group: Ipv4Addr,
	inbound: Box<[u8]>,
}

impl McastSubscriber {
	pub fn join(group: Ipv4Addr, port: u16) -> io::Result<Self> {
		assert!(group.is_multicast(), "{group} is not a multicast group");
		let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))?;
		socket.set_nonblocking(true)?;
		socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
		info!(%group, port, "joined multicast group");
		Ok(Self {
			socket,
			group,
			inbound: vec![0u8; 64 * 1024].into_boxed_slice(),
		})
	}

	/// Receive one datagram if one is queued. The returned slice is the
	/// whole datagram payload; callers split it into fixed-size frames.
	pub fn recv(&mut self) -> io::Result<Option<&[u8]>> {
		loop {
			match self.socket.recv(&mut self.inbound) {
				Ok(len) => return Ok(Some(&self.inbound[..len])),
				Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
				Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => return Err(e),
			}
		}
	}
}

impl Drop for McastSubscriber {
	fn drop(&mut self) {
		if let Err(e) = self
			.socket
			.leave_multicast_v4(&self.group, &Ipv4Addr::UNSPECIFIED)
		{
			debug!(group = %self.group, error = %e, "leave_multicast failed");
		} else {
			info!(group = %self.group, "left multicast group");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_frames_accumulate_up_to_the_mtu_budget() {
		// Network transmission is covered by the end-to-end processes;
		// here we only pin down the batching boundary.
		let mut publisher = McastPublisher::new(Ipv4Addr::new(233, 252, 14, 200), 29_001).unwrap();

		let frame = [0u8; 700];
		publisher.buffer(&frame).unwrap();
		publisher.buffer(&frame).unwrap();
		assert_eq!(publisher.outbound.len(), 1400);
	}

	#[test]
	#[should_panic(expected = "not a multicast group")]
	fn test_unicast_group_is_rejected() {
		let _ = McastPublisher::new(Ipv4Addr::new(127, 0, 0, 1), 29_001);
	}
}

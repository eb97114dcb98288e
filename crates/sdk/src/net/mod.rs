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

//! Non-blocking socket plumbing shared by the exchange and trading
//! processes.
//!
//! All sockets here are polled from dedicated component threads; nothing
//! in this module blocks, takes a lock, or allocates per record. Framing
//! is fixed-size: each stream or datagram carries whole wire records and
//! the record length is agreed at construction time.

mod mcast;
mod tcp;

pub use mcast::{McastPublisher, McastSubscriber};
pub use tcp::{ConnId, TcpClient, TcpServer};

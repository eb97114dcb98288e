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

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::utils::CachePadded;

/// Bounded single-producer/single-consumer ring.
///
/// This is the only cross-thread hand-off on the latency-critical paths:
/// gateway -> matching engine, matching engine -> gateway / publisher,
/// publisher -> snapshot synthesizer, consumer -> trade engine. Records
/// are written in place through `next_write_slot` so large wire structs
/// are never copied through an intermediate.
///
/// Concurrency contract:
/// - Exactly one producer thread and one consumer thread per ring.
/// - `size` is the single shared atomic; `publish` increments it with
///   `Release` and `peek_read` loads it with `Acquire`, so a consumer
///   that observes `size > 0` also observes the producer's writes to
///   the slot.
/// - The write and read cursors are private to their handles and never
///   shared.
///
/// There is no overrun path: rings are sized so they cannot fill, and a
/// full ring on `next_write_slot` is a programming error that terminates
/// the process.
pub struct SpscRing<T> {
	slots: Box<[UnsafeCell<T>]>,
	size: CachePadded<AtomicUsize>,
}

unsafe impl<T: Send> Send for SpscRing<T> {}
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T: Default> SpscRing<T> {
	/// Pre-allocate a ring of `capacity` default-initialized slots and
	/// split it into its producer and consumer halves.
	pub fn with_capacity(capacity: usize) -> (RingProducer<T>, RingConsumer<T>) {
		assert!(capacity > 0, "ring capacity must be non-zero");

		let slots: Box<[UnsafeCell<T>]> =
			(0..capacity).map(|_| UnsafeCell::new(T::default())).collect();

		let ring = Arc::new(SpscRing {
			slots,
			size: CachePadded::new(AtomicUsize::new(0)),
		});

		(
			RingProducer {
				ring: Arc::clone(&ring),
				next_write: 0,
			},
			RingConsumer {
				ring,
				next_read: 0,
			},
		)
	}
}

impl<T> SpscRing<T> {
	fn capacity(&self) -> usize {
		self.slots.len()
	}
}

/// Producer half of a ring. Not clonable; owned by exactly one thread.
pub struct RingProducer<T> {
	ring: Arc<SpscRing<T>>,
	next_write: usize,
}

impl<T> RingProducer<T> {
	/// Slot the producer should write next. The write only becomes
	/// visible to the consumer after the matching `publish` call.
	///
	/// Panics if the ring is full: producers must size rings so this
	/// cannot happen, and a fill is an invariant breach.
	pub fn next_write_slot(&mut self) -> &mut T {
		let size = self.ring.size.load(Ordering::Acquire);
		assert!(
			size < self.ring.capacity(),
			"spsc ring overrun: capacity {} exhausted",
			self.ring.capacity()
		);

		unsafe { &mut *self.ring.slots[self.next_write].get() }
	}

	/// Make the slot written via `next_write_slot` visible and advance.
	pub fn publish(&mut self) {
		self.next_write = (self.next_write + 1) % self.ring.capacity();
		self.ring.size.fetch_add(1, Ordering::Release);
	}

	/// Convenience for callers that already have the record by value.
	pub fn push(&mut self, value: T) {
		*self.next_write_slot() = value;
		self.publish();
	}
}

/// Consumer half of a ring. Not clonable; owned by exactly one thread.
pub struct RingConsumer<T> {
	ring: Arc<SpscRing<T>>,
	next_read: usize,
}

impl<T> RingConsumer<T> {
	/// Next unconsumed record, if any. The slot stays valid until the
	/// matching `consume` call.
	pub fn peek_read(&self) -> Option<&T> {
		if self.ring.size.load(Ordering::Acquire) == 0 {
			return None;
		}

		Some(unsafe { &*self.ring.slots[self.next_read].get() })
	}

	/// Release the slot returned by the last `peek_read`.
	pub fn consume(&mut self) {
		let prev = self.ring.size.fetch_sub(1, Ordering::Release);
		assert!(prev > 0, "consume on an empty spsc ring");
		self.next_read = (self.next_read + 1) % self.ring.capacity();
	}

	/// Pop the next record by value, if any.
	pub fn pop(&mut self) -> Option<T>
	where
		T: Copy,
	{
		let value = *self.peek_read()?;
		self.consume();
		Some(value)
	}

	pub fn len(&self) -> usize {
		self.ring.size.load(Ordering::Acquire)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

//! Data packets waiting for a route

use aorglu_protocol::{DataPacket, NodeAddr, Timestamp};
use std::collections::VecDeque;
use std::time::Duration;

/// Packet held until its destination resolves
#[derive(Debug, Clone)]
pub struct QueuedPacket {
    pub packet: DataPacket,
    /// Neighbor the packet came from; `None` if this node originated it
    pub from: Option<NodeAddr>,
    /// When the packet was queued
    pub queued_at: Timestamp,
}

impl QueuedPacket {
    pub fn destination(&self) -> NodeAddr {
        self.packet.destination
    }
}

/// Bounded FIFO shared by all destinations
///
/// Order is preserved per destination. At capacity the oldest packet,
/// whatever its destination, makes room.
#[derive(Debug)]
pub struct PendingPacketQueue {
    queue: VecDeque<QueuedPacket>,
    capacity: usize,
    timeout: Duration,
}

impl PendingPacketQueue {
    pub fn new(capacity: usize, timeout: Duration) -> Self {
        PendingPacketQueue {
            queue: VecDeque::with_capacity(capacity),
            capacity,
            timeout,
        }
    }

    /// Append a packet; returns the packet evicted to make room, if any
    pub fn enqueue(
        &mut self,
        packet: DataPacket,
        from: Option<NodeAddr>,
        now: Timestamp,
    ) -> Option<DataPacket> {
        let evicted = if self.queue.len() >= self.capacity {
            self.queue.pop_front().map(|q| q.packet)
        } else {
            None
        };

        self.queue.push_back(QueuedPacket {
            packet,
            from,
            queued_at: now,
        });
        evicted
    }

    /// Remove and return every packet for `destination`, oldest first
    pub fn dequeue_for(&mut self, destination: NodeAddr) -> Vec<QueuedPacket> {
        let mut taken = Vec::new();
        let mut kept = VecDeque::with_capacity(self.queue.len());
        for queued in self.queue.drain(..) {
            if queued.destination() == destination {
                taken.push(queued);
            } else {
                kept.push_back(queued);
            }
        }
        self.queue = kept;
        taken
    }

    /// Discard every packet for `destination`, returning them oldest first
    pub fn drop_for(&mut self, destination: NodeAddr) -> Vec<DataPacket> {
        self.dequeue_for(destination)
            .into_iter()
            .map(|q| q.packet)
            .collect()
    }

    pub fn has_packets_for(&self, destination: NodeAddr) -> bool {
        self.queue.iter().any(|q| q.destination() == destination)
    }

    pub fn len_for(&self, destination: NodeAddr) -> usize {
        self.queue
            .iter()
            .filter(|q| q.destination() == destination)
            .count()
    }

    /// Remove packets that waited longer than the queue timeout
    pub fn purge_expired(&mut self, now: Timestamp) -> Vec<DataPacket> {
        let timeout = self.timeout;
        let mut expired = Vec::new();
        self.queue.retain(|q| {
            if now.saturating_duration_since(q.queued_at) >= timeout {
                expired.push(q.packet.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for PendingPacketQueue {
    fn default() -> Self {
        Self::new(64, Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(dst: u32, tag: u8) -> DataPacket {
        DataPacket::new(NodeAddr::new(1), NodeAddr::new(dst), vec![tag])
    }

    #[test]
    fn test_fifo_per_destination() {
        let mut queue = PendingPacketQueue::default();
        queue.enqueue(packet(5, 1), None, Timestamp::ZERO);
        queue.enqueue(packet(6, 2), None, Timestamp::ZERO);
        queue.enqueue(packet(5, 3), None, Timestamp::ZERO);

        assert_eq!(queue.len_for(NodeAddr::new(5)), 2);
        let flushed = queue.dequeue_for(NodeAddr::new(5));
        let tags: Vec<u8> = flushed.iter().map(|q| q.packet.payload[0]).collect();
        assert_eq!(tags, vec![1, 3]);

        assert_eq!(queue.len(), 1);
        assert!(!queue.has_packets_for(NodeAddr::new(5)));
        assert!(queue.has_packets_for(NodeAddr::new(6)));
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut queue = PendingPacketQueue::new(2, Duration::from_secs(30));
        assert!(queue.enqueue(packet(5, 1), None, Timestamp::ZERO).is_none());
        assert!(queue.enqueue(packet(6, 2), None, Timestamp::ZERO).is_none());

        let evicted = queue.enqueue(packet(7, 3), None, Timestamp::ZERO).unwrap();
        assert_eq!(evicted.payload, vec![1]);
        assert_eq!(queue.len(), 2);
        assert!(!queue.has_packets_for(NodeAddr::new(5)));
    }

    #[test]
    fn test_purge_expired() {
        let mut queue = PendingPacketQueue::new(8, Duration::from_secs(30));
        queue.enqueue(packet(5, 1), None, Timestamp::ZERO);
        queue.enqueue(packet(5, 2), None, Timestamp::from_secs(10));

        assert!(queue.purge_expired(Timestamp::from_secs(29)).is_empty());
        let expired = queue.purge_expired(Timestamp::from_secs(30));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].payload, vec![1]);
        assert_eq!(queue.len(), 1);
    }
}

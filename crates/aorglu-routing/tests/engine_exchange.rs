//! Engines exchanging packets directly, without a simulator

use aorglu_protocol::{NodeAddr, Packet};
use aorglu_routing::{BufferedEnv, LinkTarget, ProtocolConfig, ProtocolEngine, RouteState};
use std::collections::VecDeque;

type Engine = ProtocolEngine<BufferedEnv>;

fn chain(len: u32) -> Vec<Engine> {
    (1..=len)
        .map(|n| {
            ProtocolEngine::new(NodeAddr::new(n), ProtocolConfig::default(), BufferedEnv::new())
                .unwrap()
        })
        .collect()
}

fn linked(a: NodeAddr, b: NodeAddr) -> bool {
    a.as_u32().abs_diff(b.as_u32()) == 1
}

/// Deliver queued transmissions along a line topology until nothing moves
fn pump(nodes: &mut [Engine]) -> usize {
    let mut in_flight: VecDeque<(NodeAddr, LinkTarget, Packet)> = VecDeque::new();
    let mut moved = 0;
    loop {
        for node in nodes.iter_mut() {
            let sender = node.address();
            for out in node.env_mut().take_outgoing() {
                in_flight.push_back((sender, out.target, out.packet));
            }
        }
        let Some((sender, target, packet)) = in_flight.pop_front() else {
            return moved;
        };
        moved += 1;
        for node in nodes.iter_mut() {
            let me = node.address();
            let hit = match target {
                LinkTarget::Broadcast => linked(sender, me),
                LinkTarget::Unicast(to) => to == me && linked(sender, me),
            };
            if hit {
                node.on_receive(sender, packet.clone());
            }
        }
    }
}

#[test]
fn test_three_node_discovery_and_delivery() {
    let mut nodes = chain(3);
    nodes[0].send_data(NodeAddr::new(3), b"hello".to_vec());
    assert!(nodes[0].is_discovering(NodeAddr::new(3)));

    pump(&mut nodes);

    let delivered = nodes[2].env_mut().take_delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].payload, b"hello");
    assert_eq!(delivered[0].source, NodeAddr::new(1));

    let route = nodes[0].route_table().lookup(NodeAddr::new(3)).unwrap();
    assert_eq!(route.state(), RouteState::Up);
    assert_eq!(route.next_hop(), Some(NodeAddr::new(2)));
    assert_eq!(route.hop_count(), 2);
    assert!(!nodes[0].is_discovering(NodeAddr::new(3)));

    // The relay learned both directions
    let relay = &nodes[1];
    assert!(relay.route_table().lookup(NodeAddr::new(1)).unwrap().is_up());
    assert!(relay.route_table().lookup(NodeAddr::new(3)).unwrap().is_up());
    assert_eq!(relay.stats().data_forwarded, 1);
}

#[test]
fn test_second_packet_uses_existing_route() {
    let mut nodes = chain(3);
    nodes[0].send_data(NodeAddr::new(3), b"one".to_vec());
    pump(&mut nodes);
    let requests = nodes[0].stats().requests_sent;

    nodes[0].send_data(NodeAddr::new(3), b"two".to_vec());
    pump(&mut nodes);

    assert_eq!(nodes[0].stats().requests_sent, requests);
    let payloads: Vec<_> = nodes[2]
        .env()
        .delivered()
        .iter()
        .map(|p| p.payload.clone())
        .collect();
    assert_eq!(payloads, vec![b"one".to_vec(), b"two".to_vec()]);
}

#[test]
fn test_relay_suppresses_duplicate_request() {
    let mut nodes = chain(3);
    nodes[0].send_data(NodeAddr::new(3), vec![]);
    let request = nodes[0].env_mut().take_outgoing().remove(0).packet;

    nodes[1].on_receive(NodeAddr::new(1), request.clone());
    nodes[1].on_receive(NodeAddr::new(1), request);

    assert_eq!(nodes[1].stats().requests_forwarded, 1);
    assert_eq!(nodes[1].stats().duplicates_suppressed, 1);
}

#[test]
fn test_garbage_bytes_are_rejected() {
    let mut nodes = chain(1);
    assert!(nodes[0]
        .on_receive_bytes(NodeAddr::new(2), &[0xde, 0xad, 0xbe, 0xef])
        .is_err());
    assert_eq!(nodes[0].stats().malformed_packets, 1);
}

//! Reducer-level tests for the reconciliation engine.
//!
//! Everything here runs without a transport: events go in, state and
//! commands come out.

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde_json::json;

use topowatch_client::{Command, ConnectionStatus, Event, SyncState};
use topowatch_types::{
    Edge, EdgeId, GraphState, GraphUpdate, Node, NodeId, ServerMessage, UpdateType,
};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000_i64.saturating_add(secs), 0).unwrap()
}

fn node(id: &str) -> Node {
    serde_json::from_value(json!({ "id": id, "name": id, "type": "router" })).unwrap()
}

fn edge(id: &str, source: &str, target: &str) -> Edge {
    serde_json::from_value(json!({ "id": id, "source": source, "target": target })).unwrap()
}

fn snapshot(nodes: &[&str], edges: &[(&str, &str, &str)], ts: i64) -> Event {
    Event::Inbound(ServerMessage::GraphState(GraphState {
        nodes: nodes.iter().map(|n| node(n)).collect(),
        edges: edges.iter().map(|(i, s, t)| edge(i, s, t)).collect(),
        timestamp: at(ts),
    }))
}

fn node_delta(update_type: UpdateType, id: &str, ts: i64) -> Event {
    Event::Inbound(ServerMessage::GraphUpdate(
        GraphUpdate::for_node(update_type, &node(id), "api", at(ts)).unwrap(),
    ))
}

fn edge_delta(update_type: UpdateType, e: &Edge, ts: i64) -> Event {
    Event::Inbound(ServerMessage::GraphUpdate(
        GraphUpdate::for_edge(update_type, e, "api", at(ts)).unwrap(),
    ))
}

fn established() -> Event {
    Event::Inbound(ServerMessage::ConnectionEstablished {
        session_id: "s1".to_owned(),
        timestamp: at(0),
    })
}

fn feed(state: SyncState, events: Vec<Event>) -> (SyncState, Vec<Command>) {
    let mut state = state;
    let mut all = Vec::new();
    for event in events {
        let (next, commands) = state.reduce(event);
        state = next;
        all.extend(commands);
    }
    (state, all)
}

fn connected() -> SyncState {
    feed(SyncState::new(3), vec![Event::Start, Event::TransportOpened, established()]).0
}

fn node_ids(state: &SyncState) -> Vec<String> {
    state.mirror().nodes().map(|n| n.id.to_string()).collect()
}

#[test]
fn scenario_a_node_delete_cascades() {
    let (state, _) = feed(
        SyncState::new(3),
        vec![
            Event::Start,
            Event::TransportOpened,
            established(),
            snapshot(&["n1", "n2"], &[("e1", "n1", "n2")], 0),
            node_delta(UpdateType::Deleted, "n1", 1),
        ],
    );
    assert_eq!(state.session_id(), Some("s1"));
    assert_eq!(node_ids(&state), ["n2"]);
    assert_eq!(state.mirror().edge_count(), 0);
}

#[test]
fn scenario_b_unknown_update_is_healed_by_resync() {
    let (state, commands) = feed(
        connected(),
        vec![
            snapshot(&["a", "b"], &[], 0),
            edge_delta(UpdateType::Updated, &edge("e2", "a", "b"), 1),
        ],
    );
    assert!(commands.is_empty());
    assert!(state.mirror().edge(&EdgeId::from("e2")).is_none());
    assert_eq!(state.status(), ConnectionStatus::Connected);

    let (state, _) = feed(
        state,
        vec![Event::Resync, snapshot(&["a", "b"], &[("e2", "a", "b")], 2)],
    );
    assert!(state.mirror().edge(&EdgeId::from("e2")).is_some());
}

#[test]
fn scenario_c_last_applied_wins() {
    let mut first = edge("e1", "a", "b");
    first.bandwidth = Some("10Gbps".to_owned());
    let mut second = edge("e1", "a", "b");
    second.bandwidth = Some("1Gbps".to_owned());

    let (state, _) = feed(
        connected(),
        vec![
            snapshot(&["a", "b"], &[("e1", "a", "b")], 0),
            edge_delta(UpdateType::Updated, &first, 20),
            edge_delta(UpdateType::Updated, &second, 10),
        ],
    );
    let held = state.mirror().edge(&EdgeId::from("e1")).unwrap();
    assert_eq!(held.bandwidth.as_deref(), Some("1Gbps"));
    assert_eq!(state.last_updated(), Some(at(10)));
}

#[test]
fn idempotent_creation() {
    let once = feed(connected(), vec![node_delta(UpdateType::Created, "x", 1)]).0;
    let twice = feed(
        connected(),
        vec![
            node_delta(UpdateType::Created, "x", 1),
            node_delta(UpdateType::Created, "x", 1),
        ],
    )
    .0;
    assert_eq!(node_ids(&once), node_ids(&twice));
    assert_eq!(once.mirror(), twice.mirror());
}

#[test]
fn resync_dominates_buffered_deltas() {
    let (state, _) = feed(
        connected(),
        vec![
            snapshot(&["a"], &[], 0),
            node_delta(UpdateType::Created, "b", 1),
            node_delta(UpdateType::Created, "c", 2),
            node_delta(UpdateType::Deleted, "a", 3),
            snapshot(&["a", "z"], &[("az", "a", "z")], 4),
        ],
    );
    assert_eq!(node_ids(&state), ["a", "z"]);
    assert_eq!(state.mirror().edge_count(), 1);
}

#[test]
fn bounded_reconnection() {
    let max = 4;
    let mut state = SyncState::new(max);
    let mut scheduled = 0_u32;
    let mut connects = 0_u32;
    let mut unexpected = Vec::new();

    let mut pending = vec![Event::Start];
    for _ in 0..100 {
        let Some(event) = pending.pop() else { break };
        let (next, commands) = state.reduce(event);
        state = next;
        for command in commands {
            match command {
                Command::Connect => {
                    connects = connects.saturating_add(1);
                    pending.push(Event::TransportClosed {
                        reason: "refused".to_owned(),
                    });
                }
                Command::ScheduleReconnect { attempt } => {
                    scheduled = scheduled.saturating_add(1);
                    assert_eq!(attempt, scheduled);
                    pending.push(Event::ReconnectDue);
                }
                other => unexpected.push(other),
            }
        }
    }

    assert!(unexpected.is_empty(), "{unexpected:?}");
    assert_eq!(scheduled, max);
    assert_eq!(connects, max.saturating_add(1));
    assert_eq!(state.status(), ConnectionStatus::Disconnected);
    assert!(state.error().unwrap().contains("exhausted"));

    // Stays put until re-triggered.
    let (state, commands) = state.reduce(Event::ReconnectDue);
    assert!(commands.is_empty());
    let (state, commands) = state.reduce(Event::RetryRequested);
    assert_eq!(commands, [Command::Connect]);
    assert!(state.error().is_none());
    assert_eq!(state.reconnect_attempts(), 0);
}

#[test]
fn attempts_reset_after_initial_snapshot() {
    let (state, _) = feed(
        SyncState::new(2),
        vec![
            Event::Start,
            Event::TransportClosed { reason: "refused".to_owned() },
            Event::ReconnectDue,
            Event::TransportOpened,
        ],
    );
    assert_eq!(state.reconnect_attempts(), 1);
    let (state, _) = state.reduce(snapshot(&[], &[], 0));
    assert_eq!(state.reconnect_attempts(), 0);
}

#[test]
fn transport_loss_keeps_the_mirror() {
    let (state, commands) = feed(
        connected(),
        vec![
            snapshot(&["a"], &[], 0),
            Event::TransportClosed { reason: "reset".to_owned() },
        ],
    );
    assert_eq!(commands, [Command::ScheduleReconnect { attempt: 1 }]);
    assert_eq!(state.mirror().node_count(), 1);
}

#[test]
fn no_dangling_edges_under_random_deltas() {
    let ids = ["a", "b", "c", "d", "e"];
    let mut rng = StdRng::seed_from_u64(2024);

    for _ in 0..50 {
        let mut state = connected();
        for step in 0..200_i64 {
            let pick = |rng: &mut StdRng| *ids.choose(rng).unwrap();
            let event = match rng.random_range(0..8_u8) {
                0 => snapshot(&[pick(&mut rng), pick(&mut rng)], &[("s", "a", "b")], step),
                1 | 2 => node_delta(UpdateType::Created, pick(&mut rng), step),
                3 => node_delta(UpdateType::Updated, pick(&mut rng), step),
                4 => node_delta(UpdateType::Deleted, pick(&mut rng), step),
                5 | 6 => {
                    let id = format!("e{}", rng.random_range(0..6_u8));
                    let e = edge(&id, pick(&mut rng), pick(&mut rng));
                    let kind = if rng.random_bool(0.5) {
                        UpdateType::Created
                    } else {
                        UpdateType::Updated
                    };
                    edge_delta(kind, &e, step)
                }
                _ => {
                    let id = format!("e{}", rng.random_range(0..6_u8));
                    edge_delta(UpdateType::Deleted, &edge(&id, "a", "b"), step)
                }
            };
            state = state.reduce(event).0;
            for e in state.mirror().edges() {
                assert!(state.mirror().node(&e.source).is_some());
                assert!(state.mirror().node(&e.target).is_some());
            }
        }
        assert!(state.mirror().is_consistent());
        assert!(state.mirror().node(&NodeId::from("zz")).is_none());
    }
}

mod common;

use std::collections::HashSet;

use egui::{Rect, Vec2, pos2, vec2};
use thinkspace::canvas::alignment::{Guide, compute_guides};
use thinkspace::canvas::placement::{collides, place_sibling, place_siblings};
use thinkspace::canvas::viewport::{MAX_ZOOM, MIN_ZOOM, Viewport};
use thinkspace::canvas::{LayoutConfig, snap_to_grid};
use thinkspace::graph_utils::graph::{ConnectionStyle, GraphStore, NodeData, NodePatch};
use thinkspace::history::{Command, HistoryLog};

use common::note;

#[test]
fn graphstore_cascade_delete_removes_incident_connections() {
    let mut g = GraphStore::new();
    let a = g.create_node(note("A"), pos2(0.0, 0.0));
    let b = g.create_node(note("B"), pos2(300.0, 0.0));
    let c = g.create_node(note("C"), pos2(600.0, 0.0));
    g.create_connection(a, b, ConnectionStyle::Solid).expect("a -> b");
    g.create_connection(b, c, ConnectionStyle::Dashed).expect("b -> c");
    let ac = g.create_connection(a, c, ConnectionStyle::Dotted).expect("a -> c");

    let removed = g.delete_node(b).expect("b exists");
    assert_eq!(removed.connections.len(), 2);
    assert_eq!(g.connection_count(), 1);
    assert_eq!(g.connections()[0].id, ac);
    assert!(g.connections().iter().all(|c| c.from != b && c.to != b));
    // Deleting again is a no-op
    assert!(g.delete_node(b).is_none());
}

#[test]
fn graphstore_rejects_duplicate_self_and_dangling_connections() {
    let mut g = GraphStore::new();
    let a = g.create_node(note("A"), pos2(0.0, 0.0));
    let b = g.create_node(note("B"), pos2(300.0, 0.0));
    assert!(g.create_connection(a, b, ConnectionStyle::Solid).is_some());
    assert!(g.create_connection(a, b, ConnectionStyle::Dashed).is_none(), "duplicate pair");
    assert!(g.create_connection(a, a, ConnectionStyle::Solid).is_none(), "self loop");
    assert!(g.create_connection(a, uuid::Uuid::now_v7(), ConnectionStyle::Solid).is_none());
    assert_eq!(g.connection_count(), 1);
    // Reverse direction is a distinct pair
    assert!(g.create_connection(b, a, ConnectionStyle::Solid).is_some());
}

#[test]
fn graphstore_update_returns_pre_image() {
    let mut g = GraphStore::new();
    let a = g.create_node(note("A"), pos2(0.0, 0.0));
    let before = g
        .update_node(a, NodePatch { pos: Some(pos2(40.0, 60.0)), locked: Some(true), ..Default::default() })
        .expect("node exists");
    assert_eq!(before.pos, pos2(0.0, 0.0));
    assert!(!before.locked);
    let now = g.node(a).expect("node exists");
    assert_eq!(now.pos, pos2(40.0, 60.0));
    assert!(now.locked);
    assert_eq!(now.data.title(), "A");
    assert!(g.update_node(uuid::Uuid::now_v7(), NodePatch::locked(true)).is_none());
}

#[test]
fn graphstore_from_parts_drops_dangling_connections() {
    let mut g = GraphStore::new();
    let a = g.create_node(note("A"), pos2(0.0, 0.0));
    let b = g.create_node(note("B"), pos2(300.0, 0.0));
    g.create_connection(a, b, ConnectionStyle::Solid);
    let mut conns = g.connections().to_vec();
    let mut ghost = conns[0].clone();
    ghost.id = uuid::Uuid::now_v7();
    ghost.to = uuid::Uuid::now_v7();
    conns.push(ghost);

    let rebuilt = GraphStore::from_parts(g.nodes().cloned().collect(), conns, Vec::new());
    assert_eq!(rebuilt.node_count(), 2);
    assert_eq!(rebuilt.connection_count(), 1);
}

#[test]
fn graphstore_spatial_queries() {
    let mut g = GraphStore::new();
    let a = g.create_node(note("A"), pos2(0.0, 0.0));
    let b = g.create_node(note("B"), pos2(400.0, 0.0));
    let c = g.create_node(note("C"), pos2(0.0, 400.0));

    let hits: HashSet<_> = g.nodes_in_rect(Rect::from_min_max(pos2(-10.0, -10.0), pos2(420.0, 50.0))).into_iter().collect();
    assert_eq!(hits, HashSet::from([a, b]));

    assert_eq!(g.node_at(pos2(10.0, 100.0)), Some(a));
    assert_eq!(g.header_at(pos2(10.0, 10.0)), Some(a));
    assert_eq!(g.header_at(pos2(10.0, 100.0)), None);
    // Output port sits on the right edge, halfway down
    assert_eq!(g.output_port_at(pos2(560.0, 60.0), 10.0), Some(b));
    assert_eq!(g.nearest_node(pos2(80.0, 540.0), 30.0), Some(c));
    assert_eq!(g.nearest_node(pos2(80.0, 600.0), 30.0), None);

    let bounds = g.bounds().expect("non-empty graph");
    assert_eq!(bounds.min, pos2(0.0, 0.0));
    assert_eq!(bounds.max, pos2(560.0, 520.0));
}

#[test]
fn graphstore_frame_members_require_full_containment() {
    let mut g = GraphStore::new();
    let inside = g.create_node(note("in"), pos2(20.0, 20.0));
    let _straddling = g.create_node(note("edge"), pos2(300.0, 20.0));
    let f = g.create_frame("Group", Rect::from_min_size(pos2(0.0, 0.0), vec2(400.0, 300.0)));
    assert_eq!(g.frame_members(f), vec![inside]);
    assert!(g.delete_frame(f).is_some());
    assert!(g.frame_members(f).is_empty());
}

#[test]
fn layout_snap_rounds_to_nearest_grid_unit() {
    assert_eq!(snap_to_grid(137.0, 20.0), 140.0);
    assert_eq!(snap_to_grid(112.0, 20.0), 120.0);
    assert_eq!(snap_to_grid(-9.0, 20.0), -0.0);
    assert_eq!(snap_to_grid(-11.0, 20.0), -20.0);
    let cfg = LayoutConfig::default();
    assert_eq!(cfg.snap(pos2(29.0, 31.0)), pos2(20.0, 40.0));
}

#[test]
fn viewport_round_trips_screen_and_world() {
    let v = Viewport::new(vec2(120.0, -40.0), 1.5);
    let p = pos2(333.0, 71.0);
    let back = v.screen_to_world(v.world_to_screen(p));
    assert!((back.x - p.x).abs() < 1e-3 && (back.y - p.y).abs() < 1e-3);
}

#[test]
fn viewport_zoom_is_clamped_and_anchor_stays_put() {
    let mut v = Viewport::default();
    let anchor = pos2(400.0, 300.0);
    let world_before = v.screen_to_world(anchor);
    v.zoom_at(100.0, anchor);
    let world_after = v.screen_to_world(anchor);
    assert!((world_before.x - world_after.x).abs() < 1e-3);
    assert!((world_before.y - world_after.y).abs() < 1e-3);
    // A single event is capped at a 10% step
    assert!((v.zoom() - 1.1).abs() < 1e-5);

    for _ in 0..200 {
        v.zoom_at(10_000.0, anchor);
    }
    assert_eq!(v.zoom(), MAX_ZOOM);
    for _ in 0..200 {
        v.zoom_at(-10_000.0, anchor);
    }
    assert_eq!(v.zoom(), MIN_ZOOM);

    v.set_zoom(f32::NAN);
    assert_eq!(v.zoom(), MIN_ZOOM);
    assert_eq!(Viewport::new(Vec2::ZERO, 10.0).zoom(), MAX_ZOOM);
}

#[test]
fn viewport_zoom_to_fit_centres_content() {
    let mut v = Viewport::default();
    let world = Rect::from_min_size(pos2(1000.0, 1000.0), vec2(400.0, 200.0));
    let screen = vec2(800.0, 600.0);
    v.zoom_to_fit(world, screen);
    let centre = v.world_to_screen(world.center());
    assert!((centre.x - 400.0).abs() < 1e-2 && (centre.y - 300.0).abs() < 1e-2);
    let fitted = v.world_rect_to_screen(world);
    assert!(fitted.min.x >= 0.0 && fitted.max.x <= screen.x);
    v.reset();
    assert_eq!(v, Viewport::default());
}

#[test]
fn placement_three_siblings_do_not_collide() {
    let cfg = LayoutConfig::default();
    let mut g = GraphStore::new();
    let parent = pos2(0.0, 0.0);
    g.create_node(note("parent"), parent);

    let placed = place_siblings(&g, parent, 3, &cfg);
    assert_eq!(placed.len(), 3);
    for (i, p) in placed.iter().enumerate() {
        assert!(!collides(*p, parent, cfg.collision_extent), "sibling {i} overlaps parent");
        assert_eq!(cfg.snap(*p), *p, "sibling {i} is grid aligned");
        for q in &placed[i + 1..] {
            assert!(!collides(*p, *q, cfg.collision_extent));
        }
    }
}

#[test]
fn placement_retries_outward_when_blocked() {
    let cfg = LayoutConfig::default();
    let parent = pos2(0.0, 0.0);
    // First candidate for a lone sibling is straight to the right
    let first = place_sibling(&[], parent, 0, 1, &cfg);
    assert_eq!(first, pos2(400.0, 0.0));

    let blocked = place_sibling(&[first], parent, 0, 1, &cfg);
    assert!(!collides(blocked, first, cfg.collision_extent));
    assert!(blocked.to_vec2().length() > 400.0);
}

#[test]
fn placement_falls_back_to_last_candidate() {
    let cfg = LayoutConfig { placement_attempts: 1, ..LayoutConfig::default() };
    let parent = pos2(0.0, 0.0);
    let wall = [pos2(400.0, 0.0)];
    let p = place_sibling(&wall, parent, 0, 1, &cfg);
    assert_eq!(p, pos2(400.0, 0.0));
}

#[test]
fn alignment_guides_within_threshold_only() {
    let mut g = GraphStore::new();
    let moving = g.create_node(note("m"), pos2(103.0, 500.0));
    g.create_node(note("left"), pos2(100.0, 0.0));
    g.create_node(note("row"), pos2(800.0, 498.0));
    g.create_node(note("far"), pos2(700.0, 900.0));

    let guides = compute_guides(&g, moving, &HashSet::new(), 5.0);
    assert!(guides.contains(&Guide::Vertical(100.0)));
    assert!(guides.contains(&Guide::Vertical(180.0)), "centre alignment");
    assert!(guides.contains(&Guide::Horizontal(498.0)));
    assert_eq!(guides.len(), 3);

    let guides = compute_guides(&g, moving, &HashSet::new(), 2.0);
    assert!(guides.is_empty());
    // Guides never move the node
    assert_eq!(g.node(moving).map(|n| n.pos), Some(pos2(103.0, 500.0)));
}

#[test]
fn history_delete_node_round_trip_restores_edge_order() {
    let mut g = GraphStore::new();
    let mut log = HistoryLog::with_capacity(20);
    let a = g.create_node(note("A"), pos2(0.0, 0.0));
    let b = g.create_node(note("B"), pos2(300.0, 0.0));
    let c = g.create_node(note("C"), pos2(600.0, 0.0));
    g.create_connection(a, b, ConnectionStyle::Solid);
    g.create_connection(b, c, ConnectionStyle::Solid);
    g.create_connection(a, c, ConnectionStyle::Solid);
    let original = g.clone();

    let removed = g.delete_node(b).expect("b exists");
    log.record(Command::DeleteNode { removed });
    let after = g.clone();

    assert!(log.undo(&mut g));
    assert_eq!(g, original);
    assert!(log.redo(&mut g));
    assert_eq!(g, after);
}

#[test]
fn history_cap_keeps_most_recent_entries() {
    let mut g = GraphStore::new();
    let mut log = HistoryLog::with_capacity(20);
    for i in 0..21 {
        let node = thinkspace::graph_utils::graph::Node::new(NodeData::note(format!("n{i}"), ""), pos2(0.0, 0.0));
        log.execute(Command::CreateNode { node }, &mut g);
    }
    assert_eq!(log.undo_len(), 20);
    let mut undone = 0;
    while log.undo(&mut g) {
        undone += 1;
    }
    assert_eq!(undone, 20);
    // The oldest creation fell off the log and stays applied
    assert_eq!(g.node_count(), 1);
    assert_eq!(log.redo_len(), 20);
}

#[test]
fn history_commands_serialize() {
    let mut g = GraphStore::new();
    let a = g.create_node(note("A"), pos2(0.0, 0.0));
    let b = g.create_node(note("B"), pos2(300.0, 0.0));
    g.create_connection(a, b, ConnectionStyle::Dashed);
    let removed = g.delete_node(a).expect("a exists");
    let cmd = Command::DeleteNode { removed };
    let json = serde_json::to_string(&cmd).expect("serialize command");
    let back: Command = serde_json::from_str(&json).expect("deserialize command");
    assert_eq!(back, cmd);
}

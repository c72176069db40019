//! End-to-end scenarios driven through `Manager`'s public surface: startup
//! adoption of pre-existing windows, tagset switching across several
//! clients, and a keybinding-triggered restart tearing every client down.
use std::collections::HashMap;

use dim::bindings::{Bindings, BindingNode, ChordKey, KeyCode, ModMask};
use dim::config::Config;
use dim::connection::mock::MockConnection;
use dim::event::{KeyEvent, PropertyNotifyEvent, XEvent};
use dim::manager::{Action, Manager};
use dim::property::Property;
use dim::xid::Xid;

fn manager(conn: MockConnection, bindings: Bindings<Action>) -> Manager {
    Manager::new(Box::new(conn), Config::default(), bindings)
}

fn empty_bindings() -> Bindings<Action> {
    Bindings::new(HashMap::new())
}

#[test]
fn startup_adopts_already_mapped_root_children() {
    let conn = MockConnection::new();
    *conn.root_children.borrow_mut() = vec![Xid(10), Xid(11)];
    let mut mgr = manager(conn, empty_bindings());

    mgr.startup().unwrap();

    assert!(mgr.clients.contains(Xid(10)));
    assert!(mgr.clients.contains(Xid(11)));
    assert!(mgr.is_visible(Xid(10)));
    assert!(mgr.is_visible(Xid(11)));
}

#[test]
fn startup_skips_override_redirect_children() {
    let conn = MockConnection::new();
    *conn.root_children.borrow_mut() = vec![Xid(10), Xid(11)];
    conn.override_redirect.borrow_mut().insert(Xid(11));
    let mut mgr = manager(conn, empty_bindings());

    mgr.startup().unwrap();

    assert!(mgr.clients.contains(Xid(10)));
    assert!(!mgr.clients.contains(Xid(11)));
}

#[test]
fn switching_tagset_hides_clients_outside_the_expression() {
    let conn = MockConnection::new();
    *conn.root_children.borrow_mut() = vec![Xid(10), Xid(11), Xid(12)];
    let mut mgr = manager(conn, empty_bindings());
    mgr.startup().unwrap();

    let work = mgr.tag_id("work").unwrap();
    let docs = mgr.tag_id("docs").unwrap();
    mgr.clients.get_mut(Xid(10)).unwrap().tags.push(work);
    mgr.clients.get_mut(Xid(11)).unwrap().tags.push(docs);
    // Xid(12) stays untagged and not sticky.

    mgr.set_tagset("work").unwrap();

    assert!(mgr.is_visible(Xid(10)));
    assert!(!mgr.is_visible(Xid(11)));
    assert!(!mgr.is_visible(Xid(12)));
}

#[test]
fn sticky_client_stays_visible_across_tagset_switches() {
    let conn = MockConnection::new();
    *conn.root_children.borrow_mut() = vec![Xid(10), Xid(11)];
    let mut mgr = manager(conn, empty_bindings());
    mgr.startup().unwrap();

    let sticky = mgr.tag_id("*").unwrap();
    let docs = mgr.tag_id("docs").unwrap();
    mgr.clients.get_mut(Xid(10)).unwrap().tags.push(sticky);
    mgr.clients.get_mut(Xid(11)).unwrap().tags.push(docs);

    mgr.set_tagset("work").unwrap();
    assert!(mgr.is_visible(Xid(10)));
    assert!(!mgr.is_visible(Xid(11)));

    mgr.set_tagset("docs").unwrap();
    assert!(mgr.is_visible(Xid(10)));
    assert!(mgr.is_visible(Xid(11)));
}

#[test]
fn restart_binding_tears_down_every_managed_client() {
    let restart_key = ChordKey::Key(KeyCode::new(ModMask::MOD4, 27));
    let mut root = HashMap::new();
    root.insert(restart_key, BindingNode::Callback(Action::Restart));

    let conn = MockConnection::new();
    *conn.root_children.borrow_mut() = vec![Xid(10), Xid(11)];
    let mut mgr = manager(conn, Bindings::new(root));
    mgr.startup().unwrap();
    assert!(mgr.clients.contains(Xid(10)));

    mgr.dispatch_event(XEvent::KeyPress(KeyEvent {
        window: Xid(10),
        code: KeyCode::new(ModMask::MOD4, 27),
    }))
    .unwrap();

    assert!(!mgr.clients.contains(Xid(10)));
    assert!(!mgr.clients.contains(Xid(11)));
}

#[test]
fn adopted_client_title_is_read_from_wm_name() {
    let conn = MockConnection::new();
    *conn.root_children.borrow_mut() = vec![Xid(10)];
    let wm_name = conn.intern_atom("WM_NAME").unwrap();
    conn.properties.borrow_mut().insert((Xid(10), wm_name), Property::Utf8String("xterm".into()));
    let mut mgr = manager(conn, empty_bindings());

    mgr.startup().unwrap();

    assert_eq!(mgr.clients.get(Xid(10)).unwrap().title, "xterm");
}

#[test]
fn adoption_reads_protocols_hints_and_tags() {
    let conn = MockConnection::new();
    *conn.root_children.borrow_mut() = vec![Xid(10)];
    let protocols = conn.intern_atom("WM_PROTOCOLS").unwrap();
    let delete = conn.intern_atom("WM_DELETE_WINDOW").unwrap();
    let wm_hints = conn.intern_atom("WM_HINTS").unwrap();
    let dim_tags = conn.intern_atom("_DIM_TAGS").unwrap();
    let work = conn.intern_atom("work").unwrap();
    conn.properties
        .borrow_mut()
        .insert((Xid(10), protocols), Property::AtomList(vec![delete]));
    conn.properties.borrow_mut().insert(
        (Xid(10), wm_hints),
        Property::Hints(dim::property::WmHints {
            flags: dim::property::WmHintsFlags::INPUT_HINT,
            accepts_input: false,
            urgent: false,
        }),
    );
    conn.properties
        .borrow_mut()
        .insert((Xid(10), dim_tags), Property::AtomList(vec![work]));
    let mut mgr = manager(conn, empty_bindings());

    mgr.startup().unwrap();

    let client = mgr.clients.get(Xid(10)).unwrap();
    assert!(client.supports_delete);
    assert!(!client.wm_hints.accepts_input);
    assert_eq!(client.tags, vec![work]);
}

#[test]
fn fullscreen_covers_monitor_exactly_and_unmaps_titlebar() {
    let key = ChordKey::Key(KeyCode::new(ModMask::MOD4, 41));
    let mut root = HashMap::new();
    root.insert(key, BindingNode::Callback(Action::ToggleFullscreen));

    let conn = MockConnection::new();
    *conn.root_children.borrow_mut() = vec![Xid(10)];
    let mut mgr = manager(conn, Bindings::new(root));
    mgr.startup().unwrap();

    mgr.dispatch_event(XEvent::KeyPress(KeyEvent { window: Xid(10), code: KeyCode::new(ModMask::MOD4, 41) }))
        .unwrap();

    let client = mgr.clients.get(Xid(10)).unwrap();
    assert!(client.is_fullscreen());
    assert_eq!(client.border, 0);
    assert_eq!(client.titlebar_height, 0);
    assert_eq!(client.frame_geometry(), client.geometry);
}

#[test]
fn property_notify_for_unmanaged_window_is_a_no_op() {
    let conn = MockConnection::new();
    *conn.root_children.borrow_mut() = vec![Xid(10)];
    let mut mgr = manager(conn, empty_bindings());
    mgr.startup().unwrap();

    mgr.dispatch_event(XEvent::PropertyNotify(PropertyNotifyEvent {
        window: Xid(999),
        atom: Xid(1),
        is_root: false,
    }))
    .unwrap();

    assert_eq!(mgr.clients.get(Xid(10)).unwrap().title, "");
}

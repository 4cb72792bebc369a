#![forbid(unsafe_code)]

//! Integration tests: awaiting window closure and continuation timing.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::executor::{LocalPool, block_on};
use futures::task::LocalSpawnExt;
use modal_core::{Component, ModalController, ModalEventKind, ParamsPatch};

fn component() -> Component<()> {
    Component::new("Popup", |_| ())
}

#[test]
fn awaiting_caller_resumes_after_close() {
    let mut pool = LocalPool::new();
    let modal = ModalController::new();
    let w = modal.open(&component(), ParamsPatch::new());

    let done = Rc::new(Cell::new(false));
    {
        let done = Rc::clone(&done);
        let w = w.clone();
        pool.spawner()
            .spawn_local(async move {
                w.await;
                done.set(true);
            })
            .expect("spawn");
    }

    pool.run_until_stalled();
    assert!(!done.get());

    modal.close(&w);
    assert!(!done.get());
    pool.run_until_stalled();
    assert!(done.get());
}

#[test]
fn continuations_run_once_in_attach_order_after_events() {
    let mut pool = LocalPool::new();
    let modal = ModalController::new();
    let w = modal.open(&component(), ParamsPatch::new());
    let log = Rc::new(RefCell::new(Vec::new()));

    let _sub = {
        let log = Rc::clone(&log);
        modal.on(ModalEventKind::Remove, move |_| log.borrow_mut().push("event"))
    };
    for tag in ["first", "second", "third"] {
        let log = Rc::clone(&log);
        pool.spawner()
            .spawn_local(w.then(move || log.borrow_mut().push(tag)))
            .expect("spawn");
    }
    pool.run_until_stalled();

    w.close();
    w.close();
    modal.close(&w);
    assert_eq!(*log.borrow(), vec!["event"]);

    pool.run_until_stalled();
    assert_eq!(*log.borrow(), vec!["event", "first", "second", "third"]);
}

#[test]
fn then_after_close_still_completes() {
    let modal = ModalController::new();
    let w = modal.open(&component(), ParamsPatch::new());
    w.close();

    assert_eq!(block_on(w.then(|| 7)), 7);
    block_on(w.closed());
}

#[test]
fn superseded_window_stays_pending_until_closed() {
    let mut pool = LocalPool::new();
    let modal = ModalController::new();
    let old = modal.open(&component(), ParamsPatch::new());
    modal.replace(&component(), ParamsPatch::new());

    let done = Rc::new(Cell::new(false));
    {
        let done = Rc::clone(&done);
        pool.spawner()
            .spawn_local(old.then(move || done.set(true)))
            .expect("spawn");
    }
    pool.run_until_stalled();
    assert!(!done.get());

    old.close();
    pool.run_until_stalled();
    assert!(done.get());
    assert!(modal.is_active());
}

#[test]
fn close_all_wakes_every_waiter() {
    let mut pool = LocalPool::new();
    let modal = ModalController::new();
    let popup = component();
    let count = Rc::new(Cell::new(0));

    for id in 0..4 {
        let w = modal.open(&popup, ParamsPatch::new().id(id));
        let count = Rc::clone(&count);
        pool.spawner()
            .spawn_local(async move {
                w.await;
                count.set(count.get() + 1);
            })
            .expect("spawn");
    }
    pool.run_until_stalled();
    assert_eq!(count.get(), 0);

    modal.close_all();
    pool.run_until_stalled();
    assert_eq!(count.get(), 4);
}

#[test]
fn stale_clear_resolves_hidden_windows() {
    let modal = ModalController::new();
    let popup = component();
    let hidden = modal.open(&popup, ParamsPatch::new().id(1));
    modal.hide();
    modal.open(&popup, ParamsPatch::new().id(2));
    block_on(hidden.closed());
}

use std::{sync::Arc, time::Duration};

use pretty_assertions::assert_eq;

use libcanopy::{AutoSaveEvent, AutoSaver};

use crate::canopy_test::{
    io_util::write_file,
    workspace_util::{pairs, TestWorkspace},
};

const WAIT: Duration = Duration::from_secs(10);

#[test]
fn edits_on_disk_are_saved_after_they_settle() {
    let test = TestWorkspace::new("Auto");
    let session = Arc::new(test.session());

    write_file(test.root(), "index.js", "start");
    session
        .initial_sync(&test.workspace.read_snapshot().unwrap())
        .unwrap();
    assert_eq!(test.stored(), pairs(&[("/index.js", "start")]));

    let saver = AutoSaver::start(Arc::clone(&session), Duration::from_millis(50));
    let events = saver.events();

    for step in ["one", "two", "three"] {
        write_file(test.root(), "index.js", step);
        saver.update(test.workspace.read_snapshot().unwrap());
    }

    assert_eq!(events.recv_timeout(WAIT).unwrap(), AutoSaveEvent::Started);
    assert_eq!(
        events.recv_timeout(WAIT).unwrap(),
        AutoSaveEvent::Saved { operations: 1 }
    );
    assert_eq!(test.stored(), pairs(&[("/index.js", "three")]));
}

#[test]
fn dropping_the_saver_discards_pending_work() {
    let test = TestWorkspace::new("Dropped");
    let session = Arc::new(test.session());

    let saver = AutoSaver::start(Arc::clone(&session), Duration::from_secs(60));
    write_file(test.root(), "never.js", "never");
    saver.update(test.workspace.read_snapshot().unwrap());
    drop(saver);

    assert!(test.stored().is_empty());
    assert!(!session.state().reconciling);
}

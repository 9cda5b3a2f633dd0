use insta::assert_snapshot;
use pretty_assertions::assert_eq;

use libcanopy::{blobfs::BlobKey, NodeKind};

use crate::canopy_test::workspace_util::{pairs, snapshot, TestWorkspace};

#[test]
fn identities_survive_a_reopen() {
    let mut test = TestWorkspace::new("Persisted");
    test.save(&snapshot(&[
        ("/src/App.js", "export default function App() {}"),
        ("/src/util.js", "export const add = (a, b) => a + b;"),
    ]));

    let project_id = test.workspace.project().unwrap().id;
    let app_id = test
        .workspace
        .files()
        .list_by_project(project_id)
        .into_iter()
        .find(|node| node.name == "App.js")
        .unwrap()
        .id;

    test.reopen();

    let report = test.save(&snapshot(&[
        ("/src/components/Main.js", "export default function App() {}"),
        ("/src/util.js", "export const add = (a, b) => a + b;"),
    ]));
    assert_snapshot!(report.to_string(), @r"
    create-folder /src/components
    rename /src/App.js -> /src/Main.js
    move /src/Main.js -> /src/components/Main.js
    ");

    test.reopen();
    let node = test.workspace.files().get(app_id).unwrap();
    assert_eq!(node.name, "Main.js");
    assert_eq!(node.kind, NodeKind::File);

    assert_eq!(
        test.stored(),
        pairs(&[
            ("/src/components/Main.js", "export default function App() {}"),
            ("/src/util.js", "export const add = (a, b) => a + b;"),
        ])
    );
}

#[test]
fn blobs_land_in_the_storage_directory() {
    let test = TestWorkspace::new("Blobs");
    test.save(&snapshot(&[("/index.js", "console.log('hi');")]));

    let project_id = test.workspace.project().unwrap().id;
    let node = test
        .workspace
        .files()
        .list_by_project(project_id)
        .pop()
        .unwrap();
    let key: &BlobKey = node.content_ref.as_ref().unwrap();

    assert!(key
        .as_str()
        .starts_with(&format!("projects/{}/files/", project_id)));
    assert!(key.as_str().ends_with("-index.js"));

    let on_disk = test
        .root()
        .join(".canopy")
        .join("store")
        .join("blobs")
        .join("data")
        .join(key.as_str());
    assert_eq!(
        fs_err::read_to_string(on_disk).unwrap(),
        "console.log('hi');"
    );
}

#[test]
fn deleting_a_project_removes_its_files() {
    let test = TestWorkspace::new("Doomed");
    test.save(&snapshot(&[("/a.js", "a"), ("/lib/b.js", "b")]));

    let project = test.workspace.project().unwrap();
    test.workspace
        .projects()
        .delete(project.id, "local", test.workspace.files())
        .unwrap();

    assert!(test.workspace.files().list_by_project(project.id).is_empty());
    assert!(test
        .workspace
        .files()
        .blobs()
        .keys(&format!("projects/{}", project.id))
        .unwrap()
        .is_empty());
    assert!(test.workspace.project().is_err());
}

#[test]
fn other_owners_are_turned_away() {
    let test = TestWorkspace::new("Private");
    let project = test.workspace.project().unwrap();

    let err = test
        .workspace
        .projects()
        .delete(project.id, "mallory", test.workspace.files())
        .unwrap_err();
    assert_eq!(err.code(), "UNAUTHORIZED");
}

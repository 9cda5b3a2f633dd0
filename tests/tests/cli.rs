use insta::assert_snapshot;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use libcanopy::WorkspaceConfig;

use crate::canopy_test::io_util::{files_on_disk, run_canopy, stdout, write_file};

#[test]
fn init_checks_out_the_react_starter() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("demo");
    let root_str = root.to_str().unwrap();

    run_canopy(&["init", root_str, "--name", "Demo App"]);

    let files = files_on_disk(&root);
    let names: Vec<&str> = files.keys().map(String::as_str).collect();
    assert_eq!(
        names,
        vec![
            "App.js",
            "canopy.json5",
            "index.html",
            "index.js",
            "package.json",
            "styles.css"
        ]
    );
    assert!(files["App.js"].contains("Welcome to Demo App!"));

    let config = WorkspaceConfig::load(&root).unwrap();
    assert_eq!(config.name, "Demo App");
    assert!(config.project_id.is_some());

    let output = run_canopy(&["save", root_str]);
    assert_eq!(stdout(&output).trim(), "Everything is up to date");
}

#[test]
fn projects_marks_the_bound_project() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("listed");
    let root_str = root.to_str().unwrap();
    run_canopy(&["init", root_str, "--name", "Listed App"]);

    let config = WorkspaceConfig::load(&root).unwrap();
    let project_id = config.project_id.unwrap();

    let output = run_canopy(&["projects", root_str]);
    assert_eq!(
        stdout(&output).trim_end(),
        format!("* Listed App (listed-app) {}", project_id)
    );
}

#[test]
fn save_picks_up_renames_and_edits() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("edits");
    let root_str = root.to_str().unwrap();
    run_canopy(&["init", root_str, "--name", "Edits"]);

    fs_err::rename(root.join("App.js"), root.join("Main.js")).unwrap();
    write_file(&root, "components/Button.js", "export const Button = () => null;");
    fs_err::remove_file(root.join("styles.css")).unwrap();

    let output = run_canopy(&["save", root_str]);
    assert_snapshot!(stdout(&output).trim_end(), @r"
    delete /styles.css
    rename /App.js -> /Main.js
    create-folder /components
    create-file /components/Button.js (33 bytes)
    ");

    let output = run_canopy(&["tree", root_str]);
    assert_snapshot!(stdout(&output).trim_end(), @r"
    Edits (edits)
      components/
        Button.js
      Main.js
      index.html
      index.js
      package.json
    ");
}

#[test]
fn checkout_clean_mirrors_the_store() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("mirror");
    let root_str = root.to_str().unwrap();
    run_canopy(&["init", root_str, "--name", "Mirror", "--template", "vue"]);

    write_file(&root, "src/main.js", "createApp(App).mount('#app')");
    fs_err::create_dir_all(root.join("public")).unwrap();
    run_canopy(&["save", root_str]);

    let output_dir = dir.path().join("copy");
    write_file(&output_dir, "stale.txt", "old");
    run_canopy(&[
        "checkout",
        root_str,
        "--output",
        output_dir.to_str().unwrap(),
        "--clean",
    ]);

    let files = files_on_disk(&output_dir);
    let expected: Vec<(String, String)> = vec![
        ("src/main.js".to_owned(), "createApp(App).mount('#app')".to_owned()),
    ];
    assert_eq!(files.into_iter().collect::<Vec<_>>(), expected);

    // Empty folders are never stored, so `public` doesn't come back.
    assert!(!output_dir.join("public").exists());
}

use std::{
    collections::BTreeMap,
    path::Path,
    process::{Command, Output},
};

use walkdir::WalkDir;

pub static CANOPY_PATH: &str = env!("CARGO_BIN_EXE_canopy");

/// Runs the canopy binary without file logging and returns its output,
/// failing the test if it exits unsuccessfully.
pub fn run_canopy(args: &[&str]) -> Output {
    let output = Command::new(CANOPY_PATH)
        .args(args)
        .args(["--color", "never"])
        .env("CANOPY_NO_FILE_LOG", "1")
        .output()
        .expect("Couldn't start canopy");

    if !output.status.success() {
        panic!(
            "canopy {:?} failed\nstdout:\n{}\nstderr:\n{}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    output
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs_err::create_dir_all(path.parent().unwrap()).unwrap();
    fs_err::write(path, contents).unwrap();
}

/// Every file under `root` outside `.canopy`, keyed by slash-separated
/// relative path.
pub fn files_on_disk(root: &Path) -> BTreeMap<String, String> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".canopy")
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_str().unwrap())
                .collect::<Vec<_>>()
                .join("/");
            let contents = fs_err::read_to_string(entry.path()).unwrap();
            (relative, contents)
        })
        .collect()
}

// tests/common/mod.rs
// Shared test utilities for integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

pub const HEADER: &str =
    "<!DOCTYPE html>\n<html><head><title>Export</title></head><body>\n<div class=\"preamble\">Guild / channel</div>\n";
pub const FOOTER: &str = "</div>\n<div class=\"postamble\">Exported 3 messages</div>\n</body></html>\n";

/// One message group with a timestamp span
pub fn group(timestamp: &str, body: &str) -> String {
    format!(
        "<div class=\"chatlog__message-group\"><div class=\"chatlog__messages\">\
         <span class=\"chatlog__timestamp\">{}</span>\
         <div class=\"chatlog__content\">{}</div></div></div>\n",
        timestamp, body
    )
}

/// One message group without any timestamp element
pub fn group_without_timestamp(body: &str) -> String {
    format!(
        "<div class=\"chatlog__message-group\"><div class=\"chatlog__content\">{}</div></div>\n",
        body
    )
}

/// A complete export document around `groups`
pub fn document(groups: &[String]) -> String {
    format!(
        "{}<div class=\"chatlog\">\n{}{}",
        HEADER,
        groups.concat(),
        FOOTER
    )
}

/// Write `content` as `chat.html` in `dir`
pub fn write_export(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("chat.html");
    fs::write(&path, content).expect("Failed to write export");
    path
}

/// Run the chatsplit binary from `cwd`; returns (stdout, stderr, exit code)
pub fn run_chatsplit_in(cwd: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_chatsplit"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .env("NO_EMOJI", "1")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute chatsplit");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Run chatsplit with config files ignored
pub fn run_chatsplit(cwd: &Path, args: &[&str]) -> (String, String, i32) {
    let mut full_args = vec!["--ignore-config"];
    full_args.extend_from_slice(args);
    run_chatsplit_in(cwd, &full_args)
}

/// Contents of `<dir>/<year>.html`, panicking if the file is missing
pub fn read_year(dir: &Path, year: &str) -> String {
    let path = dir.join(format!("{}.html", year));
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e))
}

/// Sorted file names in `dir`
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("Failed to list output dir")
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

/// Message group elements in an output file, in file order
pub fn groups_in(content: &str) -> Vec<&str> {
    content
        .lines()
        .filter(|line| line.starts_with("<div class=\"chatlog__message-group\""))
        .collect()
}

use assert_cmd::Command;

#[test]
fn help_lists_subcommands() {
    let output = Command::cargo_bin("bookshelf")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for subcommand in ["serve", "config", "ping", "list"] {
        assert!(stdout.contains(subcommand), "missing {}", subcommand);
    }
}

use std::process::Command;

#[test]
fn cli_compiles_without_warnings() {
    let status = Command::new(env!("CARGO"))
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .env("RUSTFLAGS", "-D warnings")
        .args(["check", "--quiet", "--bin", "skirmish"])
        .status()
        .expect("failed to invoke cargo check for skirmish CLI binary");

    assert!(status.success(), "cargo check --bin skirmish should succeed without warnings");
}

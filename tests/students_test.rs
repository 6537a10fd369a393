use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use assert_fs::prelude::*;
use predicates::prelude::*;

/// Run accessdesk with given args.
fn accessdesk() -> Command {
    let mut cmd = cargo_bin_cmd!("accessdesk");
    cmd.env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

fn init_desk() -> assert_fs::TempDir {
    let dir = assert_fs::TempDir::new().unwrap();
    accessdesk()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();
    dir
}

fn register(dir: &assert_fs::TempDir, name: &str, ra: &str, card: &str) {
    accessdesk()
        .current_dir(dir.path())
        .args(["register", "--name", name, "--ra", ra, "--card", card])
        .assert()
        .success();
}

fn stored(dir: &assert_fs::TempDir) -> serde_json::Value {
    let content = std::fs::read_to_string(dir.path().join(".accessdesk/store.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

// ─── Init ────────────────────────────────────────────────────────

#[test]
fn init_creates_config_and_store() {
    let dir = init_desk();

    dir.child(".accessdesk/config.toml")
        .assert(predicate::str::contains("backend = \"file\""));
    let doc = stored(&dir);
    assert!(doc["autorizados"].as_object().unwrap().is_empty());
    assert!(doc["registros"].as_object().unwrap().is_empty());
}

#[test]
fn init_twice_fails() {
    let dir = init_desk();

    accessdesk()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn init_firebase_requires_url() {
    let dir = assert_fs::TempDir::new().unwrap();

    accessdesk()
        .current_dir(dir.path())
        .args(["init", "--backend", "firebase"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--url"));
}

#[test]
fn commands_fail_before_init() {
    let dir = assert_fs::TempDir::new().unwrap();

    accessdesk()
        .current_dir(dir.path())
        .args(["students", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("accessdesk init"));
}

// ─── Register ────────────────────────────────────────────────────

#[test]
fn register_writes_authorized_student() {
    let dir = init_desk();

    accessdesk()
        .current_dir(dir.path())
        .args([
            "register",
            "--name",
            "  Ana Souza ",
            "--ra",
            "123",
            "--card",
            "C1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Registered Ana Souza (RA 123) with card C1"));

    let doc = stored(&dir);
    assert_eq!(doc["autorizados"]["C1"]["nome"], "Ana Souza");
    assert_eq!(doc["autorizados"]["C1"]["ra"], "123");
    assert_eq!(doc["autorizados"]["C1"]["autorizado"], true);
}

#[test]
fn register_empty_name_is_rejected() {
    let dir = init_desk();

    accessdesk()
        .current_dir(dir.path())
        .args(["register", "--name", "   ", "--ra", "123", "--card", "C1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("name"));

    assert!(stored(&dir)["autorizados"].as_object().unwrap().is_empty());
}

#[test]
fn register_rejects_path_characters_in_card() {
    let dir = init_desk();

    accessdesk()
        .current_dir(dir.path())
        .args(["register", "--name", "Ana", "--ra", "123", "--card", "a/b"])
        .assert()
        .failure();
}

#[test]
fn register_existing_card_replaces_student() {
    let dir = init_desk();
    register(&dir, "Ana", "123", "C1");

    accessdesk()
        .current_dir(dir.path())
        .args(["register", "--name", "Bruno", "--ra", "456", "--card", "C1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("replacing"));

    assert_eq!(stored(&dir)["autorizados"]["C1"]["nome"], "Bruno");
}

// ─── Students ────────────────────────────────────────────────────

#[test]
fn students_list_empty() {
    let dir = init_desk();

    accessdesk()
        .current_dir(dir.path())
        .arg("students")
        .assert()
        .success()
        .stdout(predicate::str::contains("No students registered"));
}

#[test]
fn students_list_shows_registered() {
    let dir = init_desk();
    register(&dir, "Ana", "123", "C1");
    register(&dir, "Bruno", "456", "C2");

    accessdesk()
        .current_dir(dir.path())
        .args(["students", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Registered students (2)"))
        .stdout(predicate::str::contains("Ana"))
        .stdout(predicate::str::contains("Bruno"));
}

#[test]
fn toggle_flips_authorization_both_ways() {
    let dir = init_desk();
    register(&dir, "Ana", "123", "C1");

    accessdesk()
        .current_dir(dir.path())
        .args(["students", "toggle", "C1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not authorized"));
    assert_eq!(stored(&dir)["autorizados"]["C1"]["autorizado"], false);

    accessdesk()
        .current_dir(dir.path())
        .args(["students", "toggle", "C1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is now authorized"));
    assert_eq!(stored(&dir)["autorizados"]["C1"]["autorizado"], true);
    assert_eq!(stored(&dir)["autorizados"]["C1"]["nome"], "Ana");
}

#[test]
fn toggle_unknown_card_fails() {
    let dir = init_desk();

    accessdesk()
        .current_dir(dir.path())
        .args(["students", "toggle", "NOPE"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NOPE"));
}

#[test]
fn edit_keeps_authorization() {
    let dir = init_desk();
    register(&dir, "Ana", "123", "C1");
    accessdesk()
        .current_dir(dir.path())
        .args(["students", "toggle", "C1"])
        .assert()
        .success();

    accessdesk()
        .current_dir(dir.path())
        .args(["students", "edit", "C1", "--name", "Ana Lima", "--ra", "999"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated card C1: Ana Lima (RA 999)"));

    let doc = stored(&dir);
    assert_eq!(doc["autorizados"]["C1"]["nome"], "Ana Lima");
    assert_eq!(doc["autorizados"]["C1"]["ra"], "999");
    assert_eq!(doc["autorizados"]["C1"]["autorizado"], false);
}

#[test]
fn edit_with_empty_ra_changes_nothing() {
    let dir = init_desk();
    register(&dir, "Ana", "123", "C1");

    accessdesk()
        .current_dir(dir.path())
        .args(["students", "edit", "C1", "--name", "Ana", "--ra", " "])
        .assert()
        .failure();

    assert_eq!(stored(&dir)["autorizados"]["C1"]["ra"], "123");
}

#[test]
fn delete_with_confirmation() {
    let dir = init_desk();
    register(&dir, "Ana", "123", "C1");

    accessdesk()
        .current_dir(dir.path())
        .args(["students", "delete", "C1"])
        .write_stdin("y\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted Ana (card C1)"));

    assert!(stored(&dir)["autorizados"].get("C1").is_none());
}

#[test]
fn delete_cancelled_keeps_student() {
    let dir = init_desk();
    register(&dir, "Ana", "123", "C1");

    accessdesk()
        .current_dir(dir.path())
        .args(["students", "delete", "C1"])
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Deletion cancelled"));

    assert_eq!(stored(&dir)["autorizados"]["C1"]["nome"], "Ana");
}

#[test]
fn delete_yes_skips_prompt() {
    let dir = init_desk();
    register(&dir, "Ana", "123", "C1");
    register(&dir, "Bruno", "456", "C2");

    accessdesk()
        .current_dir(dir.path())
        .args(["students", "delete", "C1", "--yes"])
        .assert()
        .success();

    let doc = stored(&dir);
    assert!(doc["autorizados"].get("C1").is_none());
    assert_eq!(doc["autorizados"]["C2"]["nome"], "Bruno");
}

#[test]
fn quiet_suppresses_success_output() {
    let dir = init_desk();

    accessdesk()
        .current_dir(dir.path())
        .args(["--quiet", "register", "--name", "Ana", "--ra", "1", "--card", "C1"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

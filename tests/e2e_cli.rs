
use assert_cmd::{cargo, prelude::*};
use cli_helpers::{
    add_user, base_cmd, config_root_for_home, db_path, holdings_json, run_cmd, run_cmd_json,
    stats_json, submit_item, TEST_DAY,
};
use predicates::prelude::*;
use std::process::Command;
use tempfile::TempDir;

fn setup_temp_home() -> TempDir {
    TempDir::new().expect("failed to create temp home")
}

#[test]
fn holdings_empty_no_color_when_piped() {
    let home = setup_temp_home();
    add_user(&home, "u1@example.com", false).unwrap();

    base_cmd(&home)
        .args(["--user", "u1@example.com", "holdings"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No items held"))
        .stdout(predicate::str::contains("\u{001b}[").not());
}

#[test]
fn submit_then_holdings_and_stats() {
    let home = setup_temp_home();
    add_user(&home, "u1@example.com", false).unwrap();
    let id = submit_item(&home, "u1@example.com", "Charizard", "100", "2").unwrap();

    let holdings = holdings_json(&home, "u1@example.com").unwrap();
    assert_eq!(holdings.len(), 1);
    assert_eq!(holdings[0]["id"].as_i64(), Some(id));
    assert_eq!(holdings[0]["count"].as_i64(), Some(2));
    assert_eq!(holdings[0]["moderation_status"], "PENDING");

    let stats = stats_json(&home, "u1@example.com").unwrap();
    assert_eq!(stats["item_count"].as_i64(), Some(2));
    assert_eq!(stats["last_known_valuation"]["day"], TEST_DAY);
    assert_eq!(stats["last_known_valuation"]["amount"], "200");

    base_cmd(&home)
        .args(["--user", "u1@example.com", "holdings"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Charizard"))
        .stdout(predicate::str::contains("200.00"));
}

#[test]
fn price_update_revalues_other_holders() {
    let home = setup_temp_home();
    add_user(&home, "admin@example.com", true).unwrap();
    add_user(&home, "u1@example.com", false).unwrap();
    let id = submit_item(&home, "admin@example.com", "Booster", "100", "2").unwrap();
    let id_arg = id.to_string();

    run_cmd(&home, &["--user", "u1@example.com", "items", "attach", &id_arg, "1"]).unwrap();
    let fanout = run_cmd_json(
        &home,
        &["--user", "u1@example.com", "items", "price", &id_arg, "150"],
    )
    .unwrap();
    assert_eq!(fanout["updated"].as_array().map(Vec::len), Some(2));
    assert_eq!(fanout["item"]["peak_price"], "150");

    let admin = stats_json(&home, "admin@example.com").unwrap();
    assert_eq!(admin["last_known_valuation"]["amount"], "300");
    let user = stats_json(&home, "u1@example.com").unwrap();
    assert_eq!(user["last_known_valuation"]["amount"], "150");
}

#[test]
fn detach_own_submission_deletes_item() {
    let home = setup_temp_home();
    add_user(&home, "u1@example.com", false).unwrap();
    let id = submit_item(&home, "u1@example.com", "Fan Art", "30", "1").unwrap();

    let outcome = run_cmd_json(
        &home,
        &["--user", "u1@example.com", "items", "detach", &id.to_string()],
    )
    .unwrap();
    assert_eq!(outcome["outcome"], "item_deleted");

    base_cmd(&home)
        .args(["items", "show", &id.to_string()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn single_holding_shows_callers_count() {
    let home = setup_temp_home();
    add_user(&home, "admin@example.com", true).unwrap();
    add_user(&home, "u1@example.com", false).unwrap();
    let id = submit_item(&home, "admin@example.com", "Booster", "25", "2").unwrap();
    let id_arg = id.to_string();

    let holding =
        run_cmd_json(&home, &["--user", "admin@example.com", "holding", &id_arg]).unwrap();
    assert_eq!(holding["id"].as_i64(), Some(id));
    assert_eq!(holding["count"].as_i64(), Some(2));

    base_cmd(&home)
        .args(["--user", "admin@example.com", "holding", &id_arg])
        .assert()
        .success()
        .stdout(predicate::str::contains("Units:   2"))
        .stdout(predicate::str::contains("50.00"));

    base_cmd(&home)
        .args(["--user", "u1@example.com", "holding", &id_arg])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn missing_user_is_unauthorized() {
    let home = setup_temp_home();

    base_cmd(&home)
        .arg("holdings")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unauthorized"));

    base_cmd(&home)
        .args(["--user", "ghost@example.com", "stats"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unauthorized"));
}

#[test]
fn invalid_submission_reports_every_field() {
    let home = setup_temp_home();
    add_user(&home, "u1@example.com", false).unwrap();

    base_cmd(&home)
        .args([
            "--user",
            "u1@example.com",
            "items",
            "submit",
            "--name",
            " ",
            "--image",
            "card.png",
            "--price",
            "0",
            "--url",
            "https://shop.example.com/x",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("validation error"))
        .stderr(predicate::str::contains("name"))
        .stderr(predicate::str::contains("price"));
}

#[test]
fn catalog_is_restricted_to_privileged_users() {
    let home = setup_temp_home();
    add_user(&home, "admin@example.com", true).unwrap();
    add_user(&home, "u1@example.com", false).unwrap();
    submit_item(&home, "u1@example.com", "Pending Thing", "5", "1").unwrap();

    base_cmd(&home)
        .args(["--user", "u1@example.com", "items", "catalog"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("forbidden"));

    let catalog = run_cmd_json(&home, &["--user", "admin@example.com", "items", "catalog"]).unwrap();
    assert_eq!(catalog.as_array().map(Vec::len), Some(1));
}

#[test]
fn invalid_as_of_day_is_rejected() {
    let home = setup_temp_home();
    add_user(&home, "u1@example.com", false).unwrap();

    let mut cmd = Command::new(cargo::cargo_bin!("stash"));
    cmd.env("HOME", home.path())
        .env_remove("STASH_USER")
        .arg("--no-color")
        .arg("--db")
        .arg(db_path(&home))
        .args(["--as-of", "2024-03-10", "--user", "u1@example.com", "stats"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("DD/MM/YYYY"));
}

#[cfg(target_os = "linux")]
#[test]
fn config_file_supplies_default_user() {
    let home = setup_temp_home();
    add_user(&home, "u1@example.com", false).unwrap();
    submit_item(&home, "u1@example.com", "Sleeve", "4", "1").unwrap();

    let config_dir = config_root_for_home(&home).join("stash");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        "user = \"u1@example.com\"\ncurrency_symbol = \"$\"\n",
    )
    .unwrap();

    base_cmd(&home)
        .arg("holdings")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sleeve"))
        .stdout(predicate::str::contains("$"));
}

#[test]
fn failed_holder_can_be_retried() {
    let home = setup_temp_home();
    add_user(&home, "admin@example.com", true).unwrap();
    add_user(&home, "u1@example.com", false).unwrap();
    let id = submit_item(&home, "admin@example.com", "Booster", "100", "1").unwrap();
    let id_arg = id.to_string();
    run_cmd(&home, &["--user", "u1@example.com", "items", "attach", &id_arg, "2"]).unwrap();

    let conn = rusqlite::Connection::open(db_path(&home)).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER block_u1 BEFORE INSERT ON valuations
         WHEN NEW.user_id = (SELECT id FROM users WHERE email = 'u1@example.com')
         BEGIN SELECT RAISE(ABORT, 'locked'); END;",
    )
    .unwrap();

    base_cmd(&home)
        .args(["--user", "admin@example.com", "items", "price", &id_arg, "120"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("stash items retry"));

    conn.execute_batch("DROP TRIGGER block_u1;").unwrap();
    drop(conn);

    run_cmd(
        &home,
        &[
            "--user",
            "admin@example.com",
            "items",
            "retry",
            &id_arg,
            "u1@example.com",
            "--from",
            "100",
        ],
    )
    .unwrap();

    let user = stats_json(&home, "u1@example.com").unwrap();
    assert_eq!(user["last_known_valuation"]["amount"], "240");
    let admin = stats_json(&home, "admin@example.com").unwrap();
    assert_eq!(admin["last_known_valuation"]["amount"], "120");
}

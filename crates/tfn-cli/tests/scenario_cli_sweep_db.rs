use predicates::prelude::*;

/// `tfn db migrate` then `tfn sweep --today` against a real database.
///
/// DB-backed test, skipped if TIFFIN_DATABASE_URL is not set.
#[allow(deprecated)]
#[test]
fn cli_migrate_then_sweep_reports_counts() -> anyhow::Result<()> {
    let url = match std::env::var(tfn_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: TIFFIN_DATABASE_URL not set");
            return Ok(());
        }
    };

    assert_cmd::Command::cargo_bin("tfn")?
        .env(tfn_db::ENV_DB_URL, &url)
        .args(["db", "migrate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("migrations_applied=true"));

    assert_cmd::Command::cargo_bin("tfn")?
        .env(tfn_db::ENV_DB_URL, &url)
        .args(["db", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("db_ok=true has_attendance_table=true"));

    // Far in the past: nothing can have ended before it.
    assert_cmd::Command::cargo_bin("tfn")?
        .env(tfn_db::ENV_DB_URL, &url)
        .args(["sweep", "--today", "1970-01-02"])
        .assert()
        .success()
        .stdout(predicate::str::contains("examined=0"))
        .stdout(predicate::str::contains("expired=0"));
    Ok(())
}

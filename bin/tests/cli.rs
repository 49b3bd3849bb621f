use assert_cmd::prelude::*; // Add methods on commands
use assert_fs::prelude::*;
use predicates::prelude::*; // Used for writing assertions
use std::process::Command; // Run programs

#[test]
fn arguments() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("theory-dd")?;
    cmd.arg("-vvv").arg("file.txt");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No such file or directory"));

    cmd = Command::cargo_bin("theory-dd")?;
    cmd.arg("--load").arg("folder").arg("file.txt");
    cmd.assert().failure().stderr(predicate::str::contains(
        "cannot be used with",
    ));

    cmd = Command::cargo_bin("theory-dd")?;
    cmd.arg("--dd").arg("zdd").arg("file.txt");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));

    cmd = Command::cargo_bin("theory-dd")?;
    cmd.arg("-h");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--assume-true"));

    cmd = Command::cargo_bin("theory-dd")?;
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
    Ok(())
}

#[test]
fn compiles() -> Result<(), Box<dyn std::error::Error>> {
    let file = assert_fs::NamedTempFile::new("bounds.txt")?;
    file.write_str("or(gt(x,5),le(x,0))\n")?;
    let wrong_file = assert_fs::NamedTempFile::new("broken.txt")?;
    wrong_file.write_str("or(gt(x,5),le(x,0)))")?;
    let unsat_file = assert_fs::NamedTempFile::new("unsat.txt")?;
    unsat_file.write_str("and(gt(x,5),le(x,0))")?;

    let mut cmd = Command::cargo_bin("theory-dd")?;
    cmd.arg(wrong_file.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("could not parse formula"));

    for dd in ["bdd", "sdd"] {
        cmd = Command::cargo_bin("theory-dd")?;
        cmd.arg(file.path()).arg("--assume-true").arg("--dd").arg(dd);
        cmd.assert()
            .success()
            .stdout(predicate::str::contains("SAT: true"))
            .stdout(predicate::str::contains("models: 2\n"));

        cmd = Command::cargo_bin("theory-dd")?;
        cmd.arg(file.path()).arg("--abstraction").arg("--dd").arg(dd);
        cmd.assert()
            .success()
            .stdout(predicate::str::contains("models: 3\n"));

        cmd = Command::cargo_bin("theory-dd")?;
        cmd.arg(unsat_file.path()).arg("--dd").arg(dd).arg("--pick");
        cmd.assert()
            .success()
            .stdout(predicate::str::contains("SAT: false"))
            .stdout(predicate::str::contains("models: 0\n"))
            .stdout(predicate::str::contains("no model"));
    }

    for solver in ["total", "partial", "extended"] {
        cmd = Command::cargo_bin("theory-dd")?;
        cmd.arg(unsat_file.path()).arg("--solver").arg(solver).arg("-q");
        cmd.assert()
            .success()
            .stdout(predicate::str::contains("SAT: false"));
    }
    Ok(())
}

#[test]
fn lemmas_conditioning_and_models() -> Result<(), Box<dyn std::error::Error>> {
    let file = assert_fs::NamedTempFile::new("phi.txt")?;
    file.write_str("gt(x,5)")?;
    let lemmas = assert_fs::NamedTempFile::new("lemmas.txt")?;
    lemmas.write_str("or(gt(x,0),neg(gt(x,5)))\n\n")?;

    let mut cmd = Command::cargo_bin("theory-dd")?;
    cmd.arg(file.path())
        .arg("--lemmas")
        .arg(lemmas.path())
        .arg("--sat-hint")
        .arg("sat")
        .arg("--models");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("projected: 1\n"))
        .stdout(predicate::str::contains("models: 1\n"))
        .stdout(predicate::str::contains("T(x > 5)"));

    cmd = Command::cargo_bin("theory-dd")?;
    cmd.arg(file.path())
        .arg("--lemmas")
        .arg(lemmas.path())
        .arg("--sat-hint")
        .arg("unsat");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("nodes: 1\n"))
        .stdout(predicate::str::contains("models: 0\n"));

    let pair = assert_fs::NamedTempFile::new("pair.txt")?;
    pair.write_str("or(a,b)")?;
    cmd = Command::cargo_bin("theory-dd")?;
    cmd.arg(pair.path())
        .arg("--abstraction")
        .arg("--dd")
        .arg("sdd")
        .arg("--condition")
        .arg("-1")
        .arg("--models");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("models: 2\n"))
        .stdout(predicate::str::contains("F(a) T(b)"))
        .stdout(predicate::str::contains("T(a) T(b)"));

    cmd = Command::cargo_bin("theory-dd")?;
    cmd.arg(pair.path()).arg("--condition").arg("7");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("label 7 was never assigned"));
    Ok(())
}

#[test]
fn save_and_load() -> Result<(), Box<dyn std::error::Error>> {
    let file = assert_fs::NamedTempFile::new("phi.txt")?;
    file.write_str("and(or(gt(x,5),a),or(le(x,0),b),imp(a,lt(x,y,3)))")?;
    let folder = assert_fs::TempDir::new()?;
    let log = folder.child("log.json");

    for dd in ["bdd", "sdd"] {
        let target = folder.child(dd);
        let mut cmd = Command::cargo_bin("theory-dd")?;
        cmd.arg(file.path())
            .arg("--dd")
            .arg(dd)
            .arg("--vtree")
            .arg("right")
            .arg("--save")
            .arg(target.path())
            .arg("--log-json")
            .arg(log.path());
        let output = cmd.output()?;
        assert!(output.status.success());
        let stdout = String::from_utf8(output.stdout)?;
        target.child("diagram.json").assert(predicate::path::exists());
        log.assert(predicate::str::contains("DD joining time"));

        cmd = Command::cargo_bin("theory-dd")?;
        cmd.arg("--load").arg(target.path()).arg("--dd").arg(dd);
        cmd.assert().success().stdout(stdout);
    }

    let mut cmd = Command::cargo_bin("theory-dd")?;
    cmd.arg("--load").arg(folder.child("bdd").path()).arg("--dd").arg("sdd");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("persisted state is corrupt"));
    Ok(())
}

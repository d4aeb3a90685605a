use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*;
use std::process::Command; // Run programs
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

fn round_trip_test(dat: &[u8],comp_args: &[&str],dec_args: &[&str]) -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("sample");
    let ash_path = temp_dir.path().join("sample.ash");
    let out_path = temp_dir.path().join("sample.out");
    std::fs::write(&in_path,dat)?;
    let mut cmd = Command::cargo_bin("ashcomp")?;
    cmd.arg(&in_path)
        .arg("-o").arg(&ash_path)
        .args(comp_args)
        .assert()
        .success();
    let mut cmd = Command::cargo_bin("ashdec")?;
    cmd.arg(&ash_path)
        .arg("-o").arg(&out_path)
        .args(dec_args)
        .assert()
        .success();
    match std::fs::read(out_path) {
        Ok(v) => {
            assert_eq!(v,dat.to_vec());
        },
        _ => panic!("unable to read round trip output")
    }
    Ok(())
}

#[test]
fn ash_round_trip() -> STDRESULT {
    let dat = "I am Sam. Sam I am. I do not like this Sam I am.\n".repeat(40);
    round_trip_test(dat.as_bytes(),&[],&[])
}

#[test]
fn ash_round_trip_with_passes() -> STDRESULT {
    let dat = "I am Sam. Sam I am. I do not like this Sam I am.\n".repeat(40);
    round_trip_test(dat.as_bytes(),&["-c","2"],&[])
}

#[test]
fn ash_round_trip_wide_distances() -> STDRESULT {
    let dat = "I am Sam. Sam I am. I do not like this Sam I am.\n".repeat(40);
    round_trip_test(dat.as_bytes(),&["-d","15"],&["-d","15"])
}

#[test]
fn default_output_names() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("sample");
    std::fs::write(&in_path,"what is in a name".as_bytes())?;
    let mut cmd = Command::cargo_bin("ashcomp")?;
    cmd.arg(&in_path).assert().success();
    let ash_path = temp_dir.path().join("sample.ash");
    assert!(ash_path.exists());
    let mut cmd = Command::cargo_bin("ashdec")?;
    cmd.arg(&ash_path).assert().success();
    let arc_path = temp_dir.path().join("sample.ash.arc");
    match std::fs::read(arc_path) {
        Ok(v) => {
            assert_eq!(v,"what is in a name".as_bytes().to_vec());
        },
        _ => panic!("unable to read round trip output")
    }
    Ok(())
}

#[test]
fn missing_input_fails() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("no_such_file");
    let mut cmd = Command::cargo_bin("ashcomp")?;
    cmd.arg(&in_path).assert().failure();
    let mut cmd = Command::cargo_bin("ashdec")?;
    cmd.arg(&in_path).assert().failure();
    Ok(())
}

#[test]
fn bad_magic_fails() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("not_an_archive");
    std::fs::write(&in_path,"MSH0 is not ASH0".as_bytes())?;
    let mut cmd = Command::cargo_bin("ashdec")?;
    cmd.arg(&in_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("FileFormatMismatch"));
    Ok(())
}

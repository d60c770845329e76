use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn command_invalid() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("hubr")?;
    cmd.arg("foobar");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("recognized"));

    Ok(())
}

#[test]
fn command_help() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("hubr")?;
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Subcommand groups"))
        .stdout(predicate::str::contains("merge"));

    Ok(())
}

#[test]
fn command_template() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("hubr")?;
    let output = cmd.arg("template").output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert_eq!(stdout.lines().count(), 1);
    assert_eq!(
        stdout,
        "fn\tname\ttrack_type\tcolor\tsupertrack\tcomposite\toverlay\n"
    );

    let mut cmd = Command::cargo_bin("hubr")?;
    let output = cmd.arg("template").arg("--csv").output()?;
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.starts_with("fn,name,track_type,"));

    Ok(())
}

#[test]
fn command_design_table() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("hubr")?;
    let output = cmd
        .arg("design")
        .arg("-d")
        .arg("tests/hubr/design.tsv")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert_eq!(stdout.lines().count(), 4);
    assert!(stdout.starts_with("id\tfn\tkind\tformat\tassay\tsamplename\tname\n"));
    assert!(stdout.contains("K562_ATAC\tK562_ATAC.bw\tsignal\tbigWig\tATAC\tK562\tK562_ATAC\n"));
    assert!(stdout.contains("HeLa_CTCF\tHeLa_CTCF.bw\tsignal\tbigWig\tChIP\tHeLa"));

    Ok(())
}

#[test]
fn command_design_csv() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("hubr")?;
    let output = cmd
        .arg("design")
        .arg("-d")
        .arg("tests/hubr/chip.csv")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert_eq!(stdout.lines().count(), 6);
    // the empty antibody of ATAC rows stays empty
    assert!(stdout.contains("S1_ATAC\tS1_ATAC.bw\tsignal\tbigWig\tATAC\tS1\t\tS1_ATAC\n"));

    Ok(())
}

#[test]
fn command_design_extractors() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("hubr")?;
    let output = cmd
        .arg("design")
        .arg("data/S1_CTCF.bw")
        .arg("data/S2_H3K27ac.bigBed")
        .arg("--pattern")
        .arg(r"(?P<sample>[^_]+)_(?P<mark>[^.]+)")
        .arg("--static")
        .arg("batch=b1")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert_eq!(stdout.lines().count(), 3);
    assert!(stdout.contains("\tbatch\t"));
    assert!(stdout.contains("S1_CTCF\tdata/S1_CTCF.bw\tsignal\tbigWig\t"));
    assert!(stdout.contains("\tS2\tH3K27ac\t"));
    assert!(stdout.contains("\tregion\tbigBed\t"));

    Ok(())
}

#[test]
fn command_design_seqnado() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("hubr")?;
    let output = cmd
        .arg("design")
        .arg("seqnado_output/RNA/bigwigs/STAR/CPM/sample1_plus.bigWig")
        .arg("seqnado_output/RNA/bigwigs/STAR/CPM/sample1_minus.bigWig")
        .arg("--seqnado")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    let header = stdout.lines().next().unwrap();
    assert!(header.contains("assay"));
    assert!(header.contains("samplename"));
    assert!(header.contains("strand"));
    assert!(stdout.contains("\tplus"));
    assert!(stdout.contains("\tminus"));

    Ok(())
}

#[test]
fn command_design_errors() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("hubr")?;
    cmd.arg("design")
        .arg("a.bw")
        .arg("--pattern")
        .arg("(?P<x");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid pattern"));

    let mut cmd = Command::cargo_bin("hubr")?;
    cmd.arg("design").arg("-d").arg("tests/hubr/no_fn.tsv");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("no `fn` column"));

    let mut cmd = Command::cargo_bin("hubr")?;
    cmd.arg("design")
        .arg("-d")
        .arg("tests/hubr/no_fn.tsv")
        .arg("--fn-column")
        .arg("file");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("a\ta.bw\tsignal\tbigWig\tATAC"));

    let mut cmd = Command::cargo_bin("hubr")?;
    cmd.arg("design").arg("a/x.bw").arg("b/x.bw");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Duplicate name `x`"));

    let mut cmd = Command::cargo_bin("hubr")?;
    cmd.arg("design");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No tracks"));

    Ok(())
}

#[test]
fn command_tree() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("hubr")?;
    let output = cmd
        .arg("tree")
        .arg("-d")
        .arg("tests/hubr/chip.csv")
        .arg("-S")
        .arg("assay")
        .arg("-G")
        .arg("samplename,antibody")
        .arg("-c")
        .arg("samplename")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    // root, 2 supertracks, 1 composite, 5 tracks
    assert_eq!(stdout.lines().count(), 9);
    assert!(stdout.starts_with("root\n  supertrack ChIP\n"));
    assert!(stdout.contains(
        "    composite ChIP_bigWig (matrix 3 cells) dimX=samplename[S1,S2] dimY=antibody[H3K4me3,H3K27ac]\n"
    ));
    assert!(stdout.contains("      track S1_H3K4me3 [S1_H3K4me3.bw] 31,119,180\n"));
    assert!(stdout.contains("      track S2_H3K4me3 [S2_H3K4me3.bw] 174,199,232\n"));

    // ATAC rows lack an antibody and stay plain tracks
    assert!(stdout.contains("  supertrack ATAC\n"));
    assert!(stdout.contains("    track S1_ATAC [S1_ATAC.bw] 31,119,180\n"));
    assert!(stdout.contains("    track S2_ATAC [S2_ATAC.bw] 174,199,232\n"));

    Ok(())
}

#[test]
fn command_tree_flat() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("hubr")?;
    let output = cmd
        .arg("tree")
        .arg("-d")
        .arg("tests/hubr/design.tsv")
        .arg("--default-color")
        .arg("#ff0000")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert_eq!(stdout.lines().count(), 4);
    assert!(stdout.contains("  track K562_ATAC [K562_ATAC.bw] 255,0,0\n"));

    Ok(())
}

#[test]
fn command_tree_overlay() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("hubr")?;
    let output = cmd
        .arg("tree")
        .arg("seqnado_output/RNA/bigwigs/STAR/CPM/sample1_plus.bigWig")
        .arg("seqnado_output/RNA/bigwigs/STAR/CPM/sample1_minus.bigWig")
        .arg("seqnado_output/RNA/bigwigs/STAR/CPM/sample2_plus.bigWig")
        .arg("--seqnado")
        .arg("--overlay-by")
        .arg("strand")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert!(stdout.contains("(by strand)"));
    assert_eq!(stdout.matches("  overlay ").count(), 1);
    assert!(stdout.contains("    track sample1_plus "));
    assert!(stdout.contains("    track sample1_minus "));
    // no partner, stays at the top
    assert!(stdout.contains("\n  track sample2_plus "));

    Ok(())
}

#[test]
fn command_tree_overlays_in_composite() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("hubr")?;
    let output = cmd
        .arg("tree")
        .arg("-d")
        .arg("tests/hubr/overlay.csv")
        .arg("-G")
        .arg("sample")
        .arg("--overlay-by")
        .arg("rep")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    // root, 1 composite, 2 overlays, 4 tracks
    assert_eq!(stdout.lines().count(), 8);
    assert!(stdout.contains("    overlay bigWig_S1_overlay (by rep)\n"));
    assert!(stdout.contains("    overlay bigWig_S2_overlay (by rep)\n"));
    // a color column beats the default
    assert!(stdout.contains("      track x1 [x1.bw] 255,0,0\n"));
    assert!(stdout.contains("      track x2 [x2.bw] 0,0,0\n"));

    Ok(())
}

#[test]
fn command_tree_by_file_column() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("hubr")?;
    cmd.arg("tree")
        .arg("-d")
        .arg("tests/hubr/design.tsv")
        .arg("-S")
        .arg("fn");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("`fn` is the track file"));

    Ok(())
}

#[test]
fn command_tree_unknown_column() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("hubr")?;
    cmd.arg("tree")
        .arg("-d")
        .arg("tests/hubr/design.tsv")
        .arg("-S")
        .arg("condition");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("`condition`"));

    Ok(())
}

mod logger;

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use tinsel_core::{CompileOptions, PassSchedule, Precision, compile_with};
use walkdir::WalkDir;

const SOURCE_EXTENSION: &str = "tsl";

/// Compile Tinsel shader programs into GLSL pass schedules.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Source file or directory of .tsl files (reads stdin when omitted)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file, or output directory when the input is a directory
    #[arg(short, long)]
    output: PathBuf,

    #[arg(long, value_enum, default_value_t = Emit::Json, help = "Output format")]
    emit: Emit,

    #[arg(
        long,
        value_enum,
        default_value_t = PrecisionArg::Highp,
        help = "Default float/int precision of the generated shaders"
    )]
    precision: PrecisionArg,

    /// Increase log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// The pass schedule as JSON
    Json,
    /// Every generated shader, one after another
    Glsl,
}

impl Emit {
    fn extension(self) -> &'static str {
        match self {
            Emit::Json => "json",
            Emit::Glsl => "glsl",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum PrecisionArg {
    Lowp,
    Mediump,
    Highp,
}

impl From<PrecisionArg> for Precision {
    fn from(arg: PrecisionArg) -> Self {
        match arg {
            PrecisionArg::Lowp => Precision::Low,
            PrecisionArg::Mediump => Precision::Medium,
            PrecisionArg::Highp => Precision::High,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose).context("failed to install logger")?;
    execute(cli)
}

fn execute(cli: Cli) -> Result<()> {
    let options = CompileOptions {
        precision: cli.precision.into(),
    };

    match &cli.input {
        Some(path) if path.is_dir() => compile_tree(path, &cli.output, cli.emit, &options),
        Some(path) => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("failed to read input file {}", path.display()))?;
            compile_one(&source, &cli.output, cli.emit, &options)
                .with_context(|| format!("failed to compile {}", path.display()))
        }
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            compile_one(&buffer, &cli.output, cli.emit, &options)
                .context("failed to compile standard input")
        }
    }
}

fn compile_one(source: &str, output: &Path, emit: Emit, options: &CompileOptions) -> Result<()> {
    let schedule = compile_with(source, options)?;
    log::info!("compiled {} passes", schedule.leaves().len());
    write_output(output, render(&schedule, emit)?.as_bytes())
}

/// Compile every `.tsl` file below `root`, mirroring the layout under
/// `output`. Failures are reported per file and the run fails at the end.
fn compile_tree(root: &Path, output: &Path, emit: Emit, options: &CompileOptions) -> Result<()> {
    let mut total = 0usize;
    let mut failed = 0usize;
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|ext| ext.to_str()) != Some(SOURCE_EXTENSION)
        {
            continue;
        }
        total += 1;
        let relative = path.strip_prefix(root).unwrap_or(path);
        let target = output.join(relative).with_extension(emit.extension());
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read input file {}", path.display()))?;
        if let Err(err) = compile_one(&source, &target, emit, options) {
            failed += 1;
            eprintln!("{}: {err:#}", path.display());
        } else {
            log::debug!("{} -> {}", path.display(), target.display());
        }
    }
    if total == 0 {
        log::warn!("no .{SOURCE_EXTENSION} files found under {}", root.display());
    }
    if failed > 0 {
        bail!("{failed} of {total} files failed to compile");
    }
    Ok(())
}

fn render(schedule: &PassSchedule, emit: Emit) -> Result<String> {
    match emit {
        Emit::Json => {
            serde_json::to_string_pretty(schedule).context("failed to serialize pass schedule")
        }
        Emit::Glsl => {
            let mut text = String::new();
            for (index, leaf) in schedule.leaves().into_iter().enumerate() {
                if index > 0 {
                    text.push('\n');
                }
                text.push_str(&format!(
                    "// pass {index}: texture {} -> texture {}\n",
                    leaf.in_num, leaf.out_num
                ));
                text.push_str(&leaf.source);
            }
            Ok(text)
        }
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    fs::write(path, bytes)
        .with_context(|| format!("failed to write output file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_cmd::Command;
    use predicates::prelude::*;
    use tempfile::tempdir;

    const BLOOM: &str = include_str!("../../demos/bloom.tsl");

    #[test]
    fn writes_json_schedule() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("bloom.tsl");
        fs::write(&input_path, BLOOM).expect("write input");
        let output_path = dir.path().join("out").join("bloom.json");

        Command::cargo_bin("tinsel")
            .expect("binary exists")
            .arg("--input")
            .arg(&input_path)
            .arg("--output")
            .arg(&output_path)
            .assert()
            .success();

        let json = fs::read_to_string(&output_path).expect("read json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(value["loopNum"], 1);
        assert_eq!(value["children"].as_array().expect("children").len(), 3);
        assert!(json.contains("\"outNum\""));
    }

    #[test]
    fn emits_glsl_with_precision() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("input.tsl");
        fs::write(&input_path, "{ frag\n refresh\n frag * 0.5 } -> 1").expect("write input");
        let output_path = dir.path().join("out.glsl");

        Command::cargo_bin("tinsel")
            .expect("binary exists")
            .arg("--input")
            .arg(&input_path)
            .arg("--output")
            .arg(&output_path)
            .arg("--emit")
            .arg("glsl")
            .arg("--precision")
            .arg("mediump")
            .assert()
            .success();

        let glsl = fs::read_to_string(&output_path).expect("read glsl");
        assert!(glsl.starts_with("// pass 0: texture 0 -> texture 1\n#version 300 es"));
        assert!(glsl.contains("// pass 1: texture 0 -> texture 1"));
        assert_eq!(glsl.matches("void main()").count(), 2);
        assert!(glsl.contains("precision mediump float;"));
    }

    #[test]
    fn reads_standard_input() {
        let dir = tempdir().expect("tempdir");
        let output_path = dir.path().join("stdin.json");

        Command::cargo_bin("tinsel")
            .expect("binary exists")
            .arg("--output")
            .arg(&output_path)
            .write_stdin("{ frag }")
            .assert()
            .success();

        assert!(output_path.exists(), "json output was not created");
    }

    #[test]
    fn reports_every_diagnostic() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("broken.tsl");
        fs::write(&input_path, "{ a := nope\n vec4(alsonope) }").expect("write input");
        let output_path = dir.path().join("out.json");

        Command::cargo_bin("tinsel")
            .expect("binary exists")
            .arg("--input")
            .arg(&input_path)
            .arg("--output")
            .arg(&output_path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("2 errors"))
            .stderr(predicate::str::contains("line 1, column 8"))
            .stderr(predicate::str::contains("'alsonope'"));

        assert!(!output_path.exists(), "no output on failure");
    }

    #[test]
    fn compiles_a_directory_tree() {
        let dir = tempdir().expect("tempdir");
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("nested")).expect("create dirs");
        fs::write(src.join("a.tsl"), "{ frag }").expect("write a");
        fs::write(src.join("nested").join("b.tsl"), "loop 2 { frag1 } -> 1").expect("write b");
        fs::write(src.join("notes.txt"), "not a shader").expect("write notes");
        let out = dir.path().join("out");

        Command::cargo_bin("tinsel")
            .expect("binary exists")
            .arg("--input")
            .arg(&src)
            .arg("--output")
            .arg(&out)
            .arg("--emit")
            .arg("glsl")
            .assert()
            .success();

        assert!(out.join("a.glsl").exists());
        assert!(out.join("nested").join("b.glsl").exists());
        assert!(!out.join("notes.glsl").exists());
    }

    #[test]
    fn directory_failures_name_the_file() {
        let dir = tempdir().expect("tempdir");
        let src = dir.path().join("src");
        fs::create_dir_all(&src).expect("create dir");
        fs::write(src.join("good.tsl"), "{ frag }").expect("write good");
        fs::write(src.join("bad.tsl"), "{ 1. }").expect("write bad");

        Command::cargo_bin("tinsel")
            .expect("binary exists")
            .arg("--input")
            .arg(&src)
            .arg("--output")
            .arg(dir.path().join("out"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("bad.tsl"))
            .stderr(predicate::str::contains("1 of 2 files failed"));

        assert!(dir.path().join("out").join("good.json").exists());
    }

    #[test]
    fn rejects_unknown_precision() {
        Command::cargo_bin("tinsel")
            .expect("binary exists")
            .arg("--output")
            .arg("unused.json")
            .arg("--precision")
            .arg("ultra")
            .assert()
            .failure()
            .stderr(predicate::str::contains("ultra"));
    }

    #[test]
    fn precision_arguments_map_to_core() {
        assert_eq!(Precision::from(PrecisionArg::Lowp), Precision::Low);
        assert_eq!(Precision::from(PrecisionArg::Highp), Precision::High);
        assert_eq!(Emit::Glsl.extension(), "glsl");
    }
}

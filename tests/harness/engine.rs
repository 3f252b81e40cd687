//! Stand-in correlation engines: `sh` scripts that honour the engine's
//! command line.

use std::fs;
use std::path::{Path, PathBuf};

use omicorr::application::correlation::EngineConfig;

pub const RESULT_HEADER: &str = "gene\tgem\tcorrelation\tp_value\tadjusted_p_value\n";

/// A script in `dir` plus the engine configuration that runs it.
pub struct FakeEngine {
    pub script: PathBuf,
    pub config: EngineConfig,
}

fn install(dir: &Path, name: &str, body: &str) -> FakeEngine {
    let script = dir.join(format!("{name}.sh"));
    fs::write(&script, body).expect("write engine script");
    let config = EngineConfig {
        program: "sh".into(),
        args: vec![script.display().to_string()],
        poll_interval_ms: 10,
        ..EngineConfig::default()
    };
    FakeEngine { script, config }
}

const PARSE_ARGS: &str = r#"
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift 2 ;;
    --summary) summary="$2"; shift 2 ;;
    --all-vs-all|--cpg) shift ;;
    *) shift 2 ;;
  esac
done
"#;

/// Writes `rows` (without header) and a summary with the given counters.
pub fn succeeding(dir: &Path, rows: &str, total: u64, evaluated: u64) -> FakeEngine {
    let fixture = dir.join("engine-rows.tsv");
    fs::write(&fixture, format!("{RESULT_HEADER}{rows}")).expect("write engine fixture");
    let body = format!(
        "{PARSE_ARGS}\ncp '{}' \"$out\"\nprintf '{{\"total_row_count\": {total}, \"evaluated_row_count\": {evaluated}}}' > \"$summary\"\n",
        fixture.display()
    );
    install(dir, "succeeding", &body)
}

/// Records its arguments into `args.txt` next to the script, then succeeds
/// with no rows.
pub fn recording(dir: &Path) -> FakeEngine {
    let record = dir.join("args.txt");
    let body = format!(
        "echo \"$@\" > '{}'\n{PARSE_ARGS}\nprintf '{RESULT_HEADER}' > \"$out\"\nprintf '{{\"total_row_count\": 0, \"evaluated_row_count\": 0}}' > \"$summary\"\n",
        record.display()
    );
    install(dir, "recording", &body)
}

/// Runs until killed.
pub fn sleeping(dir: &Path) -> FakeEngine {
    install(dir, "sleeping", "exec sleep 30\n")
}

/// Exits non-zero with a message on stderr.
pub fn failing(dir: &Path) -> FakeEngine {
    install(dir, "failing", "echo 'matrix is singular' >&2\nexit 3\n")
}

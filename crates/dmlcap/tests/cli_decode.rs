#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use dmlcap_dml::Envelope;
use dmlcap_frame::{FrameWriter, KEEP_ALIVE};

const GAME: &str = r#"{
    "service_id": 5,
    "name": "GAME",
    "messages": [
        { "order": 1, "name": "MSG_CHAT", "fields": [ { "name": "text", "type": "STR" } ] },
        { "order": 2, "name": "MSG_POSITION", "fields": [ { "name": "x", "type": "INT" } ] }
    ]
}"#;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/dmlcap-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn position(x: i32) -> Vec<u8> {
    Envelope::new(5, 2, x.to_le_bytes().to_vec()).to_bytes().to_vec()
}

/// Two positions around a keep-alive.
fn sample_capture() -> Vec<u8> {
    let mut writer = FrameWriter::new(Vec::new());
    writer.send_data(&position(1)).unwrap();
    writer.send_control(KEEP_ALIVE, &[]).unwrap();
    writer.send_data(&position(2)).unwrap();
    writer.into_inner()
}

struct Fixture {
    dir: PathBuf,
    services: PathBuf,
}

impl Fixture {
    fn new(tag: &str) -> Self {
        let dir = unique_temp_dir(tag);
        let services = dir.join("services");
        std::fs::create_dir_all(&services).expect("services dir should be creatable");
        std::fs::write(services.join("game.service.json"), GAME).expect("definition write");
        Self { dir, services }
    }

    fn capture(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.join(name);
        std::fs::write(&path, bytes).expect("capture write");
        path
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

fn dmlcap(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dmlcap"))
        .env_remove("DMLCAP_SERVICES")
        .args(args)
        .output()
        .expect("dmlcap should run")
}

fn path(p: &Path) -> &str {
    p.to_str().expect("temp paths are utf-8")
}

#[test]
fn decode_prints_one_object_per_message() {
    let fx = Fixture::new("decode");
    let capture = fx.capture("sample.bin", &sample_capture());

    let output = dmlcap(&[
        "decode",
        path(&capture),
        "--services",
        path(&fx.services),
        "--compact",
    ]);

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout,
        "{\"name\":\"MSG_POSITION\",\"message\":{\"x\":1}}\n\
         {\"name\":\"MSG_POSITION\",\"message\":{\"x\":2}}\n"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("decoded 2 messages"), "{stderr}");
}

#[test]
fn pretty_output_is_the_default() {
    let fx = Fixture::new("pretty");
    let capture = fx.capture("sample.bin", &sample_capture());

    let output = dmlcap(&["decode", path(&capture), "--services", path(&fx.services)]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("{\n  \"name\": \"MSG_POSITION\""));
    let values: Vec<serde_json::Value> = serde_json::Deserializer::from_str(&stdout)
        .into_iter()
        .collect::<Result<_, _>>()
        .expect("stdout should be a stream of JSON objects");
    assert_eq!(values.len(), 2);
    assert_eq!(values[1]["message"]["x"], 2);
}

#[test]
fn pipelined_output_matches_sequential() {
    let fx = Fixture::new("pipelined");
    let mut writer = FrameWriter::new(Vec::new());
    for x in 0..300 {
        if x % 10 == 0 {
            writer.send_control(KEEP_ALIVE, &[]).unwrap();
        }
        writer.send_data(&position(x)).unwrap();
    }
    let capture = fx.capture("long.bin", &writer.into_inner());

    let sequential = dmlcap(&["decode", path(&capture), "--services", path(&fx.services)]);
    let pipelined = dmlcap(&[
        "decode",
        path(&capture),
        "--services",
        path(&fx.services),
        "--pipelined",
        "--queue-capacity",
        "2",
    ]);

    assert!(sequential.status.success());
    assert!(pipelined.status.success());
    assert_eq!(sequential.stdout, pipelined.stdout);
}

#[test]
fn output_file_receives_messages() {
    let fx = Fixture::new("outfile");
    let capture = fx.capture("sample.bin", &sample_capture());
    let out = fx.dir.join("messages.json");

    let output = dmlcap(&[
        "decode",
        path(&capture),
        "--services",
        path(&fx.services),
        "-o",
        path(&out),
        "--compact",
    ]);

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let written = std::fs::read_to_string(&out).expect("output file should exist");
    assert_eq!(written.lines().count(), 2);
}

#[test]
fn missing_input_is_a_usage_error() {
    let fx = Fixture::new("missing");

    let output = dmlcap(&[
        "decode",
        path(&fx.dir.join("nope.bin")),
        "--services",
        path(&fx.services),
    ]);

    assert_eq!(output.status.code(), Some(64));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("cannot open capture"));
}

#[test]
fn unknown_message_fails_unless_skipped() {
    let fx = Fixture::new("unknown");
    let mut writer = FrameWriter::new(Vec::new());
    writer.send_data(&position(1)).unwrap();
    writer
        .send_data(&Envelope::new(9, 1, vec![0u8; 4]).to_bytes())
        .unwrap();
    writer.send_data(&position(3)).unwrap();
    let capture = fx.capture("unknown.bin", &writer.into_inner());

    let strict = dmlcap(&[
        "decode",
        path(&capture),
        "--services",
        path(&fx.services),
        "--compact",
    ]);
    assert_eq!(strict.status.code(), Some(60));
    assert_eq!(String::from_utf8_lossy(&strict.stdout).lines().count(), 1);
    assert!(String::from_utf8_lossy(&strict.stderr).contains("unknown message (service 9, order 1)"));

    let lenient = dmlcap(&[
        "decode",
        path(&capture),
        "--services",
        path(&fx.services),
        "--compact",
        "--on-unknown",
        "skip",
    ]);
    assert!(lenient.status.success());
    assert_eq!(String::from_utf8_lossy(&lenient.stdout).lines().count(), 2);
}

#[test]
fn truncated_capture_fails_unless_truncation_allowed() {
    let fx = Fixture::new("truncated");
    let mut bytes = sample_capture();
    bytes.extend_from_slice(&[0x0D, 0xF0, 0x20, 0x00, 0x00]);
    let capture = fx.capture("cut.bin", &bytes);

    let strict = dmlcap(&[
        "decode",
        path(&capture),
        "--services",
        path(&fx.services),
        "--compact",
    ]);
    assert_eq!(strict.status.code(), Some(60));
    assert_eq!(String::from_utf8_lossy(&strict.stdout).lines().count(), 2);

    let lenient = dmlcap(&[
        "decode",
        path(&capture),
        "--services",
        path(&fx.services),
        "--compact",
        "--on-read-error",
        "truncate",
    ]);
    assert!(lenient.status.success());
    assert_eq!(String::from_utf8_lossy(&lenient.stdout).lines().count(), 2);
}

#[test]
fn services_lists_dispatch_entries() {
    let fx = Fixture::new("services");

    let output = dmlcap(&["--format", "json", "services", "--services", path(&fx.services)]);

    assert!(output.status.success());
    let rows: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("services output should be JSON");
    assert_eq!(rows.as_array().map(Vec::len), Some(2));
    assert_eq!(rows[0]["name"], "MSG_CHAT");
    assert_eq!(rows[1]["order_number"], 2);
    assert_eq!(rows[1]["fields"][0], "x:INT");
}

#[test]
fn frames_lists_control_and_data() {
    let fx = Fixture::new("frames");
    let capture = fx.capture("sample.bin", &sample_capture());

    let output = dmlcap(&["--format", "json", "frames", path(&capture)]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let rows: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("one JSON object per line"))
        .collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["kind"], "DATA");
    assert_eq!(rows[0]["service_id"], 5);
    assert_eq!(rows[1]["control"], "KEEP_ALIVE");
    assert_eq!(rows[2]["index"], 3);

    let data_only = dmlcap(&["--format", "json", "frames", path(&capture), "--data-only"]);
    assert_eq!(String::from_utf8_lossy(&data_only.stdout).lines().count(), 2);
}

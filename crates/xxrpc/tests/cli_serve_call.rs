#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use xxrpc_core::Client;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/xxrpccli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn endpoint_for(sock_path: &Path) -> String {
    format!("unix:{}", sock_path.display())
}

struct ServeProcess {
    child: Child,
    endpoint: String,
    dir: PathBuf,
}

impl ServeProcess {
    fn start(tag: &str, extra: &[&str]) -> Self {
        let dir = unique_temp_dir(tag);
        let endpoint = endpoint_for(&dir.join("rpc.sock"));
        let child = Command::new(env!("CARGO_BIN_EXE_xxrpc"))
            .args(["--log-level", "error", "serve", "--listen", &endpoint])
            .args(extra)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("serve command should start");

        let server = Self {
            child,
            endpoint,
            dir,
        };
        server.wait_ready(Duration::from_secs(5));
        server
    }

    fn wait_ready(&self, timeout: Duration) {
        let start = Instant::now();
        loop {
            match Client::dial(&self.endpoint) {
                Ok(client) => {
                    let _ = client.close();
                    return;
                }
                Err(err) => {
                    assert!(
                        start.elapsed() < timeout,
                        "server did not come up in time: {err}"
                    );
                    thread::sleep(Duration::from_millis(25));
                }
            }
        }
    }

    fn call(&self, method: &str, json: &str, extra: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_xxrpc"))
            .args(["--log-level", "error", "--format", "json", "call"])
            .arg(&self.endpoint)
            .arg(method)
            .args(["--json", json])
            .args(extra)
            .output()
            .expect("call command should run")
    }
}

impl Drop for ServeProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

fn stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).expect("stdout should be one JSON document")
}

#[test]
fn call_prints_decoded_response() {
    let server = ServeProcess::start("say", &[]);

    let output = server.call("Echo.Say", "\"hi\"", &[]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    let json = stdout_json(&output);
    assert_eq!(json["method"], "Echo.Say");
    assert_eq!(json["ok"], true);
    assert_eq!(json["data"], "HI");
    assert!(json.get("error").is_none());

    let output = server.call("Echo.SayHello", r#"{"message":"cli"}"#, &[]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    assert_eq!(stdout_json(&output)["data"]["message"], "Echo:cli");
}

#[test]
fn unknown_method_exits_with_remote_error() {
    let server = ServeProcess::start("miss", &[]);

    let output = server.call("Echo.Nope", "null", &[]);
    assert_eq!(output.status.code(), Some(2), "{output:?}");
    let json = stdout_json(&output);
    assert_eq!(json["ok"], false);
    assert!(
        json["error"]
            .as_str()
            .expect("error should be a string")
            .contains("not found"),
        "{json}"
    );
}

#[test]
fn invalid_json_is_usage_error() {
    let server = ServeProcess::start("badjson", &[]);

    let output = server.call("Echo.Say", "{nope", &[]);
    assert_eq!(output.status.code(), Some(64), "{output:?}");
    assert!(String::from_utf8_lossy(&output.stderr).contains("--json is not valid JSON"));
}

#[test]
fn missing_server_is_transport_error() {
    let dir = unique_temp_dir("nosrv");
    let endpoint = endpoint_for(&dir.join("absent.sock"));

    let output = Command::new(env!("CARGO_BIN_EXE_xxrpc"))
        .args(["--log-level", "error", "call", &endpoint, "Echo.Say"])
        .output()
        .expect("call command should run");
    assert_eq!(output.status.code(), Some(3), "{output:?}");
    assert!(String::from_utf8_lossy(&output.stderr).contains("connect failed"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[cfg(feature = "msgpack")]
#[test]
fn msgpack_codec_end_to_end() {
    let server = ServeProcess::start("msgpack", &["--codec", "msgpack"]);

    let output = server.call("Echo.Say", "\"packed\"", &["--codec", "msgpack"]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    let json = stdout_json(&output);
    assert_eq!(json["codec"], "msgpack");
    assert_eq!(json["data"], "PACKED");
}

#[test]
fn sigint_shuts_server_down_and_removes_socket() {
    let mut server = ServeProcess::start("sigint", &[]);
    let sock_path = server.dir.join("rpc.sock");
    assert!(sock_path.exists());

    let status = Command::new("kill")
        .args(["-INT", &server.child.id().to_string()])
        .status()
        .expect("kill should run");
    assert!(status.success());

    let start = Instant::now();
    let exit = loop {
        if let Some(exit) = server.child.try_wait().expect("try_wait should succeed") {
            break exit;
        }
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "server should exit after SIGINT"
        );
        thread::sleep(Duration::from_millis(25));
    };

    assert_eq!(exit.code(), Some(0));
    assert!(!sock_path.exists(), "socket should be removed on shutdown");
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_xxrpc"))
        .arg("version")
        .output()
        .expect("version command should run");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("xxrpc {}", env!("CARGO_PKG_VERSION"))
    );
}

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::Path;
use std::process::Command;
use std::thread;

use mirrorboard_core::{board, Node};

pub fn mirrorboard_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mirrorboard"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

/// One canned route: path, HTTP status line, body.
pub struct Route {
    pub path: &'static str,
    pub status: &'static str,
    pub body: String,
}

impl Route {
    pub fn instances(path: &'static str, instances: &[(&str, &str)]) -> Self {
        let records: Vec<_> = instances
            .iter()
            .map(|(id, text)| serde_json::json!({ "instanceId": id, "text": text }))
            .collect();
        Self {
            path,
            status: "200 OK",
            body: serde_json::json!({ "instances": records }).to_string(),
        }
    }

    pub fn failing(path: &'static str) -> Self {
        Self {
            path,
            status: "500 Internal Server Error",
            body: "upstream unavailable".to_string(),
        }
    }
}

/// Serve `routes` on a loopback port for the rest of the test process and
/// return the base URL.
pub fn serve(routes: Vec<Route>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind directory");
    let base = format!("http://{}", listener.local_addr().expect("addr"));
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
            let mut request_line = String::new();
            if reader.read_line(&mut request_line).is_err() {
                continue;
            }
            loop {
                let mut header = String::new();
                match reader.read_line(&mut header) {
                    Ok(0) => break,
                    Ok(_) if header == "\r\n" => break,
                    Ok(_) => continue,
                    Err(_) => break,
                }
            }
            let path = request_line.split_whitespace().nth(1).unwrap_or("/");
            let (status, body) = routes
                .iter()
                .find(|r| r.path == path)
                .map(|r| (r.status, r.body.as_str()))
                .unwrap_or(("404 Not Found", "no such directory"));
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    base
}

pub fn children_of(home: &Path, parent: &str) -> Vec<Node> {
    board::load_at(home)
        .expect("load board")
        .nodes
        .into_iter()
        .filter(|n| n.is_child() && n.parent_id.as_ref().map(|p| p.0.as_str()) == Some(parent))
        .collect()
}

pub fn label_of(home: &Path, id: &str) -> String {
    board::load_at(home)
        .expect("load board")
        .nodes
        .into_iter()
        .find(|n| n.id.0 == id)
        .map(|n| n.label)
        .expect("node present")
}

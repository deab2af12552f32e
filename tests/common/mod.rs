//! Shared utilities for integration testing.
//!
//! Builds a complete configuration directory in a temp dir and runs the
//! server on an ephemeral port. The server trusts one reverse proxy, so
//! tests choose the client address with `X-Forwarded-For`.

#![allow(dead_code)]

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use simple_config_server::config::read_config;
use simple_config_server::http::HttpServer;
use simple_config_server::lifecycle::{startup, Shutdown};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const ES_TOKEN: &str = "es-token";
pub const ADMIN_TOKEN: &str = "admin-token";
pub const READER_TOKEN: &str = "reader-token";

pub const ES_IP: &str = "192.168.1.34";
pub const ADMIN_IP: &str = "10.0.0.7";

const FILES: &[(&str, &str)] = &[
    (
        "scs-configuration.yaml",
        r#"
environments:
  cache: false
templates:
  validate_on_startup: false
logs:
  audit:
    enabled: false
auth:
  networks:
    whitelist: [192.168.0.0/16, 10.0.0.0/8]
server:
  bind_address: 127.0.0.1:0
  reverse_proxy_count: 1
"#,
    ),
    (
        "scs-users.yaml",
        r#"
- id: elasticsearch
  token: es-token
  has_access:
    to_paths: ["/configs/elasticsearch/*"]
    from_networks: [192.168.1.0/24]
- id: admin
  token: !scs-secret tokens.yaml#admin
  has_access:
    to_paths: ["/configs/*"]
    from_networks: [10.0.0.0/8]
- id: reader
  token: reader-token
  has_access:
    to_paths: ["/configs/docs/read me.txt"]
    from_networks: [10.0.0.0/8]
"#,
    ),
    ("secrets/tokens.yaml", "admin: admin-token\n"),
    ("secrets/db.yaml", "password: hunter2\n"),
    ("common/nodes.yaml", "es:\n  name: es-node-1\n"),
    ("config/scs-env.yaml", "template:\n  context:\n    cluster: main\n"),
    (
        "config/elasticsearch/scs-env.yaml",
        r#"
template:
  context:
    node: !scs-common nodes.yaml#es.name
response:
  headers:
    Content-Type: text/yaml
"#,
    ),
    (
        "config/elasticsearch/elasticsearch.yml",
        "cluster.name: {{ cluster }}\nnode.name: {{ node }}\n",
    ),
    (
        "config/app/db.conf.scs-env.yaml",
        r#"
template:
  context:
    db:
      user: app
      password: !scs-secret db.yaml#password
"#,
    ),
    ("config/app/db.conf", "user={{ db.user }}\npassword={{ db.password }}\n"),
    (
        "config/app/hook.json.scs-env.yaml",
        r#"
request:
  methods: [POST]
  schema:
    type: object
    properties:
      name: {type: string}
    required: [name]
response:
  status: 201
"#,
    ),
    ("config/app/hook.json", "{\"hello\": \"{{ name }}\", \"cluster\": \"{{ cluster }}\"}\n"),
    ("config/static/raw.txt.scs-env.yaml", "template:\n  enabled: false\n"),
    ("config/static/raw.txt", "{{ not rendered }}\n"),
    ("config/docs/read me.txt", "docs for {{ cluster }}\n"),
    ("config/broken/syntax/scs-env.yaml", "template: [\n"),
    ("config/broken/syntax/file.txt", "x\n"),
    ("config/broken/format/scs-env.yaml", "unknown_section: 1\n"),
    ("config/broken/format/file.txt", "x\n"),
    (
        "config/broken/reference/scs-env.yaml",
        "template:\n  context:\n    a: !scs-common missing.yaml\n",
    ),
    ("config/broken/reference/file.txt", "x\n"),
    ("config/broken/template.txt", "{% if %}\n"),
];

/// Writes the standard configuration tree below `root`.
pub fn write_tree(root: &Path) {
    for (name, content) in FILES {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

/// A running server and the directory it serves from.
pub struct TestServer {
    pub addr: SocketAddr,
    pub dir: TempDir,
    pub client: reqwest::Client,
    shutdown: Shutdown,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Starts a server after `customize` had a chance to change the tree.
    pub async fn start_with(customize: impl FnOnce(&Path)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());
        customize(dir.path());

        let config = read_config(dir.path()).unwrap();
        let ctx = Arc::new(startup::prepare(config).unwrap());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let server_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = HttpServer::new(ctx).run(listener, server_shutdown).await;
        });

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        Self {
            addr,
            dir,
            client,
            shutdown,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str, token: Option<&str>, ip: &str) -> reqwest::Response {
        self.request(reqwest::Method::GET, path, token, ip, None).await
    }

    pub async fn post(&self, path: &str, token: &str, ip: &str, body: &str) -> reqwest::Response {
        self.request(reqwest::Method::POST, path, Some(token), ip, Some(body.to_string()))
            .await
    }

    pub async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        ip: &str,
        body: Option<String>,
    ) -> reqwest::Response {
        let mut request = self
            .client
            .request(method, self.url(path))
            .header("X-Forwarded-For", ip);
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        if let Some(body) = body {
            request = request.header("Content-Type", "application/json").body(body);
        }
        request.send().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Reads the error id of a JSON error response.
pub async fn error_id(response: reqwest::Response) -> String {
    let body: serde_json::Value = response.json().await.unwrap();
    body["error"]["id"].as_str().unwrap_or_default().to_string()
}

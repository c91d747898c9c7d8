// Test helpers for isolated testing
// Provides throwaway workspaces and a local stand-in for the Repology API,
// so nothing here touches the network or the real cache files.
#![allow(dead_code)]

use pkgmap::config::{Paths, Settings};
use pkgmap::error::{MapError, Result};
use pkgmap::homebrew::{BrewPackage, HomebrewLookup};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Isolated workspace holding every file pkgmap reads or writes
/// Automatically cleaned up when dropped
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub root: PathBuf,
    pub paths: Paths,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().to_path_buf();
        let paths = Paths {
            cache: root.join(".repology_cache.json"),
            name_mappings: root.join("package_name_mappings.json"),
            universe: root.join("package_mappings.toml"),
            overrides: root.join("packages").join("custom_install.json"),
            package_lists: Vec::new(),
        };

        Self {
            temp_dir,
            root,
            paths,
        }
    }

    /// Write a universe with one empty section per name.
    pub fn write_universe(&self, names: &[&str]) {
        let content: String = names
            .iter()
            .map(|name| format!("[{}]\n\n", toml_key(name)))
            .collect();
        std::fs::write(&self.paths.universe, content).unwrap();
    }

    pub fn write_name_mappings(&self, pairs: &[(&str, &str)]) {
        let map: serde_json::Map<String, serde_json::Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        let json = serde_json::json!({ "homebrew_to_repology": map });
        std::fs::write(&self.paths.name_mappings, json.to_string()).unwrap();
    }

    pub fn write_overrides(&self, json: &str) {
        std::fs::create_dir_all(self.paths.overrides.parent().unwrap()).unwrap();
        std::fs::write(&self.paths.overrides, json).unwrap();
    }

    pub fn write_cache(&self, json: &str) {
        std::fs::write(&self.paths.cache, json).unwrap();
    }

    /// Add a package list file and register it in `paths`.
    pub fn add_package_list(&mut self, file_name: &str, content: &str) -> PathBuf {
        let path = self.root.join(file_name);
        std::fs::write(&path, content).unwrap();
        self.paths.package_lists.push(path.clone());
        path
    }

    pub fn read_cache_json(&self) -> serde_json::Value {
        let content = std::fs::read_to_string(&self.paths.cache).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    /// Settings pointing at `repology_url` with no rate-limit delay.
    pub fn settings(&self, repology_url: &str) -> Settings {
        Settings {
            repology_url: repology_url.to_string(),
            rate_limit_delay: Duration::ZERO,
            request_timeout: Duration::from_secs(5),
            ..Settings::default()
        }
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

fn toml_key(name: &str) -> String {
    if name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        name.to_string()
    } else {
        format!("\"{}\"", name)
    }
}

type Routes = Arc<Mutex<HashMap<String, (u16, String)>>>;

/// Minimal HTTP server answering `/api/v1/project/<name>` requests.
///
/// Unknown projects get a 404. Every requested project name is recorded.
pub struct MockRepology {
    pub url: String,
    routes: Routes,
    hits: Arc<Mutex<Vec<String>>>,
}

const PROJECT_PREFIX: &str = "/api/v1/project/";

impl MockRepology {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let routes: Routes = Arc::new(Mutex::new(HashMap::new()));
        let hits = Arc::new(Mutex::new(Vec::new()));

        let server_routes = routes.clone();
        let server_hits = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let routes = server_routes.clone();
                let hits = server_hits.clone();
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }

                    let request = String::from_utf8_lossy(&request);
                    let path = request
                        .lines()
                        .next()
                        .and_then(|line| line.split_whitespace().nth(1))
                        .unwrap_or("/")
                        .to_string();
                    let project = path.strip_prefix(PROJECT_PREFIX).unwrap_or(&path).to_string();
                    hits.lock().unwrap().push(project.clone());

                    let (status, body) = routes
                        .lock()
                        .unwrap()
                        .get(&project)
                        .cloned()
                        .unwrap_or((404, "[]".to_string()));
                    let response = format!(
                        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        reason(status),
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { url, routes, hits }
    }

    /// Answer requests for `project` with `status` and `body`.
    pub fn respond(&self, project: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(project.to_string(), (status, body.to_string()));
    }

    /// Answer `project` with a 200 and the given repository entries.
    pub fn found(&self, project: &str, entries: serde_json::Value) {
        self.respond(project, 200, &entries.to_string());
    }

    /// Project names requested so far, in order.
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    pub fn hit_count(&self, project: &str) -> usize {
        self.hits().iter().filter(|p| *p == project).count()
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// A typical formula with distro packages everywhere.
pub fn distro_entries(name: &str, summary: &str) -> serde_json::Value {
    serde_json::json!([
        { "repo": "arch", "binname": name, "summary": summary },
        { "repo": "debian_12", "binname": name },
        { "repo": "ubuntu_24_04", "binname": name },
        { "repo": "fedora_40", "binname": name },
        { "repo": "homebrew", "srcname": name },
    ])
}

/// In-memory [`HomebrewLookup`].
#[derive(Default)]
pub struct FakeBrew {
    pub installed: bool,
    pub packages: HashMap<String, BrewPackage>,
    pub failing: HashSet<String>,
    pub lookups: Mutex<Vec<String>>,
}

impl FakeBrew {
    pub fn installed() -> Self {
        Self {
            installed: true,
            ..Default::default()
        }
    }

    pub fn with_package(mut self, name: &str, package: BrewPackage) -> Self {
        self.packages.insert(name.to_string(), package);
        self
    }

    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }
}

impl HomebrewLookup for FakeBrew {
    fn available(&self) -> bool {
        self.installed
    }

    fn lookup(&self, name: &str) -> Result<Option<BrewPackage>> {
        self.lookups.lock().unwrap().push(name.to_string());
        if self.failing.contains(name) {
            return Err(MapError::Homebrew {
                package: name.to_string(),
                reason: "brew exploded".to_string(),
            });
        }
        Ok(self.packages.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_paths_are_isolated() {
        let env1 = TestEnvironment::new();
        let env2 = TestEnvironment::new();

        assert_ne!(env1.paths.cache, env2.paths.cache);
        assert!(env1.paths.cache.starts_with(&env1.root));
        assert!(!env1.paths.cache.exists());
    }

    #[test]
    fn test_environment_cleanup() {
        let root = {
            let env = TestEnvironment::new();
            env.write_universe(&["bat"]);
            env.root.clone()
        };

        assert!(!root.exists());
    }

    #[test]
    fn test_universe_writer_quotes_names() {
        let env = TestEnvironment::new();
        env.write_universe(&["bat", "python@3.12"]);
        let names = pkgmap::universe::load_universe(&env.paths.universe).unwrap();
        assert_eq!(names, vec!["bat", "python@3.12"]);
    }

    #[tokio::test]
    async fn test_mock_server_routes() {
        let server = MockRepology::start().await;
        server.respond("bat", 200, "[]");

        let ok = reqwest::get(format!("{}/api/v1/project/bat", server.url))
            .await
            .unwrap();
        assert_eq!(ok.status().as_u16(), 200);

        let missing = reqwest::get(format!("{}/api/v1/project/nope", server.url))
            .await
            .unwrap();
        assert_eq!(missing.status().as_u16(), 404);

        assert_eq!(server.hits(), vec!["bat", "nope"]);
    }
}

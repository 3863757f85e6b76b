//! Mock trust client binary for integration testing
//!
//! Implements the subset of the trust client's command line the harness
//! uses (`init`, `add`, `publish`, `list`, `verify`, `key list`,
//! `key rotate`) on top of a plain directory standing in for the server.
//! The server directory comes from `-s file://<dir>` or, in local mode,
//! from the `storage` field of the JSON file given with `-c`.
//!
//! If the server directory holds a `login.json`, commands that talk to the
//! server read a username and a password line from stdin first.
//!
//! A `stale_suffix` file in the server directory simulates a stale mirror:
//! clients whose trust directory name ends with its content see an empty
//! target listing.
//!
//! `debug ...` subcommands expose process plumbing (stdin, environment,
//! exit codes, large output) for the runner's own tests.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::io::{BufRead, Read, Write};
use std::path::{Path, PathBuf};

type CmdResult = Result<(), String>;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(message) = run(args) {
        eprintln!("* fatal: {}", message);
        std::process::exit(1);
    }
}

/// Global flags preceding the subcommand
#[derive(Default)]
struct Globals {
    server: Option<String>,
    local: bool,
    config: Option<PathBuf>,
    trust_dir: Option<PathBuf>,
}

fn run(args: Vec<String>) -> CmdResult {
    let mut globals = Globals::default();
    let mut rest = args.into_iter();
    let mut command = Vec::new();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "-s" => globals.server = rest.next(),
            "-D" => globals.local = true,
            "-c" => globals.config = rest.next().map(PathBuf::from),
            "-d" => globals.trust_dir = rest.next().map(PathBuf::from),
            _ => {
                command.push(arg);
                command.extend(rest.by_ref());
            }
        }
    }

    let words: Vec<&str> = command.iter().map(String::as_str).collect();
    if let ["debug", rest @ ..] = words.as_slice() {
        return debug(rest, &globals);
    }

    let trust_dir = globals
        .trust_dir
        .clone()
        .ok_or("missing -d <trust dir>")?;
    let server = Server::open(&globals)?;
    let mut input = std::io::stdin().lock();

    match words.as_slice() {
        ["init", repo] => {
            server.login(&mut input)?;
            init(&server, &trust_dir, repo)
        }
        ["add", repo, name, file] => add(&trust_dir, repo, name, Path::new(file)),
        ["publish", repo] => {
            server.login(&mut input)?;
            publish(&server, &trust_dir, repo)
        }
        ["list", repo] => {
            server.login(&mut input)?;
            list(&server, &trust_dir, repo)
        }
        ["verify", repo, name, "-i", file, "-q"] => verify(&server, repo, name, Path::new(file)),
        ["key", "list"] => key_list(&trust_dir),
        ["key", "rotate", repo, role, flags @ ..] => {
            if *role == "root" {
                let answer = read_line(&mut input)?;
                if answer.trim() != "yes" {
                    return Err("root key rotation not confirmed".to_string());
                }
            }
            server.login(&mut input)?;
            let server_managed = flags.contains(&"-r");
            rotate(&server, &trust_dir, repo, role, server_managed)
        }
        other => Err(format!("unknown command: {:?}", other)),
    }
}

fn debug(words: &[&str], globals: &Globals) -> CmdResult {
    let mut out = std::io::stdout().lock();
    match words {
        ["stdin"] => {
            let mut data = Vec::new();
            std::io::stdin()
                .read_to_end(&mut data)
                .map_err(|e| e.to_string())?;
            out.write_all(&data).map_err(|e| e.to_string())
        }
        ["env", var] => {
            let value = std::env::var(var).unwrap_or_default();
            write!(out, "{}", value).map_err(|e| e.to_string())
        }
        ["globals"] => writeln!(
            out,
            "server={} local={} config={} dir={}",
            globals.server.as_deref().unwrap_or("-"),
            globals.local,
            globals
                .config
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
            globals
                .trust_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
        )
        .map_err(|e| e.to_string()),
        ["exit", code, text @ ..] => {
            if !text.is_empty() {
                write!(out, "{}", text.join(" ")).map_err(|e| e.to_string())?;
            }
            out.flush().map_err(|e| e.to_string())?;
            let code: i32 = code.parse().map_err(|_| format!("bad exit code {code}"))?;
            std::process::exit(code);
        }
        ["flood", bytes] => {
            // write everything before touching stdin
            let bytes: usize = bytes.parse().map_err(|_| format!("bad size {bytes}"))?;
            let chunk = [b'x'; 4096];
            let mut left = bytes;
            while left > 0 {
                let n = left.min(chunk.len());
                out.write_all(&chunk[..n]).map_err(|e| e.to_string())?;
                left -= n;
            }
            let mut data = Vec::new();
            std::io::stdin()
                .read_to_end(&mut data)
                .map_err(|e| e.to_string())?;
            write!(out, "\nstdin={}", data.len()).map_err(|e| e.to_string())
        }
        other => Err(format!("unknown debug command: {:?}", other)),
    }
}

fn read_line(input: &mut impl BufRead) -> Result<String, String> {
    let mut line = String::new();
    input.read_line(&mut line).map_err(|e| e.to_string())?;
    Ok(line.trim_end_matches(|c| c == '\n' || c == '\r').to_string())
}

fn require_passphrase(var: &str) -> CmdResult {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Ok(()),
        _ => Err(format!("{} is not set", var)),
    }
}

fn new_key_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Digest of target content; FNV-1a is enough to tell payloads apart
fn digest(data: &[u8]) -> String {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in data {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{:016x}", hash)
}

#[derive(Serialize, Deserialize, Default)]
struct Login {
    username: String,
    password: String,
}

#[derive(Serialize, Deserialize, Clone)]
struct Target {
    digest: String,
    size: usize,
}

/// Signed state of one repository on the server
#[derive(Serialize, Deserialize, Default)]
struct RepoState {
    keys: BTreeMap<String, String>,
    roles: BTreeMap<String, Vec<String>>,
    targets: BTreeMap<String, Target>,
    version: u64,
}

impl RepoState {
    fn add_key(&mut self, role: &str) -> String {
        let id = new_key_id();
        self.keys.insert(id.clone(), role.to_string());
        id
    }

    fn root_json(&self) -> serde_json::Value {
        let keys: serde_json::Map<String, serde_json::Value> = self
            .keys
            .iter()
            .map(|(id, role)| {
                (
                    id.clone(),
                    json!({"keytype": "ecdsa", "keyval": {"public": format!("{role}:{id}")}}),
                )
            })
            .collect();
        let roles: serde_json::Map<String, serde_json::Value> = self
            .roles
            .iter()
            .map(|(role, ids)| (role.clone(), json!({"keyids": ids, "threshold": 1})))
            .collect();
        json!({
            "signed": {"_type": "Root", "keys": keys, "roles": roles, "version": self.version},
            "signatures": []
        })
    }
}

#[derive(Serialize, Deserialize, Clone)]
struct LocalKey {
    role: String,
    gun: String,
    id: String,
}

#[derive(Serialize, Deserialize)]
struct Staged {
    name: String,
    target: Target,
}

struct Server {
    dir: PathBuf,
}

impl Server {
    fn open(globals: &Globals) -> Result<Self, String> {
        let dir = match (&globals.server, globals.local) {
            (Some(url), false) => url
                .strip_prefix("file://")
                .map(PathBuf::from)
                .ok_or_else(|| format!("unsupported server {url}"))?,
            (None, true) => {
                let config = globals.config.as_ref().ok_or("local mode needs -c")?;
                let text = std::fs::read_to_string(config)
                    .map_err(|e| format!("read {}: {}", config.display(), e))?;
                let value: serde_json::Value =
                    serde_json::from_str(&text).map_err(|e| e.to_string())?;
                value["storage"]
                    .as_str()
                    .map(PathBuf::from)
                    .ok_or("config has no storage")?
            }
            _ => return Err("expected exactly one of -s <server> or -D".to_string()),
        };
        Ok(Self { dir })
    }

    fn login(&self, input: &mut impl BufRead) -> CmdResult {
        let path = self.dir.join("login.json");
        if !path.exists() {
            return Ok(());
        }
        let expected: Login = read_json(&path)?;
        let username = read_line(input)?;
        let password = read_line(input)?;
        if username != expected.username || password != expected.password {
            return Err(format!("authentication failed for user {username:?}"));
        }
        Ok(())
    }

    /// Whether `trust_dir` is served from the stale mirror
    fn is_stale_for(&self, trust_dir: &Path) -> bool {
        let Ok(suffix) = std::fs::read_to_string(self.dir.join("stale_suffix")) else {
            return false;
        };
        let suffix = suffix.trim();
        !suffix.is_empty()
            && trust_dir
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(suffix))
    }

    fn repo_path(&self, repo: &str) -> PathBuf {
        self.dir.join(format!("{}.json", repo.replace('/', "_")))
    }

    fn load(&self, repo: &str) -> Result<RepoState, String> {
        let path = self.repo_path(repo);
        if !path.exists() {
            return Err(format!("repository {repo} does not exist"));
        }
        read_json(&path)
    }

    fn save(&self, repo: &str, state: &RepoState) -> CmdResult {
        write_json(&self.repo_path(repo), state)
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, String> {
    let text =
        std::fs::read_to_string(path).map_err(|e| format!("read {}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("parse {}: {}", path.display(), e))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> CmdResult {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    let text = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    std::fs::write(path, text).map_err(|e| format!("write {}: {}", path.display(), e))
}

fn keys_path(trust_dir: &Path) -> PathBuf {
    trust_dir.join("private").join("keys.json")
}

fn load_keys(trust_dir: &Path) -> Result<Vec<LocalKey>, String> {
    let path = keys_path(trust_dir);
    if !path.exists() {
        return Ok(Vec::new());
    }
    read_json(&path)
}

fn changelist_path(trust_dir: &Path, repo: &str) -> PathBuf {
    trust_dir.join("tuf").join(repo).join("changelist.json")
}

/// Refresh the client's cached root metadata from the server
fn sync(trust_dir: &Path, repo: &str, state: &RepoState) -> CmdResult {
    let path = trust_dir
        .join("tuf")
        .join(repo)
        .join("metadata")
        .join("root.json");
    write_json(&path, &state.root_json())
}

fn init(server: &Server, trust_dir: &Path, repo: &str) -> CmdResult {
    require_passphrase("NOTARY_ROOT_PASSPHRASE")?;
    require_passphrase("NOTARY_TARGETS_PASSPHRASE")?;
    require_passphrase("NOTARY_SNAPSHOT_PASSPHRASE")?;
    if server.repo_path(repo).exists() {
        return Err(format!("repository {repo} already exists"));
    }

    let mut state = RepoState::default();
    let mut local = load_keys(trust_dir)?;
    for role in ["root", "targets", "snapshot", "timestamp"] {
        let id = state.add_key(role);
        state.roles.insert(role.to_string(), vec![id.clone()]);
        if role != "timestamp" {
            local.push(LocalKey {
                role: role.to_string(),
                gun: if role == "root" { String::new() } else { repo.to_string() },
                id,
            });
        }
    }
    state.version = 1;

    server.save(repo, &state)?;
    write_json(&keys_path(trust_dir), &local)?;
    sync(trust_dir, repo, &state)?;
    println!("Root key found, using: {}", state.roles["root"][0]);
    Ok(())
}

fn add(trust_dir: &Path, repo: &str, name: &str, file: &Path) -> CmdResult {
    let data = std::fs::read(file).map_err(|e| format!("read {}: {}", file.display(), e))?;
    let path = changelist_path(trust_dir, repo);
    let mut staged: Vec<Staged> = if path.exists() { read_json(&path)? } else { Vec::new() };
    staged.push(Staged {
        name: name.to_string(),
        target: Target {
            digest: digest(&data),
            size: data.len(),
        },
    });
    write_json(&path, &staged)?;
    println!("Addition of target \"{name}\" to repository \"{repo}\" staged for next publish.");
    Ok(())
}

fn publish(server: &Server, trust_dir: &Path, repo: &str) -> CmdResult {
    let mut state = server.load(repo)?;
    let path = changelist_path(trust_dir, repo);
    let staged: Vec<Staged> = if path.exists() { read_json(&path)? } else { Vec::new() };

    if staged.is_empty() {
        println!("No unpublished changes for {repo}");
    } else {
        for change in staged {
            state.targets.insert(change.name, change.target);
        }
        state.version += 1;
        server.save(repo, &state)?;
        std::fs::remove_file(&path).map_err(|e| e.to_string())?;
        println!("Successfully published changes for repository {repo}");
    }
    sync(trust_dir, repo, &state)
}

fn list(server: &Server, trust_dir: &Path, repo: &str) -> CmdResult {
    let state = server.load(repo)?;
    sync(trust_dir, repo, &state)?;

    println!("{:<34} {:<18} {:<14} ROLE", "NAME", "DIGEST", "SIZE (BYTES)");
    println!("{:<34} {:<18} {:<14} ----", "----", "------", "------------");
    if server.is_stale_for(trust_dir) {
        return Ok(());
    }
    for (name, target) in &state.targets {
        println!(
            "{:<34} {:<18} {:<14} targets",
            name, target.digest, target.size
        );
    }
    Ok(())
}

fn verify(server: &Server, repo: &str, name: &str, file: &Path) -> CmdResult {
    let state = server.load(repo)?;
    let target = state
        .targets
        .get(name)
        .ok_or_else(|| format!("target {name} not found in {repo}"))?;
    let data = std::fs::read(file).map_err(|e| format!("read {}: {}", file.display(), e))?;
    if digest(&data) != target.digest || data.len() != target.size {
        return Err(format!("data not present in the trusted collection for {name}"));
    }
    Ok(())
}

fn key_list(trust_dir: &Path) -> CmdResult {
    let keys = load_keys(trust_dir)?;
    let location = trust_dir.join("private");
    println!();
    println!("{:<10} {:<34} {:<34} LOCATION", "ROLE", "GUN", "KEY ID");
    println!("{:<10} {:<34} {:<34} --------", "----", "---", "------");
    for key in keys {
        println!(
            "{:<10} {:<34} {:<34} file ({})",
            key.role,
            key.gun,
            key.id,
            location.display()
        );
    }
    Ok(())
}

fn rotate(
    server: &Server,
    trust_dir: &Path,
    repo: &str,
    role: &str,
    server_managed: bool,
) -> CmdResult {
    let mut state = server.load(repo)?;
    let mut local = load_keys(trust_dir)?;

    if role == "root" {
        require_passphrase("NOTARY_ROOT_PASSPHRASE")?;
        // old root keys stay listed so earlier metadata still verifies
        let id = state.add_key("root");
        state.roles.insert("root".to_string(), vec![id.clone()]);
        local.push(LocalKey {
            role: "root".to_string(),
            gun: String::new(),
            id,
        });
    } else {
        let old = state.roles.get(role).cloned().unwrap_or_default();
        for id in &old {
            state.keys.remove(id);
        }
        let id = state.add_key(role);
        state.roles.insert(role.to_string(), vec![id.clone()]);
        local.retain(|key| !(key.role == role && key.gun == repo));
        if !server_managed {
            local.push(LocalKey {
                role: role.to_string(),
                gun: repo.to_string(),
                id,
            });
        }
    }

    state.version += 1;
    server.save(repo, &state)?;
    write_json(&keys_path(trust_dir), &local)?;
    sync(trust_dir, repo, &state)?;
    println!("Successfully rotated {role} key for repository {repo}");
    Ok(())
}

//! Cached view of the OS hosts file.
//!
//! The parsed snapshot is replaced wholesale on reload. A lookup within
//! the cache-age window touches no file at all; after the window a stat
//! decides whether the file actually changed before it is re-read. A
//! parse or read failure leaves the previous snapshot in place.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tracing::debug;

const CACHE_MAX_AGE: Duration = Duration::from_secs(5);

#[cfg(windows)]
const SYSTEM_HOSTS_PATH: &str = r"C:\Windows\System32\drivers\etc\hosts";
#[cfg(not(windows))]
const SYSTEM_HOSTS_PATH: &str = "/etc/hosts";

#[derive(Default)]
struct Snapshot {
    /// Lowercased absolute name → addresses.
    by_name: HashMap<String, Vec<String>>,
    /// Literal address → names, case preserved.
    by_addr: HashMap<String, Vec<String>>,
    expire: Option<Instant>,
    mtime: Option<SystemTime>,
    size: u64,
}

pub struct HostsFile {
    path: PathBuf,
    state: Mutex<Snapshot>,
}

impl HostsFile {
    pub fn system() -> Self {
        debug!(path = SYSTEM_HOSTS_PATH, "using system hosts file");
        Self::with_path(SYSTEM_HOSTS_PATH)
    }

    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: Mutex::new(Snapshot::default()),
        }
    }

    /// Addresses for a host name; the key is lowercased and given a
    /// trailing dot when it contains a dot, matching the parse-side keys.
    pub fn lookup_host(&self, host: &str) -> Vec<String> {
        let mut state = self.state.lock();
        self.refresh(&mut state);
        let key = abs_domain_name(&host.to_ascii_lowercase());
        state.by_name.get(&key).cloned().unwrap_or_default()
    }

    /// Names mapped to a literal address.
    pub fn lookup_addr(&self, addr: &str) -> Vec<String> {
        let Some(addr) = parse_literal_ip(addr) else {
            return Vec::new();
        };
        let mut state = self.state.lock();
        self.refresh(&mut state);
        state.by_addr.get(&addr).cloned().unwrap_or_default()
    }

    fn refresh(&self, state: &mut Snapshot) {
        let now = Instant::now();
        if state.expire.is_some_and(|e| now < e) && !state.by_name.is_empty() {
            return;
        }

        let Ok(meta) = std::fs::metadata(&self.path) else {
            return;
        };
        let mtime = meta.modified().ok();
        let size = meta.len();
        if state.mtime.is_some() && state.mtime == mtime && state.size == size {
            state.expire = Some(now + CACHE_MAX_AGE);
            return;
        }

        let Ok(contents) = std::fs::read_to_string(&self.path) else {
            return;
        };
        let (by_name, by_addr) = parse(&contents);
        debug!(
            path = %self.path.display(),
            names = by_name.len(),
            "hosts file reloaded"
        );
        state.by_name = by_name;
        state.by_addr = by_addr;
        state.expire = Some(now + CACHE_MAX_AGE);
        state.mtime = mtime;
        state.size = size;
    }
}

fn parse(contents: &str) -> (HashMap<String, Vec<String>>, HashMap<String, Vec<String>>) {
    let mut by_name: HashMap<String, Vec<String>> = HashMap::new();
    let mut by_addr: HashMap<String, Vec<String>> = HashMap::new();

    for line in contents.lines() {
        let line = line.split('#').next().unwrap_or_default();
        let mut fields = line.split_whitespace();
        let Some(first) = fields.next() else {
            continue;
        };
        let Some(addr) = parse_literal_ip(first) else {
            continue;
        };
        for name in fields {
            let display_name = abs_domain_name(name);
            let key = abs_domain_name(&name.to_ascii_lowercase());
            by_name.entry(key).or_default().push(addr.clone());
            by_addr.entry(addr.clone()).or_default().push(display_name);
        }
    }

    (by_name, by_addr)
}

/// Normalizes a literal IP, keeping an IPv6 zone identifier when present.
fn parse_literal_ip(raw: &str) -> Option<String> {
    if let Ok(ip) = raw.parse::<std::net::IpAddr>() {
        return Some(ip.to_string());
    }
    // IPv6 with a zone, e.g. fe80::1%eth0
    let (host, zone) = raw.rsplit_once('%')?;
    let ip = host.parse::<std::net::Ipv6Addr>().ok()?;
    Some(format!("{ip}%{zone}"))
}

/// Names without any dot (like "localhost") stay bare; all others get a
/// trailing dot.
fn abs_domain_name(name: &str) -> String {
    if name.contains('.') && !name.ends_with('.') {
        format!("{name}.")
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# static entries
127.0.0.1   localhost
10.0.0.1    foo.local   Foo.Alias.local
fe80::1%lo0 scoped.example
::1         ip6-localhost # trailing comment
garbage-line
256.1.1.1   not-an-ip
";

    #[test]
    fn parse_indexes_names_and_addresses() {
        let (by_name, by_addr) = parse(SAMPLE);
        assert_eq!(by_name["localhost"], vec!["127.0.0.1"]);
        assert_eq!(by_name["foo.local."], vec!["10.0.0.1"]);
        assert_eq!(by_name["foo.alias.local."], vec!["10.0.0.1"]);
        assert_eq!(by_name["ip6-localhost"], vec!["::1"]);
        assert!(!by_name.contains_key("not-an-ip"));

        let names = &by_addr["10.0.0.1"];
        assert!(names.contains(&"foo.local.".to_string()));
        // the address index preserves the original case
        assert!(names.contains(&"Foo.Alias.local.".to_string()));
    }

    #[test]
    fn zone_identifiers_are_preserved() {
        let (by_name, _) = parse(SAMPLE);
        assert_eq!(by_name["scoped.example."], vec!["fe80::1%lo0"]);
    }

    #[test]
    fn names_without_dots_stay_bare() {
        assert_eq!(abs_domain_name("localhost"), "localhost");
        assert_eq!(abs_domain_name("foo.local"), "foo.local.");
        assert_eq!(abs_domain_name("foo.local."), "foo.local.");
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        std::fs::write(&path, "10.0.0.1 Foo.Local\n").unwrap();

        let hosts = HostsFile::with_path(&path);
        assert_eq!(hosts.lookup_host("foo.local"), vec!["10.0.0.1"]);
        assert_eq!(hosts.lookup_host("FOO.LOCAL"), vec!["10.0.0.1"]);
        assert!(hosts.lookup_host("bar.local").is_empty());
    }

    #[test]
    fn missing_file_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        std::fs::write(&path, "10.0.0.1 foo.local\n").unwrap();

        let hosts = HostsFile::with_path(&path);
        assert_eq!(hosts.lookup_host("foo.local"), vec!["10.0.0.1"]);

        std::fs::remove_file(&path).unwrap();
        // still answered from the cached snapshot
        assert_eq!(hosts.lookup_host("foo.local"), vec!["10.0.0.1"]);
    }

    #[test]
    fn lookup_addr_resolves_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        std::fs::write(&path, "10.0.0.1 foo.local bar.local\n").unwrap();

        let hosts = HostsFile::with_path(&path);
        assert_eq!(
            hosts.lookup_addr("10.0.0.1"),
            vec!["foo.local.", "bar.local."]
        );
        assert!(hosts.lookup_addr("not-an-ip").is_empty());
    }
}

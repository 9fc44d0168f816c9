//! Procfs-backed registry.
//!
//! Exposes the local machine's processes and a couple of system files as
//! managed objects, so the daemon has something real to sample without any
//! in-process instrumentation:
//!
//! - `proc:type=Process,pid=N` — `Name`, `State`, `Threads`, `VmRSS`,
//!   `VmSize` from `/proc/N/status`
//! - `proc:type=System,name=LoadAvg` — `Load1`, `Load5`, `Load15`
//! - `proc:type=System,name=Memory` — `MemTotal`, `MemFree`, `MemAvailable`
//!
//! The base path is configurable so tests can point it at a fixture
//! directory.

use std::path::{Path, PathBuf};

use crate::filter::PatternList;
use crate::model::{AttrInfo, AttrKind, AttrValue, ObjectId, ObjectInfo};
use crate::registry::{ObjectRegistry, RegistryError};

const DOMAIN: &str = "proc";

const PROCESS_ATTRS: &[(&str, AttrKind)] = &[
    ("Name", AttrKind::Text),
    ("State", AttrKind::Text),
    ("Threads", AttrKind::Int),
    ("VmRSS", AttrKind::Int),
    ("VmSize", AttrKind::Int),
];

const LOADAVG_ATTRS: &[(&str, AttrKind)] = &[
    ("Load1", AttrKind::Float),
    ("Load5", AttrKind::Float),
    ("Load15", AttrKind::Float),
];

const MEMORY_ATTRS: &[(&str, AttrKind)] = &[
    ("MemTotal", AttrKind::Int),
    ("MemFree", AttrKind::Int),
    ("MemAvailable", AttrKind::Int),
];

/// Registry over a proc-style filesystem tree.
pub struct ProcRegistry {
    base: PathBuf,
}

impl ProcRegistry {
    /// Creates a registry over `base` (usually `/proc`).
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn system_id(name: &str) -> ObjectId {
        // Constructed from literal parts, cannot fail.
        ObjectId::new(
            DOMAIN,
            vec![
                ("type".to_string(), "System".to_string()),
                ("name".to_string(), name.to_string()),
            ],
        )
        .unwrap_or_else(|_| unreachable!())
    }

    fn process_id(pid: u32) -> ObjectId {
        ObjectId::new(
            DOMAIN,
            vec![
                ("type".to_string(), "Process".to_string()),
                ("pid".to_string(), pid.to_string()),
            ],
        )
        .unwrap_or_else(|_| unreachable!())
    }

    fn list_pids(&self) -> Result<Vec<u32>, RegistryError> {
        let entries = std::fs::read_dir(&self.base)
            .map_err(|e| RegistryError::Connect(format!("{}: {}", self.base.display(), e)))?;
        let mut pids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Some(pid) = entry
                .file_name()
                .to_str()
                .and_then(|n| n.parse::<u32>().ok())
            {
                pids.push(pid);
            }
        }
        pids.sort_unstable();
        Ok(pids)
    }

    fn status_field(&self, pid: u32, field: &str) -> Result<String, RegistryError> {
        let path = self.base.join(pid.to_string()).join("status");
        let content = std::fs::read_to_string(&path)
            .map_err(|_| RegistryError::NotFound(format!("process {}", pid)))?;
        for line in content.lines() {
            if let Some(rest) = line.strip_prefix(field)
                && let Some(value) = rest.strip_prefix(':')
            {
                return Ok(value.trim().to_string());
            }
        }
        Err(RegistryError::NotFound(format!("{} of process {}", field, pid)))
    }

    /// Parses fields like `"12345 kB"` or `"7"` into the leading integer.
    fn leading_int(raw: &str) -> Result<i64, RegistryError> {
        raw.split_whitespace()
            .next()
            .and_then(|n| n.parse::<i64>().ok())
            .ok_or_else(|| RegistryError::Unsupported(format!("unparseable value '{}'", raw)))
    }

    fn read_process_attr(&self, pid: u32, attr: &str) -> Result<AttrValue, RegistryError> {
        match attr {
            "Name" => Ok(AttrValue::Str(self.status_field(pid, "Name")?)),
            "State" => Ok(AttrValue::Str(self.status_field(pid, "State")?)),
            "Threads" => Ok(AttrValue::Int(Self::leading_int(
                &self.status_field(pid, "Threads")?,
            )?)),
            "VmRSS" => Ok(AttrValue::Int(Self::leading_int(
                &self.status_field(pid, "VmRSS")?,
            )?)),
            "VmSize" => Ok(AttrValue::Int(Self::leading_int(
                &self.status_field(pid, "VmSize")?,
            )?)),
            other => Err(RegistryError::NotFound(other.to_string())),
        }
    }

    fn read_loadavg_attr(&self, attr: &str) -> Result<AttrValue, RegistryError> {
        let content = std::fs::read_to_string(self.base.join("loadavg"))?;
        let fields: Vec<&str> = content.split_whitespace().collect();
        let idx = match attr {
            "Load1" => 0,
            "Load5" => 1,
            "Load15" => 2,
            other => return Err(RegistryError::NotFound(other.to_string())),
        };
        fields
            .get(idx)
            .and_then(|f| f.parse::<f64>().ok())
            .map(AttrValue::Float)
            .ok_or_else(|| RegistryError::Unsupported("malformed loadavg".to_string()))
    }

    fn read_memory_attr(&self, attr: &str) -> Result<AttrValue, RegistryError> {
        if !MEMORY_ATTRS.iter().any(|(n, _)| *n == attr) {
            return Err(RegistryError::NotFound(attr.to_string()));
        }
        let content = std::fs::read_to_string(self.base.join("meminfo"))?;
        for line in content.lines() {
            if let Some(rest) = line.strip_prefix(attr)
                && let Some(value) = rest.strip_prefix(':')
            {
                return Ok(AttrValue::Int(Self::leading_int(value.trim())?));
            }
        }
        Err(RegistryError::NotFound(attr.to_string()))
    }

    fn attr_list(attrs: &[(&str, AttrKind)]) -> Vec<AttrInfo> {
        attrs.iter().map(|(n, k)| AttrInfo::new(*n, *k)).collect()
    }
}

impl ObjectRegistry for ProcRegistry {
    fn ping(&self) -> Result<(), RegistryError> {
        if Path::new(&self.base).is_dir() {
            Ok(())
        } else {
            Err(RegistryError::Connect(format!(
                "{} is not a directory",
                self.base.display()
            )))
        }
    }

    fn query_names(&self, filter: &PatternList) -> Result<Vec<ObjectId>, RegistryError> {
        let mut names = Vec::new();
        for system in ["LoadAvg", "Memory"] {
            let id = Self::system_id(system);
            if filter.matches(&id) {
                names.push(id);
            }
        }
        for pid in self.list_pids()? {
            let id = Self::process_id(pid);
            if filter.matches(&id) {
                names.push(id);
            }
        }
        Ok(names)
    }

    fn object_info(&self, id: &ObjectId) -> Result<ObjectInfo, RegistryError> {
        if id.domain() != DOMAIN {
            return Err(RegistryError::NotFound(id.canonical()));
        }
        match (id.get("type"), id.get("name")) {
            (Some("Process"), _) => Ok(ObjectInfo::new(id.clone(), Self::attr_list(PROCESS_ATTRS))),
            (Some("System"), Some("LoadAvg")) => {
                Ok(ObjectInfo::new(id.clone(), Self::attr_list(LOADAVG_ATTRS)))
            }
            (Some("System"), Some("Memory")) => {
                Ok(ObjectInfo::new(id.clone(), Self::attr_list(MEMORY_ATTRS)))
            }
            _ => Err(RegistryError::NotFound(id.canonical())),
        }
    }

    fn read_attribute(&self, id: &ObjectId, attr: &str) -> Result<AttrValue, RegistryError> {
        match (id.get("type"), id.get("name")) {
            (Some("Process"), _) => {
                let pid = id
                    .get("pid")
                    .and_then(|p| p.parse::<u32>().ok())
                    .ok_or_else(|| RegistryError::NotFound(id.canonical()))?;
                self.read_process_attr(pid, attr)
            }
            (Some("System"), Some("LoadAvg")) => self.read_loadavg_attr(attr),
            (Some("System"), Some("Memory")) => self.read_memory_attr(attr),
            _ => Err(RegistryError::NotFound(id.canonical())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("1234")).unwrap();
        fs::write(
            dir.path().join("1234").join("status"),
            "Name:\tworker\nState:\tS (sleeping)\nThreads:\t7\nVmSize:\t  204800 kB\nVmRSS:\t  51200 kB\n",
        )
        .unwrap();
        fs::write(dir.path().join("loadavg"), "0.52 0.58 0.59 1/467 9999\n").unwrap();
        fs::write(
            dir.path().join("meminfo"),
            "MemTotal:       16384000 kB\nMemFree:         1024000 kB\nMemAvailable:    8192000 kB\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_query_names() {
        let dir = fixture();
        let reg = ProcRegistry::new(dir.path());
        let names = reg.query_names(&PatternList::match_all()).unwrap();
        let rendered: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        assert!(rendered.contains(&"proc:type=System,name=LoadAvg".to_string()));
        assert!(rendered.contains(&"proc:type=System,name=Memory".to_string()));
        assert!(rendered.contains(&"proc:type=Process,pid=1234".to_string()));
    }

    #[test]
    fn test_filtered_query() {
        let dir = fixture();
        let reg = ProcRegistry::new(dir.path());
        let filter = PatternList::parse("proc:*type=System*").unwrap();
        let names = reg.query_names(&filter).unwrap();
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_read_process_attrs() {
        let dir = fixture();
        let reg = ProcRegistry::new(dir.path());
        let id = ProcRegistry::process_id(1234);
        assert_eq!(
            reg.read_attribute(&id, "Name").unwrap(),
            AttrValue::Str("worker".to_string())
        );
        assert_eq!(reg.read_attribute(&id, "Threads").unwrap(), AttrValue::Int(7));
        assert_eq!(reg.read_attribute(&id, "VmRSS").unwrap(), AttrValue::Int(51200));
    }

    #[test]
    fn test_read_system_attrs() {
        let dir = fixture();
        let reg = ProcRegistry::new(dir.path());
        let load = ProcRegistry::system_id("LoadAvg");
        assert_eq!(
            reg.read_attribute(&load, "Load5").unwrap(),
            AttrValue::Float(0.58)
        );
        let mem = ProcRegistry::system_id("Memory");
        assert_eq!(
            reg.read_attribute(&mem, "MemAvailable").unwrap(),
            AttrValue::Int(8192000)
        );
    }

    #[test]
    fn test_gone_process_is_not_connect_error() {
        let dir = fixture();
        let reg = ProcRegistry::new(dir.path());
        let id = ProcRegistry::process_id(4321);
        let err = reg.read_attribute(&id, "Name").unwrap_err();
        assert!(!err.is_connect());
    }

    #[test]
    fn test_missing_base_is_connect_error() {
        let reg = ProcRegistry::new("/definitely/not/here");
        assert!(reg.ping().unwrap_err().is_connect());
    }
}

use std::path::Path;

use crate::error::{HsmpError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuEntry {
    pub socket: usize,
    pub apic_id: u32,
}

/// Logical CPU -> (socket, APIC ID), indexed by logical CPU number
///
/// Slots for CPUs that were not present when the table was built stay
/// empty and are rejected on lookup.
#[derive(Debug, Clone, Default)]
pub struct CpuTable {
    entries: Vec<Option<CpuEntry>>,
}

impl CpuTable {
    pub fn from_cpuinfo(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            HsmpError::ParseError(format!("Failed to read {}: {e}", path.display()))
        })?;
        let table = Self::parse(&text)?;

        tracing::info!("Mapped {} logical CPUs from {}", table.len(), path.display());
        Ok(table)
    }

    /// Parse `/proc/cpuinfo` text
    ///
    /// Every `processor` stanza must carry `physical id` and `apicid`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut table = Self::default();

        for stanza in text.split("\n\n") {
            let mut cpu = None;
            let mut socket = None;
            let mut apic_id = None;

            for line in stanza.lines() {
                let Some((key, value)) = line.split_once(':') else {
                    continue;
                };
                match key.trim() {
                    "processor" => cpu = Some(parse_field::<usize>("processor", value)?),
                    "physical id" => socket = Some(parse_field::<usize>("physical id", value)?),
                    "apicid" => apic_id = Some(parse_field::<u32>("apicid", value)?),
                    _ => {}
                }
            }

            let Some(cpu) = cpu else {
                continue;
            };

            match (socket, apic_id) {
                (Some(socket), Some(apic_id)) => table.insert(cpu, CpuEntry { socket, apic_id }),
                _ => {
                    return Err(HsmpError::ParseError(format!(
                        "processor {cpu} has no physical id or apicid"
                    )))
                }
            }
        }

        Ok(table)
    }

    pub fn insert(&mut self, cpu: usize, entry: CpuEntry) {
        if cpu >= self.entries.len() {
            self.entries.resize(cpu + 1, None);
        }
        self.entries[cpu] = Some(entry);
    }

    pub fn lookup(&self, cpu: usize) -> Result<CpuEntry> {
        self.entries
            .get(cpu)
            .copied()
            .flatten()
            .ok_or_else(|| HsmpError::InvalidArgument(format!("CPU {cpu} is not present")))
    }

    /// Number of populated entries
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, CpuEntry)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(cpu, entry)| entry.map(|e| (cpu, e)))
    }
}

fn parse_field<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| HsmpError::ParseError(format!("bad {name} value {:?}", value.trim())))
}

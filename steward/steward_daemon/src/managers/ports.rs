use std::collections::HashSet;
use std::fmt::Display;
use std::ops::Range;

use log::warn;
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::instance::FieldMap;

pub const BATCH_PORT_RANGE: Range<u16> = 10000..60000;
pub const MAX_ALLOCATION_ATTEMPTS: usize = 100;

/// `host:container` binding. `host` is kept verbatim so non numeric specifiers
/// such as `127.0.0.1:8080` survive; an empty `host` lets the runtime choose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub host: String,
    pub container: String,
}

impl PortMapping {
    pub fn new(host: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
        }
    }

    pub fn host_port(&self) -> Option<u16> {
        self.host.parse().ok()
    }

    pub fn with_offset(&self, offset: u16) -> Self {
        match self.host_port().and_then(|port| port.checked_add(offset)) {
            Some(port) => Self::new(port.to_string(), self.container.clone()),
            None => self.clone(),
        }
    }
}

impl Display for PortMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.is_empty() {
            write!(f, "{}", self.container)
        } else {
            write!(f, "{}:{}", self.host, self.container)
        }
    }
}

/// Resolves a `HOST:CONTAINER` template where `HOST` may be `${VAR}`. `VAR` is
/// looked up in `fields` and falls back to the container port.
pub fn resolve_template(template: &str, fields: &FieldMap) -> PortMapping {
    match template.rsplit_once(':') {
        None => PortMapping::new(String::new(), template),
        Some((host, container)) => {
            let host = match placeholder(host) {
                Some(variable) => fields
                    .get(variable)
                    .map(|value| value.trim())
                    .filter(|value| !value.is_empty())
                    .unwrap_or(container)
                    .to_string(),
                None => host.to_string(),
            };
            PortMapping::new(host, container)
        }
    }
}

pub fn resolve_templates(templates: &[String], fields: &FieldMap) -> Vec<PortMapping> {
    templates
        .iter()
        .map(|template| resolve_template(template, fields))
        .collect()
}

pub fn apply_offset(mappings: &[PortMapping], offset: u16) -> Vec<PortMapping> {
    mappings
        .iter()
        .map(|mapping| mapping.with_offset(offset))
        .collect()
}

fn placeholder(value: &str) -> Option<&str> {
    value.strip_prefix("${")?.strip_suffix('}')
}

/// Random host port picker for one batch deployment. It only knows about the
/// ports it was seeded with and the ones it handed out itself.
pub struct PortAllocator<R: Rng = StdRng> {
    used: HashSet<u16>,
    rng: R,
}

impl PortAllocator<StdRng> {
    pub fn new(used: HashSet<u16>) -> Self {
        Self::with_rng(used, StdRng::from_entropy())
    }
}

impl<R: Rng> PortAllocator<R> {
    pub fn with_rng(used: HashSet<u16>, rng: R) -> Self {
        Self { used, rng }
    }

    pub fn is_free(&self, port: u16) -> bool {
        !self.used.contains(&port)
    }

    pub fn claim(&mut self, port: u16) {
        self.used.insert(port);
    }

    /// Draws up to [`MAX_ALLOCATION_ATTEMPTS`] candidates. When all of them are
    /// taken the last candidate is returned anyway and may collide.
    pub fn allocate(&mut self) -> u16 {
        let mut candidate = self.rng.gen_range(BATCH_PORT_RANGE);
        for _ in 1..MAX_ALLOCATION_ATTEMPTS {
            if self.is_free(candidate) {
                break;
            }
            candidate = self.rng.gen_range(BATCH_PORT_RANGE);
        }
        if !self.is_free(candidate) {
            warn!("No free port found after {MAX_ALLOCATION_ATTEMPTS} attempts, reusing {candidate}.");
        }
        self.claim(candidate);
        candidate
    }

    /// Uses `requested` when it is free, otherwise a random port.
    pub fn allocate_preferring(&mut self, requested: Option<u16>) -> u16 {
        match requested {
            Some(port) if self.is_free(port) => {
                self.claim(port);
                port
            }
            _ => self.allocate(),
        }
    }
}

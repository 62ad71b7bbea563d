//! Domain allowlist with `www.`-prefix equivalence.
//!
//! Both the server-side request validation and the client-embedded
//! check in the generated widget script use this logic, so the two
//! never disagree about which hosts may report events.

/// The set of domains allowed to record and query presence data.
#[derive(Clone, Debug)]
pub struct DomainAllowlist {
    domains: Vec<String>,
}

impl DomainAllowlist {
    pub fn new(domains: Vec<String>) -> Self {
        Self { domains }
    }

    /// Parse a comma-separated list, trimming whitespace and dropping
    /// empty entries. The shape of the `ALLOWED_DOMAINS` env var.
    pub fn from_csv(csv: &str) -> Self {
        Self {
            domains: csv
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Whether `domain` may interact with the service.
    ///
    /// Exact match first; a `www.`-prefixed domain is also allowed when
    /// its bare form is listed.
    pub fn is_allowed(&self, domain: &str) -> bool {
        if self.domains.iter().any(|d| d == domain) {
            return true;
        }
        if let Some(bare) = domain.strip_prefix("www.") {
            return self.domains.iter().any(|d| d == bare);
        }
        false
    }

    /// The configured domains, in order.
    pub fn domains(&self) -> &[String] {
        &self.domains
    }
}

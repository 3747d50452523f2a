//! Parsing for the speaker's single configuration string:
//! `<LocalAS> <LocalIP> <RemoteAS> <RemoteIP> <active|passive> [<prefix/len> ...]`.

use octavius_bgp_common::{
    Asn,
    Ipv4Prefix,
    Mode,
};
use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("expected at least 5 whitespace-separated fields (local-as local-ip remote-as remote-ip mode), got '{0}'")]
    TooFewFields(String),
    #[error("field {index} ('{value}') of '{raw}' is invalid => {source}")]
    Field { index: usize, value: String, raw: String, #[source] source: Box<dyn std::error::Error + Send + Sync> },
}

/// The parsed peer configuration, plus the raw string it came from - kept
/// around for log lines that want to echo back exactly what the operator
/// typed.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub raw: String,
    pub local_as: Asn,
    pub local_ip: Ipv4Addr,
    pub remote_as: Asn,
    pub remote_ip: Ipv4Addr,
    pub mode: Mode,
    pub originate: Vec<Ipv4Prefix>,
}

impl PeerConfig {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let fields: Vec<&str> = raw.split_whitespace().collect();
        if fields.len() < 5 {
            return Err(ConfigError::TooFewFields(raw.to_string()));
        }

        let local_as = field(raw, &fields, 0)?;
        let local_ip = field(raw, &fields, 1)?;
        let remote_as = field(raw, &fields, 2)?;
        let remote_ip = field(raw, &fields, 3)?;
        let mode = field(raw, &fields, 4)?;

        let mut originate = Vec::with_capacity(fields.len().saturating_sub(5));
        for offset in 0..fields.len() - 5 {
            originate.push(field(raw, &fields, 5 + offset)?);
        }

        Ok(Self { raw: raw.to_string(), local_as, local_ip, remote_as, remote_ip, mode, originate })
    }
}

fn field<T>(raw: &str, fields: &[&str], index: usize) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    fields[index].parse().map_err(|error: T::Err| ConfigError::Field {
        index,
        value: fields[index].to_string(),
        raw: raw.to_string(),
        source: Box::new(error),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_example_from_the_external_interface_contract() {
        let config = PeerConfig::parse("64512 10.0.0.1 64513 10.0.0.2 active 10.100.220.0/24").unwrap();
        assert_eq!(config.local_as, Asn(64512));
        assert_eq!(config.local_ip, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(config.remote_as, Asn(64513));
        assert_eq!(config.remote_ip, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(config.mode, Mode::Active);
        assert_eq!(config.originate, vec!["10.100.220.0/24".parse().unwrap()]);
    }

    #[test]
    fn originate_list_defaults_to_empty() {
        let config = PeerConfig::parse("64512 127.0.0.1 64513 127.0.0.2 passive").unwrap();
        assert!(config.originate.is_empty());
    }

    #[test]
    fn rejects_a_string_with_too_few_fields() {
        assert!(matches!(PeerConfig::parse("64512 127.0.0.1"), Err(ConfigError::TooFewFields(_))));
    }

    #[test]
    fn rejects_an_invalid_mode() {
        assert!(matches!(
            PeerConfig::parse("64512 127.0.0.1 64513 127.0.0.2 eager"),
            Err(ConfigError::Field { index: 4, .. })
        ));
    }
}

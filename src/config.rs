use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;

use crate::process::ParseDataSubject;

pub const DEFAULT_LOG_FILTER: &str = "info,flowbased=info";
pub const DEFAULT_MACZT_ZONE: &str = "NL";

/// What the binary should parse each input file as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Utility tool XML download, one subject table.
    UtilityTool(ParseDataSubject),
    /// Net position web service XML.
    NetPositions,
    /// Final flow-based domain CSV export.
    FinalDomain,
    /// Final flow-based domain CSV export, reduced to MACZT margins.
    Maczt,
    /// JSON dump of typed SOAP records.
    Records { subject: String, nested: bool },
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "netpositions" => Ok(Command::NetPositions),
            "domain" => Ok(Command::FinalDomain),
            "maczt" => Ok(Command::Maczt),
            _ => {
                if let Some(rest) = s.strip_prefix("records:") {
                    let (subject, nested) = match rest.strip_suffix(":nested") {
                        Some(subject) => (subject, true),
                        None => (rest, false),
                    };
                    if subject.is_empty() {
                        bail!("records command needs a subject, e.g. records:MaxExchanges");
                    }
                    return Ok(Command::Records {
                        subject: subject.to_string(),
                        nested,
                    });
                }
                let subject = s
                    .parse::<ParseDataSubject>()
                    .with_context(|| format!("unknown command {:?}", s))?;
                Ok(Command::UtilityTool(subject))
            }
        }
    }
}

/// Runtime settings: positional arguments plus environment overrides.
#[derive(Debug, Clone)]
pub struct Config {
    pub command: Command,
    /// Glob of input files.
    pub pattern: String,
    pub maczt_zone: String,
    pub log_filter: String,
}

impl Config {
    /// Build from `<command> <glob>` (program name already stripped) and an
    /// environment lookup.
    pub fn from_args<I, F>(args: I, lookup: F) -> Result<Config>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        let [command, pattern] = args.as_slice() else {
            bail!("usage: flowbased <command> <glob>");
        };
        Ok(Config {
            command: command.parse()?,
            pattern: pattern.clone(),
            maczt_zone: lookup("FLOWBASED_MACZT_ZONE")
                .unwrap_or_else(|| DEFAULT_MACZT_ZONE.to_string()),
            log_filter: lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        })
    }

    pub fn from_env() -> Result<Config> {
        Config::from_args(env::args().skip(1), |k| env::var(k).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(a: &[&str]) -> Vec<String> {
        a.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_commands() -> anyhow::Result<()> {
        assert_eq!(
            "Ptdfs".parse::<Command>()?,
            Command::UtilityTool(ParseDataSubject::Ptdfs)
        );
        assert_eq!("domain".parse::<Command>()?, Command::FinalDomain);
        assert_eq!(
            "records:Ptdfs:nested".parse::<Command>()?,
            Command::Records {
                subject: "Ptdfs".into(),
                nested: true
            }
        );
        assert!("records:".parse::<Command>().is_err());
        assert!("bogus".parse::<Command>().is_err());
        Ok(())
    }

    #[test]
    fn defaults_and_overrides() -> anyhow::Result<()> {
        let cfg = Config::from_args(args(&["maczt", "data/*.csv"]), |_| None)?;
        assert_eq!(cfg.command, Command::Maczt);
        assert_eq!(cfg.pattern, "data/*.csv");
        assert_eq!(cfg.maczt_zone, DEFAULT_MACZT_ZONE);
        assert_eq!(cfg.log_filter, DEFAULT_LOG_FILTER);

        let cfg = Config::from_args(args(&["maczt", "x"]), |k| {
            (k == "FLOWBASED_MACZT_ZONE").then(|| "FR".to_string())
        })?;
        assert_eq!(cfg.maczt_zone, "FR");
        Ok(())
    }

    #[test]
    fn wrong_argument_count_fails() {
        assert!(Config::from_args(args(&["maczt"]), |_| None).is_err());
    }
}

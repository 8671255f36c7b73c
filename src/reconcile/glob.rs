/// A name pattern using `*` and `?` only.
///
/// Patterns with brace, class or escape syntax are not interpreted; callers
/// skip checks that depend on them rather than guess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleGlob {
    pattern: Vec<char>,
}

impl SimpleGlob {
    pub fn parse(pattern: &str) -> Option<Self> {
        if pattern.contains(['{', '}', '[', ']', '\\']) {
            return None;
        }
        Some(Self {
            pattern: pattern.chars().collect(),
        })
    }

    pub fn is_literal(&self) -> bool {
        !self.pattern.iter().any(|c| *c == '*' || *c == '?')
    }

    pub fn matches(&self, name: &str) -> bool {
        let name: Vec<char> = name.chars().collect();
        let (mut p, mut n) = (0, 0);
        let mut star: Option<(usize, usize)> = None;
        while n < name.len() {
            match self.pattern.get(p) {
                Some('*') => {
                    star = Some((p, n));
                    p += 1;
                }
                Some(c) if *c == '?' || *c == name[n] => {
                    p += 1;
                    n += 1;
                }
                _ => match star {
                    Some((sp, sn)) => {
                        p = sp + 1;
                        n = sn + 1;
                        star = Some((sp, sn + 1));
                    }
                    None => return false,
                },
            }
        }
        self.pattern[p..].iter().all(|c| *c == '*')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcards() {
        let glob = SimpleGlob::parse("ci-*").unwrap();
        assert!(glob.matches("ci-build"));
        assert!(glob.matches("ci-"));
        assert!(!glob.matches("deploy"));
        assert!(!glob.is_literal());

        let glob = SimpleGlob::parse("unit-?").unwrap();
        assert!(glob.matches("unit-1"));
        assert!(!glob.matches("unit-12"));

        let glob = SimpleGlob::parse("*-test-*").unwrap();
        assert!(glob.matches("a-test-b"));
        assert!(!glob.matches("a-tes-b"));
    }

    #[test]
    fn test_literal_and_declined() {
        let glob = SimpleGlob::parse("deploy").unwrap();
        assert!(glob.is_literal());
        assert!(glob.matches("deploy"));
        assert!(!glob.matches("deploys"));
        assert!(SimpleGlob::parse("{a,b}").is_none());
        assert!(SimpleGlob::parse("job-[0-9]").is_none());
    }
}

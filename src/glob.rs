//! Glob patterns compiled to anchored regular expressions.
//!
//! Directory configs may key their `files` entries by glob instead of by a
//! literal file name. The translation here is deliberately small and explicit;
//! patterns are matched against `/`-separated paths relative to the input root.
//!
//! # Syntax
//!
//! | Glob        | Regex              | Matches                                          |
//! |-------------|--------------------|--------------------------------------------------|
//! | `*`         | `([^/]*)`          | any run of characters inside one path segment    |
//! | `?`         | `([^/])`           | exactly one character other than `/`             |
//! | `**/`       | `((?:[^/]*/)*)`    | zero or more whole directories (segment start)   |
//! | `**` at end | `(.*)`             | the rest of the path, separators included        |
//! | `[abc]`     | `([abc&&[^/]])`    | one character from the class                     |
//! | `[!abc]`    | `([^abc/])`        | one character not in the class                   |
//!
//! `**` anywhere else behaves like `*`. Every other character matches itself.
//!
//! Each wildcard becomes one capture group, in pattern order, so
//! `textures/*_n.png` matched against `textures/rock_n.png` captures `["rock"]`.
//! Output path templates refer to these captures as `$1`, `$2`, ...

use regex::Regex;
use thiserror::Error;

/// Error compiling a glob pattern.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GlobError {
    /// A `[` without a matching `]`
    #[error("unclosed character class in glob '{0}'")]
    UnclosedClass(String),
    /// The translated expression was rejected by the regex engine
    #[error("invalid glob '{pattern}': {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compile a glob pattern.
    pub fn new(pattern: &str) -> Result<Self, GlobError> {
        let translated = translate(pattern)?;
        let regex = Regex::new(&translated)
            .map_err(|source| GlobError::Regex { pattern: pattern.to_string(), source })?;
        Ok(Self { source: pattern.to_string(), regex })
    }

    /// The original glob text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The anchored regular expression this glob compiled to.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Check whether a relative path matches.
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match a relative path, returning one string per wildcard.
    pub fn captures(&self, path: &str) -> Option<Vec<String>> {
        let caps = self.regex.captures(path)?;
        Some(
            caps.iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect(),
        )
    }
}

/// Check whether a config key should be treated as a glob.
pub fn is_glob(key: &str) -> bool {
    key.contains(['*', '?', '['])
}

/// Translate a glob into an anchored regular expression.
pub fn translate(pattern: &str) -> Result<String, GlobError> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from("^");
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' if chars.get(i + 1) == Some(&'*') => {
                let at_segment_start = i == 0 || chars[i - 1] == '/';
                if at_segment_start && chars.get(i + 2) == Some(&'/') {
                    out.push_str("((?:[^/]*/)*)");
                    i += 3;
                } else if at_segment_start && i + 2 == chars.len() {
                    out.push_str("(.*)");
                    i += 2;
                } else {
                    out.push_str("([^/]*)");
                    i += 2;
                }
                continue;
            }
            '*' => out.push_str("([^/]*)"),
            '?' => out.push_str("([^/])"),
            '[' => {
                let (class, next) = translate_class(&chars, i)
                    .ok_or_else(|| GlobError::UnclosedClass(pattern.to_string()))?;
                out.push_str(&class);
                i = next;
                continue;
            }
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
        i += 1;
    }

    out.push('$');
    Ok(out)
}

/// Translate the class starting at `chars[start] == '['`.
///
/// Returns the regex text and the index just past the closing `]`. A `]`
/// directly after `[` or `[!` is a literal member.
fn translate_class(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut i = start + 1;
    let negated = matches!(chars.get(i), Some('!') | Some('^'));
    if negated {
        i += 1;
    }

    let mut body = String::new();
    let mut first = true;
    loop {
        let c = *chars.get(i)?;
        if c == ']' && !first {
            break;
        }
        match c {
            '\\' | '[' | ']' | '^' | '&' | '~' => {
                body.push('\\');
                body.push(c);
            }
            _ => body.push(c),
        }
        first = false;
        i += 1;
    }

    let class = if negated { format!("([^{}/])", body) } else { format!("([{}&&[^/]])", body) };
    Some((class, i + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_glob() {
        assert!(is_glob("*.png"));
        assert!(is_glob("tex?.png"));
        assert!(is_glob("[ab].png"));
        assert!(!is_glob("textures/rock.png"));
    }

    #[test]
    fn test_star_stays_in_segment() {
        let glob = GlobPattern::new("*.png").unwrap();
        assert!(glob.is_match("rock.png"));
        assert!(!glob.is_match("textures/rock.png"));
        assert!(!glob.is_match("rock.png.bak"));
    }

    #[test]
    fn test_star_captures() {
        let glob = GlobPattern::new("textures/*_n.png").unwrap();
        assert_eq!(glob.captures("textures/rock_n.png"), Some(vec!["rock".to_string()]));
        assert_eq!(glob.captures("textures/rock.png"), None);
    }

    #[test]
    fn test_question_mark() {
        let glob = GlobPattern::new("lod?.mesh").unwrap();
        assert_eq!(glob.captures("lod0.mesh"), Some(vec!["0".to_string()]));
        assert!(!glob.is_match("lod10.mesh"));
        assert!(!glob.is_match("lod/.mesh"));
    }

    #[test]
    fn test_double_star_directories() {
        let glob = GlobPattern::new("**/*.glsl").unwrap();
        assert!(glob.is_match("basic.glsl"));
        assert!(glob.is_match("shaders/basic.glsl"));
        assert!(glob.is_match("shaders/post/blur.glsl"));
        assert_eq!(
            glob.captures("shaders/post/blur.glsl"),
            Some(vec!["shaders/post/".to_string(), "blur".to_string()])
        );
    }

    #[test]
    fn test_trailing_double_star() {
        let glob = GlobPattern::new("fonts/**").unwrap();
        assert!(glob.is_match("fonts/a.ttf"));
        assert!(glob.is_match("fonts/sub/b.ttf"));
        assert!(!glob.is_match("textures/a.png"));
    }

    #[test]
    fn test_double_star_mid_segment_is_single_star() {
        let glob = GlobPattern::new("a**b").unwrap();
        assert!(glob.is_match("axxb"));
        assert!(!glob.is_match("ax/xb"));
    }

    #[test]
    fn test_character_classes() {
        let glob = GlobPattern::new("[ab].txt").unwrap();
        assert!(glob.is_match("a.txt"));
        assert!(!glob.is_match("c.txt"));

        let negated = GlobPattern::new("[!ab].txt").unwrap();
        assert!(negated.is_match("c.txt"));
        assert!(!negated.is_match("a.txt"));

        let range = GlobPattern::new("v[0-9].bin").unwrap();
        assert!(range.is_match("v7.bin"));
        assert!(!range.is_match("vx.bin"));
    }

    #[test]
    fn test_class_never_matches_separator() {
        let glob = GlobPattern::new("a[/x]b").unwrap();
        assert!(glob.is_match("axb"));
        assert!(!glob.is_match("a/b"));
    }

    #[test]
    fn test_unclosed_class() {
        assert!(matches!(GlobPattern::new("[ab.txt"), Err(GlobError::UnclosedClass(_))));
    }

    #[test]
    fn test_literal_regex_characters() {
        let glob = GlobPattern::new("a+b (1).*").unwrap();
        assert!(glob.is_match("a+b (1).txt"));
        assert!(!glob.is_match("aab (1).txt"));
    }
}

//! Predicate matching.
//!
//! The only predicate this implementation ships is `Path`, a glob
//! matcher anchored to the full request path. `matchit`-style
//! parametric routing (`{param}`) is not what route definitions speak
//! here — the wire format is a glob string (`*` single segment, `**`
//! multi-segment, anywhere), so matching is done directly over path
//! segments rather than through a trie router.

use crate::error::GatewayError;
use crate::route::Predicate;

#[derive(Debug, Clone)]
pub enum CompiledPredicate {
    Path(PathGlob),
    Method(Vec<String>),
}

impl CompiledPredicate {
    pub fn compile(p: &Predicate) -> Result<Self, GatewayError> {
        match p.name.as_str() {
            "Path" => {
                let pattern = p.args.get("pattern").ok_or_else(|| {
                    GatewayError::Config(format!("Path predicate missing 'pattern' arg"))
                })?;
                Ok(CompiledPredicate::Path(PathGlob::new(pattern)))
            }
            "Method" => {
                let methods = p.args.get("methods").ok_or_else(|| {
                    GatewayError::Config("Method predicate missing 'methods' arg".into())
                })?;
                let list = methods
                    .split(',')
                    .map(|s| s.trim().to_ascii_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>();
                if list.is_empty() {
                    return Err(GatewayError::Config("Method predicate has no methods".into()));
                }
                Ok(CompiledPredicate::Method(list))
            }
            other => Err(GatewayError::Config(format!("unknown predicate: {other}"))),
        }
    }

    pub fn matches(&self, method: &str, path: &str) -> bool {
        match self {
            CompiledPredicate::Path(g) => g.matches(path),
            CompiledPredicate::Method(list) => list.iter().any(|m| m == method),
        }
    }
}

/// A `/`-segmented glob: `*` matches exactly one segment, `**`
/// matches zero or more trailing segments. Anchored to the whole path
/// (no partial-prefix matches unless the pattern itself ends in `**`).
#[derive(Debug, Clone)]
pub struct PathGlob {
    segments: Vec<String>,
}

impl PathGlob {
    pub fn new(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();
        Self { segments }
    }

    pub fn matches(&self, path: &str) -> bool {
        let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        Self::match_segments(&self.segments, &path_segments)
    }

    fn match_segments(pattern: &[String], path: &[&str]) -> bool {
        match pattern.first() {
            None => path.is_empty(),
            Some(seg) if seg == "**" => {
                if pattern.len() == 1 {
                    return true;
                }
                // Try consuming 0..=path.len() segments as the "**" span.
                for i in 0..=path.len() {
                    if Self::match_segments(&pattern[1..], &path[i..]) {
                        return true;
                    }
                }
                false
            }
            Some(seg) if seg == "*" => {
                if path.is_empty() {
                    return false;
                }
                Self::match_segments(&pattern[1..], &path[1..])
            }
            Some(seg) => {
                if path.first() != Some(&seg.as_str()) {
                    return false;
                }
                Self::match_segments(&pattern[1..], &path[1..])
            }
        }
    }
}

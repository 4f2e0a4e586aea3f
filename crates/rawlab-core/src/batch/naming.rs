//! Output naming templates and destination conflict handling.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{NamingError, PipelineError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Stem,
    Index,
    Ext,
}

/// A parsed output file name template.
///
/// Tokens: `{stem}` (source file stem), `{index}` (1-based job index padded
/// to four digits), `{ext}` (source extension, lowercase). The output
/// extension is appended separately from the output format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NamingRule {
    template: String,
    segments: Vec<Segment>,
}

impl NamingRule {
    pub const DEFAULT_TEMPLATE: &'static str = "{stem}_edited";

    pub fn parse(template: &str) -> Result<Self, NamingError> {
        if template.trim().is_empty() {
            return Err(NamingError::Empty);
        }
        if template.contains('/') || template.contains('\\') {
            return Err(NamingError::PathSeparator(template.to_string()));
        }

        let mut segments = Vec::new();
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| NamingError::Unclosed(template.to_string()))?;
            let token = &after[..close];
            segments.push(match token {
                "stem" => Segment::Stem,
                "index" => Segment::Index,
                "ext" => Segment::Ext,
                other => {
                    return Err(NamingError::UnknownToken {
                        token: other.to_string(),
                    })
                }
            });
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            template: template.to_string(),
            segments,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render the file name (without output extension).
    pub fn render(&self, stem: &str, index: usize, ext: &str) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Stem => out.push_str(stem),
                Segment::Index => out.push_str(&format!("{:04}", index)),
                Segment::Ext => out.push_str(&ext.to_lowercase()),
            }
        }
        out
    }

    /// Render for a source path, taking stem and extension from it.
    pub fn render_for(&self, source: &Path, index: usize) -> String {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let ext = source
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.render(&stem, index, &ext)
    }
}

impl Default for NamingRule {
    fn default() -> Self {
        Self {
            template: Self::DEFAULT_TEMPLATE.to_string(),
            segments: vec![Segment::Stem, Segment::Literal("_edited".to_string())],
        }
    }
}

impl fmt::Display for NamingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

impl TryFrom<String> for NamingRule {
    type Error = NamingError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<NamingRule> for String {
    fn from(rule: NamingRule) -> Self {
        rule.template
    }
}

/// What to do when an output file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Replace the existing file
    Overwrite,
    /// Leave the existing file and report the job as skipped
    Skip,
    /// Append `-1`, `-2`, … until the name is free
    #[default]
    AutoRename,
    /// Report the job as failed
    Fail,
}

impl ConflictPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "overwrite" => Some(Self::Overwrite),
            "skip" => Some(Self::Skip),
            "auto_rename" | "rename" => Some(Self::AutoRename),
            "fail" => Some(Self::Fail),
            _ => None,
        }
    }
}

/// Highest `-N` suffix tried before auto-rename gives up.
const MAX_RENAME_SUFFIX: u32 = 9999;

/// Where a job's output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Write(PathBuf),
    Skip(PathBuf),
}

/// Choose and reserve the destination for `name.ext` in `dir`.
///
/// `reserved` holds every path already claimed in this run, so two jobs never
/// write the same file even under [`ConflictPolicy::Overwrite`]: a name taken
/// earlier in the run is renumbered instead of clobbered.
pub fn resolve_destination(
    policy: ConflictPolicy,
    dir: &Path,
    name: &str,
    ext: &str,
    reserved: &mut HashSet<PathBuf>,
) -> Result<Destination, PipelineError> {
    let candidate = dir.join(format!("{name}.{ext}"));
    let on_disk = candidate.exists();
    let claimed = reserved.contains(&candidate);

    let chosen = match policy {
        ConflictPolicy::Overwrite if !claimed => candidate,
        ConflictPolicy::Skip if on_disk || claimed => return Ok(Destination::Skip(candidate)),
        ConflictPolicy::Fail if on_disk || claimed => {
            return Err(PipelineError::DestinationConflict(candidate))
        }
        ConflictPolicy::Skip | ConflictPolicy::Fail => candidate,
        ConflictPolicy::Overwrite | ConflictPolicy::AutoRename => {
            if !on_disk && !claimed {
                candidate
            } else {
                (1..=MAX_RENAME_SUFFIX)
                    .map(|n| dir.join(format!("{name}-{n}.{ext}")))
                    .find(|p| !p.exists() && !reserved.contains(p))
                    .ok_or(PipelineError::DestinationConflict(candidate))?
            }
        }
    };

    reserved.insert(chosen.clone());
    Ok(Destination::Write(chosen))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template() {
        let rule = NamingRule::default();
        assert_eq!(rule, NamingRule::parse("{stem}_edited").unwrap());
        assert_eq!(rule.render_for(Path::new("/a/DSC_0001.NEF"), 1), "DSC_0001_edited");
    }

    #[test]
    fn test_all_tokens() {
        let rule = NamingRule::parse("{index}-{stem}.{ext}").unwrap();
        assert_eq!(rule.render("beach", 7, "CR2"), "0007-beach.cr2");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(NamingRule::parse("  "), Err(NamingError::Empty));
        assert!(matches!(
            NamingRule::parse("out/{stem}"),
            Err(NamingError::PathSeparator(_))
        ));
        assert_eq!(
            NamingRule::parse("{stem}_{date}"),
            Err(NamingError::UnknownToken {
                token: "date".into()
            })
        );
        assert!(matches!(
            NamingRule::parse("{stem"),
            Err(NamingError::Unclosed(_))
        ));
    }

    #[test]
    fn test_naming_rule_serde() {
        let rule: NamingRule = serde_json::from_str(r#""{stem}-final""#).unwrap();
        assert_eq!(rule.render("x", 1, "png"), "x-final");
        assert_eq!(serde_json::to_string(&rule).unwrap(), r#""{stem}-final""#);
        assert!(serde_json::from_str::<NamingRule>(r#""{nope}""#).is_err());
    }

    #[test]
    fn test_conflict_policy_parse() {
        assert_eq!(ConflictPolicy::parse("auto-rename"), Some(ConflictPolicy::AutoRename));
        assert_eq!(ConflictPolicy::parse("SKIP"), Some(ConflictPolicy::Skip));
        assert_eq!(ConflictPolicy::parse("merge"), None);
    }

    #[test]
    fn test_auto_rename_skips_existing_and_reserved() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"old").unwrap();
        let mut reserved = HashSet::new();
        reserved.insert(dir.path().join("a-1.jpg"));

        let dest =
            resolve_destination(ConflictPolicy::AutoRename, dir.path(), "a", "jpg", &mut reserved)
                .unwrap();
        assert_eq!(dest, Destination::Write(dir.path().join("a-2.jpg")));
        assert!(reserved.contains(&dir.path().join("a-2.jpg")));
    }

    #[test]
    fn test_skip_and_fail_policies() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"old").unwrap();
        let mut reserved = HashSet::new();

        let skip =
            resolve_destination(ConflictPolicy::Skip, dir.path(), "a", "png", &mut reserved)
                .unwrap();
        assert_eq!(skip, Destination::Skip(dir.path().join("a.png")));

        let fail = resolve_destination(ConflictPolicy::Fail, dir.path(), "a", "png", &mut reserved)
            .unwrap_err();
        assert_eq!(fail.kind(), "destination_conflict");

        let free = resolve_destination(ConflictPolicy::Fail, dir.path(), "b", "png", &mut reserved)
            .unwrap();
        assert_eq!(free, Destination::Write(dir.path().join("b.png")));
    }

    #[test]
    fn test_overwrite_reuses_existing_but_not_reserved() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.tif"), b"old").unwrap();
        let mut reserved = HashSet::new();

        let first =
            resolve_destination(ConflictPolicy::Overwrite, dir.path(), "a", "tif", &mut reserved)
                .unwrap();
        assert_eq!(first, Destination::Write(dir.path().join("a.tif")));
        let second =
            resolve_destination(ConflictPolicy::Overwrite, dir.path(), "a", "tif", &mut reserved)
                .unwrap();
        assert_eq!(second, Destination::Write(dir.path().join("a-1.tif")));
    }

    #[test]
    fn test_auto_rename_gives_up_when_suffixes_run_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut reserved: HashSet<PathBuf> = (1..=MAX_RENAME_SUFFIX)
            .map(|n| dir.path().join(format!("a-{n}.png")))
            .collect();
        reserved.insert(dir.path().join("a.png"));

        let err =
            resolve_destination(ConflictPolicy::AutoRename, dir.path(), "a", "png", &mut reserved)
                .unwrap_err();
        assert_eq!(err.kind(), "destination_conflict");
        assert!(err.to_string().contains("a.png"));
    }
}

//! BitBake configuration file parsers
//!
//! Parsers for bblayers.conf and layer.conf style files. Only plain variable
//! assignments are evaluated; `include`, `require`, `inherit` and function
//! bodies are skipped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

/// Assignment operators understood by [`ConfFile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssignOp {
    /// `=`
    Set,
    /// `:=`
    Immediate,
    /// `?=`
    Default,
    /// `??=`
    WeakDefault,
    /// `+=`
    Append,
    /// `=+`
    Prepend,
    /// `.=`
    AppendNoSpace,
    /// `=.`
    PrependNoSpace,
}

impl AssignOp {
    // Longest operators first so `??=` is not read as `?=`.
    const TABLE: [(&'static str, AssignOp); 8] = [
        ("??=", AssignOp::WeakDefault),
        ("?=", AssignOp::Default),
        (":=", AssignOp::Immediate),
        ("+=", AssignOp::Append),
        ("=+", AssignOp::Prepend),
        (".=", AssignOp::AppendNoSpace),
        ("=.", AssignOp::PrependNoSpace),
        ("=", AssignOp::Set),
    ];
}

/// Variables assigned in a single BitBake configuration file
#[derive(Debug, Clone, Default)]
pub struct ConfFile {
    /// File the variables were read from, if any
    pub path: Option<PathBuf>,
    /// Final variable values
    pub variables: HashMap<String, String>,
}

impl ConfFile {
    /// Parse a configuration file from disk
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

        let mut conf = Self::parse_str(&content)?;
        conf.path = Some(path.to_path_buf());
        Ok(conf)
    }

    /// Parse configuration text
    pub fn parse_str(content: &str) -> Result<Self, String> {
        let mut variables: HashMap<String, String> = HashMap::new();
        let mut weak: HashMap<String, String> = HashMap::new();

        for (lineno, line) in logical_lines(content) {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((name, op, value)) = split_assignment(line) else {
                trace!("Skipping line {}: {}", lineno, line);
                continue;
            };

            let value = unquote(value).map_err(|e| format!("line {lineno}: {e}"))?;

            // VAR:append / VAR:prepend are folded into the base variable
            let (name, op) = match name.split_once(':') {
                Some((base, "append")) => (base, AssignOp::AppendNoSpace),
                Some((base, "prepend")) => (base, AssignOp::PrependNoSpace),
                _ => (name, op),
            };

            apply(&mut variables, &mut weak, name, op, value);
        }

        for (name, value) in weak {
            variables.entry(name).or_insert(value);
        }

        Ok(ConfFile {
            path: None,
            variables,
        })
    }

    /// Get a variable value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }
}

fn apply(
    variables: &mut HashMap<String, String>,
    weak: &mut HashMap<String, String>,
    name: &str,
    op: AssignOp,
    value: String,
) {
    match op {
        AssignOp::Set | AssignOp::Immediate => {
            variables.insert(name.to_string(), value);
        }
        AssignOp::Default => {
            variables.entry(name.to_string()).or_insert(value);
        }
        AssignOp::WeakDefault => {
            weak.entry(name.to_string()).or_insert(value);
        }
        AssignOp::Append | AssignOp::AppendNoSpace => {
            let current = variables
                .entry(name.to_string())
                .or_insert_with(|| weak.get(name).cloned().unwrap_or_default());
            if op == AssignOp::Append && !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&value);
        }
        AssignOp::Prepend | AssignOp::PrependNoSpace => {
            let current = variables
                .entry(name.to_string())
                .or_insert_with(|| weak.get(name).cloned().unwrap_or_default());
            let sep = if op == AssignOp::Prepend && !current.is_empty() {
                " "
            } else {
                ""
            };
            *current = format!("{value}{sep}{current}");
        }
    }
}

/// Join backslash-continued lines, keeping the number of the first physical line
fn logical_lines(content: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (idx, raw) in content.lines().enumerate() {
        let (start, mut buf) = pending.take().unwrap_or((idx + 1, String::new()));
        match raw.trim_end().strip_suffix('\\') {
            Some(head) => {
                buf.push_str(head);
                buf.push(' ');
                pending = Some((start, buf));
            }
            None => {
                buf.push_str(raw);
                lines.push((start, buf));
            }
        }
    }

    if let Some(rest) = pending {
        lines.push(rest);
    }

    lines
}

fn split_assignment(line: &str) -> Option<(&str, AssignOp, &str)> {
    let line = line.strip_prefix("export ").unwrap_or(line).trim_start();

    let name_end = line
        .find(|c: char| !(c.is_ascii_alphanumeric() || "_-:${}/.+~".contains(c)))
        .unwrap_or(line.len());
    let mut name = &line[..name_end];
    let mut rest = line[name_end..].trim_start();

    // A trailing `.`, `+` or `:` on the name belongs to the operator (`FOO.= "x"`)
    if let Some(stripped) = name
        .strip_suffix('.')
        .or_else(|| name.strip_suffix('+'))
        .or_else(|| name.strip_suffix(':'))
    {
        rest = line[stripped.len()..].trim_start();
        name = stripped;
    }

    if name.is_empty() {
        return None;
    }

    for (token, op) in AssignOp::TABLE {
        if let Some(value) = rest.strip_prefix(token) {
            return Some((name, op, value.trim()));
        }
    }

    None
}

fn unquote(value: &str) -> Result<String, String> {
    let mut chars = value.chars();
    match chars.next() {
        Some(q @ ('"' | '\'')) => {
            let body = &value[1..];
            let end = body
                .rfind(q)
                .ok_or_else(|| format!("unterminated quote in {value}"))?;
            Ok(body[..end].to_string())
        }
        _ => Ok(value.to_string()),
    }
}

/// Configuration from bblayers.conf
#[derive(Debug, Clone)]
pub struct BbLayersConfig {
    /// List of layer paths from BBLAYERS, in configured order
    pub bblayers: Vec<PathBuf>,
    /// BBPATH value (usually "${TOPDIR}")
    pub bbpath: Option<String>,
    /// All variables from the file
    pub variables: HashMap<String, String>,
}

impl BbLayersConfig {
    /// Parse a bblayers.conf file
    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        info!("Parsing bblayers.conf: {:?}", path);

        let conf = ConfFile::parse_file(path)?;

        let bblayers_str = conf
            .variables
            .get("BBLAYERS")
            .ok_or("BBLAYERS variable not found in bblayers.conf")?;

        let bblayers: Vec<PathBuf> = bblayers_str
            .split_whitespace()
            .filter(|s| !s.is_empty() && *s != "\\")
            .map(PathBuf::from)
            .collect();

        debug!("Found {} layers in BBLAYERS", bblayers.len());

        let bbpath = conf.variables.get("BBPATH").cloned();

        Ok(BbLayersConfig {
            bblayers,
            bbpath,
            variables: conf.variables,
        })
    }
}

/// Variable expander for ${VAR} syntax
#[derive(Debug, Clone, Default)]
pub struct VariableExpander {
    variables: HashMap<String, String>,
}

impl VariableExpander {
    /// Create a new variable expander
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    /// Get a variable value
    pub fn get(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }

    /// Expand variables in a string
    ///
    /// Replaces ${VAR} with variable values. Supports nested expansion.
    /// Unknown references are left untouched.
    pub fn expand(&self, input: &str) -> String {
        const MAX_ITERATIONS: usize = 100;

        let mut result = input.to_string();
        let mut iterations = 0;

        loop {
            iterations += 1;
            if iterations > MAX_ITERATIONS {
                tracing::warn!("Variable expansion hit max iterations for: {}", input);
                break;
            }

            let mut substituted = false;
            let mut pos = 0;
            while let Some(start) = result[pos..].find("${") {
                let abs_start = pos + start;
                let Some(end_pos) = result[abs_start + 2..].find('}') else {
                    break;
                };
                let abs_end = abs_start + 2 + end_pos;
                // Innermost reference closed by this brace, so ${${A}} resolves ${A} first
                let ref_start = result[abs_start..abs_end]
                    .rfind("${")
                    .map_or(abs_start, |offset| abs_start + offset);
                let var_name = &result[ref_start + 2..abs_end];

                if let Some(value) = self.variables.get(var_name) {
                    result.replace_range(ref_start..=abs_end, value);
                    substituted = true;
                    // Start over, the value may contain references itself
                    break;
                }
                pos = abs_end + 1;
            }

            if !substituted {
                break;
            }
        }

        result
    }

    /// Expand variables in a path
    pub fn expand_path(&self, path: &Path) -> PathBuf {
        let path_str = path.to_string_lossy();
        PathBuf::from(self.expand(&path_str))
    }

    /// Expand a list of paths
    pub fn expand_paths(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        paths.iter().map(|p| self.expand_path(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_variable_expander() {
        let mut expander = VariableExpander::new();
        expander.set("TOPDIR", "/home/user/build");
        expander.set("MACHINE", "qemux86-64");

        assert_eq!(
            expander.expand("${TOPDIR}/downloads"),
            "/home/user/build/downloads"
        );
        assert_eq!(
            expander.expand("${TOPDIR}/tmp/${MACHINE}"),
            "/home/user/build/tmp/qemux86-64"
        );
        assert_eq!(expander.expand("no variables here"), "no variables here");
    }

    #[test]
    fn test_nested_expansion() {
        let mut expander = VariableExpander::new();
        expander.set("A", "B");
        expander.set("B", "value");

        assert_eq!(expander.expand("${${A}}"), "value");
        assert_eq!(expander.expand("${TOPDIR}/${${A}}/x"), "${TOPDIR}/value/x");
    }

    #[test]
    fn test_nested_unknown_reference_kept() {
        let mut expander = VariableExpander::new();
        expander.set("A", "MISSING");

        assert_eq!(expander.expand("${${A}}"), "${MISSING}");
        assert_eq!(expander.expand("${${X}}"), "${${X}}");
    }

    #[test]
    fn test_unknown_variable_kept() {
        let mut expander = VariableExpander::new();
        expander.set("TOPDIR", "/build");

        assert_eq!(
            expander.expand("${OEROOT}/meta ${TOPDIR}"),
            "${OEROOT}/meta /build"
        );
    }

    #[test]
    fn test_self_reference_terminates() {
        let mut expander = VariableExpander::new();
        expander.set("LOOP", "${LOOP}x");

        let expanded = expander.expand("${LOOP}");
        assert!(expanded.starts_with("${LOOP}"));
    }

    #[test]
    fn test_assignment_operators() {
        let conf = ConfFile::parse_str(
            r#"
# comment
A = "one"
A += "two"
B = "mid"
B =+ "front"
C = "x"
C .= "y"
D = "b"
D =. "a"
E ?= "first"
E ?= "second"
F ??= "weak"
F = "strong"
G ??= "only-weak"
H := "immediate"
export I = "exported"
"#,
        )
        .unwrap();

        assert_eq!(conf.get("A"), Some("one two"));
        assert_eq!(conf.get("B"), Some("front mid"));
        assert_eq!(conf.get("C"), Some("xy"));
        assert_eq!(conf.get("D"), Some("ab"));
        assert_eq!(conf.get("E"), Some("first"));
        assert_eq!(conf.get("F"), Some("strong"));
        assert_eq!(conf.get("G"), Some("only-weak"));
        assert_eq!(conf.get("H"), Some("immediate"));
        assert_eq!(conf.get("I"), Some("exported"));
    }

    #[test]
    fn test_append_override_syntax() {
        let conf = ConfFile::parse_str(
            r#"
BBFILES = "a.bb"
BBFILES:append = " b.bb"
BBPATH:prepend = "/x:"
"#,
        )
        .unwrap();

        assert_eq!(conf.get("BBFILES"), Some("a.bb b.bb"));
        assert_eq!(conf.get("BBPATH"), Some("/x:"));
    }

    #[test]
    fn test_non_assignments_skipped() {
        let conf = ConfFile::parse_str(
            r#"
include conf/distro/include/foo.inc
require bar.inc
inherit cmake
VAR = 'single quoted'
"#,
        )
        .unwrap();

        assert_eq!(conf.variables.len(), 1);
        assert_eq!(conf.get("VAR"), Some("single quoted"));
    }

    #[test]
    fn test_unterminated_quote_is_error() {
        let err = ConfFile::parse_str("A = \"open\n").unwrap_err();
        assert!(err.contains("line 1"));
    }

    #[test]
    fn test_bblayers_conf_parse() {
        let temp_dir = TempDir::new().unwrap();
        let conf_path = temp_dir.path().join("bblayers.conf");

        let content = r#"
POKY_BBLAYERS_CONF_VERSION = "2"
BBPATH = "${TOPDIR}"
BBFILES ?= ""

BBLAYERS ?= " \
  /path/to/meta \
  /path/to/meta-poky \
  /path/to/meta-yocto-bsp \
  "
"#;

        fs::write(&conf_path, content).unwrap();

        let config = BbLayersConfig::parse(&conf_path).unwrap();

        assert_eq!(config.bblayers.len(), 3);
        assert_eq!(config.bblayers[0], PathBuf::from("/path/to/meta"));
        assert_eq!(config.bblayers[2], PathBuf::from("/path/to/meta-yocto-bsp"));
        assert_eq!(config.bbpath, Some("${TOPDIR}".to_string()));
    }

    #[test]
    fn test_bblayers_missing_variable() {
        let temp_dir = TempDir::new().unwrap();
        let conf_path = temp_dir.path().join("bblayers.conf");
        fs::write(&conf_path, "BBPATH = \"${TOPDIR}\"\n").unwrap();

        let err = BbLayersConfig::parse(&conf_path).unwrap_err();
        assert!(err.contains("BBLAYERS"));
    }

    #[test]
    fn test_expand_path() {
        let mut expander = VariableExpander::new();
        expander.set("TOPDIR", "/home/user/build");

        let path = PathBuf::from("${TOPDIR}/downloads");
        let expanded = expander.expand_path(&path);

        assert_eq!(expanded, PathBuf::from("/home/user/build/downloads"));
    }
}

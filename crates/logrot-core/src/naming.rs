//! Archive directory and rotated filename derivation
//!
//! A [`PathNamer`] is built once per group run around a fixed rotation
//! timestamp, so every file rotated in that run lands in the same dated
//! directory with the same marker.

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::NamingTemplates;

/// Matches brace escapes, `{field}` placeholders and stray braces
static TEMPLATE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{|\}\}|\{([^{}]*)\}|[{}]").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    LogName,
    Timestamp,
    Hostname,
}

/// Parsed `fnformat` template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameTemplate {
    segments: Vec<Segment>,
}

impl FilenameTemplate {
    /// Parse a template with `{logname}`, `{timestamp}` and `{hostname}` fields
    pub fn parse(template: &str) -> Result<Self> {
        if template.is_empty() {
            return Err(Error::config("'fnformat' cannot be empty"));
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut last = 0;

        for caps in TEMPLATE_TOKEN.captures_iter(template) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            literal.push_str(&template[last..whole.start()]);
            last = whole.end();

            let field = match whole.as_str() {
                "{{" => {
                    literal.push('{');
                    continue;
                }
                "}}" => {
                    literal.push('}');
                    continue;
                }
                "{" | "}" => {
                    return Err(Error::template(format!(
                        "unbalanced brace in '{}'",
                        template
                    )))
                }
                _ => caps.get(1).map(|m| m.as_str()).unwrap_or_default(),
            };

            let segment = match field {
                "logname" => Segment::LogName,
                "timestamp" => Segment::Timestamp,
                "hostname" => Segment::Hostname,
                other => {
                    return Err(Error::template(format!(
                        "unknown field '{{{}}}' in '{}'",
                        other, template
                    )))
                }
            };
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(segment);
        }

        literal.push_str(&template[last..]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Render the template
    pub fn render(&self, logname: &str, timestamp: &str, hostname: &str) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::LogName => out.push_str(logname),
                Segment::Timestamp => out.push_str(timestamp),
                Segment::Hostname => out.push_str(hostname),
            }
        }
        out
    }
}

/// Reject strftime patterns chrono cannot format
pub fn validate_strftime(key: &str, pattern: &str) -> Result<()> {
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(Error::template(format!(
            "'{}' has an invalid strftime pattern: '{}'",
            key, pattern
        )));
    }
    Ok(())
}

/// Derives archive directories and destination paths for one rotation run
#[derive(Debug, Clone)]
pub struct PathNamer {
    now: NaiveDateTime,
    dateformat: String,
    destext: String,
    fnformat: FilenameTemplate,
    hostname: String,
    timestamp: String,
}

impl PathNamer {
    /// Create a namer for the given rotation timestamp
    pub fn new(templates: &NamingTemplates, now: NaiveDateTime, hostname: impl Into<String>) -> Result<Self> {
        validate_strftime("dateformat", &templates.dateformat)?;
        validate_strftime("destext", &templates.destext)?;
        let fnformat = FilenameTemplate::parse(&templates.fnformat)?;
        let timestamp = now.format(&templates.dateformat).to_string();

        Ok(Self {
            now,
            dateformat: templates.dateformat.clone(),
            destext: templates.destext.clone(),
            fnformat,
            hostname: hostname.into(),
            timestamp,
        })
    }

    /// Create a namer using this machine's host name
    pub fn for_local_host(templates: &NamingTemplates, now: NaiveDateTime) -> Result<Self> {
        Self::new(templates, now, crate::fs::hostname())
    }

    /// The rotation timestamp shared by every file of the run
    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// The rendered `{timestamp}` marker
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Archive directory for a source path: `<source>-<destext>`
    pub fn archive_dir(&self, source: &Path) -> PathBuf {
        let mut dir: OsString = source.as_os_str().to_os_string();
        dir.push("-");
        dir.push(self.now.format(&self.destext).to_string());
        PathBuf::from(dir)
    }

    /// Destination of a source path inside its archive directory
    pub fn dest_path(&self, source: &Path) -> PathBuf {
        let logname = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let filename = self
            .fnformat
            .render(&logname, &self.timestamp, &self.hostname);
        self.archive_dir(source).join(filename)
    }

    /// Re-derive the rotation time embedded in a rotated filename.
    ///
    /// `suffix` (the compressed extension) is stripped first; the marker is the
    /// text after the last `-`. Returns `None` when it does not parse.
    pub fn rotated_time(&self, path: &Path, suffix: Option<&str>) -> Option<NaiveDateTime> {
        let name = path.file_name()?.to_str()?;
        let name = suffix
            .filter(|s| !s.is_empty())
            .and_then(|s| name.strip_suffix(s))
            .unwrap_or(name);
        let (_, marker) = name.rsplit_once('-')?;
        parse_marker(marker, &self.dateformat)
    }
}

fn parse_marker(marker: &str, dateformat: &str) -> Option<NaiveDateTime> {
    if marker.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(marker, dateformat)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(marker, dateformat)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn templates(fnformat: &str) -> NamingTemplates {
        NamingTemplates {
            dateformat: "%Y%m%d%H%M%S".to_string(),
            destext: "rotates/%Y%m/%d".to_string(),
            fnformat: fnformat.to_string(),
        }
    }

    fn frozen() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2017, 11, 13)
            .unwrap()
            .and_hms_opt(11, 22, 33)
            .unwrap()
    }

    #[test]
    fn test_dest_path_with_timestamp() {
        let namer = PathNamer::new(&templates("{logname}-{timestamp}"), frozen(), "web1").unwrap();
        assert_eq!(
            namer.dest_path(Path::new("access.log")),
            PathBuf::from("access.log-rotates/201711/13/access.log-20171113112233")
        );
    }

    #[test]
    fn test_dest_path_logname_only() {
        let namer = PathNamer::new(&templates("{logname}"), frozen(), "web1").unwrap();
        assert_eq!(
            namer.dest_path(Path::new("access.log")),
            PathBuf::from("access.log-rotates/201711/13/access.log")
        );
    }

    #[test]
    fn test_dest_path_with_hostname() {
        let namer =
            PathNamer::new(&templates("{logname}-{timestamp}.{hostname}"), frozen(), "web1").unwrap();
        assert_eq!(
            namer.dest_path(Path::new("/tmp/nginx/access.log")),
            PathBuf::from("/tmp/nginx/access.log-rotates/201711/13/access.log-20171113112233.web1")
        );
    }

    #[test]
    fn test_dest_path_is_deterministic() {
        let namer = PathNamer::new(&templates("{logname}-{timestamp}"), frozen(), "web1").unwrap();
        let source = Path::new("/var/log/app.log");
        assert_eq!(namer.dest_path(source), namer.dest_path(source));
    }

    #[test]
    fn test_brace_escapes() {
        let template = FilenameTemplate::parse("{{{logname}}}").unwrap();
        assert_eq!(template.render("a.log", "1", "h"), "{a.log}");
    }

    #[test]
    fn test_empty_fnformat_rejected() {
        let result = PathNamer::new(&templates(""), frozen(), "web1");
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = FilenameTemplate::parse("{logname}-{date}");
        assert!(matches!(result, Err(Error::InvalidTemplate(_))));
    }

    #[test]
    fn test_unbalanced_brace_rejected() {
        assert!(FilenameTemplate::parse("{logname").is_err());
        assert!(FilenameTemplate::parse("logname}").is_err());
    }

    #[test]
    fn test_invalid_strftime_rejected() {
        let mut t = templates("{logname}");
        t.destext = "rotates/%Q".to_string();
        assert!(PathNamer::new(&t, frozen(), "web1").is_err());
    }

    #[test]
    fn test_rotated_time() {
        let namer = PathNamer::new(&templates("{logname}-{timestamp}"), frozen(), "web1").unwrap();
        let expected = NaiveDate::from_ymd_opt(2016, 9, 10)
            .unwrap()
            .and_hms_opt(10, 10, 30)
            .unwrap();
        assert_eq!(
            namer.rotated_time(Path::new("/var/log/nginx/access.log-20160910101030"), None),
            Some(expected)
        );
        assert_eq!(
            namer.rotated_time(Path::new("/var/log/nginx/access.log-20160910101030.gz"), Some(".gz")),
            Some(expected)
        );
    }

    #[test]
    fn test_rotated_time_rejects_malformed_markers() {
        let namer = PathNamer::new(&templates("{logname}-{timestamp}"), frozen(), "web1").unwrap();
        assert_eq!(namer.rotated_time(Path::new("/var/log/nginx/access.log-20160910-1010301"), None), None);
        assert_eq!(namer.rotated_time(Path::new("/var/log/nginx/access.log-201609101"), None), None);
        assert_eq!(namer.rotated_time(Path::new("/var/log/nginx/access.log201609101"), None), None);
    }

    #[test]
    fn test_rotated_time_date_only_format() {
        let mut t = templates("{logname}-{timestamp}");
        t.dateformat = "%Y%m%d".to_string();
        let namer = PathNamer::new(&t, frozen(), "web1").unwrap();
        assert_eq!(namer.timestamp(), "20171113");
        assert_eq!(
            namer.rotated_time(Path::new("app.log-20171113"), None),
            NaiveDate::from_ymd_opt(2017, 11, 13).unwrap().and_hms_opt(0, 0, 0)
        );
    }
}

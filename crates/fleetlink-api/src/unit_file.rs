// systemd unit file text <-> ordered option list.
//
// The registry stores unit bodies as serialized unit files keyed by the
// SHA-1 of their bytes, so serialization must be byte-stable: one
// `[Section]` header per run of same-section options, `Name=Value` lines,
// and a blank line between sections.

use sha1::{Digest, Sha1};

use crate::error::Error;
use crate::models::UnitOption;

/// Render options as unit file text.
pub fn serialize(options: &[UnitOption]) -> String {
    let mut out = String::new();
    let mut current: Option<&str> = None;
    for opt in options {
        if current != Some(opt.section.as_str()) {
            if current.is_some() {
                out.push('\n');
            }
            out.push('[');
            out.push_str(&opt.section);
            out.push_str("]\n");
            current = Some(&opt.section);
        }
        out.push_str(&opt.name);
        out.push('=');
        out.push_str(&opt.value);
        out.push('\n');
    }
    out
}

/// Parse unit file text into options, in file order.
pub fn parse(text: &str) -> Result<Vec<UnitOption>, Error> {
    let mut options = Vec::new();
    let mut section: Option<String> = None;
    let mut lines = text.lines().enumerate();

    while let Some((idx, raw)) = lines.next() {
        let line_no = idx + 1;
        let mut line = raw.trim().to_owned();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        while line.ends_with('\\') {
            line.pop();
            match lines.next() {
                Some((_, next)) => {
                    line.push(' ');
                    line.push_str(next.trim());
                }
                None => break,
            }
        }

        if let Some(rest) = line.strip_prefix('[') {
            let name = rest.strip_suffix(']').ok_or_else(|| Error::UnitFile {
                line: line_no,
                reason: "unterminated section header".into(),
            })?;
            if name.is_empty() {
                return Err(Error::UnitFile {
                    line: line_no,
                    reason: "empty section name".into(),
                });
            }
            section = Some(name.to_owned());
            continue;
        }

        let Some(current) = section.as_deref() else {
            return Err(Error::UnitFile {
                line: line_no,
                reason: "option outside of any section".into(),
            });
        };
        let (name, value) = line.split_once('=').ok_or_else(|| Error::UnitFile {
            line: line_no,
            reason: format!("expected Name=Value, got {line:?}"),
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::UnitFile {
                line: line_no,
                reason: "empty option name".into(),
            });
        }
        options.push(UnitOption::new(current, name, value.trim()));
    }

    Ok(options)
}

/// SHA-1 of the serialized unit file.
pub fn hash(options: &[UnitOption]) -> [u8; 20] {
    Sha1::digest(serialize(options).as_bytes()).into()
}

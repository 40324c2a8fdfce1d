//! Marker extraction from server-rendered HTML.
//!
//! Plain string search over the body. The format is untrusted but well known,
//! so a full HTML parser buys nothing here.

use crate::probe::types::Markers;

/// Markers plus the asset references they were derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scan {
    pub markers: Markers,
    /// Script sources followed by stylesheet hrefs, in document order.
    pub asset_refs: Vec<String>,
}

/// Scan a body for the mount point and script/stylesheet references.
pub fn scan(body: &str, mount_markers: &[String]) -> Scan {
    let lower = body.to_ascii_lowercase();

    let mount_point = mount_markers.iter().any(|m| body.contains(m.as_str()));

    let scripts: Vec<String> = tags(body, &lower, "script")
        .filter_map(|(tag, tag_lower)| attr_value(tag, tag_lower, "src"))
        .collect();

    let stylesheets: Vec<String> = tags(body, &lower, "link")
        .filter(|(tag, tag_lower)| {
            attr_value(tag, tag_lower, "rel")
                .map(|rel| rel.to_ascii_lowercase().contains("stylesheet"))
                .unwrap_or(false)
        })
        .filter_map(|(tag, tag_lower)| attr_value(tag, tag_lower, "href"))
        .collect();

    let markers = Markers {
        mount_point,
        script_refs: scripts.len(),
        stylesheet_refs: stylesheets.len(),
    };

    let mut asset_refs = scripts;
    asset_refs.extend(stylesheets);

    Scan { markers, asset_refs }
}

/// Iterate over opening tags named `name`, yielding the original and the
/// lowercased text between `<name` and the closing `>`.
fn tags<'a>(
    body: &'a str,
    lower: &'a str,
    name: &'a str,
) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
    let needle = format!("<{}", name);
    let mut pos = 0;

    std::iter::from_fn(move || loop {
        let start = pos + lower[pos..].find(&needle)?;
        let after = start + needle.len();
        pos = after;

        // `<scripts>` or `<linked>` are different elements
        match lower[after..].chars().next() {
            Some(c) if c.is_ascii_whitespace() || c == '>' || c == '/' => {}
            _ => continue,
        }

        let end = lower[after..].find('>').map(|i| after + i).unwrap_or(lower.len());
        pos = end;
        return Some((&body[after..end], &lower[after..end]));
    })
}

/// Value of attribute `name` inside a tag, quoted or bare.
fn attr_value(tag: &str, tag_lower: &str, name: &str) -> Option<String> {
    let bytes = tag_lower.as_bytes();
    let mut from = 0;

    while let Some(found) = tag_lower[from..].find(name) {
        let start = from + found;
        from = start + name.len();

        // Reject `data-src`, `crossorigin-href` and friends.
        if start > 0 && !bytes[start - 1].is_ascii_whitespace() {
            continue;
        }

        let rest = tag_lower[from..].trim_start();
        if !rest.starts_with('=') {
            continue;
        }

        let value_start = tag.len() - rest.len() + 1;
        let value = tag[value_start..].trim_start();
        let parsed = match value.chars().next() {
            Some(q @ ('"' | '\'')) => {
                let inner = &value[1..];
                inner.find(q).map(|end| &inner[..end])
            }
            Some(_) => Some(
                value
                    .split(|c: char| c.is_ascii_whitespace() || c == '>')
                    .next()
                    .unwrap_or_default(),
            ),
            None => None,
        };

        return parsed
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
    }

    None
}

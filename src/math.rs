/// Best-effort math span detection.
///
/// Mirrors the delimiters the original page handed its math renderer:
/// `$$…$$` for display math, `$…$` for inline. The pass only splits text
/// so the painter can restyle the spans; an unterminated delimiter leaves
/// the text untouched. Dollar amounts can false-positive in pairs
/// ("$5 and $6"), the same trade-off the auto-render pass made.
#[derive(Debug, Clone, PartialEq)]
pub enum MathSegment<'a> {
    Text(&'a str),
    Inline(&'a str),
    Display(&'a str),
}

pub fn split_math(text: &str) -> Vec<MathSegment<'_>> {
    let mut segments = Vec::new();
    let mut rest = text;
    loop {
        let Some(start) = rest.find('$') else {
            if !rest.is_empty() {
                segments.push(MathSegment::Text(rest));
            }
            break;
        };
        let after = &rest[start..];
        let parsed = if let Some(body) = after.strip_prefix("$$") {
            body.find("$$").map(|end| {
                (MathSegment::Display(&body[..end]), start + 2 + end + 2)
            })
        } else {
            let body = &after[1..];
            body.find('$')
                .map(|end| (MathSegment::Inline(&body[..end]), start + 1 + end + 1))
        };
        match parsed {
            Some((segment, consumed)) if !segment_body(&segment).trim().is_empty() => {
                if start > 0 {
                    segments.push(MathSegment::Text(&rest[..start]));
                }
                segments.push(segment);
                rest = &rest[consumed..];
            }
            _ => {
                // Unterminated or empty: the dollar sign is just text
                segments.push(MathSegment::Text(&rest[..start + 1]));
                rest = &rest[start + 1..];
            }
        }
    }
    segments
}

fn segment_body<'a>(segment: &MathSegment<'a>) -> &'a str {
    match segment {
        MathSegment::Text(s) | MathSegment::Inline(s) | MathSegment::Display(s) => s,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

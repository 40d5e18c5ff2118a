/// Best-effort flowchart text layout.
///
/// The backend wraps diagram answers in `div.mermaid` blocks whose source
/// is ordinary mermaid flowchart syntax. This module lays the common subset
/// out as plain text lines for the transcript: one line per edge, labels
/// preserved, node ids replaced by their bracket labels. Anything the
/// parser cannot follow fails the whole block, and the painter shows the
/// fixed placeholder instead, the same per-block isolation the original
/// render pass had.
use anyhow::{Result, bail};

/// Placeholder text for a diagram block that failed to parse.
pub const PARSE_ERROR_PLACEHOLDER: &str = "mermaid parse error";

/// One node reference. The id carries identity; the bracket label, when
/// present, wins for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub from: Node,
    pub to: Node,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Flowchart {
    pub direction: String,
    /// Standalone node declarations with no edge of their own.
    pub isolated: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Parse the flowchart subset: a `graph`/`flowchart` header, then edges
/// (`A --> B`, optional `|label|`) and bare node declarations. `%%`
/// comments and blank lines are skipped. Unknown statements are an error.
pub fn parse_flowchart(source: &str) -> Result<Flowchart> {
    let mut statements = source
        .split(['\n', ';'])
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("%%"));

    let header = match statements.next() {
        Some(h) => h,
        None => bail!("empty diagram"),
    };
    let direction = parse_header(header)?;

    let mut chart = Flowchart {
        direction,
        isolated: Vec::new(),
        edges: Vec::new(),
    };
    for statement in statements {
        parse_statement(statement, &mut chart)?;
    }
    if chart.edges.is_empty() && chart.isolated.is_empty() {
        bail!("diagram has no nodes");
    }
    // A node that appears in an edge is not isolated after all
    let connected: Vec<&str> = chart
        .edges
        .iter()
        .flat_map(|e| [e.from.id.as_str(), e.to.id.as_str()])
        .collect();
    chart.isolated.retain(|n| !connected.contains(&n.id.as_str()));
    Ok(chart)
}

/// Render a parsed flowchart as indented text lines.
pub fn layout(chart: &Flowchart) -> Vec<String> {
    let mut lines = Vec::new();
    for edge in &chart.edges {
        let line = match &edge.label {
            Some(label) => format!("{} ──{}──▶ {}", edge.from.display, label, edge.to.display),
            None => format!("{} ──▶ {}", edge.from.display, edge.to.display),
        };
        lines.push(line);
    }
    for node in &chart.isolated {
        lines.push(node.display.clone());
    }
    lines
}

fn parse_header(line: &str) -> Result<String> {
    let rest = line
        .strip_prefix("graph")
        .or_else(|| line.strip_prefix("flowchart"))
        .filter(|r| r.is_empty() || r.starts_with(char::is_whitespace));
    let Some(rest) = rest else {
        bail!("not a flowchart: {line:?}");
    };
    let direction = rest.trim();
    match direction {
        "" => Ok("TD".to_string()),
        "TD" | "TB" | "LR" | "RL" | "BT" => Ok(direction.to_string()),
        other => bail!("unknown direction: {other:?}"),
    }
}

fn parse_statement(statement: &str, chart: &mut Flowchart) -> Result<()> {
    match find_arrow(statement) {
        Some((arrow_start, arrow_len)) => {
            let from = parse_node(statement[..arrow_start].trim())?;
            let mut rest = statement[arrow_start + arrow_len..].trim();
            let mut label = None;
            if let Some(after_pipe) = rest.strip_prefix('|') {
                match after_pipe.find('|') {
                    Some(end) => {
                        label = Some(after_pipe[..end].trim().to_string());
                        rest = after_pipe[end + 1..].trim();
                    }
                    None => bail!("unterminated edge label: {statement:?}"),
                }
            }
            let to = parse_node(rest)?;
            chart.edges.push(Edge { from, to, label });
            Ok(())
        }
        None => {
            let node = parse_node(statement)?;
            chart.isolated.push(node);
            Ok(())
        }
    }
}

const ARROWS: &[&str] = &["-.->", "==>", "-->", "---"];

fn find_arrow(statement: &str) -> Option<(usize, usize)> {
    ARROWS
        .iter()
        .filter_map(|a| statement.find(a).map(|pos| (pos, a.len())))
        .min_by_key(|(pos, _)| *pos)
}

/// A node is an id with an optional shape-bracketed label: `A`, `A[Text]`,
/// `B(Text)`, `C{Text}`, `D((Text))`.
fn parse_node(token: &str) -> Result<Node> {
    let token = token.trim();
    if token.is_empty() {
        bail!("missing node");
    }
    let id_end = token
        .find(['[', '(', '{'])
        .unwrap_or(token.len());
    let id = token[..id_end].trim();
    if id.is_empty() || !id.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        bail!("bad node id: {token:?}");
    }
    let label = token[id_end..]
        .trim()
        .trim_start_matches(['[', '(', '{'])
        .trim_end_matches([']', ')', '}'])
        .trim();
    let display = if label.is_empty() { id } else { label };
    Ok(Node {
        id: id.to_string(),
        display: display.to_string(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_graph_parses() {
        let chart = parse_flowchart("graph TD\nA[Start] --> B{Decision}\nB -->|yes| C[Done]").unwrap();
        assert_eq!(chart.direction, "TD");
        assert_eq!(chart.edges.len(), 2);
        assert_eq!(chart.edges[0].from.display, "Start");
        assert_eq!(chart.edges[0].to.display, "Decision");
        assert_eq!(chart.edges[1].label.as_deref(), Some("yes"));
        assert_eq!(chart.edges[1].to.display, "Done");
    }

    #[test]
    fn semicolon_separated_statements_parse() {
        let chart = parse_flowchart("graph LR; A-->B; B-->C;").unwrap();
        assert_eq!(chart.direction, "LR");
        assert_eq!(chart.edges.len(), 2);
        assert_eq!(chart.edges[1].from.id, "B");
    }

    #[test]
    fn flowchart_header_and_comments_are_accepted() {
        let chart =
            parse_flowchart("flowchart LR\n%% a comment\nA --> B\n\nC[Alone]").unwrap();
        assert_eq!(chart.edges.len(), 1);
        assert_eq!(chart.isolated.len(), 1);
        assert_eq!(chart.isolated[0].display, "Alone");
    }

    #[test]
    fn node_referenced_by_edge_is_not_isolated() {
        // Identity is the id, not the label: A[Start] and the A in the edge
        // are the same node
        let chart = parse_flowchart("graph TD\nA[Start]\nA --> B").unwrap();
        assert!(chart.isolated.is_empty());
    }

    #[test]
    fn garbage_fails_to_parse() {
        assert!(parse_flowchart("sequenceDiagram\nAlice->>Bob: hi").is_err());
        assert!(parse_flowchart("").is_err());
        assert!(parse_flowchart("graph XX\nA-->B").is_err());
        assert!(parse_flowchart("graph TD\nA --> ").is_err());
        assert!(parse_flowchart("graph TD\nA -->|dangling B").is_err());
    }

    #[test]
    fn layout_lists_edges_with_labels() {
        let chart = parse_flowchart("graph TD\nA[Start] -->|ok| B[End]\nC[Spare]").unwrap();
        let lines = layout(&chart);
        assert_eq!(lines, vec!["Start ──ok──▶ End".to_string(), "Spare".to_string()]);
    }

    #[test]
    fn dotted_and_thick_arrows_parse() {
        let chart = parse_flowchart("graph TD\nA -.-> B\nB ==> C").unwrap();
        assert_eq!(chart.edges.len(), 2);
    }
}

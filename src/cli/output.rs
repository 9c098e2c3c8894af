//! Colored output helpers for CLI
//!
//! Consistent terminal output for ares-research: status lines, key/value
//! listings, the research graph tree and report rendering.

use crate::graph::{GraphState, NodePayload, NodeStatus, ResearchNode};
use crate::types::{Report, SourceStatus};
use owo_colors::OwoColorize;
use std::collections::BTreeMap;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    pub fn new() -> Self {
        Self { colored: true }
    }

    pub fn no_color() -> Self {
        Self { colored: false }
    }

    pub fn banner(&self) {
        if self.colored {
            println!(
                "\n  {} {}\n",
                "ares-research".bright_cyan().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!("\n  ares-research v{}\n", env!("CARGO_PKG_VERSION"));
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a file creation message
    pub fn created(&self, file_type: &str, path: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "✓".green().bold(),
                file_type.dimmed(),
                path.bright_white()
            );
        } else {
            println!("  [CREATED] {} {}", file_type, path);
        }
    }

    pub fn created_dir(&self, path: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "✓".green().bold(),
                "directory".dimmed(),
                path.bright_white()
            );
        } else {
            println!("  [CREATED] directory {}", path);
        }
    }

    pub fn skipped(&self, path: &str, reason: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "○".yellow(),
                path.dimmed(),
                format!("({})", reason).yellow()
            );
        } else {
            println!("  [SKIPPED] {} ({})", path, reason);
        }
    }

    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    pub fn subheader(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.cyan().bold());
        } else {
            println!("\n  --- {} ---", title);
        }
    }

    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "💡".dimmed(), message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print a command suggestion
    pub fn command(&self, cmd: &str) {
        if self.colored {
            println!("     {}", format!("$ {}", cmd).bright_cyan());
        } else {
            println!("     $ {}", cmd);
        }
    }

    /// Print a completion message
    pub fn complete(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "🚀".green(), message.bright_green().bold());
        } else {
            println!("\n  [DONE] {}", message);
        }
    }

    pub fn table_header(&self, columns: &[&str]) {
        let header: String = columns
            .iter()
            .map(|c| format!("{:<20}", c))
            .collect::<Vec<_>>()
            .join(" ");
        if self.colored {
            println!("    {}", header.bright_white().bold());
            println!("    {}", "─".repeat(columns.len() * 21).dimmed());
        } else {
            println!("    {}", header);
            println!("    {}", "-".repeat(columns.len() * 21));
        }
    }

    pub fn table_row(&self, values: &[&str]) {
        let row: String = values
            .iter()
            .map(|v| format!("{:<20}", v))
            .collect::<Vec<_>>()
            .join(" ");
        println!("    {}", row);
    }

    pub fn newline(&self) {
        println!();
    }

    // ============= Research graph =============

    fn status_tag(&self, status: NodeStatus) -> String {
        let tag = format!("[{}]", status);
        if !self.colored {
            return tag;
        }
        match status {
            NodeStatus::Pending => tag.dimmed().to_string(),
            NodeStatus::Loading => tag.yellow().to_string(),
            NodeStatus::Ready => tag.green().to_string(),
            NodeStatus::Failed => tag.red().bold().to_string(),
        }
    }

    /// One line per node, indented by tree depth
    pub fn graph_tree(&self, state: &GraphState) {
        if state.is_empty() {
            self.info("The research graph is empty");
            return;
        }
        for line in tree_lines(state) {
            let (depth, node) = line;
            let selected = state.selected_reports().iter().any(|id| id == &node.id);
            let marker = if selected { " *" } else { "" };
            let id = if self.colored {
                node.id.dimmed().to_string()
            } else {
                node.id.clone()
            };
            println!(
                "  {}{} {} {}  {}{}",
                "  ".repeat(depth),
                node.kind(),
                self.status_tag(node.status),
                truncate(&node.label(), 60),
                id,
                marker
            );
            if let Some(error) = &node.error {
                println!("  {}   {}", "  ".repeat(depth), error);
            }
        }
        let consolidations = state
            .edges()
            .iter()
            .filter(|e| e.kind == crate::graph::EdgeKind::Consolidation)
            .count();
        if consolidations > 0 {
            self.hint(&format!("{} consolidation edge(s)", consolidations));
        }
    }

    /// Everything known about one node
    pub fn node_detail(&self, node: &ResearchNode, state: &GraphState) {
        self.header(&format!("{} {}", node.kind(), node.id));
        self.kv("status", &node.status.to_string());
        if let Some(parent) = &node.parent_id {
            self.kv("parent", parent);
        }
        if let Some(error) = &node.error {
            self.kv("error", error);
        }

        match &node.payload {
            NodePayload::Group(p) => self.kv("label", &p.label),
            NodePayload::Search(p) => {
                self.kv("query", &p.query);
                self.kv("time filter", p.time_filter.as_str());
                self.kv("provider", &p.provider.to_string());
                if let Some(optimized) = &p.optimized {
                    self.kv("explanation", &optimized.explanation);
                    self.subheader("Suggested structure");
                    for section in &optimized.suggested_structure {
                        self.list_item(section);
                    }
                }
            }
            NodePayload::Selection(p) => {
                self.kv("brief", &p.prompt_draft);
                if !p.analysis.is_empty() {
                    self.kv("analysis", &p.analysis);
                }
                self.subheader("Results");
                self.table_header(&["id", "score", "url"]);
                for result in &p.results {
                    let score = format!("{:.2}", result.score);
                    self.table_row(&[&result.id, &score, &result.url]);
                }
            }
            NodePayload::Report(p) => {
                let contributors = state.contributors_of(&node.id);
                if !contributors.is_empty() {
                    self.kv("consolidates", &contributors.join(", "));
                }
                if let Some(report) = &p.report {
                    self.report(report, &p.source_status);
                }
            }
            NodePayload::FollowUp(p) => {
                for (i, term) in p.search_terms.iter().enumerate() {
                    self.list_item(&format!("{}: {}", i, term));
                }
            }
        }
    }

    pub fn report(&self, report: &Report, source_status: &BTreeMap<String, SourceStatus>) {
        self.header(&report.title);
        println!("\n  {}", report.summary);
        for section in &report.sections {
            self.subheader(&section.title);
            for line in section.content.lines() {
                println!("    {}", line);
            }
        }
        if !report.sources.is_empty() {
            self.subheader("Sources");
            for source in &report.sources {
                let status = match source_status.get(&source.url) {
                    Some(SourceStatus::Preview) => " (preview)",
                    _ => "",
                };
                self.list_item(&format!("{} <{}>{}", source.name, source.url, status));
            }
        }
    }
}

/// Depth-first walk from every root, children in creation order
pub fn tree_lines(state: &GraphState) -> Vec<(usize, &ResearchNode)> {
    let mut lines = Vec::new();
    let mut stack: Vec<(usize, &ResearchNode)> =
        state.roots().into_iter().rev().map(|n| (0, n)).collect();
    while let Some((depth, node)) = stack.pop() {
        lines.push((depth, node));
        for child in state.children(&node.id).into_iter().rev() {
            stack.push((depth + 1, child));
        }
    }
    lines
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{GroupPayload, SearchPayload};
    use crate::graph::Intent;

    fn sample_state() -> GraphState {
        let mut state = GraphState::new();
        let group = ResearchNode::new(
            None,
            NodePayload::Group(GroupPayload {
                label: "rust".to_string(),
            }),
            NodeStatus::Ready,
        );
        let search = ResearchNode::new(
            Some(group.id.clone()),
            NodePayload::Search(SearchPayload {
                query: "rust async".to_string(),
                time_filter: Default::default(),
                provider: Default::default(),
                test_mode: false,
                optimized: None,
            }),
            NodeStatus::Loading,
        );
        state.apply(Intent::CreateNode(group)).unwrap();
        state.apply(Intent::CreateNode(search)).unwrap();
        state
    }

    #[test]
    fn test_tree_lines_depths() {
        let state = sample_state();
        let depths: Vec<usize> = tree_lines(&state).iter().map(|(d, _)| *d).collect();
        assert_eq!(depths, vec![0, 1]);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn test_output_methods_no_panic() {
        for output in [Output::no_color(), Output::new()] {
            let state = sample_state();
            output.banner();
            output.success("ok");
            output.info("info");
            output.warning("warn");
            output.error("error");
            output.created("file", "research.toml");
            output.created_dir("data/projects");
            output.complete("done");
            output.skipped("research.toml", "exists");
            output.kv("key", "value");
            output.command("ares-research show");
            output.table_header(&[]);
            output.table_row(&["a"]);
            output.graph_tree(&state);
            output.graph_tree(&GraphState::new());
            for node in state.nodes() {
                output.node_detail(node, &state);
            }
        }
    }
}

//! Markdown report generation
//!
//! This module renders a finished audit as a human-readable markdown
//! report: scores, ranked pages, prioritized issues and the per-stage
//! details behind them.

use crate::analysis::Severity;
use crate::output::OutputResult;
use crate::report::{AuditResult, PageFailure};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Issues listed per severity before the rest are summarized
const MAX_ISSUES_PER_SEVERITY: usize = 50;

/// Global keywords shown in the text section
const MAX_KEYWORDS: usize = 20;

/// Writes the markdown report of an audit
///
/// # Arguments
///
/// * `result` - The finished audit
/// * `output_path` - Path where the markdown file should be written
pub fn write_markdown_report(result: &AuditResult, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_report(result);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Escapes characters that would break a table cell
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Formats an audit result as markdown
pub fn format_markdown_report(result: &AuditResult) -> String {
    let mut md = String::new();

    md.push_str(&format!("# SEO Audit: {}\n\n", result.website.root_url));

    // Audit metadata
    md.push_str("## Audit Information\n\n");
    md.push_str(&format!("- **Status**: {}\n", result.status));
    md.push_str(&format!(
        "- **Generated**: {}\n",
        result.generated_at.to_rfc3339()
    ));
    md.push_str(&format!(
        "- **Limits**: {} pages, depth {}\n",
        result.website.max_pages, result.website.max_depth
    ));
    md.push_str(&format!("- **Language**: {}\n", result.text.language));
    md.push_str(&format!(
        "- **Fingerprint**: `{}`\n",
        result.website.fingerprint
    ));
    if result.timed_out {
        md.push_str("- **Note**: the audit timeout cut the crawl short\n");
    }
    md.push('\n');

    // Scores
    md.push_str("## Scores\n\n");
    md.push_str("| Category | Score |\n");
    md.push_str("|----------|-------|\n");
    md.push_str(&format!("| **Overall** | **{:.2}** |\n", result.overall_score));
    md.push_str(&format!(
        "| Technical | {:.2} |\n",
        result.category_scores.technical
    ));
    md.push_str(&format!(
        "| On-page | {:.2} |\n",
        result.category_scores.on_page
    ));
    md.push_str(&format!("| Text | {:.2} |\n\n", result.category_scores.text));

    // Crawl
    let crawl = &result.crawl;
    md.push_str("## Crawl\n\n");
    md.push_str(&format!("- **Parsed**: {}\n", crawl.parsed));
    md.push_str(&format!("- **Failed**: {}\n", crawl.failed));
    md.push_str(&format!("- **Skipped**: {}\n", crawl.skipped));
    md.push_str(&format!("- **Requests**: {}\n", crawl.requests));
    md.push_str(&format!(
        "- **Duration**: {:.1} seconds\n\n",
        crawl.duration_ms as f64 / 1000.0
    ));

    // Ranked pages
    if !result.top_pages.is_empty() {
        md.push_str("## Top Pages\n\n");
        md.push_str("| Rank | URL | Depth | Inlinks | Score | On-page |\n");
        md.push_str("|------|-----|-------|---------|-------|---------|\n");
        for page in &result.top_pages {
            let on_page = result
                .on_page
                .iter()
                .find(|p| p.page_id == page.page_id)
                .map(|p| format!("{:.1}", p.score))
                .unwrap_or_else(|| "-".to_string());
            md.push_str(&format!(
                "| {} | {} | {} | {} | {:.2} | {} |\n",
                page.rank,
                cell(&page.url),
                page.depth,
                page.inlinks,
                page.score,
                on_page
            ));
        }
        md.push('\n');
    }

    // Issues
    md.push_str("## Issues\n\n");
    if result.issues.is_empty() {
        md.push_str("No issues found.\n\n");
    }
    for severity in [Severity::Critical, Severity::Warning, Severity::Info] {
        let issues: Vec<_> = result
            .issues
            .iter()
            .filter(|i| i.severity == severity)
            .collect();
        if issues.is_empty() {
            continue;
        }

        md.push_str(&format!("### {} ({})\n\n", severity, issues.len()));
        for issue in issues.iter().take(MAX_ISSUES_PER_SEVERITY) {
            match &issue.page_url {
                Some(url) => md.push_str(&format!("- **{}** {}: {}", issue.check, url, issue.message)),
                None => md.push_str(&format!("- **{}** {}", issue.check, issue.message)),
            }
            if !issue.recommendation.is_empty() {
                md.push_str(&format!(" _{}_", issue.recommendation));
            }
            md.push('\n');
        }
        if issues.len() > MAX_ISSUES_PER_SEVERITY {
            md.push_str(&format!(
                "\n... and {} more\n",
                issues.len() - MAX_ISSUES_PER_SEVERITY
            ));
        }
        md.push('\n');
    }

    // Technical
    let technical = &result.technical;
    md.push_str("## Technical Checks\n\n");
    md.push_str("| Category | Weight | Score | Passed |\n");
    md.push_str("|----------|--------|-------|--------|\n");
    for category in &technical.categories {
        md.push_str(&format!(
            "| {} | {:.2} | {:.1} | {} |\n",
            category.category.as_str(),
            category.weight,
            category.score,
            if category.passed { "yes" } else { "no" }
        ));
    }
    md.push('\n');

    let vitals = &technical.core_web_vitals;
    md.push_str(&format!(
        "Core Web Vitals are estimated from {} and rated {:?}",
        vitals.source, vitals.rating
    ));
    if let Some(lcp) = vitals.lcp_seconds {
        md.push_str(&format!(" (LCP about {:.2}s)", lcp));
    }
    md.push_str(".\n\n");

    // Text
    md.push_str("## Text\n\n");
    md.push_str(&format!("- **Score**: {:.2}\n", result.text.score));
    let insufficient = result.text.pages.iter().filter(|p| p.insufficient).count();
    if insufficient > 0 {
        md.push_str(&format!(
            "- **Pages with too little text**: {}\n",
            insufficient
        ));
    }
    md.push('\n');

    if !result.text.global_keywords.is_empty() {
        md.push_str("| Keyword | Count | Pages | Density |\n");
        md.push_str("|---------|-------|-------|---------|\n");
        for keyword in result.text.global_keywords.iter().take(MAX_KEYWORDS) {
            md.push_str(&format!(
                "| {} | {} | {} | {:.2}% |\n",
                cell(&keyword.term),
                keyword.count,
                keyword.pages,
                keyword.density
            ));
        }
        md.push('\n');
    }

    let readable: Vec<_> = result
        .text
        .pages
        .iter()
        .filter(|p| p.readability.is_some())
        .collect();
    if !readable.is_empty() {
        md.push_str("### Readability\n\n");
        md.push_str("| URL | Words | Readability | Level |\n");
        md.push_str("|-----|-------|-------------|-------|\n");
        for page in readable {
            md.push_str(&format!(
                "| {} | {} | {:.1} | {} |\n",
                cell(&page.url),
                page.word_count,
                page.readability.unwrap_or_default(),
                page.level.as_deref().unwrap_or("-")
            ));
        }
        md.push('\n');
    }

    if !result.keyword_graph.clusters.is_empty() {
        md.push_str("### Keyword Clusters\n\n");
        for (i, cluster) in result.keyword_graph.clusters.iter().enumerate() {
            md.push_str(&format!("{}. {}\n", i + 1, cluster.join(", ")));
        }
        md.push('\n');
    }

    push_failures(&mut md, "Failed Pages", &result.failed_pages);
    push_failures(&mut md, "Skipped Pages", &result.skipped_pages);

    md
}

fn push_failures(md: &mut String, title: &str, pages: &[PageFailure]) {
    if pages.is_empty() {
        return;
    }
    md.push_str(&format!("## {}\n\n", title));
    md.push_str("| URL | Depth | Status | Reason |\n");
    md.push_str("|-----|-------|--------|--------|\n");
    for page in pages {
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            cell(&page.url),
            page.depth,
            page.status_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            cell(&page.reason)
        ));
    }
    md.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::sample;
    use tempfile::TempDir;

    #[test]
    fn test_format_markdown_report() {
        let result = sample::result();
        let markdown = format_markdown_report(&result);

        assert!(markdown.contains("# SEO Audit: https://example.com/"));
        assert!(markdown.contains("## Scores"));
        assert!(markdown.contains(&format!("**{:.2}**", result.overall_score)));
        assert!(markdown.contains("## Top Pages"));
        assert!(markdown.contains("| 1 | https://example.com/ |"));
        assert!(markdown.contains("## Technical Checks"));
        assert!(markdown.contains("| robots_txt |"));
    }

    #[test]
    fn test_markdown_lists_failures() {
        let markdown = format_markdown_report(&sample::result());

        assert!(markdown.contains("## Failed Pages"));
        assert!(markdown.contains("https://example.com/broken"));
        assert!(markdown.contains("http-500"));
        assert!(!markdown.contains("## Skipped Pages"));
    }

    #[test]
    fn test_markdown_marks_timeout() {
        let mut result = sample::result();
        assert!(!format_markdown_report(&result).contains("timeout"));
        result.timed_out = true;
        assert!(format_markdown_report(&result).contains("the audit timeout cut the crawl short"));
    }

    #[test]
    fn test_table_cells_are_escaped() {
        assert_eq!(cell("a|b\nc"), "a\\|b c");
    }

    #[test]
    fn test_write_markdown_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.md");
        write_markdown_report(&sample::result(), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# SEO Audit"));
    }
}

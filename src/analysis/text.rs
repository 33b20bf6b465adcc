//! Text analysis: language, keywords, readability and the keyword graph
//!
//! Pages with fewer than [`MIN_TOKENS`] usable tokens are flagged as
//! insufficient text and skipped for density and readability instead of
//! failing the stage.

use crate::analysis::{
    round2, Analyzer, Issue, IssueCategory, PartialResult, PartialResults, Severity,
    SiteSnapshot,
};
use crate::audit::Language;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Below this many tokens a page has insufficient text
pub const MIN_TOKENS: usize = 20;

pub const PAGE_KEYWORDS: usize = 30;
pub const GLOBAL_KEYWORDS: usize = 50;
pub const GRAPH_NODES: usize = 30;

/// Density above which a keyword counts as stuffed
const STUFFING_DENSITY: f64 = 5.0;

const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "also", "am", "an", "and", "any", "are", "as",
    "at", "be", "because", "been", "before", "being", "below", "between", "both", "but", "by",
    "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his", "how",
    "if", "in", "into", "is", "it", "its", "just", "me", "more", "most", "my", "no", "nor", "not",
    "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours", "out", "over", "own",
    "same", "she", "should", "so", "some", "such", "than", "that", "the", "their", "theirs",
    "them", "then", "there", "these", "they", "this", "those", "through", "to", "too", "under",
    "until", "up", "us", "very", "was", "we", "were", "what", "when", "where", "which", "while",
    "who", "whom", "why", "will", "with", "would", "you", "your", "yours",
];

const KOREAN_STOPWORDS: &[&str] = &[
    "그리고", "그러나", "하지만", "그래서", "또는", "또한", "그런데", "따라서", "이것", "그것",
    "저것", "여기", "거기", "저기", "우리", "저희", "당신", "있다", "없다", "하다", "되다", "이다",
    "있는", "없는", "하는", "되는", "위해", "대한", "통해", "같은", "모든", "각각", "이런", "그런",
    "저런", "어떤", "무엇", "때문", "정도", "경우", "등등", "입니다", "합니다", "있습니다",
];

/// Trailing particles stripped from Korean tokens, longest first
const KOREAN_PARTICLES: &[&str] = &[
    "에서는", "으로는", "에게서", "이라는", "에서", "으로", "에게", "부터", "까지", "이나", "라는",
    "처럼", "보다", "은", "는", "이", "가", "을", "를", "에", "의", "로", "와", "과", "도", "만",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordStat {
    pub term: String,
    pub count: u32,
    /// Percentage of the page's tokens, two decimals
    pub density: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Readability {
    pub score: f64,
    pub level: String,
    pub avg_sentence_words: f64,
}

/// Text analysis of one parsed page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    pub page_id: i64,
    pub url: String,
    pub language: Language,
    pub token_count: usize,
    pub word_count: usize,
    pub insufficient: bool,
    pub keywords: Vec<KeywordStat>,
    pub readability: Option<Readability>,
    pub score: Option<f64>,
}

impl PageText {
    /// The page's most frequent keyword
    pub fn primary_keyword(&self) -> Option<&str> {
        self.keywords.first().map(|k| k.term.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalKeyword {
    pub term: String,
    pub count: u32,
    /// Pages listing the term among their keywords
    pub pages: usize,
    pub density: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub term: String,
    pub count: u32,
    /// Number of edges touching the node
    pub degree: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    /// Pages where both terms are among the page's keywords
    pub weight: u32,
}

/// Cross-page keyword co-occurrence structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    /// Connected components over strong edges, members in keyword rank order
    pub clusters: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextReport {
    /// Majority language over pages with sufficient text
    pub language: Language,
    pub score: f64,
    pub pages: Vec<PageText>,
    pub global_keywords: Vec<GlobalKeyword>,
    pub keyword_graph: KeywordGraph,
    pub issues: Vec<Issue>,
}

impl TextReport {
    pub fn page(&self, page_id: i64) -> Option<&PageText> {
        self.pages.iter().find(|p| p.page_id == page_id)
    }

    pub fn insufficient_pages(&self) -> impl Iterator<Item = &PageText> {
        self.pages.iter().filter(|p| p.insufficient)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextAnalyzer;

impl Analyzer for TextAnalyzer {
    fn name(&self) -> &'static str {
        "text"
    }

    fn analyze(&self, site: &SiteSnapshot<'_>, _prior: &PartialResults) -> Result<PartialResult> {
        Ok(PartialResult::Text(self.run(site)))
    }
}

impl TextAnalyzer {
    pub fn run(&self, site: &SiteSnapshot<'_>) -> TextReport {
        let mut issues = Vec::new();
        let pages: Vec<PageText> = site
            .parsed_pages()
            .map(|page| {
                let analysis = analyze_page(page.id, &page.url, &page.text, site.language);
                issues.extend(page_issues(&analysis));
                analysis
            })
            .collect();

        let sufficient: Vec<&PageText> = pages.iter().filter(|p| !p.insufficient).collect();
        let score = if sufficient.is_empty() {
            if !pages.is_empty() {
                issues.push(
                    Issue::new(
                        Severity::Warning,
                        IssueCategory::Text,
                        "text_none",
                        "No crawled page has enough text to analyse",
                    )
                    .recommend("Add descriptive, crawlable text content to your pages"),
                );
            }
            0.0
        } else {
            let total: f64 = sufficient.iter().filter_map(|p| p.score).sum();
            round2(total / sufficient.len() as f64)
        };

        let korean = sufficient.iter().filter(|p| p.language == Language::Ko).count();
        let language = if sufficient.is_empty() {
            match site.language {
                Language::Auto => Language::En,
                forced => forced,
            }
        } else if korean * 2 > sufficient.len() {
            Language::Ko
        } else {
            Language::En
        };

        let global_keywords = global_keywords(&pages);
        let keyword_graph = build_keyword_graph(&pages, &global_keywords, sufficient.len());

        tracing::debug!(
            "Text analysis: {} pages, {} insufficient, {} global keywords",
            pages.len(),
            pages.len() - sufficient.len(),
            global_keywords.len()
        );

        TextReport {
            language,
            score,
            pages,
            global_keywords,
            keyword_graph,
            issues,
        }
    }
}

/// Analyzes one page's extracted text
pub fn analyze_page(page_id: i64, url: &str, text: &str, requested: Language) -> PageText {
    let language = match requested {
        Language::Auto => detect_language(text),
        forced => forced,
    };
    let tokens = tokenize(text, language);
    let word_count = text.split_whitespace().count();

    if tokens.len() < MIN_TOKENS {
        return PageText {
            page_id,
            url: url.to_string(),
            language,
            token_count: tokens.len(),
            word_count,
            insufficient: true,
            keywords: Vec::new(),
            readability: None,
            score: None,
        };
    }

    let keywords = keyword_stats(&tokens, PAGE_KEYWORDS);
    let readability = readability(text, language);
    let length = length_score(word_count);
    let balance = keyword_balance(keywords.first().map(|k| k.density).unwrap_or(0.0));
    let score = round2(0.4 * readability.score + 0.3 * length + 0.3 * balance);

    PageText {
        page_id,
        url: url.to_string(),
        language,
        token_count: tokens.len(),
        word_count,
        insufficient: false,
        keywords,
        readability: Some(readability),
        score: Some(score),
    }
}

fn page_issues(page: &PageText) -> Vec<Issue> {
    let mut issues = Vec::new();
    if page.insufficient {
        issues.push(
            Issue::new(
                Severity::Warning,
                IssueCategory::Text,
                "text_insufficient",
                format!(
                    "Insufficient text to analyse ({} words)",
                    page.word_count
                ),
            )
            .on_page(&page.url)
            .recommend("Add at least a few paragraphs of unique text"),
        );
        return issues;
    }

    if let Some(top) = page.keywords.first().filter(|k| k.density > STUFFING_DENSITY) {
        issues.push(
            Issue::new(
                Severity::Warning,
                IssueCategory::Text,
                "text_keyword_stuffing",
                format!("Keyword '{}' has a density of {:.2}%", top.term, top.density),
            )
            .on_page(&page.url)
            .recommend("Write naturally and use synonyms instead of repeating one term"),
        );
    }

    if let Some(readability) = page.readability.as_ref().filter(|r| r.score < 40.0) {
        issues.push(
            Issue::new(
                Severity::Info,
                IssueCategory::Text,
                "text_readability",
                format!(
                    "Text is hard to read (readability {:.0}, {:.1} words per sentence)",
                    readability.score, readability.avg_sentence_words
                ),
            )
            .on_page(&page.url)
            .recommend("Use shorter sentences and simpler words"),
        );
    }

    issues
}

fn is_hangul(c: char) -> bool {
    matches!(c, '\u{AC00}'..='\u{D7A3}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}')
}

/// Resolves `ko` or `en` from the share of Hangul among letters
pub fn detect_language(text: &str) -> Language {
    let mut letters = 0usize;
    let mut hangul = 0usize;
    for c in text.chars().filter(|c| c.is_alphabetic()) {
        letters += 1;
        if is_hangul(c) {
            hangul += 1;
        }
    }
    if letters > 0 && hangul * 10 >= letters * 3 {
        Language::Ko
    } else {
        Language::En
    }
}

fn strip_particle(token: &str) -> &str {
    if !token.chars().any(is_hangul) {
        return token;
    }
    for particle in KOREAN_PARTICLES {
        if let Some(stem) = token.strip_suffix(particle) {
            if stem.chars().count() >= 2 {
                return stem;
            }
        }
    }
    token
}

/// Splits text into lowercase alphanumeric tokens with stopwords removed
pub fn tokenize(text: &str, language: Language) -> Vec<String> {
    let stopwords: &[&str] = match language {
        Language::Ko => KOREAN_STOPWORDS,
        _ => ENGLISH_STOPWORDS,
    };

    text.split(|c: char| !c.is_alphanumeric())
        .filter(|raw| !raw.is_empty())
        .map(|raw| raw.to_lowercase())
        .map(|token| strip_particle(&token).to_string())
        .filter(|token| token.chars().count() >= 2)
        .filter(|token| !token.chars().all(|c| c.is_ascii_digit()))
        .filter(|token| !stopwords.contains(&token.as_str()))
        .filter(|token| {
            // Mixed-language pages still drop the other list's stopwords
            language != Language::Ko || !ENGLISH_STOPWORDS.contains(&token.as_str())
        })
        .collect()
}

/// Counts tokens and returns the `limit` most frequent with their density
///
/// Ties are broken alphabetically so the order is reproducible.
pub fn keyword_stats(tokens: &[String], limit: usize) -> Vec<KeywordStat> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_default() += 1;
    }

    let mut ranked: Vec<(&str, u32)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let total = tokens.len() as f64;
    ranked
        .into_iter()
        .take(limit)
        .map(|(term, count)| KeywordStat {
            term: term.to_string(),
            count,
            density: round2(f64::from(count) / total * 100.0),
        })
        .collect()
}

fn sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?', '。'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn syllables(word: &str) -> usize {
    let word = word.to_lowercase();
    let mut count = 0;
    let mut previous_vowel = false;
    for c in word.chars() {
        let vowel = matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
        if vowel && !previous_vowel {
            count += 1;
        }
        previous_vowel = vowel;
    }
    if word.ends_with('e') && !word.ends_with("le") && count > 1 {
        count -= 1;
    }
    count.max(1)
}

fn readability_level(score: f64) -> &'static str {
    if score >= 80.0 {
        "easy"
    } else if score >= 60.0 {
        "standard"
    } else if score >= 40.0 {
        "difficult"
    } else {
        "very difficult"
    }
}

/// Sentence-length readability for Korean, Flesch reading ease for English
pub fn readability(text: &str, language: Language) -> Readability {
    let sentence_count = sentences(text).len().max(1);
    let words: Vec<&str> = text.split_whitespace().collect();
    let avg_sentence_words = words.len() as f64 / sentence_count as f64;

    let score = match language {
        Language::Ko => {
            if avg_sentence_words < 10.0 {
                90.0
            } else if avg_sentence_words < 15.0 {
                80.0
            } else if avg_sentence_words < 20.0 {
                70.0
            } else if avg_sentence_words < 25.0 {
                60.0
            } else {
                50.0
            }
        }
        _ => {
            let alphabetic: Vec<&str> = words
                .iter()
                .copied()
                .filter(|w| w.chars().any(char::is_alphabetic))
                .collect();
            if alphabetic.is_empty() {
                0.0
            } else {
                let syllable_total: usize = alphabetic.iter().map(|w| syllables(w)).sum();
                let per_word = syllable_total as f64 / alphabetic.len() as f64;
                (206.835 - 1.015 * avg_sentence_words - 84.6 * per_word).clamp(0.0, 100.0)
            }
        }
    };

    let score = round2(score);
    Readability {
        score,
        level: readability_level(score).to_string(),
        avg_sentence_words: round2(avg_sentence_words),
    }
}

fn length_score(word_count: usize) -> f64 {
    match word_count {
        n if n >= 600 => 100.0,
        n if n >= 300 => 80.0,
        n if n >= 150 => 60.0,
        n => n as f64 / 150.0 * 60.0,
    }
}

/// Rewards a top keyword that is present without dominating the page
fn keyword_balance(top_density: f64) -> f64 {
    if (1.0..=3.0).contains(&top_density) {
        100.0
    } else if top_density > STUFFING_DENSITY {
        40.0
    } else if top_density >= 0.5 {
        70.0
    } else {
        50.0
    }
}

fn global_keywords(pages: &[PageText]) -> Vec<GlobalKeyword> {
    let mut totals: BTreeMap<&str, (u32, usize)> = BTreeMap::new();
    for keyword in pages.iter().flat_map(|p| &p.keywords) {
        let entry = totals.entry(keyword.term.as_str()).or_default();
        entry.0 += keyword.count;
        entry.1 += 1;
    }

    let grand_total: u32 = totals.values().map(|(count, _)| count).sum();
    let mut ranked: Vec<(&str, (u32, usize))> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then_with(|| a.0.cmp(b.0)));

    ranked
        .into_iter()
        .take(GLOBAL_KEYWORDS)
        .map(|(term, (count, pages))| GlobalKeyword {
            term: term.to_string(),
            count,
            pages,
            density: if grand_total == 0 {
                0.0
            } else {
                round2(f64::from(count) / f64::from(grand_total) * 100.0)
            },
        })
        .collect()
}

/// Builds the co-occurrence graph over the top global keywords
fn build_keyword_graph(
    pages: &[PageText],
    global: &[GlobalKeyword],
    sufficient_pages: usize,
) -> KeywordGraph {
    let terms: Vec<&str> = global
        .iter()
        .take(GRAPH_NODES)
        .map(|k| k.term.as_str())
        .collect();
    let index: HashMap<&str, usize> = terms.iter().enumerate().map(|(i, t)| (*t, i)).collect();

    let mut weights: BTreeMap<(usize, usize), u32> = BTreeMap::new();
    for page in pages.iter().filter(|p| !p.insufficient) {
        let mut present: Vec<usize> = page
            .keywords
            .iter()
            .filter_map(|k| index.get(k.term.as_str()).copied())
            .collect();
        present.sort_unstable();
        for (i, a) in present.iter().enumerate() {
            for b in &present[i + 1..] {
                *weights.entry((*a, *b)).or_default() += 1;
            }
        }
    }

    let threshold = if sufficient_pages <= 1 { 1 } else { 2 };
    let mut parent: Vec<usize> = (0..terms.len()).collect();
    fn find(parent: &mut [usize], i: usize) -> usize {
        let mut root = i;
        while parent[root] != root {
            root = parent[root];
        }
        let mut node = i;
        while parent[node] != root {
            let next = parent[node];
            parent[node] = root;
            node = next;
        }
        root
    }

    let mut degree = vec![0usize; terms.len()];
    let mut edges = Vec::with_capacity(weights.len());
    for (&(a, b), &weight) in &weights {
        degree[a] += 1;
        degree[b] += 1;
        if weight >= threshold {
            let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
            if ra != rb {
                // Lower rank index becomes the root so clusters stay ordered
                parent[ra.max(rb)] = ra.min(rb);
            }
        }
        edges.push(GraphEdge {
            source: terms[a].to_string(),
            target: terms[b].to_string(),
            weight,
        });
    }

    let mut components: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for i in 0..terms.len() {
        let root = find(&mut parent, i);
        components.entry(root).or_default().push(terms[i].to_string());
    }
    let clusters = components
        .into_values()
        .filter(|members| members.len() >= 2)
        .collect();

    let nodes = global
        .iter()
        .take(GRAPH_NODES)
        .zip(degree)
        .map(|(k, degree)| GraphNode {
            term: k.term.clone(),
            count: k.count,
            degree,
        })
        .collect();

    KeywordGraph {
        nodes,
        edges,
        clusters,
    }
}

//! Whole-document layout statistics learned before any line is
//! classified: header/footer bands, TOC page ranges and per-page font
//! profiles.

use std::collections::{BTreeMap, HashMap};

use crate::config::ClassifyConfig;
use crate::parse::Page;

use super::rules::CompiledRules;

#[derive(Debug, Clone, Copy)]
enum Edge {
    Top,
    Bottom,
}

/// Layout profile of one document. Learned once per document and shared
/// across all of its lines during classification.
#[derive(Debug)]
pub struct DocumentProfile {
    header_band: Option<(f64, f64)>,
    footer_band: Option<(f64, f64)>,
    toc_pages: Vec<u32>,
    page_stats: HashMap<u32, PageStats>,
    fallback: PageStats,
}

impl DocumentProfile {
    pub fn learn(pages: &[Page], rules: &CompiledRules, config: &ClassifyConfig) -> Self {
        Self {
            header_band: learn_band(pages, config, Edge::Top),
            footer_band: learn_band(pages, config, Edge::Bottom),
            toc_pages: detect_toc_pages(pages, rules, config),
            page_stats: pages
                .iter()
                .map(|p| (p.number, PageStats::for_page(p)))
                .collect(),
            fallback: PageStats::default(),
        }
    }

    pub fn in_header_band(&self, ury: f64) -> bool {
        self.header_band
            .map(|(lo, hi)| ury >= lo && ury <= hi)
            .unwrap_or(false)
    }

    pub fn in_footer_band(&self, lly: f64) -> bool {
        self.footer_band
            .map(|(lo, hi)| lly >= lo && lly <= hi)
            .unwrap_or(false)
    }

    pub fn is_toc_page(&self, page_no: u32) -> bool {
        self.toc_pages.contains(&page_no)
    }

    pub fn page_stats(&self, page_no: u32) -> &PageStats {
        self.page_stats.get(&page_no).unwrap_or(&self.fallback)
    }
}

/// Dominant font statistics of one page, weighted by character count so
/// a single oversized heading cannot masquerade as the body style.
#[derive(Debug, Clone, Default)]
pub struct PageStats {
    pub dominant_size: f64,
    pub dominant_bold: bool,
    pub avg_line_len: f64,
    pub body_lines: usize,
}

impl PageStats {
    fn for_page(page: &Page) -> Self {
        // Half-point buckets; tally (chars, bold chars) per bucket.
        let mut buckets: BTreeMap<i64, (usize, usize)> = BTreeMap::new();
        let mut total_len = 0usize;
        let mut counted = 0usize;

        for line in page.lines() {
            let chars = line.text.trim().chars().count();
            if chars == 0 {
                continue;
            }
            total_len += chars;
            counted += 1;
            let bucket = (line.font_size * 2.0).round() as i64;
            let tally = buckets.entry(bucket).or_default();
            tally.0 += chars;
            if line.bold {
                tally.1 += chars;
            }
        }

        if counted == 0 {
            return Self::default();
        }

        let mut dominant_bucket = 0i64;
        let mut dominant_chars = 0usize;
        let mut dominant_bold_chars = 0usize;
        for (bucket, (chars, bold_chars)) in &buckets {
            if *chars > dominant_chars {
                dominant_bucket = *bucket;
                dominant_chars = *chars;
                dominant_bold_chars = *bold_chars;
            }
        }

        Self {
            dominant_size: dominant_bucket as f64 / 2.0,
            dominant_bold: dominant_bold_chars * 2 > dominant_chars,
            avg_line_len: total_len as f64 / counted as f64,
            body_lines: counted,
        }
    }
}

/// Clusters per-page extreme line positions around their median. The
/// band is only accepted when a strict majority of pages fall inside it.
fn learn_band(pages: &[Page], config: &ClassifyConfig, edge: Edge) -> Option<(f64, f64)> {
    if pages.len() < config.min_pages_for_bands as usize {
        return None;
    }

    let mut extremes: Vec<f64> = pages
        .iter()
        .filter_map(|page| match edge {
            Edge::Top => page.lines().map(|l| l.ury).reduce(f64::max),
            Edge::Bottom => page.lines().map(|l| l.lly).reduce(f64::min),
        })
        .collect();
    if extremes.len() < config.min_pages_for_bands as usize {
        return None;
    }

    extremes.sort_by(|a, b| a.total_cmp(b));
    let median = extremes[extremes.len() / 2];
    let lo = median - config.band_tolerance;
    let hi = median + config.band_tolerance;

    let inside = extremes.iter().filter(|e| **e >= lo && **e <= hi).count();
    if (inside as f64) > config.band_page_fraction * pages.len() as f64 {
        Some((lo, hi))
    } else {
        None
    }
}

fn detect_toc_pages(pages: &[Page], rules: &CompiledRules, config: &ClassifyConfig) -> Vec<u32> {
    pages
        .iter()
        .filter_map(|page| {
            let total = page.lines().count();
            if total == 0 {
                return None;
            }
            let matches = page
                .lines()
                .filter(|l| rules.matches_toc_leader(&l.text))
                .count();
            let enough = matches >= config.toc_min_matches as usize
                && matches as f64 / total as f64 >= config.toc_line_fraction;
            enough.then_some(page.number)
        })
        .collect()
}

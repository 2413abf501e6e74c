//! Page selection policy (all / odd / even / custom ranges)

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which pages of a document receive the watermark set
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageSelection {
    #[default]
    All,
    OddOnly,
    EvenOnly,
    Custom(PageRanges),
}

/// Mode name as stored in settings and accepted on the command line
///
/// The Chinese labels are what older settings files stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeMode {
    #[default]
    #[serde(alias = "全部页面")]
    All,
    #[serde(alias = "奇数页")]
    Odd,
    #[serde(alias = "偶数页")]
    Even,
    #[serde(alias = "指定页面")]
    Custom,
}

impl FromStr for RangeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "全部页面" => Ok(RangeMode::All),
            "odd" | "奇数页" => Ok(RangeMode::Odd),
            "even" | "偶数页" => Ok(RangeMode::Even),
            "custom" | "指定页面" => Ok(RangeMode::Custom),
            other => Err(format!("unknown page mode '{}' (expected all, odd, even or custom)", other)),
        }
    }
}

impl PageSelection {
    /// Build a selection from a mode and the custom range text
    pub fn from_mode(mode: RangeMode, custom: &str) -> Self {
        match mode {
            RangeMode::All => PageSelection::All,
            RangeMode::Odd => PageSelection::OddOnly,
            RangeMode::Even => PageSelection::EvenOnly,
            RangeMode::Custom => PageSelection::Custom(PageRanges::parse(custom)),
        }
    }

    pub fn mode(&self) -> RangeMode {
        match self {
            PageSelection::All => RangeMode::All,
            PageSelection::OddOnly => RangeMode::Odd,
            PageSelection::EvenOnly => RangeMode::Even,
            PageSelection::Custom(_) => RangeMode::Custom,
        }
    }

    /// Whether the zero-based page index is selected
    pub fn matches(&self, page_index: usize) -> bool {
        let page_number = page_index + 1;
        match self {
            PageSelection::All => true,
            PageSelection::OddOnly => page_number % 2 == 1,
            PageSelection::EvenOnly => page_number % 2 == 0,
            PageSelection::Custom(ranges) => ranges.contains(page_number),
        }
    }

    /// False only for a custom selection with no usable token
    pub fn selects_any(&self) -> bool {
        match self {
            PageSelection::Custom(ranges) => !ranges.is_empty(),
            _ => true,
        }
    }
}

/// Parsed custom page list: 1-based pages and inclusive ranges
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageRanges {
    ranges: Vec<RangeInclusive<usize>>,
}

impl PageRanges {
    /// Parse `"1,3-5,9"`; ASCII and full-width commas both separate tokens
    ///
    /// Never fails: malformed tokens, page 0 and reversed ranges are skipped.
    pub fn parse(text: &str) -> Self {
        let ranges = text
            .split([',', '，'])
            .filter_map(parse_token)
            .collect();
        Self { ranges }
    }

    pub fn contains(&self, page_number: usize) -> bool {
        self.ranges.iter().any(|r| r.contains(&page_number))
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl fmt::Display for PageRanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .ranges
            .iter()
            .map(|r| {
                if r.start() == r.end() {
                    r.start().to_string()
                } else {
                    format!("{}-{}", r.start(), r.end())
                }
            })
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

fn parse_token(token: &str) -> Option<RangeInclusive<usize>> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    let (start, end) = match token.split_once('-') {
        Some((a, b)) => (a.trim().parse::<usize>().ok()?, b.trim().parse::<usize>().ok()?),
        None => {
            let page = token.parse::<usize>().ok()?;
            (page, page)
        }
    };

    (start >= 1 && start <= end).then_some(start..=end)
}
